//! Figure composition: tiles probability surfaces into a grid page and
//! renders it to an RGB buffer.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::surface::{Bounds, Surface};

#[derive(Debug, thiserror::Error)]
pub enum FigureError {
    #[error("Failed to draw the figure: {0}")]
    Draw(String),
    #[error("Failed to save the figure to {1:?}")]
    Save(#[source] image::ImageError, PathBuf),
}

type Result<T> = std::result::Result<T, FigureError>;

fn draw_err(e: impl std::fmt::Display) -> FigureError {
    FigureError::Draw(e.to_string())
}

/// Immutable plot style handed to the compositor, replacing library-global
/// mutable plotting state.
#[derive(Debug, Clone)]
pub struct PageStyle {
    /// Canvas size in pixels.
    pub width: u32,
    pub height: u32,
    pub font: String,
    pub tick_label_size: u32,
    pub axis_label_size: u32,
    pub flag_size: u32,
    pub evidence_size: u32,
    pub margin: u32,
    pub x_label_area: u32,
    pub y_label_area: u32,
}

impl Default for PageStyle {
    fn default() -> Self {
        // US letter at 150 dpi
        Self {
            width: 1275,
            height: 1650,
            font: String::from("sans-serif"),
            tick_label_size: 12,
            axis_label_size: 16,
            flag_size: 24,
            evidence_size: 14,
            margin: 10,
            x_label_area: 40,
            y_label_area: 60,
        }
    }
}

/// A rendered page, kept as a raw RGB buffer until saved or dropped.
pub struct Figure {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl Figure {
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
    /// Saves the page as a PNG file.
    pub fn save(&self, filename: impl AsRef<Path>) -> Result<()> {
        let filename = filename.as_ref();
        log::info!("Saving figure to {}", filename.display());
        image::save_buffer(
            filename,
            &self.rgb,
            self.width,
            self.height,
            image::ColorType::Rgb8,
        )
        .map_err(|e| FigureError::Save(e, filename.to_path_buf()))
    }
}

/// One page of probability surfaces laid out on a rows x cols grid of
/// sub-plots sharing their axis ranges.
pub struct Page<'a> {
    surfaces: &'a [Surface],
    bounds: Bounds,
    clip: Option<Bounds>,
    shape: (usize, usize),
    labels: Option<(&'a str, &'a str)>,
    converged: Option<&'a [bool]>,
    ln_evidence: Option<&'a [f64]>,
}

impl<'a> Page<'a> {
    pub fn new(surfaces: &'a [Surface], bounds: Bounds) -> Self {
        Self {
            surfaces,
            bounds,
            clip: None,
            shape: (3, 2),
            labels: None,
            converged: None,
            ln_evidence: None,
        }
    }
    pub fn shape(self, rows: usize, cols: usize) -> Self {
        Self {
            shape: (rows, cols),
            ..self
        }
    }
    /// Restricts the visible axis ranges; limits are shared by every cell.
    pub fn clip(self, clip: Bounds) -> Self {
        Self {
            clip: Some(clip),
            ..self
        }
    }
    pub fn labels(self, x: &'a str, y: &'a str) -> Self {
        Self {
            labels: Some((x, y)),
            ..self
        }
    }
    /// Per-star convergence flags; a failed star gets a "!" marker.
    pub fn converged(self, converged: &'a [bool]) -> Self {
        Self {
            converged: Some(converged),
            ..self
        }
    }
    /// Per-star log-evidence values, printed in each cell.
    pub fn ln_evidence(self, ln_evidence: &'a [f64]) -> Self {
        Self {
            ln_evidence: Some(ln_evidence),
            ..self
        }
    }

    /// Renders the page. The first min(len, rows*cols) surfaces fill the
    /// grid in row-major order; the remaining cells stay empty frames.
    pub fn render(&self, style: &PageStyle) -> Result<Figure> {
        let (rows, cols) = self.shape;
        let range = self.clip.unwrap_or(self.bounds);
        let anchor = Pos::new(HPos::Right, VPos::Top);
        let mut rgb = vec![0u8; style.width as usize * style.height as usize * 3];
        {
            let root =
                BitMapBackend::with_buffer(&mut rgb, (style.width, style.height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;
            let cells = root.split_evenly((rows, cols));
            let n_plots = self.surfaces.len().min(rows * cols);
            for (i, cell) in cells.iter().enumerate() {
                let bottom = i / cols + 1 == rows;
                let left = i % cols == 0;
                let mut builder = ChartBuilder::on(cell);
                builder.margin(style.margin);
                if bottom {
                    builder.x_label_area_size(style.x_label_area);
                }
                if left {
                    builder.y_label_area_size(style.y_label_area);
                }
                let mut chart = builder
                    .build_cartesian_2d(range.x_min..range.x_max, range.y_min..range.y_max)
                    .map_err(draw_err)?;
                let mut mesh = chart.configure_mesh();
                mesh.disable_x_mesh()
                    .disable_y_mesh()
                    .label_style((style.font.as_str(), style.tick_label_size));
                if let Some((x_label, y_label)) = self.labels {
                    if bottom {
                        mesh.x_desc(x_label);
                    }
                    if left {
                        mesh.y_desc(y_label);
                    }
                    mesh.axis_desc_style((style.font.as_str(), style.axis_label_size));
                }
                mesh.draw().map_err(draw_err)?;

                if i >= n_plots {
                    continue;
                }
                chart
                    .draw_series(heat_cells(&self.surfaces[i], &self.bounds, &range))
                    .map_err(draw_err)?;
                if self.converged.and_then(|c| c.get(i)) == Some(&false) {
                    let text = (style.font.as_str(), style.flag_size)
                        .into_font()
                        .color(&WHITE)
                        .pos(anchor);
                    chart
                        .draw_series(std::iter::once(Text::new(
                            "!",
                            (0.90 * range.x_max, 0.95 * range.y_max),
                            text,
                        )))
                        .map_err(draw_err)?;
                }
                if let Some(&value) = self.ln_evidence.and_then(|v| v.get(i)) {
                    let text = (style.font.as_str(), style.evidence_size)
                        .into_font()
                        .color(&WHITE)
                        .pos(anchor);
                    chart
                        .draw_series(std::iter::once(Text::new(
                            format_sig(value, 2),
                            (0.95 * range.x_max, 0.95 * range.y_max),
                            text,
                        )))
                        .map_err(draw_err)?;
                }
            }
            root.present().map_err(draw_err)?;
        }
        Ok(Figure {
            width: style.width,
            height: style.height,
            rgb,
        })
    }
}

/// One filled rectangle per bin, heat-mapped against the surface's own
/// density range. Bins outside the visible range are dropped or truncated;
/// plotters does not clip series to the axis limits on its own.
fn heat_cells(surface: &Surface, bounds: &Bounds, range: &Bounds) -> Vec<Rectangle<(f64, f64)>> {
    let (nx, ny) = (surface.nx(), surface.ny());
    let dx = (bounds.x_max - bounds.x_min) / nx as f64;
    let dy = (bounds.y_max - bounds.y_min) / ny as f64;
    let (min, max) = surface.minmax();
    let scale = max - min;
    (0..nx)
        .cartesian_product(0..ny)
        .filter_map(|(ix, iy)| {
            let x0 = (bounds.x_min + ix as f64 * dx).max(range.x_min);
            let x1 = (bounds.x_min + (ix + 1) as f64 * dx).min(range.x_max);
            let y0 = (bounds.y_min + iy as f64 * dy).max(range.y_min);
            let y1 = (bounds.y_min + (iy + 1) as f64 * dy).min(range.y_max);
            if x1 <= x0 || y1 <= y0 {
                return None;
            }
            let t = if scale > 0f64 {
                (surface.get(ix, iy) - min) / scale
            } else {
                0.5
            };
            Some(Rectangle::new([(x0, y0), (x1, y1)], hot(t).filled()))
        })
        .collect()
}

/// The classic black-red-yellow-white "hot" ramp.
fn hot(t: f64) -> RGBColor {
    let t = t.clamp(0f64, 1f64);
    let r = (3f64 * t).clamp(0f64, 1f64);
    let g = (3f64 * t - 1f64).clamp(0f64, 1f64);
    let b = (3f64 * t - 2f64).clamp(0f64, 1f64);
    RGBColor((r * 255f64) as u8, (g * 255f64) as u8, (b * 255f64) as u8)
}

/// `%.2g`-style formatting: `digits` significant figures, trailing zeros
/// trimmed, scientific notation outside [1e-4, 10^digits).
pub(crate) fn format_sig(value: f64, digits: usize) -> String {
    if !value.is_finite() || value == 0f64 {
        return format!("{}", value);
    }
    let digits = digits.max(1);
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        format!("{:.*e}", digits - 1, value)
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, value);
        if fixed.contains('.') {
            fixed
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        } else {
            fixed
        }
    }
}

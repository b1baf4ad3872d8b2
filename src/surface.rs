use std::ops::AddAssign;

/// Axis extents shared by every surface of a run, in the order the binner
/// wrote them: x then y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// The same extents with the upper y bound replaced, for clipping.
    pub fn with_y_max(self, y_max: f64) -> Self {
        Self { y_max, ..self }
    }
}

/// A binned 2-D probability density surface.
///
/// Densities are stored x-major: `data[ix * ny + iy]`, with the first axis
/// mapping to the horizontal physical coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    nx: usize,
    ny: usize,
    data: Vec<f64>,
}

impl Surface {
    pub fn new(nx: usize, ny: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), nx * ny, "surface data does not match its shape");
        Self { nx, ny, data }
    }
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            data: vec![0f64; nx * ny],
        }
    }
    pub fn nx(&self) -> usize {
        self.nx
    }
    pub fn ny(&self) -> usize {
        self.ny
    }
    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.data[ix * self.ny + iy]
    }
    pub fn values(&self) -> &[f64] {
        &self.data
    }
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
    /// Replaces every NaN or infinite density with zero, returning how many
    /// values were touched.
    pub fn scrub_non_finite(&mut self) -> usize {
        let mut scrubbed = 0;
        for value in self.data.iter_mut() {
            if !value.is_finite() {
                *value = 0f64;
                scrubbed += 1;
            }
        }
        scrubbed
    }
    pub fn max(&self) -> f64 {
        self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
    pub fn minmax(&self) -> (f64, f64) {
        let max = self.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = self.data.iter().cloned().fold(f64::INFINITY, f64::min);
        (min, max)
    }
}

impl AddAssign<&Surface> for Surface {
    fn add_assign(&mut self, rhs: &Surface) {
        assert_eq!(
            (self.nx, self.ny),
            (rhs.nx, rhs.ny),
            "cannot accumulate surfaces of different shapes"
        );
        self.data
            .iter_mut()
            .zip(rhs.data.iter())
            .for_each(|(a, b)| *a += b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfaces_are_x_major() {
        let surface = Surface::new(2, 3, (0..6).map(f64::from).collect());
        assert_eq!(surface.get(0, 2), 2.0);
        assert_eq!(surface.get(1, 0), 3.0);
    }

    #[test]
    fn scrub_zeroes_every_non_finite_density() {
        let mut surface = Surface::new(2, 2, vec![1.0, f64::NAN, f64::INFINITY, -4.0]);
        assert_eq!(surface.scrub_non_finite(), 2);
        assert!(surface.values().iter().all(|v| v.is_finite()));
        assert_eq!(surface.values(), &[1.0, 0.0, 0.0, -4.0]);
    }

    #[test]
    fn accumulation_is_elementwise() {
        let mut total = Surface::zeros(2, 2);
        total += &Surface::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        total += &Surface::new(2, 2, vec![0.5, 0.5, 0.5, 0.5]);
        assert_eq!(total.values(), &[1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn clipping_only_replaces_the_upper_y_bound() {
        let bounds = Bounds {
            x_min: 5.0,
            x_max: 20.0,
            y_min: 0.0,
            y_max: 5.0,
        };
        let clip = bounds.with_y_max(2.5);
        assert_eq!(clip.x_min, 5.0);
        assert_eq!(clip.x_max, 20.0);
        assert_eq!(clip.y_min, 0.0);
        assert_eq!(clip.y_max, 2.5);
    }
}

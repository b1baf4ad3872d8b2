use std::path::PathBuf;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use structopt::StructOpt;

use plotpdf::{
    catalog::CatalogLoader,
    figure::{Page, PageStyle},
    pages::paginate,
    params::AxisParam,
    smooth::smooth_surfaces,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "plotpdf", about = "Plots posterior distributions produced by galstar")]
struct Opt {
    /// Files containing binned probability density functions for each star
    /// along the line of sight (gzipped files accepted)
    #[structopt(long, required = true, min_values = 1)]
    binfn: Vec<PathBuf>,
    /// Files containing summary statistics for each star, paired with --binfn
    #[structopt(long, required = true, min_values = 1)]
    statsfn: Vec<PathBuf>,
    /// Base filename (without extension) for plots
    #[structopt(short = "o", long)]
    plotfn: String,
    /// Start and end star indices (default: 0 6)
    #[structopt(long, visible_alias = "se", number_of_values = 2, max_values = 2)]
    startend: Vec<usize>,
    /// Number of rows and columns, respectively (default: 3 2)
    #[structopt(long, visible_alias = "rc", number_of_values = 2, max_values = 2)]
    rowcol: Vec<usize>,
    /// Open the saved plots in the system image viewer
    #[structopt(long, visible_alias = "sh")]
    show: bool,
    /// Std. dev. of the smoothing kernel (in pixels) for individual pdfs
    /// (default: 1 1)
    #[structopt(long, visible_alias = "sm", number_of_values = 2, max_values = 2)]
    smooth: Vec<u32>,
    /// Upper bound on y in plots
    #[structopt(short = "y", long)]
    ymax: Option<f64>,
    /// Names of the x- and y-axes, respectively (default: DM Ar).
    /// Choices are DM, Ar, Mr and FeH
    #[structopt(short = "p", long, number_of_values = 2, max_values = 2)]
    params: Vec<String>,
    /// Show only converged stars
    #[structopt(long, visible_alias = "cnv")]
    converged: bool,
    /// Stack stellar pdfs
    #[structopt(long, visible_alias = "stk")]
    stack: bool,
}

fn pair_or<T: Copy>(values: &[T], default: (T, T)) -> (T, T) {
    match values {
        [a, b] => (*a, *b),
        _ => default,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    // axis labels, resolved before any file is touched
    let names = if opt.params.is_empty() {
        vec![String::from("DM"), String::from("Ar")]
    } else {
        opt.params.clone()
    };
    let mut labels = Vec::new();
    for name in &names {
        match name.parse::<AxisParam>() {
            Ok(param) => labels.push(param.label()),
            Err(_) => {
                eprintln!("Invalid parameter name: {:?}", name);
                eprintln!("Valid parameter names are DM, Ar, Mr and FeH.");
                std::process::exit(1);
            }
        }
    }
    let (x_label, y_label) = (labels[0], labels[1]);

    let (start, end) = pair_or(&opt.startend, (0, 6));
    if end <= start {
        log::warn!(
            "Invalid input for --startend: \"{} {}\". The ending index must be greater than the starting index.",
            start,
            end
        );
    }
    let (rows, cols) = pair_or(&opt.rowcol, (3, 2));
    let (smooth_x, smooth_y) = pair_or(&opt.smooth, (1, 1));

    let mut catalog = CatalogLoader::new(&opt.statsfn, &opt.binfn)
        .max_stars(end)
        .converged_only(opt.converged)
        .load()?;
    let scrubbed = catalog.scrub_non_finite();
    if scrubbed > 0 {
        log::debug!("zeroed {} non-finite densities", scrubbed);
    }
    log::info!("peak density before smoothing: {:.4e}", catalog.peak_density());
    smooth_surfaces(&mut catalog.surfaces, (f64::from(smooth_x), f64::from(smooth_y)));
    log::info!("peak density after smoothing: {:.4e}", catalog.peak_density());

    let clip = opt.ymax.map(|ymax| catalog.bounds.with_y_max(ymax));
    let style = PageStyle::default();

    let mut saved = Vec::new();
    if opt.stack {
        println!("Plotting stacked pdfs ...");
        let stacked = catalog
            .stack(start, end)
            .context("no surfaces in the selected range")?;
        let surfaces = [stacked];
        let mut page = Page::new(&surfaces, catalog.bounds)
            .shape(1, 1)
            .labels(x_label, y_label);
        if let Some(clip) = clip {
            page = page.clip(clip);
        }
        let filename = PathBuf::from(format!("{}.png", opt.plotfn));
        page.render(&style)?.save(&filename)?;
        saved.push(filename);
    } else {
        let plan = paginate(start, end, catalog.len(), (rows, cols));
        let progress = ProgressBar::new(plan.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        progress.set_message("Rendering pages");
        for spec in &plan {
            log::info!(
                "Plotting pdfs {} through {} of {}",
                spec.start + 1,
                spec.end,
                catalog.len()
            );
            let mut page = Page::new(&catalog.surfaces[spec.start..spec.end], catalog.bounds)
                .shape(rows, cols)
                .labels(x_label, y_label)
                .converged(&catalog.converged[spec.start..spec.end])
                .ln_evidence(&catalog.ln_evidence[spec.start..spec.end]);
            if let Some(clip) = clip {
                page = page.clip(clip);
            }
            let filename = spec.filename(&opt.plotfn);
            page.render(&style)?.save(&filename)?;
            saved.push(filename);
            progress.inc(1);
        }
        progress.finish_with_message("All pages saved");
    }

    if opt.show {
        show(&saved);
    }
    Ok(())
}

fn show(filenames: &[PathBuf]) {
    #[cfg(target_os = "macos")]
    const VIEWER: &str = "open";
    #[cfg(not(target_os = "macos"))]
    const VIEWER: &str = "xdg-open";
    for filename in filenames {
        match std::process::Command::new(VIEWER).arg(filename).status() {
            Ok(status) if !status.success() => {
                log::warn!("{} exited with {} on {:?}", VIEWER, status, filename)
            }
            Err(e) => log::warn!("Cannot open {:?} with {}: {}", filename, VIEWER, e),
            _ => (),
        }
    }
}

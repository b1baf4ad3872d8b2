//! Page planning for paged mode: which consecutive stars land on which
//! output file.

use std::path::PathBuf;

/// One batch of consecutive stars rendered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    /// Index of the first star on the page.
    pub start: usize,
    /// One past the last star on the page.
    pub end: usize,
    /// Zero-based page number, or `None` when the run fits on one page.
    pub index: Option<usize>,
}

impl PageSpec {
    pub fn filename(&self, base: &str) -> PathBuf {
        match self.index {
            None => PathBuf::from(format!("{}.png", base)),
            Some(k) => PathBuf::from(format!("{}_{}.png", base, k)),
        }
    }
}

/// Walks `[start, min(n_stars, end))` in steps of rows*cols.
///
/// Each page covers up to a full grid of stars, capped against the catalog
/// length rather than the end index, so the last page may run past `end`.
/// When the whole range fits on a single page the filename carries no page
/// suffix.
pub fn paginate(
    start: usize,
    end: usize,
    n_stars: usize,
    shape: (usize, usize),
) -> Vec<PageSpec> {
    let per_page = shape.0 * shape.1;
    let stop = end.min(n_stars);
    if per_page == 0 || start >= stop {
        return Vec::new();
    }
    let single = stop - start <= per_page;
    (start..stop)
        .step_by(per_page)
        .enumerate()
        .map(|(k, i)| PageSpec {
            start: i,
            end: (i + per_page).min(n_stars),
            index: (!single).then_some(k),
        })
        .collect()
}

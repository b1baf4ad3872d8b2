//! Loading of the galstar output files: per-star summary statistics and
//! binned posterior surfaces.
//!
//! Both files are little-endian binary and may be gzip-compressed. A stats
//! file and a bins file describing the same line of sight always travel as a
//! pair; [`CatalogLoader`] concatenates any number of pairs into a single
//! [`Catalog`].

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;

use crate::surface::{Bounds, Surface};

const STATS_MAGIC: [u8; 4] = *b"GSTS";
const BINS_MAGIC: [u8; 4] = *b"GBIN";
const FORMAT_VERSION: u32 = 1;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to open {1:?}")]
    Open(#[source] io::Error, PathBuf),
    #[error("Failed to read {1:?}")]
    Read(#[source] io::Error, PathBuf),
    #[error("{0:?} is not a {1} file")]
    BadMagic(PathBuf, &'static str),
    #[error("{0:?} uses unsupported format version {1}")]
    Version(PathBuf, u32),
    #[error("{0:?} declares an empty {1}x{2} surface grid")]
    BadShape(PathBuf, u32, u32),
    #[error("No statistics/bins file pairs were loaded")]
    Empty,
}

type Result<T> = std::result::Result<T, CatalogError>;

/// Per-star summary statistics written by the sampler.
///
/// Only the convergence flags and the log-evidence feed the plots; the mean
/// and covariance of each fit are carried along for completeness.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stats {
    pub converged: Vec<bool>,
    pub ln_evidence: Vec<f64>,
    pub mean: Vec<[f64; 4]>,
    pub cov: Vec<[f64; 16]>,
}

impl Stats {
    pub fn len(&self) -> usize {
        self.converged.len()
    }
    pub fn is_empty(&self) -> bool {
        self.converged.is_empty()
    }
}

fn open(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| CatalogError::Open(e, path.to_path_buf()))?;
    let mut buffer = BufReader::new(file);
    let head = buffer
        .fill_buf()
        .map_err(|e| CatalogError::Read(e, path.to_path_buf()))?;
    Ok(if head.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(buffer))
    } else {
        Box::new(buffer)
    })
}

struct Reader<'a> {
    inner: Box<dyn Read>,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn open(path: &'a Path) -> Result<Self> {
        Ok(Self {
            inner: open(path)?,
            path,
        })
    }
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buffer = [0u8; N];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|e| CatalogError::Read(e, self.path.to_path_buf()))?;
        Ok(buffer)
    }
    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes::<1>()?[0])
    }
    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }
    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.bytes()?))
    }
    fn f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        let mut buffer = vec![0u8; count * 8];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|e| CatalogError::Read(e, self.path.to_path_buf()))?;
        Ok(buffer
            .chunks_exact(8)
            .map(|c| {
                f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
            })
            .collect())
    }
}

/// Loads the summary statistics for every star in a stats file.
pub fn load_stats(path: impl AsRef<Path>) -> Result<Stats> {
    let path = path.as_ref();
    let mut reader = Reader::open(path)?;
    if reader.bytes::<4>()? != STATS_MAGIC {
        return Err(CatalogError::BadMagic(path.to_path_buf(), "stats"));
    }
    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(CatalogError::Version(path.to_path_buf(), version));
    }
    let n_stars = reader.u32()? as usize;
    let mut stats = Stats::default();
    for _ in 0..n_stars {
        stats.converged.push(reader.u8()? != 0);
        stats.ln_evidence.push(reader.f64()?);
        let mut mean = [0f64; 4];
        for value in mean.iter_mut() {
            *value = reader.f64()?;
        }
        stats.mean.push(mean);
        let mut cov = [0f64; 16];
        for value in cov.iter_mut() {
            *value = reader.f64()?;
        }
        stats.cov.push(cov);
    }
    Ok(stats)
}

/// Loads the shared axis bounds and the binned surfaces of a bins file.
pub fn load_bins(path: impl AsRef<Path>) -> Result<(Bounds, Vec<Surface>)> {
    let path = path.as_ref();
    let mut reader = Reader::open(path)?;
    if reader.bytes::<4>()? != BINS_MAGIC {
        return Err(CatalogError::BadMagic(path.to_path_buf(), "bins"));
    }
    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(CatalogError::Version(path.to_path_buf(), version));
    }
    let n_stars = reader.u32()? as usize;
    let nx = reader.u32()?;
    let ny = reader.u32()?;
    if nx == 0 || ny == 0 {
        return Err(CatalogError::BadShape(path.to_path_buf(), nx, ny));
    }
    let bounds = Bounds {
        x_min: reader.f64()?,
        x_max: reader.f64()?,
        y_min: reader.f64()?,
        y_max: reader.f64()?,
    };
    let (nx, ny) = (nx as usize, ny as usize);
    let surfaces = (0..n_stars)
        .map(|_| Ok(Surface::new(nx, ny, reader.f64s(nx * ny)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok((bounds, surfaces))
}

/// Writes a stats file (the inverse of [`load_stats`]).
pub fn write_stats(writer: &mut impl Write, stats: &Stats) -> io::Result<()> {
    assert_eq!(stats.ln_evidence.len(), stats.len());
    assert_eq!(stats.mean.len(), stats.len());
    assert_eq!(stats.cov.len(), stats.len());
    writer.write_all(&STATS_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(stats.len() as u32).to_le_bytes())?;
    for i in 0..stats.len() {
        writer.write_all(&[stats.converged[i] as u8])?;
        writer.write_all(&stats.ln_evidence[i].to_le_bytes())?;
        for value in &stats.mean[i] {
            writer.write_all(&value.to_le_bytes())?;
        }
        for value in &stats.cov[i] {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Writes a bins file (the inverse of [`load_bins`]).
pub fn write_bins(writer: &mut impl Write, bounds: &Bounds, surfaces: &[Surface]) -> io::Result<()> {
    let first = surfaces.first().expect("cannot write an empty bins file");
    writer.write_all(&BINS_MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(surfaces.len() as u32).to_le_bytes())?;
    writer.write_all(&(first.nx() as u32).to_le_bytes())?;
    writer.write_all(&(first.ny() as u32).to_le_bytes())?;
    for value in [bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max] {
        writer.write_all(&value.to_le_bytes())?;
    }
    for surface in surfaces {
        assert_eq!((surface.nx(), surface.ny()), (first.nx(), first.ny()));
        for value in surface.values() {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// The concatenated star records of one run.
#[derive(Debug)]
pub struct Catalog {
    pub bounds: Bounds,
    pub surfaces: Vec<Surface>,
    pub converged: Vec<bool>,
    pub ln_evidence: Vec<f64>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
    /// Zeroes every non-finite density, returning how many were touched.
    /// Must run before smoothing so the kernel never sees NaN or inf.
    pub fn scrub_non_finite(&mut self) -> usize {
        self.surfaces
            .iter_mut()
            .map(|surface| surface.scrub_non_finite())
            .sum()
    }
    /// The largest density across all surfaces.
    pub fn peak_density(&self) -> f64 {
        self.surfaces
            .iter()
            .map(Surface::max)
            .fold(f64::NEG_INFINITY, f64::max)
    }
    /// Element-wise sum of the surfaces in `[start, min(len, end))`, or
    /// `None` when the catalog holds no surfaces at all. An empty range
    /// yields an all-zero surface.
    pub fn stack(&self, start: usize, end: usize) -> Option<Surface> {
        let first = self.surfaces.first()?;
        let mut total = Surface::zeros(first.nx(), first.ny());
        let stop = end.min(self.surfaces.len());
        for surface in &self.surfaces[start.min(stop)..stop] {
            total += surface;
        }
        Some(total)
    }
    fn retain_converged(&mut self) {
        let keep = std::mem::take(&mut self.converged);
        self.surfaces = std::mem::take(&mut self.surfaces)
            .into_iter()
            .zip(keep.iter())
            .filter(|(_, &k)| k)
            .map(|(surface, _)| surface)
            .collect();
        self.ln_evidence = std::mem::take(&mut self.ln_evidence)
            .into_iter()
            .zip(keep.iter())
            .filter(|(_, &k)| k)
            .map(|(value, _)| value)
            .collect();
        self.converged = keep.into_iter().filter(|&k| k).collect();
    }
}

/// Builder for loading paired statistics and bins files into a [`Catalog`].
///
/// Pairs are consumed in input order and loading stops as soon as the
/// accumulated star count reaches `max_stars`; later pairs are never opened.
pub struct CatalogLoader {
    pairs: Vec<(PathBuf, PathBuf)>,
    max_stars: usize,
    converged_only: bool,
}

impl CatalogLoader {
    pub fn new(statsfn: &[PathBuf], binfn: &[PathBuf]) -> Self {
        Self {
            pairs: statsfn.iter().cloned().zip(binfn.iter().cloned()).collect(),
            max_stars: usize::MAX,
            converged_only: false,
        }
    }
    pub fn max_stars(self, max_stars: usize) -> Self {
        Self { max_stars, ..self }
    }
    pub fn converged_only(self, converged_only: bool) -> Self {
        Self {
            converged_only,
            ..self
        }
    }
    pub fn load(self) -> Result<Catalog> {
        let mut bounds = None;
        let mut surfaces = Vec::new();
        let mut converged = Vec::new();
        let mut ln_evidence = Vec::new();
        for (statsfn, binfn) in &self.pairs {
            log::info!("Loading {:?}...", statsfn);
            let stats = load_stats(statsfn)?;
            log::info!("Loading {:?}...", binfn);
            let (b, mut s) = load_bins(binfn)?;
            bounds = Some(b);
            surfaces.append(&mut s);
            converged.extend(stats.converged);
            ln_evidence.extend(stats.ln_evidence);
            if converged.len() >= self.max_stars {
                break;
            }
        }
        let bounds = bounds.ok_or(CatalogError::Empty)?;
        let mut catalog = Catalog {
            bounds,
            surfaces,
            converged,
            ln_evidence,
        };
        if self.converged_only {
            catalog.retain_converged();
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};

    const BOUNDS: Bounds = Bounds {
        x_min: 5.0,
        x_max: 20.0,
        y_min: 0.0,
        y_max: 5.0,
    };

    fn sample_stats(n: usize) -> Stats {
        let mut stats = Stats::default();
        for i in 0..n {
            stats.converged.push(i % 2 == 0);
            stats.ln_evidence.push(-0.5 - i as f64);
            stats.mean.push([i as f64, 1.0, 2.0, 3.0]);
            stats.cov.push([0.25 * i as f64; 16]);
        }
        stats
    }

    fn sample_surfaces(n: usize, nx: usize, ny: usize) -> Vec<Surface> {
        (0..n)
            .map(|k| {
                Surface::new(nx, ny, (0..nx * ny).map(|j| (j + k) as f64).collect())
            })
            .collect()
    }

    fn write_pair(
        dir: &Path,
        tag: &str,
        stats: &Stats,
        surfaces: &[Surface],
    ) -> (PathBuf, PathBuf) {
        let statsfn = dir.join(format!("{tag}.stats"));
        let binfn = dir.join(format!("{tag}.bins"));
        write_stats(&mut File::create(&statsfn).unwrap(), stats).unwrap();
        write_bins(&mut File::create(&binfn).unwrap(), &BOUNDS, surfaces).unwrap();
        (statsfn, binfn)
    }

    #[test]
    fn stats_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let stats = sample_stats(3);
        let (statsfn, _) = write_pair(dir.path(), "lb90", &stats, &sample_surfaces(3, 4, 4));
        assert_eq!(load_stats(&statsfn).unwrap(), stats);
    }

    #[test]
    fn bins_roundtrip_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let binfn = dir.path().join("lb90.bins.gz");
        let surfaces = sample_surfaces(2, 4, 3);
        let mut raw = Vec::new();
        write_bins(&mut raw, &BOUNDS, &surfaces).unwrap();
        let mut encoder = GzEncoder::new(File::create(&binfn).unwrap(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap();
        let (bounds, loaded) = load_bins(&binfn).unwrap();
        assert_eq!(bounds, BOUNDS);
        assert_eq!(loaded, surfaces);
    }

    #[test]
    fn rejects_foreign_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.stats");
        std::fs::write(&path, b"NOPE0123456789").unwrap();
        assert!(matches!(
            load_stats(&path),
            Err(CatalogError::BadMagic(_, "stats"))
        ));
    }

    #[test]
    fn loading_stops_once_enough_stars_are_accumulated() {
        let dir = tempfile::tempdir().unwrap();
        let (statsfn, binfn) =
            write_pair(dir.path(), "first", &sample_stats(4), &sample_surfaces(4, 3, 3));
        // the second pair does not exist on disk; it must never be opened
        let statsfns = vec![statsfn, dir.path().join("missing.stats")];
        let binfns = vec![binfn, dir.path().join("missing.bins")];
        let catalog = CatalogLoader::new(&statsfns, &binfns)
            .max_stars(3)
            .load()
            .unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn converged_filter_keeps_all_arrays_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let stats = sample_stats(5);
        let surfaces = sample_surfaces(5, 2, 2);
        let (statsfn, binfn) = write_pair(dir.path(), "lb90", &stats, &surfaces);
        let catalog = CatalogLoader::new(&[statsfn], &[binfn])
            .converged_only(true)
            .load()
            .unwrap();
        // stars 0, 2 and 4 converged
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.converged, vec![true; 3]);
        assert_eq!(catalog.ln_evidence, vec![-0.5, -2.5, -4.5]);
        assert_eq!(
            catalog.surfaces,
            vec![surfaces[0].clone(), surfaces[2].clone(), surfaces[4].clone()]
        );
    }

    #[test]
    fn stacking_sums_the_selected_range_elementwise() {
        let surfaces = sample_surfaces(4, 2, 2);
        let catalog = Catalog {
            bounds: BOUNDS,
            surfaces: surfaces.clone(),
            converged: vec![true; 4],
            ln_evidence: vec![0.0; 4],
        };
        let total = catalog.stack(1, 3).unwrap();
        let expected: Vec<f64> = surfaces[1]
            .values()
            .iter()
            .zip(surfaces[2].values())
            .map(|(a, b)| a + b)
            .collect();
        assert_eq!(total.values(), expected.as_slice());
        // the end index caps at the catalog length
        let full = catalog.stack(0, 100).unwrap();
        assert_eq!(full.get(0, 0), 0.0 + 1.0 + 2.0 + 3.0);
    }
}

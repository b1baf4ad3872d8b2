//! Gaussian smoothing of binned probability surfaces.

use rayon::prelude::*;

use crate::surface::Surface;

/// Smooths every surface independently with a separable Gaussian kernel of
/// standard deviation `sigma` pixels along each axis.
///
/// A non-positive sigma leaves the corresponding axis untouched. The kernel
/// is truncated at 4 sigma and normalized to unit sum; densities outside the
/// grid count as zero. Surfaces must be scrubbed of non-finite values first.
pub fn smooth_surfaces(surfaces: &mut [Surface], sigma: (f64, f64)) {
    let kx = gaussian_kernel(sigma.0);
    let ky = gaussian_kernel(sigma.1);
    if kx.len() == 1 && ky.len() == 1 {
        return;
    }
    surfaces
        .par_iter_mut()
        .for_each(|surface| smooth_surface(surface, &kx, &ky));
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0f64 {
        return vec![1f64];
    }
    let radius = (4f64 * sigma).ceil() as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

fn smooth_surface(surface: &mut Surface, kx: &[f64], ky: &[f64]) {
    let (nx, ny) = (surface.nx(), surface.ny());
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;

    // x pass
    let mut pass = vec![0f64; nx * ny];
    for ix in 0..nx {
        for iy in 0..ny {
            let mut acc = 0f64;
            for (j, k) in kx.iter().enumerate() {
                let jx = ix as isize + j as isize - rx;
                if (0..nx as isize).contains(&jx) {
                    acc += k * surface.get(jx as usize, iy);
                }
            }
            pass[ix * ny + iy] = acc;
        }
    }
    // y pass
    let values = surface.values_mut();
    for ix in 0..nx {
        for iy in 0..ny {
            let mut acc = 0f64;
            for (j, k) in ky.iter().enumerate() {
                let jy = iy as isize + j as isize - ry;
                if (0..ny as isize).contains(&jy) {
                    acc += k * pass[ix * ny + jy as usize];
                }
            }
            values[ix * ny + iy] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(nx: usize, ny: usize, ix: usize, iy: usize) -> Surface {
        let mut surface = Surface::zeros(nx, ny);
        surface.values_mut()[ix * ny + iy] = 1f64;
        surface
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(1.5);
        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1f64).abs() < 1e-12);
        let n = kernel.len();
        for i in 0..n / 2 {
            assert_eq!(kernel[i], kernel[n - 1 - i]);
        }
    }

    #[test]
    fn zero_sigma_is_the_identity() {
        let mut surfaces = vec![delta(5, 5, 2, 2)];
        let original = surfaces[0].clone();
        smooth_surfaces(&mut surfaces, (0f64, 0f64));
        assert_eq!(surfaces[0], original);
    }

    #[test]
    fn interior_mass_is_preserved() {
        // a delta far from every edge keeps its mass under a 4-sigma kernel
        let mut surfaces = vec![delta(21, 21, 10, 10)];
        smooth_surfaces(&mut surfaces, (1f64, 1f64));
        let mass: f64 = surfaces[0].values().iter().sum();
        assert!((mass - 1f64).abs() < 1e-9);
        assert!(surfaces[0].get(10, 10) < 1f64);
    }

    #[test]
    fn anisotropic_kernel_spreads_along_one_axis_only() {
        let mut surfaces = vec![delta(15, 15, 7, 7)];
        smooth_surfaces(&mut surfaces, (1f64, 0f64));
        let surface = &surfaces[0];
        assert!(surface.get(5, 7) > 0f64);
        assert_eq!(surface.get(7, 5), 0f64);
        assert_eq!(surface.get(7, 9), 0f64);
    }
}

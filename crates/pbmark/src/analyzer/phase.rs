//! Phase correlation between two equally sized rasters.

use image::GrayImage;
use num_complex::Complex64;

use crate::spectrum::{Fft2d, Field, Spectrum};

/// Translation of the second raster relative to the first.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseShift {
    pub dx: f64,
    pub dy: f64,
    /// Correlation mass around the peak, in `[0, 1]`.
    pub response: f64,
}

/// Estimate `(dx, dy)` such that `b(x, y) ≈ a(x - dx, y - dy)`.
///
/// Both inputs are Hann windowed. The normalized cross-power spectrum is
/// inverse transformed; its peak is refined by a 3x3 weighted centroid that
/// wraps around the raster borders. Shifts beyond half the raster size are
/// reported as negative.
pub fn phase_correlate(a: &GrayImage, b: &GrayImage, fft: &Fft2d) -> PhaseShift {
    let fa = fft.forward(&Field::from_gray(a).hann_windowed());
    let fb = fft.forward(&Field::from_gray(b).hann_windowed());
    let (w, h) = (fa.width, fa.height);

    let cross: Vec<Complex64> = fa
        .bins
        .iter()
        .zip(fb.bins.iter())
        .map(|(x, y)| {
            let c = x.conj() * y;
            let n = c.norm();
            if n > 1e-12 {
                c / n
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect();
    let surface: Vec<f64> = fft
        .inverse(&Spectrum {
            width: w,
            height: h,
            bins: cross,
        })
        .iter()
        .map(|c| c.re)
        .collect();

    let mut peak = 0usize;
    for (i, &v) in surface.iter().enumerate() {
        if v > surface[peak] {
            peak = i;
        }
    }
    let (px, py) = ((peak % w) as i64, (peak / w) as i64);

    let mut mass = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for oy in -1i64..=1 {
        for ox in -1i64..=1 {
            let x = (px + ox).rem_euclid(w as i64) as usize;
            let y = (py + oy).rem_euclid(h as i64) as usize;
            let v = surface[y * w + x];
            mass += v;
            sx += v * ox as f64;
            sy += v * oy as f64;
        }
    }

    let (mut fx, mut fy) = (px as f64, py as f64);
    if mass > 1e-12 {
        fx += sx / mass;
        fy += sy / mass;
    }
    if fx > w as f64 / 2.0 {
        fx -= w as f64;
    }
    if fy > h as f64 / 2.0 {
        fy -= h as f64;
    }

    PhaseShift {
        dx: fx,
        dy: fy,
        response: mass.clamp(0.0, 1.0),
    }
}

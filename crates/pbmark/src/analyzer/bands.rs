//! Band-limited autocorrelation shift estimation.
//!
//! The power spectrum restricted to one grid-pitch annulus is inverse
//! transformed into an autocorrelation surface. Its strongest off-origin
//! peak is the dominant displacement of that band. Near and far bands are
//! processed independently; their difference carries the depth signal.

use crate::spectrum::{fftshift, Fft2d, Spectrum};

use super::Band;

/// Displacement of one band's autocorrelation peak relative to zero lag.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandShift {
    pub dx: f64,
    pub dy: f64,
    /// `min(1, (peak / mean|surface|) / 100)`.
    pub confidence: f64,
}

impl BandShift {
    const NONE: Self = Self {
        dx: 0.0,
        dy: 0.0,
        confidence: 0.0,
    };
}

/// Estimate the band displacement from a centered (windowed) spectrum.
pub fn estimate_band_shift(
    spectrum: &Spectrum,
    fft: &Fft2d,
    band: Band,
    zero_lag_radius: f64,
) -> BandShift {
    let (w, h) = (spectrum.width, spectrum.height);
    let power = spectrum.annulus(band.r_min, band.r_max).power();
    let raw: Vec<f64> = fft.inverse(&power).iter().map(|c| c.re).collect();
    let (cx, cy) = (w / 2, h / 2);
    let mut surface = symmetrized(&fftshift(&raw, w, h), w, h, (cx, cy));

    let r2 = zero_lag_radius * zero_lag_radius;
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - cx as f64;
            let dy = y as f64 - cy as f64;
            if dx * dx + dy * dy <= r2 {
                surface[y * w + x] = 0.0;
            }
        }
    }

    let mean = surface.iter().map(|v| v.abs()).sum::<f64>() / surface.len().max(1) as f64;
    let mut best_idx = 0usize;
    let mut best = f64::NEG_INFINITY;
    for (i, &v) in surface.iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }

    if !(mean > 1e-12) || !(best > 0.0) {
        return BandShift::NONE;
    }

    let px = best_idx % w;
    let py = best_idx / w;
    BandShift {
        dx: px as f64 - cx as f64,
        dy: py as f64 - cy as f64,
        confidence: ((best / mean) / 100.0).min(1.0),
    }
}

/// Average of a centered surface and its point reflection through `center`.
///
/// Mirrored bins get bit-identical values, so a peak and its mirror tie
/// exactly and the row-major scan always reports the upper one.
fn symmetrized(surface: &[f64], w: usize, h: usize, (cx, cy): (usize, usize)) -> Vec<f64> {
    let mut out = vec![0.0; surface.len()];
    for y in 0..h {
        let my = (2 * cy + h - y) % h;
        for x in 0..w {
            let mx = (2 * cx + w - x) % w;
            out[y * w + x] = 0.5 * (surface[y * w + x] + surface[my * w + mx]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::Field;
    use crate::test_utils::{render_gratings, Grating};

    #[test]
    fn black_raster_yields_zero_confidence() {
        let img = image::GrayImage::new(64, 64);
        let fft = Fft2d::new(64, 64);
        let spectrum = fft.forward(&Field::from_gray(&img).hann_windowed());
        let shift = estimate_band_shift(
            &spectrum,
            &fft,
            Band {
                r_min: 20.0,
                r_max: 30.0,
            },
            2.0,
        );
        assert_eq!(shift.confidence, 0.0);
        assert_eq!((shift.dx, shift.dy), (0.0, 0.0));
    }

    #[test]
    fn grating_peak_lies_on_its_lattice() {
        // vertical stripes, period 8 px: autocorrelation maxima at dx ≡ 0 (mod 8)
        let img = render_gratings(64, &[Grating::new(8, 0, 60.0)]);
        let fft = Fft2d::new(64, 64);
        let spectrum = fft.forward(&Field::from_gray(&img).hann_windowed());
        let shift = estimate_band_shift(
            &spectrum,
            &fft,
            Band {
                r_min: 4.0,
                r_max: 12.0,
            },
            2.0,
        );
        assert!(shift.confidence > 0.0);
        let phase = shift.dx / 8.0;
        assert!(
            (phase - phase.round()).abs() < 0.2,
            "dx {} is not a multiple of the period",
            shift.dx
        );
    }

    #[test]
    fn mirror_pair_reports_the_upper_peak() {
        // stripes along y: the zero-lag ridge runs vertically, peaks at (0, ±3)
        let img = render_gratings(64, &[Grating::new(8, 0, 60.0)]);
        let fft = Fft2d::new(64, 64);
        let spectrum = fft.forward(&Field::from_gray(&img).hann_windowed());
        let band = Band {
            r_min: 4.0,
            r_max: 12.0,
        };
        let shift = estimate_band_shift(&spectrum, &fft, band, 2.0);
        assert_eq!((shift.dx, shift.dy), (0.0, -3.0));
    }

    #[test]
    fn reflection_is_an_involution_on_odd_and_even_sizes() {
        for (w, h) in [(6usize, 4usize), (5, 7)] {
            let surface: Vec<f64> = (0..w * h).map(|i| (i * i % 11) as f64).collect();
            let c = (w / 2, h / 2);
            let once = symmetrized(&surface, w, h, c);
            assert_eq!(symmetrized(&once, w, h, c), once);
            // the center is its own mirror
            assert_eq!(once[c.1 * w + c.0], surface[c.1 * w + c.0]);
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let img = render_gratings(64, &[Grating::new(6, 3, 40.0), Grating::new(-2, 9, 25.0)]);
        let fft = Fft2d::new(64, 64);
        let spectrum = fft.forward(&Field::from_gray(&img).hann_windowed());
        let band = Band {
            r_min: 3.0,
            r_max: 15.0,
        };
        let a = estimate_band_shift(&spectrum, &fft, band, 2.0);
        let b = estimate_band_shift(&spectrum, &fft, band, 2.0);
        assert_eq!(a, b);
    }
}

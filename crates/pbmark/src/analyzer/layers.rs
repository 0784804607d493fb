//! Explicit reconstruction of the two printed layers.
//!
//! Each layer is a periodic grid, so it concentrates its energy in a pair of
//! point-symmetric spectral peaks. Keeping one peak pair (plus a small disk
//! around each) and inverse transforming recovers that layer alone.

use image::GrayImage;

use crate::spectrum::{rank_descending, Fft2d, Field, Spectrum};

/// Configuration for layer separation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerSeparationConfig {
    /// Pass-disk radius (bins) around each selected peak. The DC exclusion
    /// radius and the minimum peak spacing are both twice this value.
    pub peak_mask_radius: usize,
    /// Minimum grid frequency (bins from DC).
    pub grid_freq_min: f64,
    /// Maximum grid frequency (bins from DC).
    pub grid_freq_max: f64,
    /// Number of ranked bins scanned before giving up.
    pub max_peak_candidates: usize,
    /// Peaks weaker than this fraction of the strongest bin (normally DC)
    /// are ignored.
    pub min_peak_fraction: f64,
    /// Treat the point-symmetric partner of an accepted peak as taken.
    pub exclude_conjugates: bool,
}

impl Default for LayerSeparationConfig {
    fn default() -> Self {
        Self {
            peak_mask_radius: 4,
            grid_freq_min: 8.0,
            grid_freq_max: 100.0,
            max_peak_candidates: 500,
            min_peak_fraction: 0.01,
            exclude_conjugates: true,
        }
    }
}

/// Two reconstructed layers, 8-bit min-max normalized.
#[derive(Debug, Clone)]
pub struct LayerPair {
    /// Layer of the strongest spectral peak.
    pub primary: GrayImage,
    pub secondary: GrayImage,
    /// Selected peak bins (centered spectrum coordinates), strongest first.
    pub peaks: [(usize, usize); 2],
}

/// Ranked spectral peak search shared with the fingerprint extractor.
///
/// Bins are visited in descending magnitude order (ties by ascending index).
/// A bin qualifies when its radius is within `[r_min, r_max]`, its magnitude
/// is at least `floor`, and it is at least `min_separation` away from every
/// accepted peak (and, optionally, from their conjugates).
#[derive(Debug, Clone, Copy)]
pub(crate) struct PeakSearch {
    pub r_min: f64,
    pub r_max: f64,
    pub min_separation: f64,
    pub max_candidates: usize,
    pub floor: f64,
    pub exclude_conjugates: bool,
}

impl PeakSearch {
    pub(crate) fn pick(
        &self,
        spectrum: &Spectrum,
        magnitude: &[f64],
        count: usize,
    ) -> Vec<(usize, usize)> {
        let w = spectrum.width;
        let mut accepted: Vec<(usize, usize)> = Vec::with_capacity(count);
        let mut blocked: Vec<(usize, usize)> = Vec::new();

        for idx in rank_descending(magnitude)
            .into_iter()
            .take(self.max_candidates)
        {
            if magnitude[idx] < self.floor {
                break;
            }
            let (x, y) = (idx % w, idx / w);
            let r = spectrum.radius(x, y);
            if r < self.r_min || r > self.r_max {
                continue;
            }
            let distinct = blocked.iter().all(|&(px, py)| {
                let dx = x as f64 - px as f64;
                let dy = y as f64 - py as f64;
                (dx * dx + dy * dy).sqrt() >= self.min_separation
            });
            if !distinct {
                continue;
            }

            accepted.push((x, y));
            blocked.push((x, y));
            if self.exclude_conjugates {
                if let Some(conj) = spectrum.conjugate_bin(x, y) {
                    blocked.push(conj);
                }
            }
            if accepted.len() >= count {
                break;
            }
        }
        accepted
    }
}

/// Zero the magnitude of every bin within `radius` of DC.
pub(crate) fn mask_dc(spectrum: &Spectrum, magnitude: &mut [f64], radius: f64) {
    let (cx, cy) = spectrum.center();
    let r2 = radius * radius;
    for y in 0..spectrum.height {
        for x in 0..spectrum.width {
            let dx = x as f64 - cx as f64;
            let dy = y as f64 - cy as f64;
            if dx * dx + dy * dy <= r2 {
                magnitude[y * spectrum.width + x] = 0.0;
            }
        }
    }
}

/// Reconstruct both printed layers from a rectified raster.
///
/// Returns `None` when fewer than two qualifying peaks are found.
pub fn separate_layers(
    rectified: &GrayImage,
    fft: &Fft2d,
    config: &LayerSeparationConfig,
) -> Option<LayerPair> {
    let spectrum = fft.forward(&Field::from_gray(rectified));
    let mut magnitude = spectrum.magnitude();
    let strongest = magnitude.iter().cloned().fold(0.0, f64::max);
    let r = config.peak_mask_radius as f64;
    mask_dc(&spectrum, &mut magnitude, 2.0 * r);

    let search = PeakSearch {
        r_min: config.grid_freq_min,
        r_max: config.grid_freq_max,
        min_separation: 2.0 * r,
        max_candidates: config.max_peak_candidates,
        floor: (config.min_peak_fraction * strongest).max(f64::MIN_POSITIVE),
        exclude_conjugates: config.exclude_conjugates,
    };
    let peaks = search.pick(&spectrum, &magnitude, 2);
    if peaks.len() < 2 {
        tracing::debug!("layer separation: {} peaks found", peaks.len());
        return None;
    }

    let primary = reconstruct(&spectrum, fft, peaks[0], r);
    let secondary = reconstruct(&spectrum, fft, peaks[1], r);
    Some(LayerPair {
        primary,
        secondary,
        peaks: [peaks[0], peaks[1]],
    })
}

/// Keep a disk around `peak` and its conjugate, inverse transform, normalize.
fn reconstruct(spectrum: &Spectrum, fft: &Fft2d, peak: (usize, usize), r: f64) -> GrayImage {
    let (cx, cy) = spectrum.center();
    let conj = (
        2.0 * cx as f64 - peak.0 as f64,
        2.0 * cy as f64 - peak.1 as f64,
    );
    let r2 = r * r;
    let near = |x: usize, y: usize, c: (f64, f64)| {
        let dx = x as f64 - c.0;
        let dy = y as f64 - c.1;
        dx * dx + dy * dy <= r2
    };
    let masked = spectrum.masked(|x, y| {
        near(x, y, (peak.0 as f64, peak.1 as f64)) || near(x, y, conj)
    });
    let spatial = fft.inverse(&masked);
    Field {
        width: spectrum.width,
        height: spectrum.height,
        data: spatial.iter().map(|c| c.norm()).collect(),
    }
    .to_gray_normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{render_gratings, Grating};

    #[test]
    fn separates_two_gratings() {
        let img = render_gratings(128, &[Grating::new(12, 0, 60.0), Grating::new(0, 30, 40.0)]);
        let fft = Fft2d::new(128, 128);
        let pair = separate_layers(&img, &fft, &LayerSeparationConfig::default()).expect("pair");

        let (c, _) = (64usize, 64usize);
        let [p0, p1] = pair.peaks;
        // strongest first: the 60-amplitude grating on the x axis
        assert_eq!(p0.1, c);
        assert_eq!((p0.0 as i64 - c as i64).abs(), 12);
        assert_eq!(p1.0, c);
        assert_eq!((p1.1 as i64 - c as i64).abs(), 30);

        // the primary layer varies along x only
        let row: Vec<u8> = (0..128).map(|x| pair.primary.get_pixel(x, 40)[0]).collect();
        let col: Vec<u8> = (0..128).map(|y| pair.primary.get_pixel(20, y)[0]).collect();
        let spread = |v: &[u8]| v.iter().max().unwrap() - v.iter().min().unwrap();
        assert!(spread(&row) > 100);
        assert!(spread(&col) < 20);
    }

    #[test]
    fn single_grating_has_no_second_layer() {
        let img = render_gratings(64, &[Grating::new(10, 0, 60.0)]);
        let fft = Fft2d::new(64, 64);
        assert!(separate_layers(&img, &fft, &LayerSeparationConfig::default()).is_none());
    }

    #[test]
    fn conjugate_pair_counts_twice_when_not_excluded() {
        let img = render_gratings(64, &[Grating::new(10, 0, 60.0)]);
        let fft = Fft2d::new(64, 64);
        let config = LayerSeparationConfig {
            exclude_conjugates: false,
            ..LayerSeparationConfig::default()
        };
        let pair = separate_layers(&img, &fft, &config).expect("conjugates accepted");
        assert_eq!(pair.peaks[0].1, pair.peaks[1].1);
        assert_eq!(pair.peaks[0].0 + pair.peaks[1].0, 64);
    }
}

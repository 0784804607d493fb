//! Spectral fingerprint of the printed pattern.
//!
//! The two dominant grid peaks of a rectified marker are reduced to their
//! radial frequency and orientation. Averaged over many frames and rounded,
//! they form the [`IdentityRecord`] bound into a credential.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::analyzer::layers::{mask_dc, PeakSearch};
use crate::spectrum::{Fft2d, Field};

/// Configuration for fingerprint extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Radius (bins) of the DC disk removed before peak search.
    pub dc_mask_radius: f64,
    /// Minimum peak distance from DC (bins).
    pub min_dist: f64,
    /// Maximum peak distance from DC (bins).
    pub max_dist: f64,
    /// Minimum spacing between accepted peaks (bins).
    pub min_peak_separation: f64,
    /// Number of ranked bins scanned before giving up.
    pub max_peak_candidates: usize,
    /// Peaks weaker than this fraction of the strongest bin are ignored. The
    /// default only screens out transform round-off.
    pub min_peak_fraction: f64,
    /// Treat the point-symmetric partner of an accepted peak as taken. Off by
    /// default: a single grating then yields its own conjugate pair.
    pub exclude_conjugates: bool,
    /// Report distances as a fraction of the raster width.
    pub normalize_frequency: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            dc_mask_radius: 15.0,
            min_dist: 20.0,
            max_dist: 200.0,
            min_peak_separation: 15.0,
            max_peak_candidates: 500,
            min_peak_fraction: 1e-9,
            exclude_conjugates: false,
            normalize_frequency: true,
        }
    }
}

/// Per-frame descriptor of the two dominant spectral peaks.
///
/// Peaks are ordered by distance from DC; angles are in degrees, mod 180.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub f1: f64,
    pub a1: f64,
    pub f2: f64,
    pub a2: f64,
    pub rel_angle: f64,
}

/// Extract the descriptor of one rectified raster.
///
/// Returns `None` when fewer than two qualifying peaks exist. Deterministic:
/// identical input yields bit-identical output.
pub fn extract_features(rectified: &GrayImage, config: &FingerprintConfig) -> Option<FeatureDescriptor> {
    let (w, h) = rectified.dimensions();
    let fft = Fft2d::new(w as usize, h as usize);
    extract_features_with(rectified, &fft, config)
}

/// [`extract_features`] with a pre-planned transform of matching size.
pub fn extract_features_with(
    rectified: &GrayImage,
    fft: &Fft2d,
    config: &FingerprintConfig,
) -> Option<FeatureDescriptor> {
    let spectrum = fft.forward(&Field::from_gray(rectified));
    let mut magnitude = spectrum.magnitude();
    let strongest = magnitude.iter().cloned().fold(0.0, f64::max);
    mask_dc(&spectrum, &mut magnitude, config.dc_mask_radius);

    let search = PeakSearch {
        r_min: config.min_dist,
        r_max: config.max_dist,
        min_separation: config.min_peak_separation,
        max_candidates: config.max_peak_candidates,
        floor: (config.min_peak_fraction * strongest).max(f64::MIN_POSITIVE),
        exclude_conjugates: config.exclude_conjugates,
    };
    let peaks = search.pick(&spectrum, &magnitude, 2);
    if peaks.len() < 2 {
        tracing::debug!("fingerprint: {} peaks found", peaks.len());
        return None;
    }

    let (cx, cy) = spectrum.center();
    let polar = |(x, y): (usize, usize)| {
        let dx = x as f64 - cx as f64;
        let dy = y as f64 - cy as f64;
        let angle = dy.atan2(dx).to_degrees().rem_euclid(180.0);
        ((dx * dx + dy * dy).sqrt(), angle)
    };
    let mut measured = [polar(peaks[0]), polar(peaks[1])];
    if measured[1].0 < measured[0].0 {
        measured.swap(0, 1);
    }
    let [(d1, a1), (d2, a2)] = measured;

    let scale = if config.normalize_frequency {
        1.0 / spectrum.width as f64
    } else {
        1.0
    };
    Some(FeatureDescriptor {
        f1: d1 * scale,
        a1,
        f2: d2 * scale,
        a2,
        rel_angle: (a1 - a2).abs(),
    })
}

/// Averaged, rounded descriptor plus the PBM scale of a session.
///
/// Serializes as a flat mapping; `pbm_scale` is omitted when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub f1: f64,
    pub a1: f64,
    pub f2: f64,
    pub a2: f64,
    pub rel_angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbm_scale: Option<f64>,
}

impl IdentityRecord {
    /// Field-wise mean of `descriptors`, every field rounded to `decimals`.
    pub fn from_descriptors(
        descriptors: &[FeatureDescriptor],
        pbm_scale: Option<f64>,
        decimals: u32,
    ) -> Option<Self> {
        if descriptors.is_empty() {
            return None;
        }
        let n = descriptors.len() as f64;
        let mean = |f: fn(&FeatureDescriptor) -> f64| descriptors.iter().map(f).sum::<f64>() / n;
        Some(Self {
            f1: round_to(mean(|d| d.f1), decimals),
            a1: round_to(mean(|d| d.a1), decimals),
            f2: round_to(mean(|d| d.f2), decimals),
            a2: round_to(mean(|d| d.a2), decimals),
            rel_angle: round_to(mean(|d| d.rel_angle), decimals),
            pbm_scale: pbm_scale.map(|s| round_to(s, decimals)),
        })
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{render_gratings, Grating};
    use approx::assert_abs_diff_eq;

    fn two_layer_pattern() -> GrayImage {
        render_gratings(256, &[Grating::new(30, 0, 60.0), Grating::new(0, 50, 40.0)])
    }

    fn distinct_peaks() -> FingerprintConfig {
        FingerprintConfig {
            exclude_conjugates: true,
            min_peak_fraction: 0.01,
            ..FingerprintConfig::default()
        }
    }

    #[test]
    fn strongest_grating_and_its_conjugate_by_default() {
        let d = extract_features(&two_layer_pattern(), &FingerprintConfig::default())
            .expect("two peaks");
        assert_abs_diff_eq!(d.f1, 30.0 / 256.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f2, 30.0 / 256.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.a1, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.a2, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.rel_angle, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn descriptor_of_two_gratings_with_conjugates_excluded() {
        let d = extract_features(&two_layer_pattern(), &distinct_peaks()).expect("two peaks");
        assert_abs_diff_eq!(d.f1, 30.0 / 256.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.f2, 50.0 / 256.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.a1, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.a2, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.rel_angle, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn raw_distances_when_not_normalized() {
        let config = FingerprintConfig {
            normalize_frequency: false,
            ..FingerprintConfig::default()
        };
        let d = extract_features(&two_layer_pattern(), &config).unwrap();
        assert_abs_diff_eq!(d.f1, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn extraction_is_idempotent() {
        let img = render_gratings(128, &[Grating::new(21, 7, 50.0), Grating::new(-5, 33, 35.0)]);
        let config = FingerprintConfig::default();
        let a = extract_features(&img, &config);
        let b = extract_features(&img, &config);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn fewer_than_two_peaks_yield_none() {
        let flat = GrayImage::from_pixel(128, 128, image::Luma([100]));
        assert!(extract_features(&flat, &FingerprintConfig::default()).is_none());

        let single = render_gratings(128, &[Grating::new(25, 0, 60.0)]);
        assert!(extract_features(&single, &distinct_peaks()).is_none());
        let pair = extract_features(&single, &FingerprintConfig::default())
            .expect("a grating and its conjugate");
        assert_eq!(pair.f1, pair.f2);
        assert_abs_diff_eq!(pair.f1, 25.0 / 128.0, epsilon = 1e-12);
    }

    #[test]
    fn record_from_identical_descriptors() {
        let d = FeatureDescriptor {
            f1: 0.10,
            a1: 30.0,
            f2: 0.20,
            a2: 120.0,
            rel_angle: 90.0,
        };
        let record = IdentityRecord::from_descriptors(&[d; 20], Some(0.05), 4).unwrap();
        assert_eq!(
            record,
            IdentityRecord {
                f1: 0.1,
                a1: 30.0,
                f2: 0.2,
                a2: 120.0,
                rel_angle: 90.0,
                pbm_scale: Some(0.05),
            }
        );
        assert!(IdentityRecord::from_descriptors(&[], None, 4).is_none());
    }

    #[test]
    fn undefined_scale_is_omitted() {
        let d = FeatureDescriptor {
            f1: 0.123456,
            a1: 1.0,
            f2: 0.2,
            a2: 2.0,
            rel_angle: 1.0,
        };
        let record = IdentityRecord::from_descriptors(&[d], None, 4).unwrap();
        assert_eq!(record.f1, 0.1235);
        let json = serde_json::to_value(record).unwrap();
        assert!(json.get("pbm_scale").is_none());
    }
}

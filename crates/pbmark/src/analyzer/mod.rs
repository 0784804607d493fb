//! Frequency-domain analysis of a rectified marker.
//!
//! Two measurement paths produce one [`ShiftSample`] per frame:
//! - `BandDifferential` (default): autocorrelation peaks of a near and a far
//!   grid-pitch band, see [`bands`].
//! - `LayerSeparation`: reconstruct both printed layers from their spectral
//!   peaks ([`layers`]) and phase-correlate them ([`phase`]).

pub mod bands;
pub mod layers;
pub mod phase;

use image::GrayImage;

use crate::spectrum::{Fft2d, Field};

pub use bands::{estimate_band_shift, BandShift};
pub use layers::{separate_layers, LayerPair, LayerSeparationConfig};
pub use phase::{phase_correlate, PhaseShift};

/// Frequency band `[r_min, r_max]` measured in bins from DC.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Band {
    pub r_min: f64,
    pub r_max: f64,
}

/// Which measurement path feeds the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Near/far band autocorrelation; emits [`ShiftSample::Banded`].
    #[default]
    BandDifferential,
    /// Layer reconstruction + phase correlation; emits [`ShiftSample::Single`].
    LayerSeparation,
}

/// Analyzer configuration.
///
/// Band radii are empirically tuned for the printed grid pitches and the
/// canonical raster size; they are not physical constants.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub mode: AnalysisMode,
    /// Pitch band of the upper (near) printed layer.
    pub near_band: Band,
    /// Pitch band of the lower (far) printed layer.
    pub far_band: Band,
    /// Radius (pixels) of the zero-lag disk removed from autocorrelation surfaces.
    pub zero_lag_radius: f64,
    pub layers: LayerSeparationConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::BandDifferential,
            near_band: Band {
                r_min: 8.0,
                r_max: 24.0,
            },
            far_band: Band {
                r_min: 24.0,
                r_max: 64.0,
            },
            zero_lag_radius: 3.0,
            layers: LayerSeparationConfig::default(),
        }
    }
}

/// Per-frame shift measurement fed into the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShiftSample {
    /// One relative shift between the two layers.
    Single { dx: f64, dy: f64, confidence: f64 },
    /// Independent displacements of the near and far bands.
    Banded {
        near: [f64; 2],
        far: [f64; 2],
        confidence: f64,
    },
}

impl ShiftSample {
    /// Zero-confidence sample standing in for a frame with no measurement.
    pub const fn missing() -> Self {
        Self::Single {
            dx: 0.0,
            dy: 0.0,
            confidence: 0.0,
        }
    }

    pub fn confidence(&self) -> f64 {
        match *self {
            Self::Single { confidence, .. } | Self::Banded { confidence, .. } => confidence,
        }
    }

    /// Near-band shift. A single sample is already relative, so it is
    /// reported as the near shift against a stationary far layer.
    pub fn near(&self) -> [f64; 2] {
        match *self {
            Self::Single { dx, dy, .. } => [dx, dy],
            Self::Banded { near, .. } => near,
        }
    }

    pub fn far(&self) -> [f64; 2] {
        match *self {
            Self::Single { .. } => [0.0, 0.0],
            Self::Banded { far, .. } => far,
        }
    }

    /// Differential motion `near - far`.
    pub fn difference(&self) -> [f64; 2] {
        let n = self.near();
        let f = self.far();
        [n[0] - f[0], n[1] - f[1]]
    }

    /// Magnitude of the differential motion.
    pub fn parallax(&self) -> f64 {
        let d = self.difference();
        d[0].hypot(d[1])
    }
}

/// Runs the configured measurement path on rectified rasters of one size.
pub struct FrameAnalyzer {
    config: AnalyzerConfig,
    size: (usize, usize),
    fft: Fft2d,
}

impl FrameAnalyzer {
    pub fn new(width: usize, height: usize, config: AnalyzerConfig) -> Self {
        Self {
            config,
            size: (width, height),
            fft: Fft2d::new(width, height),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Transform planned for the configured raster size.
    pub fn fft(&self) -> &Fft2d {
        &self.fft
    }

    /// Measure one rectified raster. Rasters of a different size than the
    /// planned one get a one-off plan.
    pub fn analyze(&self, rectified: &GrayImage) -> ShiftSample {
        self.with_plan(rectified, |fft| self.analyze_with(fft, rectified))
    }

    /// Reconstruct both printed layers (display/debug output). Like
    /// [`analyze`](Self::analyze), any raster size is accepted.
    pub fn separate(&self, rectified: &GrayImage) -> Option<LayerPair> {
        self.with_plan(rectified, |fft| {
            separate_layers(rectified, fft, &self.config.layers)
        })
    }

    fn with_plan<T>(&self, rectified: &GrayImage, f: impl FnOnce(&Fft2d) -> T) -> T {
        let (w, h) = rectified.dimensions();
        let dims = (w as usize, h as usize);
        if dims == self.size {
            f(&self.fft)
        } else {
            f(&Fft2d::new(dims.0, dims.1))
        }
    }

    fn analyze_with(&self, fft: &Fft2d, rectified: &GrayImage) -> ShiftSample {
        match self.config.mode {
            AnalysisMode::BandDifferential => {
                let spectrum = fft.forward(&Field::from_gray(rectified).hann_windowed());
                let near = estimate_band_shift(
                    &spectrum,
                    fft,
                    self.config.near_band,
                    self.config.zero_lag_radius,
                );
                let far = estimate_band_shift(
                    &spectrum,
                    fft,
                    self.config.far_band,
                    self.config.zero_lag_radius,
                );
                ShiftSample::Banded {
                    near: [near.dx, near.dy],
                    far: [far.dx, far.dy],
                    confidence: near.confidence.min(far.confidence),
                }
            }
            AnalysisMode::LayerSeparation => {
                let Some(pair) = separate_layers(rectified, fft, &self.config.layers) else {
                    return ShiftSample::missing();
                };
                let shift = phase_correlate(&pair.primary, &pair.secondary, fft);
                ShiftSample::Single {
                    dx: shift.dx,
                    dy: shift.dy,
                    confidence: shift.response,
                }
            }
        }
    }
}

//! Per-frame chain: localize → rectify → analyze.

use image::GrayImage;
use serde::Serialize;

use crate::analyzer::{FrameAnalyzer, ShiftSample};
use crate::config::PipelineConfig;
use crate::fingerprint::{extract_features_with, FeatureDescriptor, FingerprintConfig};
use crate::localize::{find_roi, LocalizerConfig, Quad};
use crate::rectify::rectify;

/// Everything measured from one frame.
///
/// The shift sample and any fingerprint descriptor of the same cycle come
/// from `rectified`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameObservation {
    pub roi: Option<Quad>,
    /// Shoelace area of the ROI (0 without one).
    pub roi_area: f64,
    #[serde(skip)]
    pub rectified: Option<GrayImage>,
    /// Zero-confidence when there is no ROI or no measurement.
    pub sample: ShiftSample,
}

impl FrameObservation {
    fn missing(roi: Option<Quad>) -> Self {
        Self {
            roi_area: roi.map_or(0.0, |q| q.area()),
            roi,
            rectified: None,
            sample: ShiftSample::missing(),
        }
    }

    pub fn has_roi(&self) -> bool {
        self.roi.is_some()
    }
}

/// Per-frame measurement used by sessions.
pub trait FrameMeasurer {
    fn observe(&self, frame: &GrayImage) -> FrameObservation;
    /// Fingerprint descriptor of an observation's rectified raster.
    fn describe(&self, observation: &FrameObservation) -> Option<FeatureDescriptor>;
}

/// Stateless per-frame processor built once per session.
pub struct FrameProcessor {
    localizer: LocalizerConfig,
    canonical_size: u32,
    analyzer: FrameAnalyzer,
    fingerprint: FingerprintConfig,
}

impl FrameProcessor {
    pub fn new(config: &PipelineConfig) -> Self {
        let s = config.canonical_size as usize;
        Self {
            localizer: config.localizer.clone(),
            canonical_size: config.canonical_size,
            analyzer: FrameAnalyzer::new(s, s, config.analyzer.clone()),
            fingerprint: config.fingerprint.clone(),
        }
    }

    pub fn canonical_size(&self) -> u32 {
        self.canonical_size
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }
}

impl FrameMeasurer for FrameProcessor {
    fn observe(&self, frame: &GrayImage) -> FrameObservation {
        let Some(roi) = find_roi(frame, &self.localizer) else {
            return FrameObservation::missing(None);
        };
        let Some(rectified) = rectify(frame, &roi, self.canonical_size) else {
            return FrameObservation::missing(Some(roi));
        };
        let sample = self.analyzer.analyze(&rectified);
        tracing::debug!(
            "frame: area={:.0} parallax={:.3} conf={:.3}",
            roi.area(),
            sample.parallax(),
            sample.confidence()
        );
        FrameObservation {
            roi_area: roi.area(),
            roi: Some(roi),
            rectified: Some(rectified),
            sample,
        }
    }

    fn describe(&self, observation: &FrameObservation) -> Option<FeatureDescriptor> {
        let rectified = observation.rectified.as_ref()?;
        extract_features_with(rectified, self.analyzer.fft(), &self.fingerprint)
    }
}

//! Enrollment: prove liveness, collect descriptors, issue a credential.

use image::GrayImage;

use crate::config::PipelineConfig;
use crate::credential::{Credential, CredentialSigner};
use crate::error::PbmError;
use crate::fingerprint::{FeatureDescriptor, IdentityRecord};
use crate::liveness::{DecisionEngine, Liveness};
use crate::pipeline::FrameProcessor;
use crate::scale::ScaleEstimator;

use super::{FrameReport, Measurer, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollState {
    /// No marker seen yet.
    Searching,
    /// Marker present; waiting for a `Valid3d` window.
    LivenessCheck,
    /// Collecting one descriptor per `Valid3d` frame.
    Capturing,
    /// Credential issued.
    Done,
}

impl EnrollState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Searching => "SEARCHING",
            Self::LivenessCheck => "LIVENESS_CHECK",
            Self::Capturing => "CAPTURING_FEATURES",
            Self::Done => "DONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollEvent {
    RoiFound,
    Classified(Liveness),
    CaptureComplete,
    Reset,
}

/// Pure enrollment transition function.
///
/// Losing the ROI is not an event: it never rolls the state back.
pub fn next_enroll_state(state: EnrollState, event: EnrollEvent) -> EnrollState {
    use EnrollEvent::*;
    use EnrollState::*;
    match (state, event) {
        (_, Reset) => Searching,
        (Searching, RoiFound) => LivenessCheck,
        (LivenessCheck, Classified(Liveness::Valid3d)) => Capturing,
        (Capturing, CaptureComplete) => Done,
        (s, _) => s,
    }
}

/// Enrollment protocol over one marker.
pub struct EnrollmentSession<S> {
    measurer: Measurer,
    engine: DecisionEngine,
    scale: ScaleEstimator,
    signer: S,
    required: usize,
    decimals: u32,
    state: EnrollState,
    descriptors: Vec<FeatureDescriptor>,
    credential: Option<Credential>,
}

impl<S: CredentialSigner> EnrollmentSession<S> {
    pub fn new(config: &PipelineConfig, signer: S) -> Self {
        Self::with_measurer(config, Box::new(FrameProcessor::new(config)), signer)
    }

    pub fn with_measurer(config: &PipelineConfig, measurer: Measurer, signer: S) -> Self {
        Self {
            measurer,
            engine: DecisionEngine::new(&config.liveness),
            scale: ScaleEstimator::new(),
            signer,
            required: config.session.enroll_samples.max(1),
            decimals: config.session.record_decimals,
            state: EnrollState::Searching,
            descriptors: Vec::new(),
            credential: None,
        }
    }

    pub fn state(&self) -> EnrollState {
        self.state
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn apply(&mut self, event: EnrollEvent) {
        let next = next_enroll_state(self.state, event);
        if next == self.state {
            return;
        }
        tracing::info!("enrollment: {} -> {}", self.state.label(), next.label());
        if next == EnrollState::LivenessCheck {
            self.engine.reset();
        }
        self.state = next;
    }

    fn finish(&mut self) -> Result<(), PbmError> {
        let scale = self.scale.estimate();
        let record = IdentityRecord::from_descriptors(&self.descriptors, scale, self.decimals)
            .ok_or(PbmError::EmptyEnrollment)?;
        let credential = Credential::issue(&record, &self.signer)?;
        tracing::info!(
            "enrollment complete: id={} scale={:?} samples={}",
            credential.data.id,
            record.pbm_scale,
            self.descriptors.len()
        );
        self.credential = Some(credential);
        Ok(())
    }
}

impl<S: CredentialSigner> Session for EnrollmentSession<S> {
    type Outcome = Credential;

    fn step(&mut self, frame: &GrayImage) -> Result<FrameReport, PbmError> {
        let obs = self.measurer.observe(frame);
        if self.state == EnrollState::Searching && obs.has_roi() {
            self.apply(EnrollEvent::RoiFound);
        }

        let mut liveness = Liveness::Undecidable;
        if matches!(self.state, EnrollState::LivenessCheck | EnrollState::Capturing) {
            liveness = self.engine.update(obs.sample);
            if obs.has_roi() {
                self.scale.record(obs.sample.parallax(), obs.roi_area);
            }
            self.apply(EnrollEvent::Classified(liveness));

            if self.state == EnrollState::Capturing && liveness == Liveness::Valid3d {
                if let Some(descriptor) = self.measurer.describe(&obs) {
                    self.descriptors.push(descriptor);
                }
            }
            if self.state == EnrollState::Capturing && self.descriptors.len() >= self.required {
                self.finish()?;
                self.apply(EnrollEvent::CaptureComplete);
            }
        }

        Ok(FrameReport {
            state: self.state.label(),
            roi: obs.roi,
            liveness,
            stats: self.engine.assess().stats,
            collected: self.descriptors.len(),
            required: self.required,
            error: None,
        })
    }

    fn outcome(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn reset(&mut self) {
        self.apply(EnrollEvent::Reset);
        self.engine.reset();
        self.scale.reset();
        self.descriptors.clear();
        self.credential = None;
    }
}

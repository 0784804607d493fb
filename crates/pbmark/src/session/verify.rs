//! Verification: check the presented credential, prove liveness, measure
//! the fingerprint and compare it with the claim.

use image::GrayImage;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::credential::{
    compare_records, verify_credential_text, CredentialVerifier, MatchOutcome, MatchReport,
    MatchTolerance, VerifiedClaim,
};
use crate::error::{CredentialError, PbmError};
use crate::fingerprint::{FeatureDescriptor, IdentityRecord};
use crate::liveness::{DecisionEngine, Liveness};
use crate::pipeline::FrameProcessor;
use crate::ports::QrCodec;
use crate::scale::ScaleEstimator;

use super::{FrameReport, Measurer, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    /// Waiting for a credential that passes signature and hash checks.
    Scan,
    LivenessCheck,
    /// Collecting descriptors from every rectified frame.
    Measuring,
    Result(MatchOutcome),
}

impl VerifyState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Scan => "SCAN",
            Self::LivenessCheck => "LIVENESS_CHECK",
            Self::Measuring => "MEASURING",
            Self::Result(_) => "RESULT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyEvent {
    ClaimAccepted,
    Classified(Liveness),
    Measured(MatchOutcome),
    Reset,
}

/// Pure verification transition function.
pub fn next_verify_state(state: VerifyState, event: VerifyEvent) -> VerifyState {
    use VerifyEvent::*;
    use VerifyState::*;
    match (state, event) {
        (_, Reset) => Scan,
        (Scan, ClaimAccepted) => LivenessCheck,
        (LivenessCheck, Classified(Liveness::Valid3d)) => Measuring,
        (Measuring, Measured(outcome)) => Result(outcome),
        (s, _) => s,
    }
}

/// Final result of a verification run.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// Id of the verified claim.
    pub id: String,
    pub claimed: IdentityRecord,
    pub measured: IdentityRecord,
    pub report: MatchReport,
}

impl VerificationOutcome {
    pub fn outcome(&self) -> MatchOutcome {
        self.report.outcome
    }
}

/// Verification protocol over one presented marker.
pub struct VerificationSession<V, Q> {
    measurer: Measurer,
    engine: DecisionEngine,
    scale: ScaleEstimator,
    verifier: V,
    codec: Q,
    tolerance: MatchTolerance,
    required: usize,
    decimals: u32,
    state: VerifyState,
    claim: Option<VerifiedClaim>,
    descriptors: Vec<FeatureDescriptor>,
    result: Option<VerificationOutcome>,
}

impl<V: CredentialVerifier, Q: QrCodec> VerificationSession<V, Q> {
    pub fn new(config: &PipelineConfig, verifier: V, codec: Q) -> Self {
        Self::with_measurer(config, Box::new(FrameProcessor::new(config)), verifier, codec)
    }

    pub fn with_measurer(config: &PipelineConfig, measurer: Measurer, verifier: V, codec: Q) -> Self {
        Self {
            measurer,
            engine: DecisionEngine::new(&config.liveness),
            scale: ScaleEstimator::new(),
            verifier,
            codec,
            tolerance: config.tolerance.clone(),
            required: config.session.verify_samples.max(1),
            decimals: config.session.record_decimals,
            state: VerifyState::Scan,
            claim: None,
            descriptors: Vec::new(),
            result: None,
        }
    }

    pub fn state(&self) -> VerifyState {
        self.state
    }

    pub fn claim(&self) -> Option<&VerifiedClaim> {
        self.claim.as_ref()
    }

    /// Present credential text directly, bypassing the QR codec.
    ///
    /// Only accepted in the scan state; a rejected credential leaves the
    /// session scanning.
    pub fn submit_claim(&mut self, text: &str) -> Result<(), CredentialError> {
        if self.state != VerifyState::Scan {
            return Ok(());
        }
        match verify_credential_text(text, &self.verifier) {
            Ok(claim) => {
                tracing::info!("credential {} verified", claim.id);
                self.claim = Some(claim);
                self.apply(VerifyEvent::ClaimAccepted);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("credential rejected: {}", err);
                Err(err)
            }
        }
    }

    fn apply(&mut self, event: VerifyEvent) {
        let next = next_verify_state(self.state, event);
        if next == self.state {
            return;
        }
        tracing::info!("verification: {} -> {}", self.state.label(), next.label());
        match next {
            VerifyState::LivenessCheck => self.engine.reset(),
            VerifyState::Measuring => self.descriptors.clear(),
            _ => {}
        }
        self.state = next;
    }

    fn conclude(&mut self) {
        let Some(claim) = self.claim.as_ref() else {
            return;
        };
        let Some(measured) =
            IdentityRecord::from_descriptors(&self.descriptors, self.scale.estimate(), self.decimals)
        else {
            return;
        };
        let report = compare_records(&claim.record, &measured, &self.tolerance);
        tracing::info!("verification of {}: {}", claim.id, report.outcome);
        let outcome = report.outcome;
        self.result = Some(VerificationOutcome {
            id: claim.id.clone(),
            claimed: claim.record,
            measured,
            report,
        });
        self.apply(VerifyEvent::Measured(outcome));
    }
}

impl<V: CredentialVerifier, Q: QrCodec> Session for VerificationSession<V, Q> {
    type Outcome = VerificationOutcome;

    fn step(&mut self, frame: &GrayImage) -> Result<FrameReport, PbmError> {
        let obs = self.measurer.observe(frame);
        let mut liveness = Liveness::Undecidable;
        let mut error = None;

        match self.state {
            VerifyState::Scan => {
                if let Some(text) = self.codec.decode(frame) {
                    if let Err(err) = self.submit_claim(&text) {
                        error = Some(err.to_string());
                    }
                }
            }
            VerifyState::LivenessCheck | VerifyState::Measuring => {
                liveness = self.engine.update(obs.sample);
                if obs.has_roi() {
                    self.scale.record(obs.sample.parallax(), obs.roi_area);
                }
                if self.state == VerifyState::LivenessCheck {
                    self.apply(VerifyEvent::Classified(liveness));
                } else if let Some(descriptor) = self.measurer.describe(&obs) {
                    self.descriptors.push(descriptor);
                    if self.descriptors.len() >= self.required {
                        self.conclude();
                    }
                }
            }
            VerifyState::Result(_) => {}
        }

        Ok(FrameReport {
            state: self.state.label(),
            roi: obs.roi,
            liveness,
            stats: self.engine.assess().stats,
            collected: self.descriptors.len(),
            required: self.required,
            error,
        })
    }

    fn outcome(&self) -> Option<&VerificationOutcome> {
        self.result.as_ref()
    }

    fn reset(&mut self) {
        self.apply(VerifyEvent::Reset);
        self.engine.reset();
        self.scale.reset();
        self.descriptors.clear();
        self.claim = None;
        self.result = None;
    }
}

//! pbmark: parallax-based authentication of printed two-layer markers.
//!
//! A genuine marker carries two grid layers printed at different depths; as
//! the camera moves, the layers shift against each other. A photo or screen
//! replay of the marker is flat and shows no such differential motion.
//! The pipeline stages are:
//!
//! 1. **Localize** – find the square marker outline ([`find_roi`]).
//! 2. **Rectify** – perspective-warp it to a canonical square ([`rectify`]).
//! 3. **Analyze** – measure near/far band shifts or separate the two layers
//!    in the frequency domain ([`FrameAnalyzer`]).
//! 4. **Decide** – classify a rolling window of shifts as genuine 3-D,
//!    flat 2-D, or undecidable ([`DecisionEngine`]).
//! 5. **Fingerprint** – reduce the dominant spectral peaks to a descriptor
//!    and average them into an [`IdentityRecord`].
//! 6. **Credential** – hash, sign, verify and tolerance-match identity
//!    records; enrollment and verification run as explicit state machines.
//!
//! # Public API
//! - [`PipelineConfig`] holds every tunable parameter.
//! - [`EnrollmentSession`] / [`VerificationSession`] plus [`drive_session`]
//!   run the protocols over any [`FrameSource`].
//! - The stage functions are exposed for offline analysis and tooling.

pub mod analyzer;
mod config;
pub mod credential;
mod error;
mod fingerprint;
mod homography;
pub mod liveness;
mod localize;
mod pipeline;
pub mod ports;
mod rectify;
mod scale;
pub mod session;
mod spectrum;

#[cfg(test)]
pub(crate) mod test_utils;

pub use analyzer::{AnalysisMode, AnalyzerConfig, Band, FrameAnalyzer, LayerPair, ShiftSample};
pub use config::{PipelineConfig, SessionConfig};
pub use credential::{
    canonical_json, compare_records, fingerprint_id, verify_credential_text, Credential,
    CredentialSigner, CredentialVerifier, Ed25519Signer, Ed25519Verifier, MatchOutcome,
    MatchReport, MatchTolerance, VerifiedClaim,
};
pub use error::{ConfigError, CredentialError, KeyError, PbmError};
pub use fingerprint::{
    extract_features, extract_features_with, round_to, FeatureDescriptor, FingerprintConfig,
    IdentityRecord,
};
pub use homography::HomographyError;
pub use liveness::{DecisionEngine, Liveness, LivenessConfig, ScorerKind};
pub use localize::{find_roi, LocalizerConfig, Quad};
pub use pipeline::{FrameMeasurer, FrameObservation, FrameProcessor};
pub use ports::{Control, ControlSignal, FrameSource, QrCodec};
pub use rectify::rectify;
pub use scale::{pbm_scale, ScaleEstimator};
pub use session::{
    drive_session, drive_session_with, EnrollmentSession, FrameReport, Session,
    VerificationOutcome, VerificationSession,
};
pub use spectrum::{Fft2d, Field, Spectrum};

//! Error taxonomy.
//!
//! Detection misses (no ROI, too few spectral peaks) are not errors: they are
//! `None` values that degrade a frame to a zero-confidence sample.

use std::path::PathBuf;

/// Integrity failures of a presented credential.
///
/// All of these are recoverable: a verification session stays in its scan
/// state and reports the error.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("credential is missing field `{0}`")]
    MissingField(&'static str),
    #[error("credential carries an unsigned fingerprint payload")]
    Unsigned,
    #[error("credential id `{0}` is not 16 lowercase hex characters")]
    BadId(String),
    #[error("signature is not a hex string")]
    BadSignatureEncoding,
    #[error("signature does not verify")]
    SignatureInvalid,
    #[error("fingerprint hash mismatch: claimed {claimed}, recomputed {recomputed}")]
    HashMismatch { claimed: String, recomputed: String },
}

/// Key material could not be loaded or used.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("cannot read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid key material in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Configuration file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Session-level failures.
#[derive(Debug, thiserror::Error)]
pub enum PbmError {
    /// The frame source could not deliver a frame. Fatal.
    #[error("frame acquisition failed: {0}")]
    Acquisition(String),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// The configured frame cap was reached before the session completed.
    #[error("session did not complete within {frames} frames")]
    Timeout { frames: usize },
    /// Enrollment finished collecting but could not build an identity record.
    #[error("no feature descriptors collected")]
    EmptyEnrollment,
}

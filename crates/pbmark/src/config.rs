//! Single immutable pipeline configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerConfig;
use crate::credential::MatchTolerance;
use crate::error::ConfigError;
use crate::fingerprint::FingerprintConfig;
use crate::liveness::LivenessConfig;
use crate::localize::LocalizerConfig;

/// Session-level sample counts and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Descriptors collected during enrollment.
    pub enroll_samples: usize,
    /// Descriptors collected during verification.
    pub verify_samples: usize,
    /// Decimal places kept in identity records.
    pub record_decimals: u32,
    /// Frames a driven session may consume before timing out.
    pub max_frames: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enroll_samples: 20,
            verify_samples: 10,
            record_decimals: 4,
            max_frames: None,
        }
    }
}

/// Complete configuration; each component receives its own section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub localizer: LocalizerConfig,
    /// Side length (pixels) of the rectified raster.
    pub canonical_size: u32,
    pub analyzer: AnalyzerConfig,
    pub liveness: LivenessConfig,
    pub fingerprint: FingerprintConfig,
    pub tolerance: MatchTolerance,
    pub session: SessionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            localizer: LocalizerConfig::default(),
            canonical_size: 256,
            analyzer: AnalyzerConfig::default(),
            liveness: LivenessConfig::default(),
            fingerprint: FingerprintConfig::default(),
            tolerance: MatchTolerance::default(),
            session: SessionConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonical_size < 16 {
            return Err(ConfigError::Invalid(format!(
                "canonical_size must be at least 16, got {}",
                self.canonical_size
            )));
        }
        if self.liveness.window == 0 {
            return Err(ConfigError::Invalid("liveness.window must be positive".into()));
        }
        if self.session.enroll_samples == 0 || self.session.verify_samples == 0 {
            return Err(ConfigError::Invalid("session sample counts must be positive".into()));
        }
        let l = &self.localizer;
        if !(l.min_area_ratio < l.max_area_ratio) {
            return Err(ConfigError::Invalid(format!(
                "localizer area band [{}, {}] is empty",
                l.min_area_ratio, l.max_area_ratio
            )));
        }
        Ok(())
    }
}

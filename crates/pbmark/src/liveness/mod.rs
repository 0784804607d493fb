//! Temporal decision engine: genuine 3-D parallax vs. flat 2-D reproduction.
//!
//! Every frame appends one [`ShiftSample`] to a fixed-capacity window; the
//! classification is recomputed from the whole window by a pure
//! [`LivenessScorer`]. A window below capacity is always
//! [`Liveness::Undecidable`].

mod differential;
mod history;
mod motion;

use serde::{Deserialize, Serialize};

use crate::analyzer::ShiftSample;

pub use differential::DifferentialScorer;
pub use history::ShiftHistory;
pub use motion::MotionScorer;

/// Liveness classification of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Liveness {
    #[serde(rename = "UNDECIDABLE")]
    Undecidable,
    #[serde(rename = "INVALID_2D")]
    Invalid2d,
    #[serde(rename = "VALID_3D")]
    Valid3d,
}

impl Liveness {
    pub fn label(self) -> &'static str {
        match self {
            Self::Undecidable => "UNDECIDABLE",
            Self::Invalid2d => "INVALID_2D",
            Self::Valid3d => "VALID_3D",
        }
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which scorer implementation the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Near/far differential statistics.
    #[default]
    Differential,
    /// Mean/stability of a single relative shift.
    Motion,
}

/// Liveness configuration.
///
/// All thresholds are empirically tuned; they are not physical constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub scorer: ScorerKind,
    /// Window length (frames).
    pub window: usize,
    /// Samples below this confidence are ignored by the differential scorer.
    /// Band confidences of real markers sit around 0.02–0.06; the default
    /// drops missing measurements, not weak ones.
    pub confidence_floor: f64,
    /// Fraction of the window that must pass the confidence floor.
    pub min_valid_fraction: f64,
    /// Minimum mean `|near - far|` (pixels).
    pub min_mean_difference: f64,
    /// Minimum magnitude of the mean unit difference vector.
    pub min_coherence: f64,
    /// Minimum fraction of samples sharing the majority x-sign.
    pub min_sign_consistency: f64,
    /// Minimum mean `|near - far| / |near|`.
    pub min_gain: f64,
    /// Minimum 95th-5th percentile spread of `|near|` (pixels). Band peaks
    /// are integer lags, so a still camera gives exactly 0.
    pub min_swing: f64,
    /// Motion scorer: mean magnitude must exceed this (pixels).
    pub motion_eps_shift: f64,
    /// Motion scorer: population std of the magnitude must stay below this.
    pub motion_max_std: f64,
    /// Motion scorer: minimum mean confidence.
    pub motion_min_confidence: f64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::Differential,
            window: 30,
            confidence_floor: 0.015,
            min_valid_fraction: 0.5,
            min_mean_difference: 0.5,
            min_coherence: 0.6,
            min_sign_consistency: 0.7,
            min_gain: 0.05,
            min_swing: 1.0,
            motion_eps_shift: 0.5,
            motion_max_std: 1.0,
            motion_min_confidence: 0.1,
        }
    }
}

/// Window statistics exposed for display. Fields a scorer does not use
/// stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Samples in the window.
    pub samples: usize,
    /// Samples that passed the confidence floor.
    pub valid: usize,
    pub mean_confidence: f64,
    pub mean_difference: f64,
    pub coherence: f64,
    pub sign_consistency: f64,
    pub gain: f64,
    pub swing: f64,
    /// Population std of the shift magnitude (motion scorer).
    pub magnitude_std: f64,
}

/// Classification plus the statistics it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub liveness: Liveness,
    pub stats: WindowStats,
}

/// Pure classifier over a window of samples.
pub trait LivenessScorer: Send + Sync {
    fn assess(&self, history: &ShiftHistory) -> Assessment;
}

/// Build the scorer selected by `config.scorer`.
pub fn scorer_from_config(config: &LivenessConfig) -> Box<dyn LivenessScorer> {
    match config.scorer {
        ScorerKind::Differential => Box::new(DifferentialScorer::from_config(config)),
        ScorerKind::Motion => Box::new(MotionScorer::from_config(config)),
    }
}

/// Stateful engine owning one session's sample window.
pub struct DecisionEngine {
    history: ShiftHistory,
    scorer: Box<dyn LivenessScorer>,
}

impl DecisionEngine {
    pub fn new(config: &LivenessConfig) -> Self {
        Self::with_scorer(config.window, scorer_from_config(config))
    }

    pub fn with_scorer(window: usize, scorer: Box<dyn LivenessScorer>) -> Self {
        Self {
            history: ShiftHistory::new(window),
            scorer,
        }
    }

    /// Append one sample and reclassify the window.
    pub fn update(&mut self, sample: ShiftSample) -> Liveness {
        self.history.push(sample);
        self.assess().liveness
    }

    /// Classify the current window without appending.
    pub fn assess(&self) -> Assessment {
        let mut assessment = self.scorer.assess(&self.history);
        if !self.history.is_full() {
            assessment.liveness = Liveness::Undecidable;
        }
        assessment
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &ShiftHistory {
        &self.history
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

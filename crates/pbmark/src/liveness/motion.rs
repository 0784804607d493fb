//! Legacy scorer over the magnitude of a single relative shift.

use super::{Assessment, Liveness, LivenessConfig, LivenessScorer, ShiftHistory, WindowStats};

/// Classifies by the mean and stability of `|near - far|`.
///
/// A stable, non-zero shift is genuine; a non-zero but jittery one is
/// undecidable; a vanishing one is flat.
#[derive(Debug, Clone)]
pub struct MotionScorer {
    pub eps_shift: f64,
    pub max_std: f64,
    pub min_confidence: f64,
}

impl MotionScorer {
    pub fn from_config(config: &LivenessConfig) -> Self {
        Self {
            eps_shift: config.motion_eps_shift,
            max_std: config.motion_max_std,
            min_confidence: config.motion_min_confidence,
        }
    }
}

impl LivenessScorer for MotionScorer {
    fn assess(&self, history: &ShiftHistory) -> Assessment {
        let mut stats = WindowStats {
            samples: history.len(),
            valid: history.len(),
            ..WindowStats::default()
        };
        if history.is_empty() {
            return Assessment {
                liveness: Liveness::Undecidable,
                stats,
            };
        }

        let n = history.len() as f64;
        let mags: Vec<f64> = history.iter().map(|s| s.parallax()).collect();
        let mean = mags.iter().sum::<f64>() / n;
        let var = mags.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
        stats.mean_confidence = history.iter().map(|s| s.confidence()).sum::<f64>() / n;
        stats.mean_difference = mean;
        stats.magnitude_std = var.sqrt();

        let liveness = if stats.mean_confidence < self.min_confidence {
            Liveness::Undecidable
        } else if mean > self.eps_shift {
            if stats.magnitude_std < self.max_std {
                Liveness::Valid3d
            } else {
                Liveness::Undecidable
            }
        } else {
            Liveness::Invalid2d
        };
        Assessment { liveness, stats }
    }
}

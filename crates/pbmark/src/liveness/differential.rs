//! Canonical scorer over near/far band differences.

use crate::analyzer::ShiftSample;

use super::{Assessment, Liveness, LivenessConfig, LivenessScorer, ShiftHistory, WindowStats};

/// Classifies the window from the differential motion `near - far`.
///
/// A flat reproduction moves both bands together, so their difference stays
/// near zero or flips direction at random. Decision order: too little swing
/// is undecidable; then mean difference, coherence, sign consistency and gain
/// must each clear their threshold for `Valid3d`.
#[derive(Debug, Clone)]
pub struct DifferentialScorer {
    pub confidence_floor: f64,
    pub min_valid_fraction: f64,
    pub min_mean_difference: f64,
    pub min_coherence: f64,
    pub min_sign_consistency: f64,
    pub min_gain: f64,
    pub min_swing: f64,
}

impl DifferentialScorer {
    pub fn from_config(config: &LivenessConfig) -> Self {
        Self {
            confidence_floor: config.confidence_floor,
            min_valid_fraction: config.min_valid_fraction,
            min_mean_difference: config.min_mean_difference,
            min_coherence: config.min_coherence,
            min_sign_consistency: config.min_sign_consistency,
            min_gain: config.min_gain,
            min_swing: config.min_swing,
        }
    }

    fn classify(&self, stats: &WindowStats) -> Liveness {
        if stats.swing < self.min_swing {
            Liveness::Undecidable
        } else if stats.mean_difference < self.min_mean_difference
            || stats.coherence < self.min_coherence
            || stats.sign_consistency < self.min_sign_consistency
            || stats.gain < self.min_gain
        {
            Liveness::Invalid2d
        } else {
            Liveness::Valid3d
        }
    }
}

impl LivenessScorer for DifferentialScorer {
    fn assess(&self, history: &ShiftHistory) -> Assessment {
        let mut stats = WindowStats {
            samples: history.len(),
            ..WindowStats::default()
        };
        if history.is_empty() {
            return Assessment {
                liveness: Liveness::Undecidable,
                stats,
            };
        }
        stats.mean_confidence =
            history.iter().map(|s| s.confidence()).sum::<f64>() / history.len() as f64;

        let valid: Vec<&ShiftSample> = history
            .iter()
            .filter(|s| s.confidence() >= self.confidence_floor)
            .collect();
        stats.valid = valid.len();
        let required = self.min_valid_fraction * history.len() as f64;
        if valid.is_empty() || (valid.len() as f64) < required {
            return Assessment {
                liveness: Liveness::Undecidable,
                stats,
            };
        }

        let n = valid.len() as f64;
        let diffs: Vec<[f64; 2]> = valid.iter().map(|s| s.difference()).collect();
        let norms: Vec<f64> = diffs.iter().map(|d| d[0].hypot(d[1])).collect();
        stats.mean_difference = norms.iter().sum::<f64>() / n;

        let mut unit_sum = [0.0, 0.0];
        for (d, &m) in diffs.iter().zip(norms.iter()) {
            if m > 0.0 {
                unit_sum[0] += d[0] / m;
                unit_sum[1] += d[1] / m;
            }
        }
        stats.coherence = (unit_sum[0] / n).hypot(unit_sum[1] / n);

        let positive = diffs.iter().filter(|d| d[0] > 0.0).count();
        let negative = diffs.iter().filter(|d| d[0] < 0.0).count();
        stats.sign_consistency = positive.max(negative) as f64 / n;

        let ratios: Vec<f64> = valid
            .iter()
            .zip(norms.iter())
            .filter_map(|(s, &m)| {
                let near = s.near();
                let near_mag = near[0].hypot(near[1]);
                (near_mag > 1e-9).then(|| m / near_mag)
            })
            .collect();
        stats.gain = if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };

        let mut near_mags: Vec<f64> = valid
            .iter()
            .map(|s| {
                let near = s.near();
                near[0].hypot(near[1])
            })
            .collect();
        near_mags.sort_by(f64::total_cmp);
        stats.swing = percentile(&near_mags, 95.0) - percentile(&near_mags, 5.0);

        Assessment {
            liveness: self.classify(&stats),
            stats,
        }
    }
}

/// Linear-interpolation percentile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let t = rank - lo as f64;
            sorted[lo] + t * (sorted[hi] - sorted[lo])
        }
    }
}

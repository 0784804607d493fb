//! Tolerance comparison of a claimed identity record against a measured one.

use serde::{Deserialize, Serialize};

use crate::fingerprint::IdentityRecord;

/// Per-field absolute tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTolerance {
    /// Applies to `f1`, `f2` and `pbm_scale`.
    pub frequency_tolerance: f64,
    /// Applies to `a1`, `a2` and `rel_angle` (degrees).
    pub angle_tolerance: f64,
}

impl Default for MatchTolerance {
    fn default() -> Self {
        Self {
            frequency_tolerance: 0.02,
            angle_tolerance: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    #[serde(rename = "GENUINE")]
    Genuine,
    #[serde(rename = "MISMATCH")]
    Mismatch,
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Genuine => "GENUINE",
            Self::Mismatch => "MISMATCH",
        })
    }
}

/// One field of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    pub claimed: f64,
    /// `None` when the field could not be measured.
    pub measured: Option<f64>,
    pub difference: Option<f64>,
    pub tolerance: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub fields: Vec<FieldComparison>,
}

impl MatchReport {
    pub fn is_genuine(&self) -> bool {
        self.outcome == MatchOutcome::Genuine
    }
}

/// Compare every claimed field against its measurement.
///
/// `rel_angle` differences above 90° wrap to `180° - diff`. A claimed
/// `pbm_scale` that was not measured fails; an unclaimed one is ignored.
pub fn compare_records(
    claimed: &IdentityRecord,
    measured: &IdentityRecord,
    tolerance: &MatchTolerance,
) -> MatchReport {
    let freq = tolerance.frequency_tolerance;
    let angle = tolerance.angle_tolerance;

    let mut fields = vec![
        compare("f1", claimed.f1, Some(measured.f1), freq, false),
        compare("a1", claimed.a1, Some(measured.a1), angle, false),
        compare("f2", claimed.f2, Some(measured.f2), freq, false),
        compare("a2", claimed.a2, Some(measured.a2), angle, false),
        compare("rel_angle", claimed.rel_angle, Some(measured.rel_angle), angle, true),
    ];
    if let Some(scale) = claimed.pbm_scale {
        fields.push(compare("pbm_scale", scale, measured.pbm_scale, freq, false));
    }

    let outcome = if fields.iter().all(|f| f.passed) {
        MatchOutcome::Genuine
    } else {
        MatchOutcome::Mismatch
    };
    MatchReport { outcome, fields }
}

fn compare(
    field: &str,
    claimed: f64,
    measured: Option<f64>,
    tolerance: f64,
    wrap_half_turn: bool,
) -> FieldComparison {
    let difference = measured.map(|m| {
        let d = (m - claimed).abs();
        if wrap_half_turn && d > 90.0 {
            180.0 - d
        } else {
            d
        }
    });
    FieldComparison {
        field: field.to_string(),
        claimed,
        measured,
        difference,
        tolerance,
        passed: difference.is_some_and(|d| d <= tolerance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(f1: f64, rel_angle: f64, pbm_scale: Option<f64>) -> IdentityRecord {
        IdentityRecord {
            f1,
            a1: 30.0,
            f2: 0.2,
            a2: 120.0,
            rel_angle,
            pbm_scale,
        }
    }

    #[test]
    fn identical_records_are_genuine() {
        let r = record(0.1, 90.0, Some(0.05));
        let report = compare_records(&r, &r, &MatchTolerance::default());
        assert!(report.is_genuine());
        assert_eq!(report.fields.len(), 6);
    }

    #[test]
    fn frequency_beyond_tolerance_is_a_mismatch() {
        let report = compare_records(
            &record(0.10, 90.0, Some(0.05)),
            &record(0.15, 90.0, Some(0.05)),
            &MatchTolerance::default(),
        );
        assert_eq!(report.outcome, MatchOutcome::Mismatch);
        let failed: Vec<&str> = report
            .fields
            .iter()
            .filter(|f| !f.passed)
            .map(|f| f.field.as_str())
            .collect();
        assert_eq!(failed, vec!["f1"]);
    }

    #[test]
    fn relative_angle_wraps_at_half_turn() {
        let report = compare_records(
            &record(0.1, 2.0, None),
            &record(0.1, 176.0, None),
            &MatchTolerance::default(),
        );
        let rel = report.fields.iter().find(|f| f.field == "rel_angle").unwrap();
        assert!((rel.difference.unwrap() - 6.0).abs() < 1e-9);
        assert!(report.is_genuine());
    }

    #[test]
    fn claimed_scale_must_be_measured() {
        let report = compare_records(
            &record(0.1, 90.0, Some(0.05)),
            &record(0.1, 90.0, None),
            &MatchTolerance::default(),
        );
        assert_eq!(report.outcome, MatchOutcome::Mismatch);

        let unclaimed = compare_records(
            &record(0.1, 90.0, None),
            &record(0.1, 90.0, Some(0.9)),
            &MatchTolerance::default(),
        );
        assert!(unclaimed.is_genuine());
    }
}

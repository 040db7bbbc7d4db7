//! Stability assessment over a skill's recent outcome history.
//!
//! The stability gap is `mean(accuracies) - min(accuracies)`. It measures
//! inconsistency, not absolute quality: a skill that is uniformly wrong has a
//! gap of zero and is not flagged by this metric.

use serde::{Deserialize, Serialize};

use crate::domain::{OutcomeHistory, SkillRef};

/// Gap above which a skill is critically unstable.
pub const CRITICAL_GAP: f64 = 0.5;

/// Gap above which a skill is flagged as unstable.
pub const WARNING_GAP: f64 = 0.3;

/// Severity classification of a stability gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl Severity {
    /// Classify a gap against the fixed thresholds.
    pub fn from_gap(gap: f64) -> Self {
        if gap > CRITICAL_GAP {
            Self::Critical
        } else if gap > WARNING_GAP {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    /// Whether this severity counts as a flag.
    pub fn should_flag(self) -> bool {
        self >= Self::Warning
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityAssessment {
    pub skill: SkillRef,
    pub gap: f64,
    pub severity: Severity,
    /// Number of accuracy samples that contributed to the gap.
    pub samples: usize,
}

/// Assess one skill. `None` or an empty history is "no signal" and is never
/// penalized.
pub fn assess(skill: &SkillRef, history: Option<&OutcomeHistory>) -> StabilityAssessment {
    let accuracies: Vec<f64> = history
        .map(|h| {
            h.accuracies
                .iter()
                .copied()
                .filter(|a| a.is_finite())
                .collect()
        })
        .unwrap_or_default();

    let gap = stability_gap(&accuracies).unwrap_or(0.0);
    StabilityAssessment {
        skill: skill.clone(),
        gap,
        severity: Severity::from_gap(gap),
        samples: accuracies.len(),
    }
}

/// `mean - min` over `accuracies`, or `None` when empty.
///
/// Clamped at zero: mean ≥ min holds mathematically but summation can
/// undershoot by an ulp.
pub fn stability_gap(accuracies: &[f64]) -> Option<f64> {
    let min = accuracies.iter().copied().reduce(f64::min)?;
    let mean = mean(accuracies)?;
    Some((mean - min).max(0.0))
}

/// Arithmetic mean, or `None` when empty.
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill() -> SkillRef {
        SkillRef::parse("x:y").unwrap()
    }

    fn history(accuracies: &[f64]) -> OutcomeHistory {
        OutcomeHistory::new(accuracies.to_vec(), vec![])
    }

    #[test]
    fn no_signal_is_ok() {
        let a = assess(&skill(), None);
        assert_eq!(a.gap, 0.0);
        assert_eq!(a.severity, Severity::Ok);

        let a = assess(&skill(), Some(&history(&[])));
        assert_eq!(a.gap, 0.0);
        assert_eq!(a.severity, Severity::Ok);
        assert_eq!(a.samples, 0);
    }

    #[test]
    fn uniform_failure_is_not_flagged() {
        let a = assess(&skill(), Some(&history(&[0.0, 0.0, 0.0, 0.0])));
        assert_eq!(a.gap, 0.0);
        assert_eq!(a.severity, Severity::Ok);
    }

    #[test]
    fn gap_is_mean_minus_min() {
        // mean 0.7, min 0.1
        let a = assess(&skill(), Some(&history(&[1.0, 1.0, 0.1, 0.7])));
        assert!((a.gap - 0.6).abs() < 1e-9);
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(Severity::from_gap(0.3), Severity::Ok);
        assert_eq!(Severity::from_gap(0.31), Severity::Warning);
        assert_eq!(Severity::from_gap(0.5), Severity::Warning);
        assert_eq!(Severity::from_gap(0.51), Severity::Critical);
        assert!(!Severity::Ok.should_flag());
        assert!(Severity::Warning.should_flag());
        assert!(Severity::Critical.should_flag());
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let a = assess(&skill(), Some(&history(&[f64::NAN, 1.0, 1.0])));
        assert_eq!(a.gap, 0.0);
        assert_eq!(a.samples, 2);
    }

    #[test]
    fn gap_never_negative() {
        let samples = [
            vec![0.1, 0.2, 0.3],
            vec![1.0; 7],
            vec![0.333_333_333, 0.333_333_333, 0.333_333_333],
            vec![0.9, 0.0, 0.45, 0.12, 0.77],
        ];
        for s in &samples {
            assert!(stability_gap(s).unwrap() >= 0.0, "negative gap for {s:?}");
        }
    }

    #[test]
    fn severity_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }
}

//! Improvement queue: per-skill lifecycle state machine.
//!
//! ```text
//! healthy --flag--> flagged --flag--> flagged (count++)
//! flagged --start_evaluation--> evaluating (count reset)
//! evaluating --record_eval_execution xN--> evaluating
//! evaluating --evaluate, mean <= baseline--> promoted
//! evaluating --evaluate, mean >  baseline--> pending_rollback_review
//! ```
//!
//! `promoted` and `pending_rollback_review` are sinks from the queue's point
//! of view. A promoted skill may be flagged again from scratch; a skill under
//! rollback review is never overwritten by new flags.
//!
//! Transitions live on [`QueueEntry`] so they can be exercised without disk;
//! [`ImprovementQueue`] wraps them with write-through persistence.

pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::SkillRef;
use crate::stability::mean;

pub use store::ImprovementQueue;

/// Flags required before a skill becomes eligible for improvement.
pub const FLAG_THRESHOLD: u32 = 3;

/// Evaluation samples required before a decision can be made.
pub const EVAL_WINDOW_SIZE: usize = 10;

/// Lifecycle status of a queue entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Healthy,
    Flagged,
    Evaluating,
    PendingRollbackReview,
    Promoted,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Flagged => "flagged",
            Self::Evaluating => "evaluating",
            Self::PendingRollbackReview => "pending_rollback_review",
            Self::Promoted => "promoted",
        }
    }

    /// States that new flags must not overwrite.
    pub fn is_flag_protected(self) -> bool {
        matches!(self, Self::Evaluating | Self::PendingRollbackReview)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded flag, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub stability_gap: f64,
    #[serde(default)]
    pub invocation_id: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

/// Outcome of an evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Promote,
    PendingRollbackReview,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::PendingRollbackReview => "pending_rollback_review",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision plus the numbers it was based on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalDecision {
    pub decision: Decision,
    pub baseline_gap: f64,
    pub eval_mean: f64,
    pub samples: usize,
}

/// Per-skill state. Every field has a canonical default so an entry missing
/// fields on disk is indistinguishable from one written with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub flagged_count: u32,
    #[serde(default)]
    pub flag_history: Vec<FlagRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_gap: Option<f64>,
    #[serde(default)]
    pub eval_samples: Vec<f64>,
    /// Mean of the last completed evaluation window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_mean: Option<f64>,
    #[serde(default)]
    pub regression_detected: bool,
    /// When the current decision was followed through. Cleared by the next
    /// evaluation window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concluded_at: Option<DateTime<Utc>>,
    /// Fields written by other tools; preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueueEntry {
    /// Record a flag. Returns the status the entry had before.
    pub fn record_flag(
        &mut self,
        stability_gap: f64,
        invocation_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Status {
        let prior = self.status;
        self.flag_history.push(FlagRecord {
            stability_gap,
            invocation_id: invocation_id.to_string(),
            timestamp,
        });
        self.flagged_count += 1;
        if !prior.is_flag_protected() {
            self.status = Status::Flagged;
        }
        prior
    }

    pub fn needs_improvement(&self) -> bool {
        self.status == Status::Flagged && self.flagged_count >= FLAG_THRESHOLD
    }

    /// Open an evaluation window. Returns the status the entry had before.
    pub fn begin_evaluation(&mut self, baseline_gap: f64) -> Status {
        let prior = self.status;
        self.status = Status::Evaluating;
        self.baseline_gap = Some(baseline_gap);
        self.flagged_count = 0;
        self.eval_samples.clear();
        self.concluded_at = None;
        prior
    }

    /// Append an evaluation sample. No-op returning `false` outside `evaluating`.
    pub fn push_eval_sample(&mut self, stability_gap: f64) -> bool {
        if self.status != Status::Evaluating {
            return false;
        }
        self.eval_samples.push(stability_gap);
        true
    }

    pub fn is_eval_complete(&self) -> bool {
        self.eval_samples.len() >= EVAL_WINDOW_SIZE
    }

    /// Decide a complete evaluation window.
    ///
    /// `None` without mutating when the entry is not evaluating, the window
    /// is incomplete, or no baseline was recorded.
    pub fn decide(&mut self) -> Option<EvalDecision> {
        if self.status != Status::Evaluating || !self.is_eval_complete() {
            return None;
        }
        let baseline_gap = self.baseline_gap?;
        let eval_mean = mean(&self.eval_samples)?;
        let samples = self.eval_samples.len();

        let decision = if eval_mean <= baseline_gap {
            self.status = Status::Promoted;
            Decision::Promote
        } else {
            self.status = Status::PendingRollbackReview;
            self.regression_detected = true;
            Decision::PendingRollbackReview
        };
        self.eval_mean = Some(eval_mean);
        self.eval_samples.clear();
        self.concluded_at = None;

        Some(EvalDecision {
            decision,
            baseline_gap,
            eval_mean,
            samples,
        })
    }
}

/// The persisted queue document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueDocument {
    /// Incremented on every successful save.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub skills: BTreeMap<SkillRef, QueueEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Errors from queue persistence.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file changed underneath us: expected revision {expected}, found {found}")]
    StaleRevision { expected: u64, found: u64 },

    #[error("stability gap must be a finite number, got {0}")]
    NonFiniteGap(f64),

    #[error("failed to encode queue document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

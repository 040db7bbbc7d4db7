//! skillgov Core Library
//!
//! Closed-loop governance for agent skills: detect unstable skills from
//! their outcome history, queue them for improvement, evaluate the change,
//! then promote it or route it to a human rollback review.

pub mod config;
pub mod domain;
pub mod experience;
pub mod git;
pub mod governor;
pub mod obs;
pub mod queue;
pub mod review;
pub mod stability;
pub mod telemetry;
pub mod versioning;

pub use config::{GovernorConfig, ReviewerConfig};

pub use domain::{
    load_history, GovernanceError, HistoryDocument, OutcomeHistory, Result, SkillRef,
};

pub use experience::{
    entry_key, ExperienceEntry, ExperienceError, ExperienceLibrary, Trajectory,
    DEFAULT_MAX_RESULTS, MAX_ENTRIES_PER_SKILL,
};

pub use git::{capture_head_sha, commit_diff};

pub use governor::{Conclusion, FollowThrough, Governor, InvocationEvent, MonitorReport};

pub use queue::{
    Decision, EvalDecision, ImprovementQueue, QueueEntry, QueueError, Status, EVAL_WINDOW_SIZE,
    FLAG_THRESHOLD,
};

pub use review::{
    create_github_issue, generate_issue_body, generate_issue_title, generate_rollback_command,
    GhCliTracker, IssueDraft, IssueTracker, TrackerUnavailable,
};

pub use stability::{assess, stability_gap, Severity, StabilityAssessment};

pub use versioning::{bump_version, read_version, SkillDocument, VersionError};

/// Crate version, used by the CLI's `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Domain-level error taxonomy for skillgov.

use chrono::{DateTime, Utc};

use crate::experience::ExperienceError;
use crate::queue::QueueError;
use crate::versioning::VersionError;

/// skillgov domain errors.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error("invalid skill reference: {0}")]
    InvalidSkillRef(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("experience library error: {0}")]
    Experience(#[from] ExperienceError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("skill {skill} has no decision to follow through (status {status})")]
    NoDecision { skill: String, status: String },

    #[error("skill {skill} was already concluded at {at}")]
    AlreadyConcluded { skill: String, at: DateTime<Utc> },
}

/// Result type for skillgov domain operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;

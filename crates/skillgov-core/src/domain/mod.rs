//! Domain models for skillgov.
//!
//! Canonical definitions shared by every component:
//! - `SkillRef`: `namespace:name` primary key
//! - `OutcomeHistory` / `HistoryDocument`: read-only invocation outcomes
//! - `GovernanceError`: error taxonomy

pub mod error;
pub mod history;
pub mod skill_ref;

pub use error::{GovernanceError, Result};
pub use history::{load_history, HistoryDocument, OutcomeHistory};
pub use skill_ref::SkillRef;

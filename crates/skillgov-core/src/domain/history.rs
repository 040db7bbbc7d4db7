//! Read-only view of the outcome history written by the invocation log producer.
//!
//! The document maps each skill reference to its rolling outcome samples:
//!
//! ```json
//! { "x:y": { "accuracies": [0.9, 0.4, 1.0], "durations": [120.0, 340.0, 95.0] } }
//! ```
//!
//! Nothing here ever fails: a missing or unreadable document is an empty
//! history, and a malformed entry is "no signal" for that one skill.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::skill_ref::SkillRef;

/// Outcome samples for one skill. Both sequences may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeHistory {
    #[serde(default)]
    pub accuracies: Vec<f64>,
    #[serde(default)]
    pub durations: Vec<f64>,
}

impl OutcomeHistory {
    pub fn new(accuracies: Vec<f64>, durations: Vec<f64>) -> Self {
        Self {
            accuracies,
            durations,
        }
    }
}

/// Whole history snapshot, keyed by skill reference.
///
/// Entries are kept as raw JSON and decoded on lookup so that one corrupt
/// entry never hides the others.
#[derive(Debug, Clone, Default)]
pub struct HistoryDocument {
    entries: BTreeMap<String, Value>,
}

impl HistoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a history document from JSON text. Anything that is not a JSON
    /// object yields an empty document.
    pub fn from_json_str(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self {
                entries: map.into_iter().collect(),
            },
            Ok(other) => {
                warn!(kind = %json_kind(&other), "history document is not an object; treating as empty");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "history document is not valid JSON; treating as empty");
                Self::default()
            }
        }
    }

    /// Insert or replace one skill's history.
    pub fn insert(&mut self, skill: &SkillRef, history: &OutcomeHistory) {
        let value = serde_json::to_value(history).unwrap_or(Value::Null);
        self.entries.insert(skill.as_str().to_string(), value);
    }

    /// Decode the history for `skill`, or `None` when absent or malformed.
    pub fn get(&self, skill: &SkillRef) -> Option<OutcomeHistory> {
        let raw = self.entries.get(skill.as_str())?;
        match serde_json::from_value::<OutcomeHistory>(raw.clone()) {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(skill = %skill, error = %e, "malformed history entry; treating as no signal");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the history document at `path`, treating a missing or corrupt file
/// as an empty history.
pub fn load_history(path: &Path) -> HistoryDocument {
    match std::fs::read_to_string(path) {
        Ok(raw) => HistoryDocument::from_json_str(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no history document; treating as empty");
            HistoryDocument::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read history document");
            HistoryDocument::default()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

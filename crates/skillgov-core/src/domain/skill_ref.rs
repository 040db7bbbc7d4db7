//! Stable `namespace:name` skill identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::GovernanceError;

/// Primary key shared by every component.
///
/// Case-sensitive and immutable. Serialized as a plain string so it can be
/// used directly as a JSON object key. Keys read back from storage are not
/// re-validated; rejecting one would drop governance state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillRef(String);

impl SkillRef {
    /// Parse a `namespace:name` reference, rejecting empty parts.
    pub fn parse(raw: &str) -> Result<Self, GovernanceError> {
        match raw.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Ok(Self(raw.to_string())),
            _ => Err(GovernanceError::InvalidSkillRef(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace part, or the empty string for stored keys without `:`.
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(ns, _)| ns)
    }

    /// Name part, or the whole key for stored keys without `:`.
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Filesystem-safe form: `:` and `/` replaced with `_`.
    pub fn sanitized(&self) -> String {
        self.0.replace(|c: char| c == ':' || c == '/', "_")
    }
}

impl fmt::Display for SkillRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SkillRef {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SkillRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

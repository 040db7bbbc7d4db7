//! Version bookkeeping in a skill definition's YAML frontmatter.
//!
//! ```markdown
//! ---
//! name: hook-writer
//! version: 1.2.0
//! rollback_available: true
//! version_history:
//!   - version: 1.2.0
//!     timestamp: 2026-01-01T00:00:00Z
//!     change_summary: tightened matcher
//!     baseline_metrics: { baseline_gap: 0.15, eval_mean: 0.1 }
//! ---
//! # Instructions ...
//! ```
//!
//! Keys not touched by a bump keep their values and order; the body after
//! the closing delimiter is written back byte-for-byte.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::obs;

const DELIMITER: &str = "---";
const VERSION_KEY: &str = "version";
const HISTORY_KEY: &str = "version_history";
const ROLLBACK_KEY: &str = "rollback_available";

/// Version assigned to skills that have never been versioned.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Errors from reading or rewriting a skill definition.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("frontmatter opened with --- but never closed")]
    UnterminatedFrontmatter,

    #[error("frontmatter is not a YAML mapping")]
    NotAMapping,

    #[error("invalid version {value:?}: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("version_history is not a list")]
    InvalidHistory,

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VersionError>;

#[derive(Debug, Serialize)]
struct VersionRecord<'a> {
    version: String,
    timestamp: DateTime<Utc>,
    change_summary: &'a str,
    baseline_metrics: &'a BTreeMap<String, f64>,
}

/// A skill definition split into frontmatter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDocument {
    pub frontmatter: Mapping,
    pub body: String,
}

impl SkillDocument {
    /// Split `text` into frontmatter and body. Text without a leading `---`
    /// line has empty frontmatter and is all body.
    pub fn parse(text: &str) -> Result<Self> {
        let Some((yaml, body)) = split_frontmatter(text)? else {
            return Ok(Self {
                frontmatter: Mapping::new(),
                body: text.to_string(),
            });
        };

        let frontmatter = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(yaml)? {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => return Err(VersionError::NotAMapping),
            }
        };
        Ok(Self {
            frontmatter,
            body: body.to_string(),
        })
    }

    pub fn render(&self) -> Result<String> {
        let mut yaml = serde_yaml::to_string(&self.frontmatter)?;
        if !yaml.ends_with('\n') {
            yaml.push('\n');
        }
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", self.body))
    }

    /// Current version, if any.
    pub fn version(&self) -> Option<String> {
        match self.frontmatter.get(VERSION_KEY)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Apply a minor bump in memory and return the new version.
    pub fn bump(
        &mut self,
        change_summary: &str,
        metrics: &BTreeMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        if self.version().is_none() {
            self.initialize(now)?;
        }
        let current = self.version().unwrap_or_else(|| INITIAL_VERSION.to_string());
        let parsed = semver::Version::parse(current.trim()).map_err(|source| {
            VersionError::InvalidVersion {
                value: current.clone(),
                source,
            }
        })?;
        let next = semver::Version::new(parsed.major, parsed.minor + 1, parsed.patch).to_string();

        let record = serde_yaml::to_value(VersionRecord {
            version: next.clone(),
            timestamp: now,
            change_summary,
            baseline_metrics: metrics,
        })?;
        self.history_mut()?.push(record);
        self.frontmatter
            .insert(Value::from(VERSION_KEY), Value::from(next.clone()));
        self.frontmatter
            .insert(Value::from(ROLLBACK_KEY), Value::Bool(true));
        Ok(next)
    }

    fn initialize(&mut self, now: DateTime<Utc>) -> Result<()> {
        let empty = BTreeMap::new();
        let record = serde_yaml::to_value(VersionRecord {
            version: INITIAL_VERSION.to_string(),
            timestamp: now,
            change_summary: "Initial version",
            baseline_metrics: &empty,
        })?;
        self.frontmatter
            .insert(Value::from(VERSION_KEY), Value::from(INITIAL_VERSION));
        self.frontmatter
            .insert(Value::from(HISTORY_KEY), Value::Sequence(vec![record]));
        Ok(())
    }

    fn history_mut(&mut self) -> Result<&mut Vec<Value>> {
        let key = Value::from(HISTORY_KEY);
        if !self.frontmatter.contains_key(&key) {
            self.frontmatter.insert(key.clone(), Value::Sequence(Vec::new()));
        }
        match self.frontmatter.get_mut(&key) {
            Some(Value::Sequence(seq)) => Ok(seq),
            _ => Err(VersionError::InvalidHistory),
        }
    }
}

/// Returns `(yaml, body)` when `text` opens with a `---` line.
fn split_frontmatter(text: &str) -> Result<Option<(&str, &str)>> {
    let is_delimiter =
        |line: &str| line.trim_end_matches(|c: char| c == '\r' || c == '\n') == DELIMITER;

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if !is_delimiter(first) {
        return Ok(None);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if is_delimiter(line) {
            return Ok(Some((&text[yaml_start..offset], &text[offset + line.len()..])));
        }
        offset += line.len();
    }
    Err(VersionError::UnterminatedFrontmatter)
}

/// Bump the minor version of the skill at `skill_file`, record the change
/// in its history, and mark rollback as available.
///
/// An unversioned skill is first initialized at [`INITIAL_VERSION`], so its
/// first bump yields `1.1.0`.
pub fn bump_version(
    skill_file: &Path,
    change_summary: &str,
    metrics: &BTreeMap<String, f64>,
) -> Result<String> {
    let text = fs::read_to_string(skill_file)?;
    let mut doc = SkillDocument::parse(&text)?;
    let version = doc.bump(change_summary, metrics, Utc::now())?;
    write_atomic(skill_file, doc.render()?.as_bytes())?;
    obs::emit_version_bumped(&skill_file.display().to_string(), &version);
    Ok(version)
}

/// Current version recorded in `skill_file`, if any.
pub fn read_version(skill_file: &Path) -> Result<Option<String>> {
    let text = fs::read_to_string(skill_file)?;
    Ok(SkillDocument::parse(&text)?.version())
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

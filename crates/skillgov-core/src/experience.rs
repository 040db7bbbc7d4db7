//! Experience library: successful execution trajectories per skill.
//!
//! Layout: `<root>/<sanitized skill>/<hash12>.json`, where `hash12` is the
//! first 12 hex characters of SHA-256 over the task description. Storing the
//! same task again overwrites its entry.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

use crate::domain::SkillRef;
use crate::obs;

/// Entries retained per skill.
pub const MAX_ENTRIES_PER_SKILL: usize = 20;

/// Default cap for [`ExperienceLibrary::find_similar`].
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// The only outcome that is ever persisted.
pub const SUCCESS_OUTCOME: &str = "success";

const KEY_LEN: usize = 12;

/// A completed execution submitted for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trajectory {
    pub skill: SkillRef,
    pub task_description: String,
    pub approach_taken: String,
    pub outcome: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
}

impl Trajectory {
    pub fn is_success(&self) -> bool {
        self.outcome == SUCCESS_OUTCOME
    }
}

/// A stored trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub skill: SkillRef,
    pub task_description: String,
    pub approach_taken: String,
    pub outcome: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    pub stored_at: DateTime<Utc>,
}

impl ExperienceEntry {
    fn from_trajectory(t: Trajectory, stored_at: DateTime<Utc>) -> Self {
        Self {
            skill: t.skill,
            task_description: t.task_description,
            approach_taken: t.approach_taken,
            outcome: t.outcome,
            duration_ms: t.duration_ms,
            tools_used: t.tools_used,
            key_decisions: t.key_decisions,
            stored_at,
        }
    }
}

/// Errors from experience storage.
#[derive(Debug, Error)]
pub enum ExperienceError {
    #[error("failed to encode experience entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExperienceError>;

/// Deterministic storage key for a task description.
pub fn entry_key(task_description: &str) -> String {
    let digest = Sha256::digest(task_description.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    key
}

/// Filesystem-backed experience library.
#[derive(Debug, Clone)]
pub struct ExperienceLibrary {
    root: PathBuf,
}

impl ExperienceLibrary {
    /// Create a library rooted at `root`. Directories are created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn skill_dir(&self, skill: &SkillRef) -> PathBuf {
        self.root.join(skill.sanitized())
    }

    /// Store a successful trajectory, then prune the skill to
    /// [`MAX_ENTRIES_PER_SKILL`].
    ///
    /// Returns `false` without touching disk for any non-success outcome.
    pub fn store(&self, trajectory: Trajectory) -> Result<bool> {
        if !trajectory.is_success() {
            return Ok(false);
        }

        let skill = trajectory.skill.clone();
        let dir = self.skill_dir(&skill);
        fs::create_dir_all(&dir)?;

        let key = entry_key(&trajectory.task_description);
        let entry = ExperienceEntry::from_trajectory(trajectory, Utc::now());
        let json = serde_json::to_vec_pretty(&entry)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.persist(dir.join(format!("{key}.json")))
            .map_err(|e| e.error)?;

        let pruned = self.prune(&dir, &skill)?;
        if pruned > 0 {
            obs::emit_experience_pruned(skill.as_str(), pruned, MAX_ENTRIES_PER_SKILL);
        }
        obs::emit_experience_stored(skill.as_str(), &key, pruned);
        Ok(true)
    }

    /// Remove the oldest entries of `skill` until at most
    /// [`MAX_ENTRIES_PER_SKILL`] remain.
    ///
    /// Age is the entry's `stored_at`, falling back to file modification time
    /// for entries that cannot be decoded. Entries of another skill sharing
    /// the sanitized directory are left alone. Returns the number removed.
    fn prune(&self, dir: &Path, skill: &SkillRef) -> Result<usize> {
        let mut aged: Vec<(DateTime<Utc>, PathBuf)> = entry_files(dir)?
            .into_iter()
            .filter_map(|path| match read_entry(&path) {
                Ok(entry) if entry.skill != *skill => None,
                Ok(entry) => Some((entry.stored_at, path)),
                Err(_) => Some((modified_time(&path), path)),
            })
            .collect();
        if aged.len() <= MAX_ENTRIES_PER_SKILL {
            return Ok(0);
        }

        // Oldest first, then path for deterministic tie-breaking.
        aged.sort();
        let excess = aged.len() - MAX_ENTRIES_PER_SKILL;
        for (_, path) in aged.iter().take(excess) {
            fs::remove_file(path)?;
        }
        Ok(excess)
    }

    /// All entries for `skill`, ordered by storage key (not by time).
    ///
    /// Malformed files are skipped with a warning. `a_b:c` and `a:b_c`
    /// sanitize to the same directory, so entries are matched on their
    /// recorded skill.
    pub fn list_entries(&self, skill: &SkillRef) -> Result<Vec<ExperienceEntry>> {
        let dir = self.skill_dir(skill);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = entry_files(&dir)?;
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            match read_entry(&path) {
                Ok(entry) if entry.skill == *skill => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed experience entry");
                }
            }
        }
        Ok(entries)
    }

    /// Entries whose task description shares at least one word with `query`,
    /// best overlap first, at most `max_results`.
    ///
    /// Scoring is plain bag-of-words intersection over lowercase,
    /// whitespace-separated words. Ties keep storage-key order.
    pub fn find_similar(
        &self,
        skill: &SkillRef,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ExperienceEntry>> {
        let query_words = word_set(query);
        if query_words.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, ExperienceEntry)> = self
            .list_entries(skill)?
            .into_iter()
            .filter_map(|entry| {
                let overlap = word_set(&entry.task_description)
                    .intersection(&query_words)
                    .count();
                (overlap > 0).then_some((overlap, entry))
            })
            .collect();

        // Stable sort keeps list order among equal scores.
        scored.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(scored
            .into_iter()
            .take(max_results)
            .map(|(_, entry)| entry)
            .collect())
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn entry_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let path = dirent?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn read_entry(path: &Path) -> Result<ExperienceEntry> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

fn modified_time(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH), DateTime::<Utc>::from)
}

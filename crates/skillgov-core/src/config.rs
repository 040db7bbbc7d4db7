//! Configuration for skillgov paths and the rollback reviewer.
//!
//! Defaults come from the environment:
//! - `SKILLGOV_HOME`: state directory (default `.skillgov`)
//! - `SKILLGOV_HISTORY`: outcome history document (default `<home>/skill_history.json`)
//! - `SKILLGOV_ISSUE_REPO`: `owner/name` passed to the tracker as `--repo`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::review::{DEFAULT_LABEL, ISSUE_TIMEOUT};

/// Default state directory, relative to the working directory.
pub const DEFAULT_HOME: &str = ".skillgov";

const QUEUE_FILE: &str = "improvement_queue.json";
const HISTORY_FILE: &str = "skill_history.json";
const EXPERIENCE_DIR: &str = "experiences";

/// Settings for filing rollback review tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerConfig {
    /// Tracker executable, looked up on `PATH`.
    pub program: String,
    /// Target repository; the tracker's default when `None`.
    pub repo: Option<String>,
    pub labels: Vec<String>,
    pub timeout: Duration,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        ReviewerConfig {
            program: "gh".to_string(),
            repo: std::env::var("SKILLGOV_ISSUE_REPO").ok(),
            labels: vec![DEFAULT_LABEL.to_string()],
            timeout: ISSUE_TIMEOUT,
        }
    }
}

/// Where governance state lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorConfig {
    pub home: PathBuf,
    pub queue_path: PathBuf,
    pub history_path: PathBuf,
    pub experience_dir: PathBuf,
    pub reviewer: ReviewerConfig,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        let home = std::env::var_os("SKILLGOV_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME));
        let mut config = Self::new(home);
        if let Some(history) = std::env::var_os("SKILLGOV_HISTORY") {
            config.history_path = PathBuf::from(history);
        }
        config
    }
}

impl GovernorConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create a config with every path under `home`.
    pub fn new(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref().to_path_buf();
        GovernorConfig {
            queue_path: home.join(QUEUE_FILE),
            history_path: home.join(HISTORY_FILE),
            experience_dir: home.join(EXPERIENCE_DIR),
            reviewer: ReviewerConfig::default(),
            home,
        }
    }

    /// Read history from somewhere other than `<home>`.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    pub fn with_reviewer(mut self, reviewer: ReviewerConfig) -> Self {
        self.reviewer = reviewer;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_home() {
        let config = GovernorConfig::new("/tmp/gov");
        assert_eq!(config.queue_path, PathBuf::from("/tmp/gov/improvement_queue.json"));
        assert_eq!(config.history_path, PathBuf::from("/tmp/gov/skill_history.json"));
        assert_eq!(config.experience_dir, PathBuf::from("/tmp/gov/experiences"));
    }

    #[test]
    fn history_override() {
        let config = GovernorConfig::new("/tmp/gov").with_history_path("/var/log/hist.json");
        assert_eq!(config.history_path, PathBuf::from("/var/log/hist.json"));
        assert_eq!(config.queue_path, PathBuf::from("/tmp/gov/improvement_queue.json"));
    }

    #[test]
    fn reviewer_defaults() {
        let reviewer = ReviewerConfig::default();
        assert_eq!(reviewer.program, "gh");
        assert_eq!(reviewer.timeout, Duration::from_secs(30));
        assert_eq!(reviewer.labels, vec![DEFAULT_LABEL.to_string()]);
    }
}

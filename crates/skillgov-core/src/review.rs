//! Rollback review: human-facing tickets for regressed skills.
//!
//! Formatting is pure. Filing is best-effort: a missing tracker binary, a
//! non-zero exit, a crash, or a timeout all collapse into one
//! [`TrackerUnavailable`] error, which [`create_github_issue`] absorbs into
//! `None`. The queue has already persisted the decision by the time a ticket
//! is filed, so nothing here can corrupt governance state.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::config::ReviewerConfig;
use crate::domain::SkillRef;
use crate::obs;

/// Fixed timeout for the tracker subprocess.
pub const ISSUE_TIMEOUT: Duration = Duration::from_secs(30);

/// Label attached to every rollback review ticket.
pub const DEFAULT_LABEL: &str = "skill-regression";

/// Title for a rollback review ticket.
pub fn generate_issue_title(skill: &SkillRef) -> String {
    format!("Skill regression: {skill} needs rollback review")
}

/// Markdown body embedding every input verbatim so a reviewer can act
/// without consulting other state.
pub fn generate_issue_body(
    skill: &SkillRef,
    baseline_gap: f64,
    current_gap: f64,
    improvement_diff: &str,
    rollback_command: &str,
) -> String {
    let mut out = String::new();
    out.push_str("## Skill regression detected\n\n");
    out.push_str(&format!("- **Skill:** `{skill}`\n"));
    out.push_str(&format!("- **Baseline stability gap:** {baseline_gap:.3}\n"));
    out.push_str(&format!("- **Post-change stability gap:** {current_gap:.3}\n"));
    out.push_str(&format!(
        "- **Change:** {:+.3} (higher is less stable)\n\n",
        current_gap - baseline_gap
    ));

    out.push_str("## Improvement diff\n\n");
    out.push_str("```diff\n");
    out.push_str(improvement_diff);
    if !improvement_diff.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n\n");

    out.push_str("## Rollback\n\n");
    out.push_str("Review the diff above. To revert the improvement, run:\n\n");
    out.push_str("```bash\n");
    out.push_str(rollback_command);
    out.push_str("\n```\n");
    out
}

/// Revert command for the improvement commit. Never executed here.
pub fn generate_rollback_command(commit_hash: &str) -> String {
    format!("git revert --no-edit {}", commit_hash.trim())
}

/// A ticket ready to file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub skill: SkillRef,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

impl IssueDraft {
    /// Build the complete ticket for a regressed skill.
    pub fn for_regression(
        skill: &SkillRef,
        baseline_gap: f64,
        current_gap: f64,
        improvement_diff: &str,
        commit_hash: &str,
        labels: &[String],
    ) -> Self {
        let rollback_command = generate_rollback_command(commit_hash);
        Self {
            skill: skill.clone(),
            title: generate_issue_title(skill),
            body: generate_issue_body(
                skill,
                baseline_gap,
                current_gap,
                improvement_diff,
                &rollback_command,
            ),
            labels: if labels.is_empty() {
                vec![DEFAULT_LABEL.to_string()]
            } else {
                labels.to_vec()
            },
        }
    }
}

/// The tracker could not file the ticket, for whatever reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("issue tracker unavailable: {reason}")]
pub struct TrackerUnavailable {
    pub reason: String,
}

impl TrackerUnavailable {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Something that can turn a draft into a ticket URL.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, draft: &IssueDraft) -> Result<String, TrackerUnavailable>;
}

/// Files tickets through the `gh` command-line tool.
#[derive(Debug, Clone)]
pub struct GhCliTracker {
    program: String,
    repo: Option<String>,
    timeout: Duration,
}

impl GhCliTracker {
    pub fn new(config: &ReviewerConfig) -> Self {
        Self {
            program: config.program.clone(),
            repo: config.repo.clone(),
            timeout: config.timeout,
        }
    }

    fn args(&self, draft: &IssueDraft) -> Vec<String> {
        let mut args = vec![
            "issue".to_string(),
            "create".to_string(),
            "--title".to_string(),
            draft.title.clone(),
            "--body".to_string(),
            draft.body.clone(),
        ];
        for label in &draft.labels {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        if let Some(repo) = &self.repo {
            args.push("--repo".to_string());
            args.push(repo.clone());
        }
        args
    }
}

#[async_trait]
impl IssueTracker for GhCliTracker {
    async fn create_issue(&self, draft: &IssueDraft) -> Result<String, TrackerUnavailable> {
        let binary = find_on_path(&self.program)
            .ok_or_else(|| TrackerUnavailable::new(format!("{} not found on PATH", self.program)))?;

        let mut cmd = Command::new(&binary);
        cmd.args(self.args(draft))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                TrackerUnavailable::new(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| TrackerUnavailable::new(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrackerUnavailable::new(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if url.is_empty() {
            return Err(TrackerUnavailable::new(format!(
                "{} returned no issue URL",
                self.program
            )));
        }
        Ok(url)
    }
}

/// File `draft` through `tracker`, absorbing every failure into `None`.
pub async fn create_github_issue(tracker: &dyn IssueTracker, draft: &IssueDraft) -> Option<String> {
    match tracker.create_issue(draft).await {
        Ok(url) => {
            obs::emit_issue_filed(draft.skill.as_str(), &url);
            Some(url)
        }
        Err(e) => {
            obs::emit_issue_unavailable(draft.skill.as_str(), &e);
            None
        }
    }
}

/// Locate an executable on `PATH`. A program given as a path is checked
/// directly.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(OsStr::new(program)))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill() -> SkillRef {
        SkillRef::parse("x:y").unwrap()
    }

    #[test]
    fn body_embeds_all_inputs() {
        let body = generate_issue_body(
            &skill(),
            0.15,
            0.40,
            "-old line\n+new line",
            "git revert --no-edit abc123",
        );
        assert!(body.contains("x:y"));
        assert!(body.contains("0.150"));
        assert!(body.contains("0.400"));
        assert!(body.contains("-old line\n+new line"));
        assert!(body.contains("git revert --no-edit abc123"));
    }

    #[test]
    fn rollback_command_is_deterministic() {
        assert_eq!(
            generate_rollback_command("deadbeef"),
            "git revert --no-edit deadbeef"
        );
        assert_eq!(
            generate_rollback_command(" deadbeef\n"),
            generate_rollback_command("deadbeef")
        );
    }

    #[test]
    fn draft_defaults_label() {
        let draft = IssueDraft::for_regression(&skill(), 0.1, 0.2, "", "abc", &[]);
        assert_eq!(draft.labels, vec![DEFAULT_LABEL.to_string()]);
        assert!(draft.title.contains("x:y"));
        assert!(draft.body.contains("git revert --no-edit abc"));
    }

    #[test]
    fn gh_args_include_title_body_labels_and_repo() {
        let config = ReviewerConfig {
            repo: Some("org/skills".to_string()),
            ..ReviewerConfig::default()
        };
        let tracker = GhCliTracker::new(&config);
        let draft = IssueDraft::for_regression(&skill(), 0.1, 0.2, "d", "abc", &[]);
        let args = tracker.args(&draft);
        assert_eq!(&args[..2], ["issue", "create"]);
        assert!(args.windows(2).any(|w| w[0] == "--title" && w[1] == draft.title));
        assert!(args.windows(2).any(|w| w[0] == "--label" && w[1] == DEFAULT_LABEL));
        assert!(args.windows(2).any(|w| w[0] == "--repo" && w[1] == "org/skills"));
    }

    #[test]
    fn missing_program_is_not_found() {
        assert!(find_on_path("skillgov-definitely-not-installed").is_none());
    }

    #[tokio::test]
    async fn missing_tracker_binary_yields_none() {
        let config = ReviewerConfig {
            program: "skillgov-definitely-not-installed".to_string(),
            ..ReviewerConfig::default()
        };
        let tracker = GhCliTracker::new(&config);
        let draft = IssueDraft::for_regression(&skill(), 0.1, 0.2, "d", "abc", &[]);
        assert!(tracker.create_issue(&draft).await.is_err());
        assert_eq!(create_github_issue(&tracker, &draft).await, None);
    }
}

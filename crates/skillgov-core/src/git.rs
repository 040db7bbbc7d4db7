//! Git helpers for locating the improvement commit behind a regression.

use std::path::Path;
use std::process::Command;

/// Errors from invoking git.
#[derive(Debug, thiserror::Error)]
#[error("git error: {0}")]
pub struct GitError(String);

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory. Returns an error if the
/// directory is not inside a git repository or if git is not available.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String, GitError> {
    let stdout = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    let sha = stdout.trim().to_string();
    if sha.is_empty() {
        return Err(GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Patch introduced by `commit`, as printed by `git show --format= <commit>`.
pub fn commit_diff(repo_dir: &Path, commit: &str) -> Result<String, GitError> {
    run_git(repo_dir, &["show", "--format=", "--no-color", commit])
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

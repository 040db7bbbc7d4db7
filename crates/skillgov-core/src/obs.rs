//! Structured observability hooks for skill governance lifecycle events.
//!
//! This module provides:
//! - Skill-scoped tracing spans via `SkillSpan` RAII guard
//! - Emission functions for key lifecycle events: flag, evaluation start,
//!   sample, decision, experience storage, ticket filing, version bump
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the `skillgov` binary.

use tracing::{debug, info, warn};

/// RAII guard that enters a skill-scoped span for the duration of one
/// governance call.
///
/// # Example
///
/// ```ignore
/// let _span = SkillSpan::enter("plugin-dev:hook-writer");
/// // all tracing calls now carry skill = "plugin-dev:hook-writer"
/// ```
pub struct SkillSpan {
    _span: tracing::span::EnteredSpan,
}

impl SkillSpan {
    /// Create and enter a span tagged with the skill reference.
    pub fn enter(skill: &str) -> Self {
        let span = tracing::info_span!("skillgov.skill", skill = %skill);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a flag was recorded.
pub fn emit_skill_flagged(skill: &str, stability_gap: f64, flagged_count: u32, status: &str) {
    info!(
        event = "skill.flagged",
        skill = %skill,
        stability_gap = stability_gap,
        flagged_count = flagged_count,
        status = %status,
    );
}

/// Emit event: an evaluation window was opened.
pub fn emit_eval_started(skill: &str, baseline_gap: f64, prior_status: &str) {
    info!(
        event = "eval.started",
        skill = %skill,
        baseline_gap = baseline_gap,
        prior_status = %prior_status,
    );
}

/// Emit event: re-arming an evaluation discarded in-progress state (warning level).
pub fn emit_eval_rearmed(skill: &str, prior_status: &str, discarded_flags: u32) {
    warn!(
        event = "eval.rearmed",
        skill = %skill,
        prior_status = %prior_status,
        discarded_flags = discarded_flags,
        "start_evaluation called on a skill that was not flagged",
    );
}

/// Emit event: one evaluation sample recorded.
pub fn emit_eval_sample_recorded(skill: &str, stability_gap: f64, collected: usize) {
    debug!(
        event = "eval.sample_recorded",
        skill = %skill,
        stability_gap = stability_gap,
        collected = collected,
    );
}

/// Emit event: an evaluation window was decided.
pub fn emit_eval_decided(skill: &str, decision: &str, baseline_gap: f64, eval_mean: f64) {
    info!(
        event = "eval.decided",
        skill = %skill,
        decision = %decision,
        baseline_gap = baseline_gap,
        eval_mean = eval_mean,
    );
}

/// Emit event: a trajectory was stored in the experience library.
pub fn emit_experience_stored(skill: &str, key: &str, pruned: usize) {
    info!(event = "experience.stored", skill = %skill, key = %key, pruned = pruned);
}

/// Emit event: old entries were removed to keep a skill under its cap.
pub fn emit_experience_pruned(skill: &str, removed: usize, retained: usize) {
    debug!(event = "experience.pruned", skill = %skill, removed = removed, retained = retained);
}

/// Emit event: a rollback review ticket was filed.
pub fn emit_issue_filed(skill: &str, url: &str) {
    info!(event = "review.issue_filed", skill = %skill, url = %url);
}

/// Emit event: ticket filing was skipped or failed (warning level).
pub fn emit_issue_unavailable(skill: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "review.issue_unavailable", skill = %skill, reason = %reason);
}

/// Emit event: a skill definition's version was bumped.
pub fn emit_version_bumped(path: &str, version: &str) {
    info!(event = "version.bumped", path = %path, version = %version);
}

/// Emit event: the monitor hook absorbed an internal error (warning level).
pub fn emit_hook_error(skill: &str, error: &dyn std::fmt::Display) {
    warn!(event = "hook.error", skill = %skill, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_span_create() {
        // Just ensure SkillSpan::enter doesn't panic
        let _span = SkillSpan::enter("x:y");
    }
}

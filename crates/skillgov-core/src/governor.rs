//! The closed loop: assess → flag → evaluate → promote or review.
//!
//! [`Governor::observe`] is what the post-invocation hook calls once per skill
//! invocation. [`Governor::conclude`] performs the follow-through for a skill
//! whose evaluation has been decided.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::GovernorConfig;
use crate::domain::{load_history, GovernanceError, HistoryDocument, Result, SkillRef};
use crate::experience::{ExperienceLibrary, Trajectory};
use crate::git;
use crate::obs;
use crate::queue::{EvalDecision, ImprovementQueue, Status};
use crate::review::{create_github_issue, IssueDraft, IssueTracker};
use crate::stability::{assess, Severity};
use crate::versioning;

/// Placeholder diff used when neither a diff nor git history is available.
const DIFF_UNAVAILABLE: &str = "(improvement diff unavailable)";

/// One completed skill invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationEvent {
    pub skill: SkillRef,
    pub invocation_id: String,
}

impl InvocationEvent {
    /// Build an event, generating a UUID v4 when the host supplies no id.
    pub fn new(skill: SkillRef, invocation_id: Option<String>) -> Self {
        let invocation_id = invocation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            skill,
            invocation_id,
        }
    }
}

/// What the hook reports for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    pub skill: String,
    pub severity: Severity,
    pub stability_gap: f64,
    pub samples: usize,
    pub status: Status,
    pub flagged: bool,
    pub improvement_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<EvalDecision>,
    /// Rollback review ticket filed for a regression decided by this invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MonitorReport {
    /// Report for an invocation the governor could not process.
    pub fn failed(skill: &str, error: impl std::fmt::Display) -> Self {
        Self {
            skill: skill.to_string(),
            severity: Severity::Ok,
            stability_gap: 0.0,
            samples: 0,
            status: Status::default(),
            flagged: false,
            improvement_triggered: false,
            decision: None,
            issue_url: None,
            error: Some(error.to_string()),
        }
    }

    /// Single-line JSON rendering for stdout.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"skill\":{},\"error\":\"report encoding failed: {e}\"}}",
                serde_json::Value::from(self.skill.as_str())
            )
        })
    }
}

/// Inputs for following through on a decided evaluation.
#[derive(Debug, Clone, Default)]
pub struct FollowThrough {
    /// Skill definition to version-bump on promotion.
    pub skill_file: Option<PathBuf>,
    pub change_summary: Option<String>,
    /// Trajectory to keep as an experience on promotion.
    pub trajectory: Option<Trajectory>,
    /// Improvement commit; defaults to `HEAD` of `repo_dir`.
    pub commit: Option<String>,
    /// Improvement diff; defaults to the commit's patch.
    pub improvement_diff: Option<String>,
    /// Repository used for git lookups; defaults to the skill file's directory.
    pub repo_dir: Option<PathBuf>,
}

impl FollowThrough {
    fn repo_dir(&self) -> PathBuf {
        if let Some(dir) = &self.repo_dir {
            return dir.clone();
        }
        match self.skill_file.as_deref().and_then(Path::parent) {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Result of [`Governor::conclude`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Conclusion {
    Promoted {
        skill: SkillRef,
        version: Option<String>,
        experience_stored: bool,
    },
    RollbackReview {
        skill: SkillRef,
        issue_url: Option<String>,
        draft: IssueDraft,
    },
}

/// Owns the queue and experience library for one process.
#[derive(Debug)]
pub struct Governor {
    config: GovernorConfig,
    queue: ImprovementQueue,
    library: ExperienceLibrary,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        let queue = ImprovementQueue::open(&config.queue_path);
        let library = ExperienceLibrary::new(&config.experience_dir);
        Self {
            config,
            queue,
            library,
        }
    }

    pub fn queue(&self) -> &ImprovementQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut ImprovementQueue {
        &mut self.queue
    }

    pub fn library(&self) -> &ExperienceLibrary {
        &self.library
    }

    /// Outcome history from the configured path.
    pub fn load_history(&self) -> HistoryDocument {
        load_history(&self.config.history_path)
    }

    /// Process one invocation.
    ///
    /// An evaluating skill contributes a sample and is decided once the
    /// window fills. A skill under rollback review is left alone. Anything
    /// else is flagged when its severity is at least `warning`.
    pub fn observe(
        &mut self,
        event: &InvocationEvent,
        history: &HistoryDocument,
    ) -> Result<MonitorReport> {
        let skill = &event.skill;
        let _span = obs::SkillSpan::enter(skill.as_str());

        let outcomes = history.get(skill);
        let assessment = assess(skill, outcomes.as_ref());
        debug!(
            gap = assessment.gap,
            severity = %assessment.severity,
            samples = assessment.samples,
            "assessed"
        );

        let mut flagged = false;
        let mut improvement_triggered = false;
        let mut decision = None;

        match self.queue.status(skill) {
            Status::Evaluating => {
                self.queue.record_eval_execution(skill, assessment.gap)?;
                if self.queue.is_eval_complete(skill) {
                    decision = self.queue.evaluate(skill)?;
                }
            }
            Status::PendingRollbackReview => {
                debug!("skill is under rollback review; not flagging");
            }
            _ if assessment.severity.should_flag() => {
                self.queue
                    .flag_skill(skill, assessment.gap, &event.invocation_id)?;
                flagged = true;
                improvement_triggered = self.queue.needs_improvement(skill);
            }
            _ => {}
        }

        Ok(MonitorReport {
            skill: skill.to_string(),
            severity: assessment.severity,
            stability_gap: assessment.gap,
            samples: assessment.samples,
            status: self.queue.status(skill),
            flagged,
            improvement_triggered,
            decision,
            issue_url: None,
            error: None,
        })
    }

    /// Follow through on a decided evaluation.
    ///
    /// Promotion bumps the skill file's version and stores the trajectory.
    /// A regression files a rollback review ticket; filing failures are
    /// absorbed and reported as a missing URL, and leave the decision open
    /// so the ticket can be filed again. A decision is followed through at
    /// most once: a second call fails with `AlreadyConcluded`.
    pub async fn conclude(
        &mut self,
        skill: &SkillRef,
        follow: FollowThrough,
        tracker: &dyn IssueTracker,
    ) -> Result<Conclusion> {
        let _span = obs::SkillSpan::enter(skill.as_str());
        let entry = self.queue.entry(skill).cloned().unwrap_or_default();
        if let Some(at) = entry.concluded_at {
            return Err(GovernanceError::AlreadyConcluded {
                skill: skill.to_string(),
                at,
            });
        }

        match entry.status {
            Status::Promoted => {
                let mut metrics = BTreeMap::new();
                if let Some(gap) = entry.baseline_gap {
                    metrics.insert("baseline_gap".to_string(), gap);
                }
                if let Some(gap) = entry.eval_mean {
                    metrics.insert("eval_mean".to_string(), gap);
                }

                let version = match &follow.skill_file {
                    Some(path) => {
                        let summary = follow.change_summary.clone().unwrap_or_else(|| {
                            promotion_summary(entry.baseline_gap, entry.eval_mean)
                        });
                        Some(versioning::bump_version(path, &summary, &metrics)?)
                    }
                    None => None,
                };

                let experience_stored = match follow.trajectory {
                    Some(mut trajectory) => {
                        trajectory.skill = skill.clone();
                        self.library.store(trajectory)?
                    }
                    None => false,
                };
                self.queue.mark_concluded(skill)?;

                Ok(Conclusion::Promoted {
                    skill: skill.clone(),
                    version,
                    experience_stored,
                })
            }
            Status::PendingRollbackReview => {
                let (Some(baseline_gap), Some(current_gap)) = (entry.baseline_gap, entry.eval_mean)
                else {
                    return Err(no_decision(skill, entry.status));
                };

                let repo_dir = follow.repo_dir();
                let commit = match follow.commit.clone() {
                    Some(commit) => commit,
                    None => git::capture_head_sha(&repo_dir).unwrap_or_else(|e| {
                        warn!(error = %e, "could not resolve improvement commit, using HEAD");
                        "HEAD".to_string()
                    }),
                };
                let diff = match follow.improvement_diff.clone() {
                    Some(diff) => diff,
                    None => git::commit_diff(&repo_dir, &commit).unwrap_or_else(|e| {
                        warn!(error = %e, "could not read improvement diff");
                        DIFF_UNAVAILABLE.to_string()
                    }),
                };

                let draft = IssueDraft::for_regression(
                    skill,
                    baseline_gap,
                    current_gap,
                    &diff,
                    &commit,
                    &self.config.reviewer.labels,
                );
                let issue_url = create_github_issue(tracker, &draft).await;
                if issue_url.is_some() {
                    self.queue.mark_concluded(skill)?;
                }

                Ok(Conclusion::RollbackReview {
                    skill: skill.clone(),
                    issue_url,
                    draft,
                })
            }
            status => Err(no_decision(skill, status)),
        }
    }
}

fn no_decision(skill: &SkillRef, status: Status) -> GovernanceError {
    GovernanceError::NoDecision {
        skill: skill.to_string(),
        status: status.to_string(),
    }
}

fn promotion_summary(baseline_gap: Option<f64>, eval_mean: Option<f64>) -> String {
    match (baseline_gap, eval_mean) {
        (Some(baseline), Some(mean)) => format!(
            "Promoted after evaluation: mean gap {mean:.3} within baseline {baseline:.3}"
        ),
        _ => "Promoted after evaluation".to_string(),
    }
}

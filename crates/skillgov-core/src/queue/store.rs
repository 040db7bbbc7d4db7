use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{EvalDecision, QueueDocument, QueueEntry, QueueError, Result, Status};
use crate::domain::SkillRef;
use crate::obs;

/// File-backed improvement queue with write-through persistence.
///
/// Every mutation is applied to a copy of the document, written atomically
/// (temp file in the same directory, then rename) and only then swapped into
/// memory, so a failed write leaves both memory and disk at the prior state.
///
/// Writers are assumed to be serialized externally. The document carries a
/// `revision` counter; a save that finds a different revision on disk than
/// the one last loaded fails with [`QueueError::StaleRevision`] instead of
/// silently overwriting another writer's update.
#[derive(Debug)]
pub struct ImprovementQueue {
    path: PathBuf,
    doc: QueueDocument,
}

/// Only the revision is needed to detect a concurrent writer.
#[derive(Deserialize)]
struct RevisionHeader {
    #[serde(default)]
    revision: u64,
}

impl ImprovementQueue {
    /// Open the queue at `path`.
    ///
    /// A missing or malformed document is an empty queue, never an error:
    /// losing flag history only delays remediation.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<QueueDocument>(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed queue document; starting empty");
                // Adopt the on-disk revision so the next save replaces the document.
                QueueDocument {
                    revision: read_revision(&raw).unwrap_or(0),
                    ..QueueDocument::default()
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no queue document; starting empty");
                QueueDocument::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable queue document; starting empty");
                QueueDocument::default()
            }
        };
        Self { path, doc }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Revision of the in-memory document (equal to the on-disk one after
    /// every successful mutation).
    pub fn revision(&self) -> u64 {
        self.doc.revision
    }

    pub fn entry(&self, skill: &SkillRef) -> Option<&QueueEntry> {
        self.doc.skills.get(skill)
    }

    /// Current status; `healthy` for skills never flagged.
    pub fn status(&self, skill: &SkillRef) -> Status {
        self.entry(skill).map(|e| e.status).unwrap_or_default()
    }

    /// All tracked skills in key order.
    pub fn skills(&self) -> impl Iterator<Item = (&SkillRef, &QueueEntry)> {
        self.doc.skills.iter()
    }

    /// Record one instability flag for `skill`.
    ///
    /// Skills under evaluation or rollback review keep their status; the
    /// flag is still recorded for audit.
    pub fn flag_skill(
        &mut self,
        skill: &SkillRef,
        stability_gap: f64,
        invocation_id: &str,
    ) -> Result<()> {
        check_gap(stability_gap)?;
        let (count, status) = self.mutate(|doc| {
            let entry = doc.skills.entry(skill.clone()).or_default();
            entry.record_flag(stability_gap, invocation_id, Utc::now());
            (entry.flagged_count, entry.status)
        })?;
        obs::emit_skill_flagged(skill.as_str(), stability_gap, count, status.as_str());
        Ok(())
    }

    pub fn needs_improvement(&self, skill: &SkillRef) -> bool {
        self.entry(skill).is_some_and(QueueEntry::needs_improvement)
    }

    pub fn get_improvable_skills(&self) -> Vec<SkillRef> {
        self.doc
            .skills
            .iter()
            .filter(|(_, e)| e.needs_improvement())
            .map(|(skill, _)| skill.clone())
            .collect()
    }

    /// Open an evaluation window against `baseline_gap`.
    ///
    /// Called by the improvement applier after its change is in place.
    /// Permitted from any state; re-arming a skill that is not `flagged`
    /// discards in-progress flags or samples and is logged as a warning.
    pub fn start_evaluation(&mut self, skill: &SkillRef, baseline_gap: f64) -> Result<()> {
        check_gap(baseline_gap)?;
        let discarded = self.entry(skill).map_or(0, |e| e.flagged_count);
        let prior = self.mutate(|doc| {
            doc.skills
                .entry(skill.clone())
                .or_default()
                .begin_evaluation(baseline_gap)
        })?;
        if prior != Status::Flagged {
            obs::emit_eval_rearmed(skill.as_str(), prior.as_str(), discarded);
        }
        obs::emit_eval_started(skill.as_str(), baseline_gap, prior.as_str());
        Ok(())
    }

    /// Record one post-change stability gap.
    ///
    /// Returns `false` without writing when the skill is not evaluating.
    pub fn record_eval_execution(&mut self, skill: &SkillRef, stability_gap: f64) -> Result<bool> {
        check_gap(stability_gap)?;
        if self.status(skill) != Status::Evaluating {
            debug!(skill = %skill, "not evaluating; eval sample ignored");
            return Ok(false);
        }
        let collected = self.mutate(|doc| {
            let entry = doc.skills.entry(skill.clone()).or_default();
            entry.push_eval_sample(stability_gap);
            entry.eval_samples.len()
        })?;
        obs::emit_eval_sample_recorded(skill.as_str(), stability_gap, collected);
        Ok(true)
    }

    pub fn is_eval_complete(&self, skill: &SkillRef) -> bool {
        self.entry(skill).is_some_and(QueueEntry::is_eval_complete)
    }

    /// Decide a complete evaluation window.
    ///
    /// Returns `Ok(None)` without writing unless the skill is evaluating and
    /// its window is complete.
    pub fn evaluate(&mut self, skill: &SkillRef) -> Result<Option<EvalDecision>> {
        let ready = self
            .entry(skill)
            .is_some_and(|e| e.status == Status::Evaluating && e.is_eval_complete());
        if !ready {
            debug!(skill = %skill, "evaluation window not complete; no decision");
            return Ok(None);
        }
        let decided = self.mutate(|doc| doc.skills.get_mut(skill).and_then(QueueEntry::decide))?;
        if let Some(d) = &decided {
            obs::emit_eval_decided(
                skill.as_str(),
                d.decision.as_str(),
                d.baseline_gap,
                d.eval_mean,
            );
        }
        Ok(decided)
    }

    /// Record that the current decision has been followed through.
    pub fn mark_concluded(&mut self, skill: &SkillRef) -> Result<()> {
        if self.entry(skill).is_none() {
            return Ok(());
        }
        self.mutate(|doc| {
            if let Some(entry) = doc.skills.get_mut(skill) {
                entry.concluded_at = Some(Utc::now());
            }
        })
    }

    fn mutate<T>(&mut self, f: impl FnOnce(&mut QueueDocument) -> T) -> Result<T> {
        let mut next = self.doc.clone();
        let out = f(&mut next);
        self.persist(&mut next)?;
        self.doc = next;
        Ok(out)
    }

    fn persist(&self, next: &mut QueueDocument) -> Result<()> {
        if let Some(found) = self.disk_revision() {
            if found != self.doc.revision {
                return Err(QueueError::StaleRevision {
                    expected: self.doc.revision,
                    found,
                });
            }
        }
        next.revision = self.doc.revision + 1;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec_pretty(next)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Revision currently on disk; `None` when the file is missing or
    /// unreadable (a corrupt file is overwritten, matching `open`).
    fn disk_revision(&self) -> Option<u64> {
        let raw = fs::read_to_string(&self.path).ok()?;
        read_revision(&raw)
    }
}

fn read_revision(raw: &str) -> Option<u64> {
    serde_json::from_str::<RevisionHeader>(raw)
        .ok()
        .map(|p| p.revision)
}

/// JSON has no encoding for NaN or infinities; serde_json writes them as
/// `null`, which would make the whole document unreadable.
fn check_gap(gap: f64) -> Result<()> {
    if gap.is_finite() {
        Ok(())
    } else {
        Err(QueueError::NonFiniteGap(gap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EVAL_WINDOW_SIZE;

    fn make_queue() -> (tempfile::TempDir, ImprovementQueue) {
        let dir = tempfile::tempdir().unwrap();
        let queue = ImprovementQueue::open(dir.path().join("queue.json"));
        (dir, queue)
    }

    fn skill() -> SkillRef {
        SkillRef::parse("x:y").unwrap()
    }

    #[test]
    fn every_mutation_is_written_through() {
        let (dir, mut queue) = make_queue();
        queue.flag_skill(&skill(), 0.35, "inv-1").unwrap();

        let reopened = ImprovementQueue::open(dir.path().join("queue.json"));
        assert_eq!(reopened.revision(), 1);
        assert_eq!(reopened.entry(&skill()), queue.entry(&skill()));
    }

    #[test]
    fn unflagged_skill_is_healthy() {
        let (_dir, queue) = make_queue();
        assert_eq!(queue.status(&skill()), Status::Healthy);
        assert!(!queue.needs_improvement(&skill()));
        assert!(!queue.is_eval_complete(&skill()));
    }

    #[test]
    fn malformed_document_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, "{ this is not json").unwrap();

        let mut queue = ImprovementQueue::open(&path);
        assert_eq!(queue.skills().count(), 0);
        queue.flag_skill(&skill(), 0.4, "inv-1").unwrap();
        assert_eq!(ImprovementQueue::open(&path).revision(), 1);
    }

    #[test]
    fn document_with_bad_entries_is_replaced_on_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, r#"{"revision":3,"skills":{"a:b":{"status":"retired"}}}"#).unwrap();

        let mut queue = ImprovementQueue::open(&path);
        assert_eq!(queue.skills().count(), 0);
        for i in 0..3 {
            queue.flag_skill(&skill(), 0.4, &format!("inv-{i}")).unwrap();
        }

        let reopened = ImprovementQueue::open(&path);
        assert_eq!(reopened.revision(), 6);
        assert!(reopened.needs_improvement(&skill()));
    }

    #[test]
    fn non_finite_gaps_are_rejected_without_write() {
        let (dir, mut queue) = make_queue();
        let other = SkillRef::parse("keep:me").unwrap();
        queue.flag_skill(&other, 0.4, "inv-1").unwrap();
        queue.start_evaluation(&skill(), 0.2).unwrap();
        let rev = queue.revision();

        for gap in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                queue.record_eval_execution(&skill(), gap),
                Err(QueueError::NonFiniteGap(_))
            ));
            assert!(queue.flag_skill(&other, gap, "inv-x").is_err());
            assert!(queue.start_evaluation(&other, gap).is_err());
        }
        assert_eq!(queue.revision(), rev);

        let reopened = ImprovementQueue::open(dir.path().join("queue.json"));
        assert_eq!(reopened.status(&other), Status::Flagged);
        assert!(reopened.entry(&skill()).unwrap().eval_samples.is_empty());
    }

    #[test]
    fn mark_concluded_persists() {
        let (dir, mut queue) = make_queue();
        queue.mark_concluded(&skill()).unwrap();
        assert_eq!(queue.revision(), 0);

        queue.flag_skill(&skill(), 0.4, "inv-1").unwrap();
        queue.mark_concluded(&skill()).unwrap();
        let reopened = ImprovementQueue::open(dir.path().join("queue.json"));
        assert!(reopened.entry(&skill()).unwrap().concluded_at.is_some());
    }

    #[test]
    fn record_outside_evaluation_does_not_write() {
        let (_dir, mut queue) = make_queue();
        queue.flag_skill(&skill(), 0.4, "inv-1").unwrap();
        let rev = queue.revision();
        assert!(!queue.record_eval_execution(&skill(), 0.2).unwrap());
        assert_eq!(queue.revision(), rev);
    }

    #[test]
    fn evaluate_before_complete_is_noop() {
        let (_dir, mut queue) = make_queue();
        queue.start_evaluation(&skill(), 0.1).unwrap();
        queue.record_eval_execution(&skill(), 0.5).unwrap();
        let rev = queue.revision();
        assert_eq!(queue.evaluate(&skill()).unwrap(), None);
        assert_eq!(queue.revision(), rev);
        assert_eq!(queue.status(&skill()), Status::Evaluating);
    }

    #[test]
    fn concurrent_writer_is_detected() {
        let (dir, mut first) = make_queue();
        first.flag_skill(&skill(), 0.4, "inv-1").unwrap();

        let mut second = ImprovementQueue::open(dir.path().join("queue.json"));
        second.flag_skill(&skill(), 0.4, "inv-2").unwrap();

        match first.flag_skill(&skill(), 0.4, "inv-3") {
            Err(QueueError::StaleRevision { expected, found }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected StaleRevision, got {other:?}"),
        }
        // The failed call left memory untouched.
        assert_eq!(first.entry(&skill()).unwrap().flagged_count, 1);
    }

    #[test]
    fn full_window_decides_and_persists() {
        let (dir, mut queue) = make_queue();
        queue.start_evaluation(&skill(), 0.2).unwrap();
        for _ in 0..EVAL_WINDOW_SIZE {
            queue.record_eval_execution(&skill(), 0.1).unwrap();
        }
        assert!(queue.is_eval_complete(&skill()));
        let d = queue.evaluate(&skill()).unwrap().unwrap();
        assert_eq!(d.samples, EVAL_WINDOW_SIZE);

        let reopened = ImprovementQueue::open(dir.path().join("queue.json"));
        assert_eq!(reopened.status(&skill()), Status::Promoted);
        assert!(reopened.entry(&skill()).unwrap().eval_samples.is_empty());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("queue.json");
        let mut queue = ImprovementQueue::open(&path);
        queue.flag_skill(&skill(), 0.4, "inv-1").unwrap();
        assert!(path.exists());
    }
}

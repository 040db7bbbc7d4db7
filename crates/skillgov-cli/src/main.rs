//! skillgov - closed-loop governance for agent skills
//!
//! ## Commands
//!
//! - `hook`: post-invocation monitor; prints one JSON line and always exits 0
//! - `status` / `improvable`: inspect the improvement queue
//! - `start-eval` / `record-eval` / `evaluate`: drive an evaluation window
//! - `conclude`: promote (version bump, experience) or file a rollback review
//! - `experience`: store, list, and search successful trajectories
//! - `review`: render or file a rollback review ticket
//! - `bump-version`: minor-bump a skill definition's frontmatter version

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Level;

use skillgov_core::experience::DEFAULT_MAX_RESULTS;
use skillgov_core::{
    bump_version, create_github_issue, obs, Conclusion, Decision, ExperienceLibrary,
    FollowThrough, GhCliTracker, Governor, GovernorConfig, ImprovementQueue, InvocationEvent,
    IssueDraft, MonitorReport, SkillRef, Trajectory, EVAL_WINDOW_SIZE,
};

#[derive(Parser)]
#[command(name = "skillgov")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Closed-loop skill governance", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// State directory holding the queue and experience library
    #[arg(long, global = true, env = "SKILLGOV_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post-invocation monitor hook
    Hook {
        /// Skill reference (namespace:name)
        #[arg(long)]
        skill: String,

        /// Invocation identifier (a UUID is generated if omitted)
        #[arg(long)]
        invocation_id: Option<String>,

        /// Outcome history document (default: <home>/skill_history.json)
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Show queue state for one skill or all skills
    Status {
        #[arg(long)]
        skill: Option<String>,
    },

    /// List skills that need improvement
    Improvable,

    /// Open an evaluation window after an improvement is applied
    StartEval {
        #[arg(long)]
        skill: String,

        /// Stability gap before the improvement
        #[arg(long)]
        baseline: f64,
    },

    /// Record one post-improvement stability gap
    RecordEval {
        #[arg(long)]
        skill: String,

        #[arg(long)]
        gap: f64,
    },

    /// Decide a complete evaluation window
    Evaluate {
        #[arg(long)]
        skill: String,
    },

    /// Follow through on a decided evaluation
    Conclude {
        #[arg(long)]
        skill: String,

        /// Skill definition to version-bump on promotion
        #[arg(long)]
        skill_file: Option<PathBuf>,

        /// Change summary recorded in the version history
        #[arg(short, long)]
        message: Option<String>,

        /// Trajectory JSON to store as an experience on promotion
        #[arg(long)]
        trajectory: Option<PathBuf>,

        /// Improvement commit (default: HEAD of the skill's repository)
        #[arg(long)]
        commit: Option<String>,

        /// File holding the improvement diff (default: the commit's patch)
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// Repository for git lookups (default: the skill file's directory)
        #[arg(long)]
        repo: Option<PathBuf>,
    },

    /// Experience library operations
    Experience {
        #[command(subcommand)]
        action: ExperienceAction,
    },

    /// Render a rollback review ticket, optionally filing it
    Review {
        #[arg(long)]
        skill: String,

        #[arg(long)]
        baseline: f64,

        #[arg(long)]
        current: f64,

        /// Improvement commit to revert
        #[arg(long)]
        commit: String,

        /// File holding the improvement diff
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// File the ticket with the issue tracker
        #[arg(long)]
        file: bool,
    },

    /// Minor-bump the version in a skill definition
    BumpVersion {
        /// Skill definition (markdown with YAML frontmatter)
        #[arg(long)]
        file: PathBuf,

        /// Change summary
        #[arg(short, long)]
        message: String,

        /// Baseline metric as key=value (repeatable)
        #[arg(long = "metric", value_parser = parse_metric)]
        metrics: Vec<(String, f64)>,
    },
}

#[derive(Subcommand)]
enum ExperienceAction {
    /// Store a trajectory read from a JSON file
    Store {
        #[arg(long)]
        file: PathBuf,
    },

    /// List stored experiences for a skill
    List {
        #[arg(long)]
        skill: String,
    },

    /// Find experiences similar to a task description
    Search {
        #[arg(long)]
        skill: String,

        /// Task description to match
        query: String,

        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS)]
        max: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if invoked_as_hook() && e.use_stderr() => {
            // The host must never be blocked by the hook.
            let report = MonitorReport::failed("", format!("invalid hook arguments: {:?}", e.kind()));
            println!("{}", report.to_json_line());
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    skillgov_core::telemetry::init_tracing(cli.json, level);

    let config = governor_config(cli.home);

    match cli.command {
        Commands::Hook {
            skill,
            invocation_id,
            history,
        } => {
            cmd_hook(config, &skill, invocation_id, history.as_deref()).await;
            Ok(())
        }
        Commands::Status { skill } => cmd_status(&config, skill.as_deref()),
        Commands::Improvable => cmd_improvable(&config),
        Commands::StartEval { skill, baseline } => cmd_start_eval(&config, &skill, baseline),
        Commands::RecordEval { skill, gap } => cmd_record_eval(&config, &skill, gap),
        Commands::Evaluate { skill } => cmd_evaluate(&config, &skill),
        Commands::Conclude {
            skill,
            skill_file,
            message,
            trajectory,
            commit,
            diff_file,
            repo,
        } => {
            let follow = FollowThrough {
                skill_file,
                change_summary: message,
                trajectory: trajectory.as_deref().map(read_trajectory).transpose()?,
                commit,
                improvement_diff: diff_file.as_deref().map(read_diff).transpose()?,
                repo_dir: repo,
            };
            cmd_conclude(config, &skill, follow).await
        }
        Commands::Experience { action } => match action {
            ExperienceAction::Store { file } => cmd_experience_store(&config, &file),
            ExperienceAction::List { skill } => cmd_experience_list(&config, &skill),
            ExperienceAction::Search { skill, query, max } => {
                cmd_experience_search(&config, &skill, &query, max)
            }
        },
        Commands::Review {
            skill,
            baseline,
            current,
            commit,
            diff_file,
            file,
        } => {
            let diff = diff_file.as_deref().map(read_diff).transpose()?;
            cmd_review(
                &config,
                &skill,
                baseline,
                current,
                &commit,
                diff.as_deref().unwrap_or_default(),
                file,
            )
            .await
        }
        Commands::BumpVersion {
            file,
            message,
            metrics,
        } => cmd_bump_version(&file, &message, metrics.into_iter().collect()),
    }
}

fn invoked_as_hook() -> bool {
    std::env::args().skip(1).any(|arg| arg == "hook")
}

/// Paths from the environment, re-rooted under `--home` when given.
fn governor_config(home: Option<PathBuf>) -> GovernorConfig {
    let Some(home) = home else {
        return GovernorConfig::from_env();
    };
    let config = GovernorConfig::new(home);
    match std::env::var_os("SKILLGOV_HISTORY") {
        Some(history) => config.with_history_path(history),
        None => config,
    }
}

fn parse_skill(raw: &str) -> Result<SkillRef> {
    SkillRef::parse(raw).with_context(|| format!("Invalid skill reference: {raw}"))
}

fn parse_metric(raw: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("metric name missing in {raw:?}"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {key}: {e}"))?;
    Ok((key.to_string(), value))
}

fn read_trajectory(path: &Path) -> Result<Trajectory> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trajectory {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid trajectory JSON in {}", path.display()))
}

fn read_diff(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read diff {}", path.display()))
}

/// Monitor one invocation and print the report. Never fails.
async fn cmd_hook(
    config: GovernorConfig,
    skill: &str,
    invocation_id: Option<String>,
    history: Option<&Path>,
) {
    let report = hook_report(config, skill, invocation_id, history).await;
    println!("{}", report.to_json_line());
}

/// Observe the invocation; when it decides a regression, file the rollback
/// review ticket straight away.
async fn hook_report(
    config: GovernorConfig,
    skill: &str,
    invocation_id: Option<String>,
    history: Option<&Path>,
) -> MonitorReport {
    let skill_ref = match SkillRef::parse(skill) {
        Ok(s) => s,
        Err(e) => {
            obs::emit_hook_error(skill, &e);
            return MonitorReport::failed(skill, e);
        }
    };
    let config = match history {
        Some(path) => config.with_history_path(path),
        None => config,
    };

    let tracker = GhCliTracker::new(&config.reviewer);
    let mut governor = Governor::new(config);
    let history = governor.load_history();
    let event = InvocationEvent::new(skill_ref, invocation_id);
    let mut report = match governor.observe(&event, &history) {
        Ok(report) => report,
        Err(e) => {
            obs::emit_hook_error(skill, &e);
            return MonitorReport::failed(skill, e);
        }
    };

    let regressed = report
        .decision
        .is_some_and(|d| d.decision == Decision::PendingRollbackReview);
    if regressed {
        match governor
            .conclude(&event.skill, FollowThrough::default(), &tracker)
            .await
        {
            Ok(Conclusion::RollbackReview { issue_url, .. }) => report.issue_url = issue_url,
            Ok(Conclusion::Promoted { .. }) => {}
            Err(e) => {
                obs::emit_hook_error(skill, &e);
                report.error = Some(e.to_string());
            }
        }
    }
    report
}

/// Show queue state
fn cmd_status(config: &GovernorConfig, skill: Option<&str>) -> Result<()> {
    let queue = ImprovementQueue::open(&config.queue_path);

    if let Some(raw) = skill {
        let skill = parse_skill(raw)?;
        match queue.entry(&skill) {
            Some(entry) => println!("{}", serde_json::to_string_pretty(entry)?),
            None => println!("{skill}: healthy (not tracked)"),
        }
        return Ok(());
    }

    let mut tracked = queue.skills().peekable();
    if tracked.peek().is_none() {
        println!("No skills tracked in {}", config.queue_path.display());
        return Ok(());
    }

    println!("Queue: {} (revision {})", config.queue_path.display(), queue.revision());
    println!();
    for (skill, entry) in tracked {
        println!(
            "  {:<40} {:<24} flags={:<3} samples={}/{}",
            skill.as_str(),
            entry.status.as_str(),
            entry.flagged_count,
            entry.eval_samples.len(),
            EVAL_WINDOW_SIZE
        );
    }
    Ok(())
}

fn cmd_improvable(config: &GovernorConfig) -> Result<()> {
    let queue = ImprovementQueue::open(&config.queue_path);
    let skills = queue.get_improvable_skills();
    if skills.is_empty() {
        println!("No skills need improvement");
    }
    for skill in skills {
        println!("{skill}");
    }
    Ok(())
}

fn cmd_start_eval(config: &GovernorConfig, skill: &str, baseline: f64) -> Result<()> {
    let skill = parse_skill(skill)?;
    if !baseline.is_finite() || baseline < 0.0 {
        bail!("Baseline gap must be a non-negative number, got {baseline}");
    }
    let mut queue = ImprovementQueue::open(&config.queue_path);
    queue
        .start_evaluation(&skill, baseline)
        .context("Failed to start evaluation")?;
    println!("Evaluation started for {skill} (baseline gap {baseline:.3})");
    Ok(())
}

fn cmd_record_eval(config: &GovernorConfig, skill: &str, gap: f64) -> Result<()> {
    let skill = parse_skill(skill)?;
    if !gap.is_finite() || gap < 0.0 {
        bail!("Stability gap must be a non-negative number, got {gap}");
    }
    let mut queue = ImprovementQueue::open(&config.queue_path);
    if queue
        .record_eval_execution(&skill, gap)
        .context("Failed to record evaluation sample")?
    {
        let collected = queue.entry(&skill).map_or(0, |e| e.eval_samples.len());
        println!("Recorded sample {collected}/{EVAL_WINDOW_SIZE} for {skill}");
    } else {
        println!("{skill} is not under evaluation; sample ignored");
    }
    Ok(())
}

fn cmd_evaluate(config: &GovernorConfig, skill: &str) -> Result<()> {
    let skill = parse_skill(skill)?;
    let mut queue = ImprovementQueue::open(&config.queue_path);
    match queue.evaluate(&skill).context("Failed to evaluate")? {
        Some(decision) => println!("{}", serde_json::to_string_pretty(&decision)?),
        None => {
            let collected = queue.entry(&skill).map_or(0, |e| e.eval_samples.len());
            println!(
                "No decision for {skill}: status {}, {collected}/{EVAL_WINDOW_SIZE} samples",
                queue.status(&skill)
            );
        }
    }
    Ok(())
}

async fn cmd_conclude(config: GovernorConfig, skill: &str, follow: FollowThrough) -> Result<()> {
    let skill = parse_skill(skill)?;
    let tracker = GhCliTracker::new(&config.reviewer);
    let mut governor = Governor::new(config);
    let conclusion = governor
        .conclude(&skill, follow, &tracker)
        .await
        .with_context(|| format!("Failed to conclude evaluation for {skill}"))?;
    println!("{}", serde_json::to_string_pretty(&conclusion)?);
    Ok(())
}

fn cmd_experience_store(config: &GovernorConfig, file: &Path) -> Result<()> {
    let trajectory = read_trajectory(file)?;
    let skill = trajectory.skill.clone();
    let library = ExperienceLibrary::new(&config.experience_dir);
    if library
        .store(trajectory)
        .context("Failed to store experience")?
    {
        println!("Stored experience for {skill}");
    } else {
        println!("Skipped: only successful trajectories are stored");
    }
    Ok(())
}

fn cmd_experience_list(config: &GovernorConfig, skill: &str) -> Result<()> {
    let skill = parse_skill(skill)?;
    let library = ExperienceLibrary::new(&config.experience_dir);
    let entries = library.list_entries(&skill)?;
    if entries.is_empty() {
        println!(
            "No experiences stored for {skill} in {}",
            config.experience_dir.display()
        );
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {}",
            entry.stored_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.task_description
        );
        println!("    {}", entry.approach_taken);
    }
    Ok(())
}

fn cmd_experience_search(
    config: &GovernorConfig,
    skill: &str,
    query: &str,
    max: usize,
) -> Result<()> {
    let skill = parse_skill(skill)?;
    let library = ExperienceLibrary::new(&config.experience_dir);
    let hits = library.find_similar(&skill, query, max)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

async fn cmd_review(
    config: &GovernorConfig,
    skill: &str,
    baseline: f64,
    current: f64,
    commit: &str,
    diff: &str,
    file: bool,
) -> Result<()> {
    let skill = parse_skill(skill)?;
    let draft = IssueDraft::for_regression(
        &skill,
        baseline,
        current,
        diff,
        commit,
        &config.reviewer.labels,
    );

    if file {
        let tracker = GhCliTracker::new(&config.reviewer);
        if let Some(url) = create_github_issue(&tracker, &draft).await {
            println!("{url}");
            return Ok(());
        }
        eprintln!("Issue tracker unavailable; ticket follows");
    }

    println!("{}", draft.title);
    println!();
    print!("{}", draft.body);
    Ok(())
}

fn cmd_bump_version(file: &Path, message: &str, metrics: BTreeMap<String, f64>) -> Result<()> {
    let version = bump_version(file, message, &metrics)
        .with_context(|| format!("Failed to bump version of {}", file.display()))?;
    println!("{} -> {version}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use skillgov_core::{ReviewerConfig, Severity, Status};

    fn write_history(dir: &Path, skill: &str, accuracies: Vec<f64>) -> PathBuf {
        let doc = json!({ skill: { "accuracies": accuracies, "durations": [] } });
        let path = dir.join("history.json");
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(
            parse_metric("baseline_gap=0.15").unwrap(),
            ("baseline_gap".to_string(), 0.15)
        );
        assert!(parse_metric("baseline_gap").is_err());
        assert!(parse_metric("=0.1").is_err());
        assert!(parse_metric("gap=high").is_err());
    }

    #[test]
    fn test_hook_args_parse() {
        let cli = Cli::try_parse_from([
            "skillgov",
            "hook",
            "--skill",
            "plugin-dev:hook-writer",
            "--invocation-id",
            "inv-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Hook {
                skill,
                invocation_id,
                history,
            } => {
                assert_eq!(skill, "plugin-dev:hook-writer");
                assert_eq!(invocation_id.as_deref(), Some("inv-1"));
                assert!(history.is_none());
            }
            _ => panic!("expected hook command"),
        }
    }

    #[tokio::test]
    async fn test_hook_invalid_skill_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            hook_report(GovernorConfig::new(dir.path()), "no-namespace", None, None).await;
        assert!(report.error.is_some());
        assert!(!report.flagged);
        assert!(!dir.path().join("improvement_queue.json").exists());
    }

    #[tokio::test]
    async fn test_hook_flags_unstable_skill() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(dir.path(), "a:b", vec![1.0, 0.2, 0.6]);

        let mut report = None;
        for i in 0..3 {
            report = Some(hook_report(
                GovernorConfig::new(dir.path()),
                "a:b",
                Some(format!("inv-{i}")),
                Some(&history),
            )
            .await);
        }
        let report = report.unwrap();
        assert_eq!(report.error, None);
        assert_eq!(report.severity, Severity::Warning);
        assert!(report.flagged);
        assert!(report.improvement_triggered);
        assert_eq!(report.status, Status::Flagged);
    }

    #[tokio::test]
    async fn test_hook_missing_history_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let report = hook_report(
            GovernorConfig::new(dir.path()),
            "a:b",
            None,
            Some(&dir.path().join("missing.json")),
        )
        .await;
        assert_eq!(report.error, None);
        assert_eq!(report.severity, Severity::Ok);
        assert!(!report.flagged);
    }

    #[tokio::test]
    async fn test_hook_reports_queue_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let history = write_history(dir.path(), "a:b", vec![1.0, 0.0]);
        let queue = dir.path().join("improvement_queue.json");
        std::fs::create_dir_all(queue.join("blocker")).unwrap();

        // The queue path is a directory: the write fails but the hook still reports.
        let report =
            hook_report(GovernorConfig::new(dir.path()), "a:b", None, Some(&history)).await;
        assert!(report.error.is_some());
    }

    /// Start an evaluation against a tight baseline, then run the hook until
    /// the window decides a regression.
    async fn run_regressing_window(config: &GovernorConfig) -> MonitorReport {
        // mean 0.6, min 0.2: gap 0.4 against a 0.05 baseline
        let history = write_history(&config.home, "a:b", vec![1.0, 0.2, 0.6]);
        cmd_start_eval(config, "a:b", 0.05).unwrap();

        let mut last = None;
        for i in 0..EVAL_WINDOW_SIZE {
            last = Some(
                hook_report(config.clone(), "a:b", Some(format!("eval-{i}")), Some(&history))
                    .await,
            );
        }
        last.unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_files_rollback_review_on_regression() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-gh");
        std::fs::write(&script, "#!/bin/sh\necho 'https://github.com/org/skills/issues/5'\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = GovernorConfig::new(dir.path()).with_reviewer(ReviewerConfig {
            program: script.display().to_string(),
            ..ReviewerConfig::default()
        });

        let report = run_regressing_window(&config).await;
        assert_eq!(report.error, None);
        assert_eq!(report.status, Status::PendingRollbackReview);
        assert_eq!(
            report.decision.map(|d| d.decision),
            Some(Decision::PendingRollbackReview)
        );
        assert_eq!(
            report.issue_url.as_deref(),
            Some("https://github.com/org/skills/issues/5")
        );
        assert!(!report.to_json_line().contains('\n'));

        let queue = ImprovementQueue::open(&config.queue_path);
        let entry = queue.entry(&SkillRef::parse("a:b").unwrap()).unwrap();
        assert!(entry.concluded_at.is_some());
    }

    #[tokio::test]
    async fn test_hook_absorbs_unavailable_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernorConfig::new(dir.path()).with_reviewer(ReviewerConfig {
            program: "/nonexistent/bin/gh".to_string(),
            ..ReviewerConfig::default()
        });

        let report = run_regressing_window(&config).await;
        assert_eq!(report.error, None);
        assert_eq!(report.issue_url, None);
        assert_eq!(report.status, Status::PendingRollbackReview);

        // The ticket can still be filed later.
        let queue = ImprovementQueue::open(&config.queue_path);
        let entry = queue.entry(&SkillRef::parse("a:b").unwrap()).unwrap();
        assert_eq!(entry.concluded_at, None);
    }

    #[test]
    fn test_record_eval_rejects_non_finite_gap() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernorConfig::new(dir.path());
        cmd_start_eval(&config, "a:b", 0.2).unwrap();

        assert!(cmd_record_eval(&config, "a:b", f64::NAN).is_err());
        assert!(cmd_record_eval(&config, "a:b", f64::INFINITY).is_err());
        cmd_record_eval(&config, "a:b", 0.1).unwrap();

        let queue = ImprovementQueue::open(&config.queue_path);
        let entry = queue.entry(&SkillRef::parse("a:b").unwrap()).unwrap();
        assert_eq!(entry.eval_samples, vec![0.1]);
    }

    #[test]
    fn test_bump_version_command() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("SKILL.md");
        std::fs::write(&file, "---\nname: a\nversion: 1.4.0\n---\nbody\n").unwrap();

        let metrics = BTreeMap::from([("baseline_gap".to_string(), 0.2)]);
        cmd_bump_version(&file, "tightened", metrics).unwrap();
        assert_eq!(
            skillgov_core::read_version(&file).unwrap().as_deref(),
            Some("1.5.0")
        );
    }

    #[test]
    fn test_start_eval_rejects_negative_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernorConfig::new(dir.path());
        assert!(cmd_start_eval(&config, "a:b", -0.1).is_err());
        cmd_start_eval(&config, "a:b", 0.2).unwrap();
        let queue = ImprovementQueue::open(&config.queue_path);
        assert_eq!(
            queue.status(&SkillRef::parse("a:b").unwrap()),
            Status::Evaluating
        );
    }

    #[test]
    fn test_experience_store_command_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = GovernorConfig::new(dir.path());
        let file = dir.path().join("trajectory.json");
        std::fs::write(
            &file,
            r#"{"skill":"a:b","task_description":"t","approach_taken":"x","outcome":"failure"}"#,
        )
        .unwrap();

        cmd_experience_store(&config, &file).unwrap();
        assert!(!config.experience_dir.exists());
    }
}

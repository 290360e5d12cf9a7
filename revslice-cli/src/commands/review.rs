use super::{resolve_range, Context};
use crate::display::short;
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use revslice_core::{
    plan_commit_chunks, run_sliced_jobs, ChangeOps, Git, JobOutcome, ScratchWorktree,
    SliceCommitter, SlicePlanner,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One job per size-bounded run of commits
    Commits,
    /// One job per directory-coherent group of changed files
    Slices,
}

/// One unit of review work.
#[derive(Debug, Clone)]
struct ReviewJob {
    label: String,
    base: String,
    head: String,
    files: usize,
    /// Paths to isolate with a slice commit pair; `None` reviews base..head as is.
    slice: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum JobStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
struct JobReport {
    index: usize,
    label: String,
    base: String,
    head: String,
    files: usize,
    status: JobStatus,
    exit_code: Option<i32>,
    duration_ms: u64,
    output: String,
}

#[derive(Debug, Serialize)]
struct ReviewReport {
    run_id: Uuid,
    mode: Mode,
    base: String,
    head: String,
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
    aborted: bool,
    skipped: usize,
    jobs: Vec<JobReport>,
}

pub async fn run(
    ctx: &Context,
    base: &str,
    head: &str,
    exec: &str,
    mode: Mode,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let run_id = Uuid::new_v4();
    let started = Utc::now();
    let (base, head) = resolve_range(&ctx.git, base, head).await?;

    let ops = ctx.git.change_ops(&base, &head).await?;
    let jobs = plan_jobs(ctx, mode, &base, &head, &ops).await?;
    if jobs.is_empty() {
        println!("{}", "Nothing to review".yellow());
        return Ok(());
    }

    println!("{}", "Review run".bold().cyan());
    println!("  {}: {}", "Run ID".bold(), run_id);
    println!("  {}: {}..{}", "Range".bold(), short(&base), short(&head));
    println!("  {}: {} ({:?})", "Jobs".bold(), jobs.len(), mode);
    println!();

    let total = jobs.len();
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let committer = SliceCommitter::from_config(&ctx.config);
    let runner = JobRunner {
        git: &ctx.git,
        ops: &ops,
        committer: &committer,
        exec,
    };

    let outcomes = run_sliced_jobs(jobs, ctx.config.concurrency, |job, index| {
        let runner = &runner;
        let progress = progress.clone();
        async move {
            progress.set_message(job.label.clone());
            let report = runner.run(job, index).await;
            progress.inc(1);
            // A failing first job usually means the review tool itself is
            // unusable; later failures only concern their own slice.
            if index == 0 && report.status != JobStatus::Passed {
                Ok(JobOutcome::Abort(report))
            } else {
                Ok(JobOutcome::Continue(report))
            }
        }
    })
    .await?;
    progress.finish_and_clear();

    let aborted = outcomes.first().map(JobOutcome::is_abort).unwrap_or(false);
    let reports: Vec<JobReport> = outcomes.into_iter().map(JobOutcome::into_inner).collect();
    let skipped = total - reports.len();

    print_summary(&reports, skipped);

    if let Some(path) = report_path {
        let report = ReviewReport {
            run_id,
            mode,
            base,
            head,
            started,
            finished: Utc::now(),
            aborted,
            skipped,
            jobs: reports.clone(),
        };
        write_report(&path, &report)?;
        println!("  {}: {}", "Report".bold(), path.display());
    }

    let failed = reports.iter().filter(|r| r.status != JobStatus::Passed).count();
    if aborted {
        anyhow::bail!("First review job failed; skipped the remaining {} job(s)", skipped);
    }
    if failed > 0 {
        anyhow::bail!("{} of {} review job(s) failed", failed, total);
    }
    Ok(())
}

async fn plan_jobs(
    ctx: &Context,
    mode: Mode,
    base: &str,
    head: &str,
    ops: &ChangeOps,
) -> Result<Vec<ReviewJob>> {
    let jobs = match mode {
        Mode::Commits => {
            let commits = ctx.git.rev_list(base, head).await?;
            plan_commit_chunks(base, &commits, ctx.config.max_files, &ctx.git)
                .await?
                .into_iter()
                .map(|chunk| ReviewJob {
                    label: format!("{}..{}", short(&chunk.base), short(&chunk.head)),
                    base: chunk.base,
                    head: chunk.head,
                    files: chunk.file_count,
                    slice: None,
                })
                .collect()
        }
        Mode::Slices => SlicePlanner::from_config(&ctx.config)
            .plan(&ops.all())?
            .into_iter()
            .map(|slice| ReviewJob {
                label: slice.label,
                base: base.to_string(),
                head: head.to_string(),
                files: slice.paths.len(),
                slice: Some(slice.paths),
            })
            .collect(),
    };
    Ok(jobs)
}

struct JobRunner<'a> {
    git: &'a Git,
    ops: &'a ChangeOps,
    committer: &'a SliceCommitter,
    exec: &'a str,
}

impl JobRunner<'_> {
    /// Runs one job; every failure is folded into the returned report.
    async fn run(&self, job: ReviewJob, index: usize) -> JobReport {
        let started = Instant::now();
        let mut report = JobReport {
            index,
            label: job.label.clone(),
            base: job.base.clone(),
            head: job.head.clone(),
            files: job.files,
            status: JobStatus::Error,
            exit_code: None,
            duration_ms: 0,
            output: String::new(),
        };

        let result = match &job.slice {
            Some(paths) => self.run_slice(&job, paths, index).await,
            None => self.exec_review(self.git.dir(), &job, &job.base, &job.head, index).await,
        };

        match result {
            Ok((exit_code, output)) => {
                report.status = if exit_code == Some(0) {
                    JobStatus::Passed
                } else {
                    JobStatus::Failed
                };
                report.exit_code = exit_code;
                report.output = output;
            }
            Err(e) => {
                warn!("job {} ({}) errored: {:#}", index, job.label, e);
                report.output = format!("{:#}", e);
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!("job {} ({}) finished: {:?}", index, report.label, report.status);
        report
    }

    async fn run_slice(
        &self,
        job: &ReviewJob,
        paths: &[String],
        index: usize,
    ) -> Result<(Option<i32>, String)> {
        let mut tree = ScratchWorktree::create(self.git, &job.base).await?;
        let result: Result<(Option<i32>, String)> = async {
            let pair = self
                .committer
                .create_head_slice_commits(&mut tree, &job.base, &job.head, self.ops, paths, &job.label)
                .await?;
            self.exec_review(tree.path(), job, &pair.base, &pair.head, index)
                .await
        }
        .await;

        if let Err(e) = tree.remove().await {
            warn!("could not clean up worktree for {}: {}", job.label, e);
        }
        result
    }

    async fn exec_review(
        &self,
        dir: &Path,
        job: &ReviewJob,
        base: &str,
        head: &str,
        index: usize,
    ) -> Result<(Option<i32>, String)> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(self.exec)
            .current_dir(dir)
            .env("REVSLICE_BASE", base)
            .env("REVSLICE_HEAD", head)
            .env("REVSLICE_LABEL", &job.label)
            .env("REVSLICE_INDEX", index.to_string())
            .env("REVSLICE_FILES", job.files.to_string())
            .output()
            .await
            .with_context(|| format!("Failed to start review command for {}", job.label))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((output.status.code(), text))
    }
}

fn print_summary(reports: &[JobReport], skipped: usize) {
    for report in reports {
        let icon = match report.status {
            JobStatus::Passed => "✓".green(),
            JobStatus::Failed => "✗".red(),
            JobStatus::Error => "!".red(),
        };
        println!(
            "  {} {} {} {}",
            icon,
            report.label,
            format!("({} files)", report.files).dimmed(),
            format!("{:.1}s", report.duration_ms as f64 / 1000.0).dimmed()
        );
        if report.status != JobStatus::Passed {
            for line in last_lines(&report.output, 5) {
                println!("      {}", line.dimmed());
            }
        }
    }

    let passed = reports.iter().filter(|r| r.status == JobStatus::Passed).count();
    println!();
    let summary = format!("{}/{} job(s) passed", passed, reports.len() + skipped);
    if passed == reports.len() && skipped == 0 {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.yellow().bold());
    }
    if skipped > 0 {
        println!("{}", format!("{} job(s) not started", skipped).yellow());
    }
}

fn last_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].to_vec()
}

fn write_report(path: &Path, report: &ReviewReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {:?}", path))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(status: JobStatus) -> JobReport {
        JobReport {
            index: 0,
            label: "src".to_string(),
            base: "a".to_string(),
            head: "b".to_string(),
            files: 3,
            status,
            exit_code: Some(0),
            duration_ms: 12,
            output: String::new(),
        }
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\n\nc\nd\n", 2), vec!["c", "d"]);
        assert_eq!(last_lines("only\n", 5), vec!["only"]);
        assert!(last_lines("", 3).is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");
        let now = Utc::now();
        let review = ReviewReport {
            run_id: Uuid::new_v4(),
            mode: Mode::Slices,
            base: "a".to_string(),
            head: "b".to_string(),
            started: now,
            finished: now,
            aborted: false,
            skipped: 0,
            jobs: vec![report(JobStatus::Passed), report(JobStatus::Failed)],
        };

        write_report(&path, &review).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "slices");
        assert_eq!(value["jobs"][0]["status"], "passed");
        assert_eq!(value["jobs"][1]["status"], "failed");
        assert_eq!(value["jobs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exec_review_passes_range() {
        let dir = TempDir::new().unwrap();
        let git = Git::open(dir.path());
        let ops = ChangeOps::new();
        let committer = SliceCommitter::default();
        let runner = JobRunner {
            git: &git,
            ops: &ops,
            committer: &committer,
            exec: "echo \"$REVSLICE_BASE $REVSLICE_HEAD $REVSLICE_LABEL $REVSLICE_FILES\"; exit 3",
        };
        let job = ReviewJob {
            label: "docs".to_string(),
            base: "b1".to_string(),
            head: "h1".to_string(),
            files: 2,
            slice: None,
        };

        let report = runner.run(job, 4).await;

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.exit_code, Some(3));
        assert_eq!(report.output.trim(), "b1 h1 docs 2");
        assert_eq!(report.index, 4);
    }
}

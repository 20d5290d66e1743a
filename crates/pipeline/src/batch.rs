//! Batch processing.
//!
//! Runs jobs strictly one at a time, collecting per-job outcomes into an
//! append-only report. A failing job is recorded and the batch moves on;
//! nothing a single job does can take its siblings down with it.

use crate::concurrency::WorkerPlan;
use crate::job::{run_job, JobRequest, JobStage, JobSummary};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::startup::NormalizeSupport;
use crate::tools::ToolRunner;
use slidecast_config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Final outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(JobSummary),
    Failed { stage: JobStage, reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// One entry in a batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub job_id: String,
    pub archive_path: PathBuf,
    pub outcome: JobOutcome,
}

/// Append-only record of per-job outcomes, in submission order.
#[derive(Debug, Default)]
pub struct BatchReport {
    entries: Vec<BatchEntry>,
}

impl BatchReport {
    /// Append one job's outcome.
    pub fn record(&mut self, job_id: String, archive_path: PathBuf, outcome: JobOutcome) {
        self.entries.push(BatchEntry {
            job_id,
            archive_path,
            outcome,
        });
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Run a batch of jobs sequentially.
///
/// Only image-level work within a single job is parallelized; jobs never
/// overlap, which bounds peak resource usage to one job's external-process
/// footprint at a time. Each job's fatal error is converted into a
/// `Failed(reason)` entry here and never propagates further.
pub async fn run_batch(
    runner: Arc<dyn ToolRunner>,
    cfg: &Config,
    support: NormalizeSupport,
    requests: &[JobRequest],
    events: Option<mpsc::Sender<ProgressEvent>>,
) -> BatchReport {
    let plan = WorkerPlan::derive(cfg);
    let mut report = BatchReport::default();

    for request in requests {
        let reporter = match &events {
            Some(tx) => ProgressReporter::new(request.id.clone(), tx.clone()),
            None => ProgressReporter::disabled(request.id.clone()),
        };

        info!(
            job_id = %request.id,
            archive = %request.archive_path.display(),
            "job started"
        );

        let outcome = match run_job(runner.clone(), cfg, &plan, support, request, &reporter).await
        {
            Ok(summary) => {
                info!(
                    job_id = %request.id,
                    output = %summary.output_path.display(),
                    verified = summary.verified_images,
                    excluded = summary.failed_images,
                    "job succeeded"
                );
                JobOutcome::Succeeded(summary)
            }
            Err(err) => {
                error!(job_id = %request.id, stage = %err.stage(), "job failed: {}", err);
                JobOutcome::Failed {
                    stage: err.stage(),
                    reason: err.to_string(),
                }
            }
        };

        report.record(request.id.clone(), request.archive_path.clone(), outcome);
    }

    report
}

//! CLI entry point for Slidecast
//!
//! Parses command line arguments, runs startup checks, and drives a batch of
//! archive-to-video conversion jobs, rendering the progress event stream as
//! log lines.

use clap::Parser;
use slidecast::{
    parse_selection, run_batch, run_startup_checks, JobOutcome, JobRequest, ProgressEvent,
    SystemRunner,
};
use slidecast_config::Config;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Slidecast - CBZ archives plus one audio track in, slideshow videos out
#[derive(Parser, Debug)]
#[command(name = "slidecast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CBZ archives to convert, processed in order
    #[arg(required = true)]
    archives: Vec<PathBuf>,

    /// Audio track mixed under every video
    #[arg(short, long)]
    audio: PathBuf,

    /// Path to an optional configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the output videos (default: next to each archive)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Selection over the given archives, e.g. "1,3,5-7" (default: all)
    #[arg(long)]
    select: Option<String>,

    /// Skip startup tool checks. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

/// Render progress events as log lines; encode progress is reported in 10%
/// steps per job.
fn spawn_progress_renderer(
    mut events: mpsc::Receiver<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_step: HashMap<String, u32> = HashMap::new();
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::PhaseStarted { job_id, phase } => {
                    info!(job_id = %job_id, "phase: {}", phase);
                }
                ProgressEvent::EncodeProgress { job_id, fraction } => {
                    let step = ((fraction * 100.0) as u32) / 10 * 10;
                    let entry = last_step.entry(job_id.clone()).or_insert(0);
                    if step > *entry {
                        *entry = step;
                        info!(job_id = %job_id, "encoding {}%", step);
                    }
                }
                ProgressEvent::EncodeCompleted { job_id } => {
                    last_step.remove(&job_id);
                    info!(job_id = %job_id, "encoding 100%");
                }
                ProgressEvent::EncodeStalled { job_id } => {
                    last_step.remove(&job_id);
                    warn!(job_id = %job_id, "encoder exited without reporting progress");
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    let archives: Vec<PathBuf> = match &args.select {
        Some(expr) => match parse_selection(expr, args.archives.len()) {
            Ok(indices) => indices.into_iter().map(|i| args.archives[i].clone()).collect(),
            Err(e) => {
                eprintln!("Invalid --select expression: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => args.archives.clone(),
    };

    let runner = Arc::new(SystemRunner);

    let support = if args.skip_checks {
        println!("WARNING: Skipping startup checks (--skip-checks enabled)");
        slidecast::startup::detect_magick(runner.as_ref()).await
    } else {
        match run_startup_checks(runner.as_ref()).await {
            Ok(support) => support,
            Err(e) => {
                eprintln!("Startup check failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let requests: Vec<JobRequest> = archives
        .iter()
        .map(|archive| {
            JobRequest::for_archive(
                archive.clone(),
                args.audio.clone(),
                args.output_dir.as_deref(),
            )
        })
        .collect();

    println!(
        "Slidecast: {} archive(s), audio: {}",
        requests.len(),
        args.audio.display()
    );

    let (event_tx, event_rx) = mpsc::channel(256);
    let renderer = spawn_progress_renderer(event_rx);

    let report = run_batch(runner, &config, support, &requests, Some(event_tx)).await;

    // All senders are gone once the batch returns; the renderer drains and exits.
    let _ = renderer.await;

    println!();
    println!(
        "Batch summary: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    for entry in report.entries() {
        match &entry.outcome {
            JobOutcome::Succeeded(summary) => {
                println!(
                    "  OK   {} -> {} ({} frames, {} excluded)",
                    entry.archive_path.display(),
                    summary.output_path.display(),
                    summary.verified_images,
                    summary.failed_images
                );
            }
            JobOutcome::Failed { stage, reason } => {
                println!(
                    "  FAIL {} [{}]: {}",
                    entry.archive_path.display(),
                    stage,
                    reason
                );
            }
        }
    }

    if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

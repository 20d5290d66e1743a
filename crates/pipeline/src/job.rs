//! Job orchestrator.
//!
//! Drives one archive-to-video conversion through the full pipeline:
//! extract -> normalize -> verify -> manifest -> probe -> encode. Every stage
//! must produce a usable result before the next begins; any fatal condition
//! stops the job without affecting its siblings in the batch. The job's
//! temporary working area is released exactly once, on every exit path.

use crate::concurrency::WorkerPlan;
use crate::encode::{run_encode, EncodeError, EncodeJob};
use crate::extract::{extract_archive, ExtractError};
use crate::imageset::{ImageSet, ImageState};
use crate::manifest::Manifest;
use crate::normalize::run_normalizer_pool;
use crate::probe::{probe_audio_duration, AudioParameters, ProbeError};
use crate::progress::{JobPhase, ProgressReporter};
use crate::startup::NormalizeSupport;
use crate::tools::ToolRunner;
use crate::verify::run_verifier_pool;
use serde::{Deserialize, Serialize};
use slidecast_config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Stage of a job in the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Images extracted into the temporary area.
    Extracted,
    /// Normalizer pool is rewriting images.
    Normalizing,
    /// Verifier pool is decode-checking images.
    Verifying,
    /// Frame manifest written.
    ManifestBuilt,
    /// Audio duration probe and parameter derivation.
    Probing,
    /// External encode running.
    Encoding,
    /// Job finished successfully.
    Succeeded,
    /// Job stopped at a fatal condition.
    Failed,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Extracted => write!(f, "extracted"),
            JobStage::Normalizing => write!(f, "normalizing"),
            JobStage::Verifying => write!(f, "verifying"),
            JobStage::ManifestBuilt => write!(f, "manifest_built"),
            JobStage::Probing => write!(f, "probing"),
            JobStage::Encoding => write!(f, "encoding"),
            JobStage::Succeeded => write!(f, "succeeded"),
            JobStage::Failed => write!(f, "failed"),
        }
    }
}

/// Error type for job execution. Every variant is fatal for its job and maps
/// to a `Failed(reason)` outcome at the batch boundary; per-image failures
/// never surface here.
#[derive(Debug, Error)]
pub enum JobError {
    /// Extraction produced no usable images or the archive was unreadable.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    /// Zero records survived a pool stage.
    #[error("all images failed during {stage} ({count} attempted)")]
    AllImagesFailed { stage: JobStage, count: usize },

    /// Source audio duration could not be determined.
    #[error("audio probe failed: {0}")]
    AudioProbe(#[from] ProbeError),

    /// The encode invocation failed.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// Failed to create the temporary working directory.
    #[error("Failed to create temp directory: {0}")]
    TempDirCreation(std::io::Error),

    /// Failed to create the output directory.
    #[error("Failed to create output directory: {0}")]
    OutputDirCreation(std::io::Error),

    /// Failed to write the frame manifest.
    #[error("Failed to write manifest: {0}")]
    ManifestWrite(std::io::Error),

    /// An internal task failed to complete.
    #[error("internal task failure: {0}")]
    Task(String),
}

impl JobError {
    /// The pipeline stage this failure surfaces from.
    pub fn stage(&self) -> JobStage {
        match self {
            JobError::Extraction(_) | JobError::TempDirCreation(_) | JobError::Task(_) => {
                JobStage::Extracted
            }
            JobError::AllImagesFailed { stage, .. } => *stage,
            JobError::ManifestWrite(_) => JobStage::ManifestBuilt,
            JobError::AudioProbe(_) => JobStage::Probing,
            JobError::OutputDirCreation(_) | JobError::Encode(_) => JobStage::Encoding,
        }
    }
}

/// One unit of work: an archive, the audio track, and the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Unique job identifier.
    pub id: String,
    /// Path to the CBZ archive.
    pub archive_path: PathBuf,
    /// Path to the audio track.
    pub audio_path: PathBuf,
    /// Destination video file.
    pub output_path: PathBuf,
}

impl JobRequest {
    /// Create a request with a fresh UUID.
    pub fn new(archive_path: PathBuf, audio_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            archive_path,
            audio_path,
            output_path,
        }
    }

    /// Create a request with the output placed next to the archive, or in
    /// `output_dir` when given, named after the sanitized archive stem.
    pub fn for_archive(
        archive_path: PathBuf,
        audio_path: PathBuf,
        output_dir: Option<&Path>,
    ) -> Self {
        let file_name = output_file_name(&archive_path);
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| archive_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(archive_path, audio_path, dir.join(file_name))
    }
}

/// Output video file name derived from the archive stem.
///
/// Characters outside `[A-Za-z0-9_ .-]` are dropped and the result trimmed,
/// with a fixed fallback when nothing survives.
pub fn output_file_name(archive_path: &Path) -> String {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '.' | '-'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "slideshow.mp4".to_string()
    } else {
        format!("{}.mp4", cleaned)
    }
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub output_path: PathBuf,
    /// Images discovered in the archive.
    pub total_images: usize,
    /// Images that made it into the video.
    pub verified_images: usize,
    /// Images excluded by per-image failures.
    pub failed_images: usize,
}

/// Run one job to completion.
///
/// Per-image failures are absorbed by the pool stages; only job-fatal
/// conditions return as errors. The temporary directory created here is
/// removed on drop, so success, failure, and panic unwinding all release it
/// exactly once before control returns to the batch caller.
pub async fn run_job(
    runner: Arc<dyn ToolRunner>,
    cfg: &Config,
    plan: &WorkerPlan,
    support: NormalizeSupport,
    request: &JobRequest,
    progress: &ProgressReporter,
) -> Result<JobSummary, JobError> {
    let temp_dir = TempDir::new().map_err(JobError::TempDirCreation)?;
    let fps = cfg.video.fps.max(1); // a zero-fps config would make every duration infinite

    progress.phase(JobPhase::Extracting);
    let archive_path = request.archive_path.clone();
    let extract_root = temp_dir.path().to_path_buf();
    let image_extensions = cfg.formats.image_extensions.clone();
    let frames = tokio::task::spawn_blocking(move || {
        extract_archive(&archive_path, &extract_root, &image_extensions)
    })
    .await
    .map_err(|e| JobError::Task(e.to_string()))??;

    info!(job_id = %request.id, images = frames.len(), "archive extracted");
    let mut images = ImageSet::from_paths(frames);

    progress.phase(JobPhase::Normalizing);
    let normalized =
        run_normalizer_pool(runner.clone(), &mut images, plan.pool_size, support).await;
    if normalized == 0 {
        return Err(JobError::AllImagesFailed {
            stage: JobStage::Normalizing,
            count: images.len(),
        });
    }

    progress.phase(JobPhase::Verifying);
    let verified = run_verifier_pool(runner.clone(), &mut images, plan.pool_size).await;
    if verified == 0 {
        return Err(JobError::AllImagesFailed {
            stage: JobStage::Verifying,
            count: images.len(),
        });
    }

    progress.phase(JobPhase::BuildingManifest);
    let survivors = images.verified_paths();
    let manifest = Manifest::build(&survivors, fps, cfg.video.last_frame_hold_secs);
    let manifest_path = temp_dir.path().join("frames.txt");
    manifest
        .write_to(&manifest_path)
        .map_err(JobError::ManifestWrite)?;

    progress.phase(JobPhase::Probing);
    let source_duration = probe_audio_duration(runner.as_ref(), &request.audio_path).await?;
    let audio = AudioParameters::derive(
        source_duration,
        survivors.len(),
        fps,
        cfg.audio.fade_in_secs,
        cfg.audio.fade_out_secs,
    );
    debug!(
        job_id = %request.id,
        target_secs = audio.target_duration_secs,
        loops_audio = audio.needs_loop(),
        "audio parameters derived"
    );

    progress.phase(JobPhase::Encoding);
    if let Some(parent) = request.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(JobError::OutputDirCreation)?;
        }
    }

    let encode_job = EncodeJob {
        manifest_path,
        audio_path: request.audio_path.clone(),
        output_path: request.output_path.clone(),
        fps,
        audio,
    };
    run_encode(runner.as_ref(), &encode_job, progress).await?;

    Ok(JobSummary {
        output_path: request.output_path.clone(),
        total_images: images.len(),
        verified_images: verified,
        failed_images: images.count_in(ImageState::Failed),
    })
}

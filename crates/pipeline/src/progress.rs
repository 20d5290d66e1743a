//! Typed progress events.
//!
//! The pipeline reports progress as a stream of typed events over a channel;
//! any renderer (terminal, log line, no-op) can consume them. Nothing in the
//! library prints.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Pipeline phase a job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Extracting,
    Normalizing,
    Verifying,
    BuildingManifest,
    Probing,
    Encoding,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Extracting => write!(f, "extracting"),
            JobPhase::Normalizing => write!(f, "normalizing"),
            JobPhase::Verifying => write!(f, "verifying"),
            JobPhase::BuildingManifest => write!(f, "building_manifest"),
            JobPhase::Probing => write!(f, "probing"),
            JobPhase::Encoding => write!(f, "encoding"),
        }
    }
}

/// Progress event emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A pipeline phase has begun for the job.
    PhaseStarted { job_id: String, phase: JobPhase },
    /// Encode completion fraction, monotonically non-decreasing and held
    /// below 1.0 while the encoder is still running.
    EncodeProgress { job_id: String, fraction: f64 },
    /// The encoder exited cleanly; completion is exactly 1.0.
    EncodeCompleted { job_id: String },
    /// The encoder exited without emitting a single progress marker; the
    /// caller should warn instead of reporting completion.
    EncodeStalled { job_id: String },
}

/// Per-job handle for emitting progress events.
///
/// Sends are non-blocking: if the consumer falls behind, events are dropped
/// rather than stalling the pipeline (or the encoder's output pipe).
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: String,
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(job_id: impl Into<String>, tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            job_id: job_id.into(),
            tx: Some(tx),
        }
    }

    /// Reporter that drops every event; for callers without a renderer.
    pub fn disabled(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            tx: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn phase(&self, phase: JobPhase) {
        self.send(ProgressEvent::PhaseStarted {
            job_id: self.job_id.clone(),
            phase,
        });
    }

    pub fn encode_progress(&self, fraction: f64) {
        self.send(ProgressEvent::EncodeProgress {
            job_id: self.job_id.clone(),
            fraction,
        });
    }

    pub fn encode_completed(&self) {
        self.send(ProgressEvent::EncodeCompleted {
            job_id: self.job_id.clone(),
        });
    }

    pub fn encode_stalled(&self) {
        self.send(ProgressEvent::EncodeStalled {
            job_id: self.job_id.clone(),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }
}

//! Slidecast
//!
//! Converts CBZ image archives plus an audio track into slideshow videos by
//! orchestrating external tools (ffmpeg, ffprobe, ImageMagick) around a
//! concurrent image pipeline: extract, normalize, verify, build the frame
//! manifest, probe the audio, encode with live progress monitoring.

pub mod batch;
pub mod concurrency;
pub mod encode;
pub mod extract;
pub mod imageset;
pub mod job;
pub mod manifest;
pub mod normalize;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod select;
pub mod startup;
pub mod tools;
pub mod verify;

pub use slidecast_config as config;
pub use slidecast_config::Config;

pub use batch::{run_batch, BatchEntry, BatchReport, JobOutcome};
pub use concurrency::{derive_plan, WorkerPlan};
pub use encode::{
    build_encode_invocation, parse_progress_time, run_encode, EncodeError, EncodeJob,
    ProgressTracker,
};
pub use extract::{discover_images, extract_archive, natural_cmp, sort_natural, ExtractError};
pub use imageset::{ImageRecord, ImageSet, ImageState};
pub use job::{output_file_name, run_job, JobError, JobRequest, JobStage, JobSummary};
pub use manifest::{Manifest, ManifestEntry};
pub use normalize::run_normalizer_pool;
pub use pool::{run_stage, StageOutcome};
pub use probe::{probe_audio_duration, AudioParameters, ProbeError};
pub use progress::{JobPhase, ProgressEvent, ProgressReporter};
pub use select::{parse_selection, SelectError};
pub use startup::{run_startup_checks, NormalizeSupport, StartupError};
pub use tools::{SystemRunner, ToolInvocation, ToolOutput, ToolRunner, ToolStatus};
pub use verify::run_verifier_pool;

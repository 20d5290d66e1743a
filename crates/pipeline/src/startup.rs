//! Startup checks.
//!
//! Preflight verification that the external tools exist before a batch
//! starts: ffmpeg and ffprobe are required, ImageMagick is optional (the
//! normalizer passes records through when it is absent).

use crate::tools::{ToolInvocation, ToolRunner};
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("FFmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("ffprobe not available: {0}")]
    FfprobeUnavailable(String),
}

/// Whether the ImageMagick-based normalization stage can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeSupport {
    /// `magick` responded; images will be resaved before verification.
    Available,
    /// `magick` is missing; records pass through to verification untouched.
    Unavailable,
}

/// Check that `ffmpeg -version` executes successfully.
pub async fn check_ffmpeg_available(runner: &dyn ToolRunner) -> Result<(), StartupError> {
    let invocation = ToolInvocation::new("ffmpeg").arg("-version");
    match runner.run(&invocation).await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(StartupError::FfmpegUnavailable(
            "ffmpeg -version failed; is FFmpeg installed and in PATH?".to_string(),
        )),
        Err(e) => Err(StartupError::FfmpegUnavailable(format!(
            "ffmpeg -version failed; is FFmpeg installed and in PATH? Error: {}",
            e
        ))),
    }
}

/// Check that `ffprobe -version` executes successfully.
pub async fn check_ffprobe_available(runner: &dyn ToolRunner) -> Result<(), StartupError> {
    let invocation = ToolInvocation::new("ffprobe").arg("-version");
    match runner.run(&invocation).await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(StartupError::FfprobeUnavailable(
            "ffprobe -version failed; is FFmpeg installed and in PATH?".to_string(),
        )),
        Err(e) => Err(StartupError::FfprobeUnavailable(format!(
            "ffprobe -version failed; is FFmpeg installed and in PATH? Error: {}",
            e
        ))),
    }
}

/// Detect whether ImageMagick's `magick` is available.
pub async fn detect_magick(runner: &dyn ToolRunner) -> NormalizeSupport {
    let invocation = ToolInvocation::new("magick").arg("-version");
    match runner.run(&invocation).await {
        Ok(output) if output.status.success() => NormalizeSupport::Available,
        _ => NormalizeSupport::Unavailable,
    }
}

/// Run all startup checks in order
///
/// ffmpeg and ffprobe are hard requirements; magick availability is reported
/// back so the normalizer knows whether to run or pass through.
pub async fn run_startup_checks(runner: &dyn ToolRunner) -> Result<NormalizeSupport, StartupError> {
    check_ffmpeg_available(runner).await?;
    check_ffprobe_available(runner).await?;
    Ok(detect_magick(runner).await)
}

//! FFmpeg encode invocation and progress monitoring.
//!
//! Builds the single ffmpeg command that turns a frame manifest plus an audio
//! track into the final video, runs it, and translates the stderr stats
//! stream into a normalized, monotonically non-decreasing progress signal.

use crate::probe::{parse_clock_time, AudioParameters};
use crate::progress::ProgressReporter;
use crate::tools::{ToolInvocation, ToolRunner};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Composite filter graph: the frame is split into a blurred, screen-filling
/// background and a height-fit foreground centered on top, forced to 16:9.
const VIDEO_FILTER: &str = "[0:v]split=2[bg][fg];\
[bg]scale=1280:720,boxblur=10:1[blurred];\
[fg]scale=-1:720[fgscaled];\
[blurred][fgscaled]overlay=(W-w)/2:(H-h)/2,setdar=16/9[v]";

/// Live observations are held just below full; exactly 1.0 is reported only
/// once the encoder has exited cleanly, since the final stats line can land
/// at or past the target.
const LIVE_FRACTION_CEILING: f64 = 0.999;

/// Error type for encode operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// ffmpeg exited with non-zero status
    #[error("ffmpeg exited with code {0}")]
    ExitCode(i32),

    /// ffmpeg was terminated by a signal
    #[error("ffmpeg process was terminated by signal")]
    Terminated,

    /// IO error during encoding
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything one encode invocation needs; not retained afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    /// Path to the written concat manifest.
    pub manifest_path: PathBuf,
    /// Path to the source audio track.
    pub audio_path: PathBuf,
    /// Destination video file.
    pub output_path: PathBuf,
    /// Output frame rate.
    pub fps: u32,
    /// Derived audio/duration parameters.
    pub audio: AudioParameters,
}

/// Build the afade filter chain, or None when both fades are zero.
pub fn build_audio_filter(audio: &AudioParameters) -> Option<String> {
    let mut filters = Vec::new();

    if audio.fade_in_secs > 0.0 {
        filters.push(format!("afade=t=in:st=0:d={:.4}", audio.fade_in_secs));
    }
    if audio.fade_out_secs > 0.0 {
        filters.push(format!(
            "afade=t=out:st={:.4}:d={:.4}",
            audio.fade_out_start_secs(),
            audio.fade_out_secs
        ));
    }

    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

/// Build the ffmpeg invocation for one encode.
///
/// The manifest drives frame sequencing through the concat demuxer; the audio
/// input is looped indefinitely and `-shortest` cuts the output at the video
/// end, which by construction equals the target duration.
pub fn build_encode_invocation(job: &EncodeJob) -> ToolInvocation {
    let mut invocation = ToolInvocation::new("ffmpeg")
        .arg("-y")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("info")
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg_path(&job.manifest_path)
        .arg("-stream_loop")
        .arg("-1")
        .arg("-i")
        .arg_path(&job.audio_path)
        .arg("-filter_complex")
        .arg(VIDEO_FILTER)
        .arg("-map")
        .arg("[v]")
        .arg("-map")
        .arg("1:a")
        .arg("-c:v")
        .arg("libx264")
        .arg("-r")
        .arg(job.fps.to_string())
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-shortest");

    if let Some(filter) = build_audio_filter(&job.audio) {
        invocation = invocation.arg("-af").arg(filter);
    }

    invocation.arg_path(&job.output_path)
}

/// Parse an ffmpeg stderr stats line into elapsed seconds.
///
/// Example line:
/// `frame=   12 fps=4.0 q=28.0 size=     256kB time=00:00:03.00 bitrate= ...`
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let value = extract_value(line, "time=")?;
    parse_clock_time(&value)
}

/// Extract the value following `key` up to the next whitespace.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let value: String = line[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Normalizes elapsed-time markers into a clamped, monotonically
/// non-decreasing completion fraction.
#[derive(Debug)]
pub struct ProgressTracker {
    target_secs: f64,
    fraction: f64,
    observed: bool,
}

impl ProgressTracker {
    pub fn new(target_secs: f64) -> Self {
        Self {
            target_secs,
            fraction: 0.0,
            observed: false,
        }
    }

    /// Record an elapsed-time marker. Returns the new fraction when it
    /// advances the signal, None otherwise; the signal never regresses.
    pub fn observe(&mut self, elapsed_secs: f64) -> Option<f64> {
        self.observed = true;
        if self.target_secs <= 0.0 {
            return None;
        }

        let fraction = (elapsed_secs / self.target_secs).clamp(0.0, LIVE_FRACTION_CEILING);
        if fraction > self.fraction {
            self.fraction = fraction;
            Some(fraction)
        } else {
            None
        }
    }

    /// Mark the encode as cleanly finished; the signal becomes exactly 1.0.
    pub fn complete(&mut self) -> f64 {
        self.fraction = 1.0;
        1.0
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Whether any progress marker was seen at all.
    pub fn observed_any(&self) -> bool {
        self.observed
    }
}

/// Run one encode invocation, monitoring its progress stream.
///
/// The monitor drains stderr lines as they arrive so the encoder's pipe never
/// backs up, mapping each `time=` marker to a completion fraction. A clean
/// exit emits either the completion event or, when no marker was ever seen,
/// the stalled event so the caller can warn instead of assuming 100%. A
/// non-zero exit is fatal regardless of how much progress was observed.
pub async fn run_encode(
    runner: &dyn ToolRunner,
    job: &EncodeJob,
    progress: &ProgressReporter,
) -> Result<(), EncodeError> {
    let invocation = build_encode_invocation(job);
    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);

    let (status_result, mut tracker) = tokio::join!(
        runner.run_streaming(&invocation, line_tx),
        async {
            let mut tracker = ProgressTracker::new(job.audio.target_duration_secs);
            while let Some(line) = line_rx.recv().await {
                if let Some(elapsed) = parse_progress_time(&line) {
                    if let Some(fraction) = tracker.observe(elapsed) {
                        progress.encode_progress(fraction);
                    }
                }
            }
            tracker
        }
    );

    let status = status_result?;
    if !status.success() {
        return match status.code() {
            Some(code) => Err(EncodeError::ExitCode(code)),
            None => Err(EncodeError::Terminated),
        };
    }

    if tracker.observed_any() {
        tracker.complete();
        progress.encode_completed();
    } else {
        progress.encode_stalled();
    }

    Ok(())
}

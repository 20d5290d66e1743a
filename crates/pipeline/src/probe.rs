//! Audio probing and derived encode parameters.
//!
//! Obtains the source track's duration from ffprobe and derives the values
//! the encode step needs: target video duration, clamped fade durations, and
//! whether the track has to repeat to cover the video.

use crate::tools::{ToolInvocation, ToolRunner};
use std::path::Path;
use thiserror::Error;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe command failed to execute.
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    /// Failed to parse ffprobe JSON output.
    #[error("Failed to parse ffprobe output: {0}")]
    ParseError(String),

    /// The probed file carried no usable duration.
    #[error("audio duration missing or not positive")]
    MissingDuration,

    /// IO error during probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub duration: Option<String>,
    }
}

/// Build the probe invocation for an audio file.
///
/// Runs `ffprobe -v quiet -print_format json -show_format <path>`.
pub fn build_probe_invocation(path: &Path) -> ToolInvocation {
    ToolInvocation::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg_path(path)
}

/// Probe an audio file and return its duration in seconds.
pub async fn probe_audio_duration(
    runner: &dyn ToolRunner,
    path: &Path,
) -> Result<f64, ProbeError> {
    let output = runner.run(&build_probe_invocation(path)).await?;

    if !output.status.success() {
        return Err(ProbeError::FfprobeFailed(format!(
            "ffprobe exited with {:?}: {}",
            output.status.code(),
            output.stderr.trim()
        )));
    }

    parse_duration_output(&output.stdout)
}

/// Parse ffprobe JSON output into a duration in seconds.
pub fn parse_duration_output(json_str: &str) -> Result<f64, ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let duration = ffprobe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| parse_duration_value(&d))
        .ok_or(ProbeError::MissingDuration)?;

    if duration > 0.0 {
        Ok(duration)
    } else {
        Err(ProbeError::MissingDuration)
    }
}

/// Parse a duration value given as raw decimal seconds or as an
/// HH:MM:SS.ms clock string.
pub fn parse_duration_value(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.contains(':') {
        parse_clock_time(trimmed)
    } else {
        trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Parse an HH:MM:SS.ms clock string into total seconds.
pub fn parse_clock_time(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let hours = parts[0].parse::<f64>().ok()?;
    let minutes = parts[1].parse::<f64>().ok()?;
    let seconds = parts[2].parse::<f64>().ok()?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Derived audio parameters for one encode. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParameters {
    /// Duration of the source track.
    pub source_duration_secs: f64,
    /// Target video duration: verified frame count / fps.
    pub target_duration_secs: f64,
    /// Fade-in, clamped to half the target duration.
    pub fade_in_secs: f64,
    /// Fade-out, clamped to half the target duration.
    pub fade_out_secs: f64,
}

impl AudioParameters {
    /// Derive the parameters for one encode.
    ///
    /// The clamp to target/2 per fade keeps the two fades from overlapping,
    /// so a fade pair can never swallow a short clip entirely.
    pub fn derive(
        source_duration_secs: f64,
        verified_count: usize,
        fps: u32,
        configured_fade_in: f64,
        configured_fade_out: f64,
    ) -> Self {
        let target = verified_count as f64 / f64::from(fps.max(1));
        let half = target / 2.0;

        Self {
            source_duration_secs,
            target_duration_secs: target,
            fade_in_secs: configured_fade_in.clamp(0.0, half),
            fade_out_secs: configured_fade_out.clamp(0.0, half),
        }
    }

    /// Where the fade-out begins: the cut point minus the fade length.
    pub fn fade_out_start_secs(&self) -> f64 {
        (self.target_duration_secs - self.fade_out_secs).max(0.0)
    }

    /// True when the source track is shorter than the video and must repeat
    /// (concatenated with itself) to cover the full target duration.
    pub fn needs_loop(&self) -> bool {
        self.source_duration_secs < self.target_duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{failed_output, ok_stdout, ScriptedRunner};
    use proptest::prelude::*;

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("00:00:05.00"), Some(5.0));
        assert_eq!(parse_clock_time("00:01:30.50"), Some(90.5));
        assert_eq!(parse_clock_time("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_clock_time("N/A"), None);
        assert_eq!(parse_clock_time("5.0"), None);
        assert_eq!(parse_clock_time("00:xx:00.00"), None);
    }

    #[test]
    fn test_parse_duration_value_raw_and_clock() {
        assert_eq!(parse_duration_value("212.184"), Some(212.184));
        assert_eq!(parse_duration_value(" 3.5 "), Some(3.5));
        assert_eq!(parse_duration_value("00:03:32.18"), Some(212.18));
        assert_eq!(parse_duration_value("garbage"), None);
    }

    #[test]
    fn test_parse_duration_output() {
        let json = r#"{"format": {"filename": "track.mp3", "duration": "212.184"}}"#;
        let duration = parse_duration_output(json).unwrap();
        assert!((duration - 212.184).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_output_missing_duration() {
        let json = r#"{"format": {"filename": "track.mp3"}}"#;
        assert!(matches!(
            parse_duration_output(json),
            Err(ProbeError::MissingDuration)
        ));
    }

    #[test]
    fn test_parse_duration_output_invalid_json() {
        assert!(matches!(
            parse_duration_output("not json"),
            Err(ProbeError::ParseError(_))
        ));
    }

    #[test]
    fn test_probe_invocation_args() {
        let invocation = build_probe_invocation(Path::new("/music/track.flac"));
        assert_eq!(invocation.program, "ffprobe");
        assert_eq!(
            invocation.args,
            vec![
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "/music/track.flac"
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_audio_duration_success() {
        let runner = ScriptedRunner::new(|_| {
            Ok(ok_stdout(r#"{"format": {"duration": "90.5"}}"#))
        });
        let duration = probe_audio_duration(&runner, Path::new("/music/a.mp3"))
            .await
            .unwrap();
        assert!((duration - 90.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_probe_audio_duration_nonzero_exit() {
        let runner = ScriptedRunner::new(|_| Ok(failed_output(1, "no such file")));
        let result = probe_audio_duration(&runner, Path::new("/music/a.mp3")).await;
        assert!(matches!(result, Err(ProbeError::FfprobeFailed(_))));
    }

    #[test]
    fn test_derive_target_duration_scenario() {
        // 10 verified images at 4 fps -> exactly 2.5 seconds.
        let params = AudioParameters::derive(1.0, 10, 4, 2.0, 2.0);
        assert!((params.target_duration_secs - 2.5).abs() < f64::EPSILON);
        // 1.0s of audio must loop to cover 2.5s.
        assert!(params.needs_loop());
    }

    #[test]
    fn test_derive_clamps_fades_to_half_target() {
        // Configured 2.0 + 2.0 against a 2.5s clip: each fade caps at 1.25.
        let params = AudioParameters::derive(10.0, 10, 4, 2.0, 2.0);
        assert!((params.fade_in_secs - 1.25).abs() < 1e-9);
        assert!((params.fade_out_secs - 1.25).abs() < 1e-9);
        assert!((params.fade_out_start_secs() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_derive_short_fades_pass_through() {
        let params = AudioParameters::derive(120.0, 100, 4, 2.0, 3.0);
        assert!((params.target_duration_secs - 25.0).abs() < 1e-9);
        assert!((params.fade_in_secs - 2.0).abs() < 1e-9);
        assert!((params.fade_out_secs - 3.0).abs() < 1e-9);
        assert!((params.fade_out_start_secs() - 22.0).abs() < 1e-9);
        assert!(!params.needs_loop());
    }

    #[test]
    fn test_negative_fade_config_clamps_to_zero() {
        let params = AudioParameters::derive(10.0, 10, 4, -1.0, -5.0);
        assert_eq!(params.fade_in_secs, 0.0);
        assert_eq!(params.fade_out_secs, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        // The fades never overlap: their sum stays within the target even
        // when the configured values individually dwarf it.
        #[test]
        fn prop_fades_never_exceed_target(
            count in 1usize..500,
            fps in 1u32..120,
            fade_in in 0.0f64..1000.0,
            fade_out in 0.0f64..1000.0,
        ) {
            let params = AudioParameters::derive(60.0, count, fps, fade_in, fade_out);
            prop_assert!(
                params.fade_in_secs + params.fade_out_secs
                    <= params.target_duration_secs + 1e-9
            );
            prop_assert!(params.fade_out_start_secs() >= params.fade_in_secs - 1e-9);
        }

        // Target duration is exactly count / fps.
        #[test]
        fn prop_target_duration_exact(count in 0usize..1000, fps in 1u32..240) {
            let params = AudioParameters::derive(1.0, count, fps, 0.0, 0.0);
            prop_assert_eq!(params.target_duration_secs, count as f64 / f64::from(fps));
        }
    }
}

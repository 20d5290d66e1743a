//! Frame manifest for the encode step.
//!
//! The manifest is a pure function of the surviving frame sequence and the
//! configured FPS: same survivors, same manifest, every run. Its serialized
//! form is the ffmpeg concat demuxer text format.

use std::path::{Path, PathBuf};

/// One frame entry: path plus display duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Ordered frame list consumed by one encode invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from frames in order.
    ///
    /// Every frame gets exactly 1/fps seconds. A non-zero
    /// `last_frame_hold_secs` stretches only the final entry; the default
    /// (0.0) keeps spacing uniform.
    pub fn build(frames: &[PathBuf], fps: u32, last_frame_hold_secs: f64) -> Self {
        let per_frame = 1.0 / f64::from(fps.max(1));
        let mut entries: Vec<ManifestEntry> = frames
            .iter()
            .map(|path| ManifestEntry {
                path: path.clone(),
                duration_secs: per_frame,
            })
            .collect();

        if last_frame_hold_secs > 0.0 {
            if let Some(last) = entries.last_mut() {
                last.duration_secs += last_frame_hold_secs;
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry durations.
    pub fn total_duration_secs(&self) -> f64 {
        self.entries.iter().map(|e| e.duration_secs).sum()
    }

    /// Render the concat demuxer text.
    ///
    /// Each entry becomes a `file` line plus a `duration` line. The final
    /// file is repeated once more without a duration, since the concat demuxer
    /// ignores the last listed duration otherwise, cutting the final frame
    /// short.
    pub fn to_concat_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&format!(
                "file '{}'\n",
                escape_single_quotes(&entry.path.to_string_lossy())
            ));
            text.push_str(&format!("duration {:.4}\n", entry.duration_secs));
        }
        if let Some(last) = self.entries.last() {
            text.push_str(&format!(
                "file '{}'\n",
                escape_single_quotes(&last.path.to_string_lossy())
            ));
        }
        text
    }

    /// Write the concat text to disk.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_concat_text())
    }
}

/// Quote a path for a concat `file` directive: `'` becomes `'\''`.
fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "'\\''")
}

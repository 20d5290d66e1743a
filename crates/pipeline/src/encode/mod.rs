//! Encode driver and progress monitor.

mod ffmpeg;

pub use ffmpeg::*;

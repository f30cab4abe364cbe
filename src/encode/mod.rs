//! Video assembly through external tools.

/// `ffmpeg`/`ffprobe` argument construction and the [`ffmpeg::Encoder`].
pub mod ffmpeg;
/// Blocking child-process runner with bounded diagnostics capture.
pub mod process;

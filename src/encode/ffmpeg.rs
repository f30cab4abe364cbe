use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::encode::process::{ToolInvocation, ToolRunner};
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::raster::slide::RenderedFrame;

/// How frames are fed to the encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxStrategy {
    /// `image2` demuxer over the numbered frame pattern at `1/duration` fps.
    #[default]
    Pattern,
    /// `concat` demuxer over a manifest of `file`/`duration` directives.
    Manifest,
}

#[derive(Clone, Debug)]
pub struct EncoderOpts {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub strategy: MuxStrategy,
    pub output_fps: u32,
    /// Seek offset for the thumbnail still.
    pub thumbnail_offset: Duration,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            strategy: MuxStrategy::Pattern,
            output_fps: 30,
            thumbnail_offset: Duration::from_secs(1),
        }
    }
}

/// Everything one assembly needs. All inputs must already exist on disk.
#[derive(Clone, Debug)]
pub struct AssemblyJob<'a> {
    /// Frames in slide order, numbered `1..=n` without gaps.
    pub frames: &'a [RenderedFrame],
    /// `%d` pattern covering `frames` (pattern strategy).
    pub frame_pattern: &'a Path,
    pub audio: &'a Path,
    pub per_slide_duration_seconds: u32,
    pub output: &'a Path,
    /// Where the concat manifest is written (manifest strategy). Removed on every exit path.
    pub manifest_path: &'a Path,
}

/// Drives `ffmpeg`/`ffprobe` through a [`ToolRunner`]. At most one child runs at a time per call.
pub struct Encoder {
    opts: EncoderOpts,
    runner: Arc<dyn ToolRunner>,
}

impl Encoder {
    pub fn new(opts: EncoderOpts, runner: Arc<dyn ToolRunner>) -> Self {
        Self { opts, runner }
    }

    pub fn opts(&self) -> &EncoderOpts {
        &self.opts
    }

    /// Mux frames and narration into one MP4 at `job.output`.
    #[tracing::instrument(skip_all, fields(frames = job.frames.len()))]
    pub fn assemble_video(&self, job: &AssemblyJob<'_>) -> SlidecastResult<PathBuf> {
        validate_job(job)?;
        ensure_parent_dir(job.output)?;

        let (invocation, _manifest_guard) = match self.opts.strategy {
            MuxStrategy::Pattern => (self.pattern_invocation(job), None),
            MuxStrategy::Manifest => {
                ensure_parent_dir(job.manifest_path)?;
                let guard = TempFileGuard(Some(job.manifest_path.to_path_buf()));
                let manifest = render_concat_manifest(job.frames, job.per_slide_duration_seconds);
                std::fs::write(job.manifest_path, manifest).with_context(|| {
                    format!("write concat manifest '{}'", job.manifest_path.display())
                })?;
                (self.manifest_invocation(job), Some(guard))
            }
        };

        self.runner.run(&invocation)?.into_result()?;

        if !job.output.is_file() {
            return Err(SlidecastError::Encoding {
                exit_code: Some(0),
                diagnostics: format!(
                    "encoder reported success but '{}' was not written",
                    job.output.display()
                ),
            });
        }
        tracing::info!(video = %job.output.display(), "video assembled");
        Ok(job.output.to_path_buf())
    }

    /// Grab one still at the configured offset (1s by default) as a JPEG.
    #[tracing::instrument(skip(self))]
    pub fn extract_thumbnail(&self, video: &Path, output: &Path) -> SlidecastResult<PathBuf> {
        if !video.is_file() {
            return Err(SlidecastError::validation(format!(
                "video '{}' does not exist",
                video.display()
            )));
        }
        ensure_parent_dir(output)?;

        self.runner
            .run(&self.thumbnail_invocation(video, output))?
            .into_result()?;

        if !output.is_file() {
            return Err(SlidecastError::Encoding {
                exit_code: Some(0),
                diagnostics: format!(
                    "thumbnail extraction reported success but '{}' was not written",
                    output.display()
                ),
            });
        }
        Ok(output.to_path_buf())
    }

    /// Container duration in seconds as reported by `ffprobe`.
    pub fn probe_duration(&self, video: &Path) -> SlidecastResult<f64> {
        let inv = ToolInvocation::new(&self.opts.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video);
        let out = self.runner.run(&inv)?.into_result()?;
        parse_probe_duration(&out.stdout).ok_or_else(|| {
            SlidecastError::Other(anyhow::anyhow!(
                "ffprobe returned no usable duration: {:?}",
                out.stdout.trim()
            ))
        })
    }

    pub fn pattern_invocation(&self, job: &AssemblyJob<'_>) -> ToolInvocation {
        ToolInvocation::new(&self.opts.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args([
                "-framerate".into(),
                format!("1/{}", job.per_slide_duration_seconds),
                "-start_number".into(),
                "1".into(),
            ])
            .arg("-i")
            .arg(job.frame_pattern)
            .arg("-i")
            .arg(job.audio)
            .args(self.output_args())
            .arg(job.output)
    }

    pub fn manifest_invocation(&self, job: &AssemblyJob<'_>) -> ToolInvocation {
        ToolInvocation::new(&self.opts.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(job.manifest_path)
            .arg("-i")
            .arg(job.audio)
            .args(self.output_args())
            .arg(job.output)
    }

    pub fn thumbnail_invocation(&self, video: &Path, output: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.opts.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-ss")
            .arg(format_seek(self.opts.thumbnail_offset))
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-q:v", "2"])
            .arg(output)
    }

    fn output_args(&self) -> Vec<OsString> {
        let fps = self.opts.output_fps.to_string();
        [
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-c:a",
            "aac",
            "-shortest",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from)
        .collect()
    }
}

/// Concat-demuxer manifest. The last frame is listed a second time without a `duration`: the
/// demuxer ignores the final entry's duration otherwise.
pub fn render_concat_manifest(frames: &[RenderedFrame], per_slide_duration_seconds: u32) -> String {
    let mut out = String::new();
    for frame in frames {
        let _ = writeln!(out, "file '{}'", quote_concat_path(&frame.path));
        let _ = writeln!(out, "duration {per_slide_duration_seconds}");
    }
    if let Some(last) = frames.last() {
        let _ = writeln!(out, "file '{}'", quote_concat_path(&last.path));
    }
    out
}

// Inside single quotes the concat demuxer only needs `'` itself escaped, as `'\''`.
fn quote_concat_path(path: &Path) -> String {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    abs.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', r"'\''")
}

fn format_seek(offset: Duration) -> String {
    let ms = offset.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1_000) % 60,
        ms % 1_000
    )
}

fn parse_probe_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

fn validate_job(job: &AssemblyJob<'_>) -> SlidecastResult<()> {
    if job.frames.is_empty() {
        return Err(SlidecastError::validation("no slide frames provided"));
    }
    if job.per_slide_duration_seconds == 0 {
        return Err(SlidecastError::validation(
            "per-slide duration must be >= 1 second",
        ));
    }
    for (i, frame) in job.frames.iter().enumerate() {
        if frame.slide_number != i + 1 {
            return Err(SlidecastError::validation(format!(
                "frames must be numbered 1..=n without gaps, found {} at position {}",
                frame.slide_number,
                i + 1
            )));
        }
        if !frame.path.is_file() {
            return Err(SlidecastError::validation(format!(
                "frame '{}' does not exist",
                frame.path.display()
            )));
        }
    }
    if !job.audio.is_file() {
        return Err(SlidecastError::validation(format!(
            "narration audio '{}' does not exist",
            job.audio.display()
        )));
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> SlidecastResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Removes the wrapped file when dropped.
pub(crate) struct TempFileGuard(pub(crate) Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;

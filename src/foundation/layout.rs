//! Deterministic on-disk layout.
//!
//! Every file the pipeline produces or serves is named here, so producers (rasterizer, encoder)
//! and consumers (range server, sinks) agree without a database. Names derive from a logical id
//! plus a per-run disambiguator:
//!
//! ```text
//! <root>/frames/<logical>_<run>_slide_<n>.png
//! <root>/audio/<logical>_<run>.<ext>
//! <root>/videos/<logical>_<run>.mp4
//! <root>/thumbnails/<logical>_<run>_thumbnail.jpg
//! <root>/temp/<logical>_<run>_slides.txt
//! <root>/temp/<logical>_<run>.mp4               (in-flight video)
//! <root>/temp/<logical>_<run>_thumbnail.jpg     (in-flight thumbnail)
//! ```
//!
//! Encoders write into `temp/`; only a run that finished encoding moves its files into
//! `videos/` and `thumbnails/`, where the lookups scan.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::foundation::error::{SlidecastError, SlidecastResult};

const MAX_LOGICAL_ID_LEN: usize = 128;

static LAST_RUN: AtomicU64 = AtomicU64::new(0);

/// Identity of one pipeline run: the lesson's logical id plus a monotonically increasing run
/// number. Two runs for the same lesson never share an `ArtifactId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    logical: String,
    run: u64,
}

impl ArtifactId {
    /// Allocate a fresh id for `logical`. The run number is wall-clock milliseconds, bumped so it
    /// is strictly greater than any run number handed out earlier in this process.
    pub fn allocate(logical: &str) -> SlidecastResult<Self> {
        validate_logical_id(logical)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut prev = LAST_RUN.load(Ordering::Relaxed);
        let run = loop {
            let next = now.max(prev + 1);
            match LAST_RUN.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => break next,
                Err(actual) => prev = actual,
            }
        };

        Ok(Self {
            logical: logical.to_string(),
            run,
        })
    }

    pub fn new(logical: &str, run: u64) -> SlidecastResult<Self> {
        validate_logical_id(logical)?;
        Ok(Self {
            logical: logical.to_string(),
            run,
        })
    }

    /// Parse the `{logical}_{run}` form produced by `Display`. The run is the digits after the
    /// last `_`.
    pub fn parse(s: &str) -> Option<Self> {
        let (logical, run) = s.rsplit_once('_')?;
        if run.is_empty() || !run.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::new(logical, run.parse().ok()?).ok()
    }

    pub fn logical(&self) -> &str {
        &self.logical
    }

    pub fn run(&self) -> u64 {
        self.run
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.logical, self.run)
    }
}

/// Reject ids that could escape the layout or break the `%d` frame pattern.
pub fn validate_logical_id(id: &str) -> SlidecastResult<()> {
    if id.is_empty() || id.len() > MAX_LOGICAL_ID_LEN {
        return Err(SlidecastError::validation(format!(
            "logical id must be 1..={MAX_LOGICAL_ID_LEN} characters"
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(SlidecastError::validation(format!(
            "logical id '{id}' may only contain ASCII letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// Root of the per-kind output directories.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Create every directory of the layout.
    pub fn ensure_dirs(&self) -> SlidecastResult<()> {
        for dir in [
            self.frames_dir(),
            self.audio_dir(),
            self.videos_dir(),
            self.thumbnails_dir(),
            self.temp_dir(),
        ] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        }
        Ok(())
    }

    /// Frame file for 1-based `slide_number`.
    pub fn frame_path(&self, id: &ArtifactId, slide_number: usize) -> PathBuf {
        self.frames_dir()
            .join(format!("{id}_slide_{slide_number}.png"))
    }

    /// `%d` pattern matching every [`OutputLayout::frame_path`] of `id`.
    pub fn frame_pattern(&self, id: &ArtifactId) -> PathBuf {
        self.frames_dir().join(format!("{id}_slide_%d.png"))
    }

    /// Staged narration copy. Keeps the source extension so the encoder can sniff the container.
    pub fn narration_path(&self, id: &ArtifactId, source: &Path) -> PathBuf {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.bytes().all(|b| b.is_ascii_alphanumeric()))
            .unwrap_or("wav");
        self.audio_dir().join(format!("{id}.{ext}"))
    }

    pub fn video_path(&self, id: &ArtifactId) -> PathBuf {
        self.videos_dir().join(format!("{id}.mp4"))
    }

    pub fn thumbnail_path(&self, id: &ArtifactId) -> PathBuf {
        self.thumbnails_dir().join(format!("{id}_thumbnail.jpg"))
    }

    /// Where the encoder writes the video before the run is promoted.
    pub fn staging_video_path(&self, id: &ArtifactId) -> PathBuf {
        self.temp_dir().join(format!("{id}.mp4"))
    }

    pub fn staging_thumbnail_path(&self, id: &ArtifactId) -> PathBuf {
        self.temp_dir().join(format!("{id}_thumbnail.jpg"))
    }

    pub fn manifest_path(&self, id: &ArtifactId) -> PathBuf {
        self.temp_dir().join(format!("{id}_slides.txt"))
    }

    /// Newest finished video for `logical`, found by scanning the videos directory.
    pub fn latest_video(&self, logical: &str) -> Option<(ArtifactId, PathBuf)> {
        self.latest_in(&self.videos_dir(), logical, ".mp4")
    }

    /// Newest thumbnail for `logical`, found by scanning the thumbnails directory.
    pub fn latest_thumbnail(&self, logical: &str) -> Option<(ArtifactId, PathBuf)> {
        self.latest_in(&self.thumbnails_dir(), logical, "_thumbnail.jpg")
    }

    fn latest_in(&self, dir: &Path, logical: &str, suffix: &str) -> Option<(ArtifactId, PathBuf)> {
        validate_logical_id(logical).ok()?;
        let prefix = format!("{logical}_");
        let rd = std::fs::read_dir(dir).ok()?;

        rd.flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                let run = name
                    .strip_prefix(&prefix)?
                    .strip_suffix(suffix)?
                    .parse::<u64>()
                    .ok()?;
                Some((run, entry.path()))
            })
            .filter(|(_, path)| path.is_file())
            .max_by_key(|(run, _)| *run)
            .map(|(run, path)| {
                (
                    ArtifactId {
                        logical: logical.to_string(),
                        run,
                    },
                    path,
                )
            })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/layout.rs"]
mod tests;

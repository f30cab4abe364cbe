use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::foundation::layout::validate_logical_id;

/// One slide of a lesson outline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// Position in the outline as given by the upstream producer. Informational only; slides are
    /// rendered in sequence order.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "key_points")]
    pub bullet_points: Vec<String>,
    #[serde(default, alias = "narration_script", skip_serializing_if = "Option::is_none")]
    pub narration_hint: Option<String>,
}

impl Slide {
    /// Title to render, falling back to `Slide {n}` for a blank title.
    pub fn display_title(&self, slide_number: usize) -> String {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            format!("Slide {slide_number}")
        } else {
            trimmed.to_string()
        }
    }
}

/// Normalized input produced by the upstream drafting/synthesis collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LessonPackage {
    /// Logical lesson id; names every artifact of the run.
    pub id: String,
    pub slides: Vec<Slide>,
    #[serde(default, alias = "script")]
    pub full_narration_text: String,
    pub target_duration_seconds: u32,
}

impl LessonPackage {
    pub fn from_json_str(s: &str) -> SlidecastResult<Self> {
        let pkg: Self = serde_json::from_str(s)
            .map_err(|e| SlidecastError::validation(format!("invalid lesson package json: {e}")))?;
        pkg.validate()?;
        Ok(pkg)
    }

    pub fn from_path(path: &Path) -> SlidecastResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read lesson package '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> SlidecastResult<()> {
        validate_logical_id(&self.id)?;
        if self.slides.is_empty() {
            return Err(SlidecastError::validation(
                "lesson package must contain at least one slide",
            ));
        }
        if self.target_duration_seconds == 0 {
            return Err(SlidecastError::validation(
                "target_duration_seconds must be > 0",
            ));
        }
        Ok(())
    }
}

/// Duration allotted to one slide. Derived by the planner, never persisted on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideTiming {
    pub slide_index: usize,
    pub duration_seconds: u32,
}

/// Object-storage coordinates of an uploaded file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObjectRef {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
}

/// Where one file of a [`MediaArtifact`] can be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactLocation {
    /// File stays on local disk and is served by this process at `endpoint`.
    Local { path: PathBuf, endpoint: String },
    /// File lives in durable storage at a public URL.
    Remote { url: String, object: StoredObjectRef },
}

impl ArtifactLocation {
    /// URL or endpoint path a client should fetch.
    pub fn href(&self) -> &str {
        match self {
            Self::Local { endpoint, .. } => endpoint,
            Self::Remote { url, .. } => url,
        }
    }
}

/// Finished video plus thumbnail for one run. Immutable once published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaArtifact {
    pub artifact_id: String,
    pub logical_id: String,
    pub video: ArtifactLocation,
    pub thumbnail: ArtifactLocation,
    pub duration_seconds: f64,
    pub slide_count: usize,
}

#[cfg(test)]
#[path = "../tests/unit/model.rs"]
mod tests;

//! Where finished artifacts go and how they are found again.
//!
//! Exactly one [`ArtifactSink`] is chosen when the process starts: [`LocalSink`] keeps files on
//! disk for the range server, [`DurableSink`] uploads them to object storage. Both remember what
//! this process published; lookups accept either a full artifact id (`{logical}_{run}`) or a
//! logical id, which resolves to that lesson's newest run.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use serde::Serialize;

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::foundation::layout::{ArtifactId, OutputLayout, validate_logical_id};
use crate::model::{ArtifactLocation, MediaArtifact, StoredObjectRef};
use crate::store::object::ObjectStore;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Local,
    Durable,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Durable => "durable",
        }
    }
}

/// How a retrieval request is answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Stream this file from disk.
    Local {
        path: PathBuf,
        content_type: &'static str,
    },
    /// Send the client to this public URL.
    Remote { url: String },
}

/// Output of a successful encode, before publication.
#[derive(Clone, Debug)]
pub struct EncodedArtifact {
    pub id: ArtifactId,
    pub video_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub duration_seconds: f64,
    pub slide_count: usize,
}

pub trait ArtifactSink: Send + Sync {
    fn mode(&self) -> DeliveryMode;

    /// Make `encoded` retrievable. Only called after encoding succeeded end to end.
    fn publish(&self, encoded: &EncodedArtifact) -> SlidecastResult<MediaArtifact>;

    fn locate_video(&self, id: &str) -> SlidecastResult<Delivery>;

    fn locate_thumbnail(&self, id: &str) -> SlidecastResult<Delivery>;

    /// Artifacts published by this process, oldest first, at most [`REGISTRY_CAPACITY`].
    fn list(&self) -> Vec<MediaArtifact>;
}

/// Artifacts remembered per process. The oldest entries are forgotten past this many; local
/// lookups still find them on disk, durable video lookups answer not-found.
pub const REGISTRY_CAPACITY: usize = 4096;

#[derive(Debug, Default)]
struct Registry {
    published: RwLock<VecDeque<MediaArtifact>>,
}

impl Registry {
    fn insert(&self, artifact: MediaArtifact) {
        let mut published = self.published.write().unwrap_or_else(|e| e.into_inner());
        if published.len() >= REGISTRY_CAPACITY {
            published.pop_front();
        }
        published.push_back(artifact);
    }

    fn find(&self, id: &str) -> Option<MediaArtifact> {
        let published = self.published.read().unwrap_or_else(|e| e.into_inner());
        published
            .iter()
            .rev()
            .find(|a| a.artifact_id == id)
            .or_else(|| published.iter().rev().find(|a| a.logical_id == id))
            .cloned()
    }

    fn all(&self) -> Vec<MediaArtifact> {
        self.published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

fn require_file(path: &std::path::Path, what: &str) -> SlidecastResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SlidecastError::storage(
            "publish",
            format!("{what} '{}' does not exist", path.display()),
        ))
    }
}

/// Files stay under the output layout and are served by this process.
#[derive(Debug)]
pub struct LocalSink {
    layout: OutputLayout,
    base_path: String,
    registry: Registry,
}

impl LocalSink {
    /// `base_path` prefixes the retrieval endpoints recorded in published artifacts (e.g. `/api`).
    pub fn new(layout: OutputLayout, base_path: &str) -> Self {
        Self {
            layout,
            base_path: base_path.trim_end_matches('/').to_string(),
            registry: Registry::default(),
        }
    }

    fn endpoint(&self, kind: &str, artifact_id: &str) -> String {
        format!("{}/{kind}/{artifact_id}", self.base_path)
    }

    fn locate(
        &self,
        id: &str,
        from_artifact: impl Fn(&MediaArtifact) -> &ArtifactLocation,
        exact: impl Fn(&ArtifactId) -> PathBuf,
        latest: impl Fn(&str) -> Option<(ArtifactId, PathBuf)>,
        content_type: &'static str,
    ) -> SlidecastResult<Delivery> {
        if validate_logical_id(id).is_err() {
            return Err(SlidecastError::not_found(id));
        }

        let registered = self.registry.find(id).and_then(|a| match from_artifact(&a) {
            ArtifactLocation::Local { path, .. } if path.is_file() => Some(path.clone()),
            _ => None,
        });
        let path = registered
            .or_else(|| {
                ArtifactId::parse(id)
                    .map(|parsed| exact(&parsed))
                    .filter(|p| p.is_file())
            })
            .or_else(|| latest(id).map(|(_, path)| path));

        match path {
            Some(path) => Ok(Delivery::Local { path, content_type }),
            None => Err(SlidecastError::not_found(id)),
        }
    }
}

impl ArtifactSink for LocalSink {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Local
    }

    fn publish(&self, encoded: &EncodedArtifact) -> SlidecastResult<MediaArtifact> {
        require_file(&encoded.video_path, "video")?;
        require_file(&encoded.thumbnail_path, "thumbnail")?;

        let artifact_id = encoded.id.to_string();
        let artifact = MediaArtifact {
            video: ArtifactLocation::Local {
                path: encoded.video_path.clone(),
                endpoint: self.endpoint("videos", &artifact_id),
            },
            thumbnail: ArtifactLocation::Local {
                path: encoded.thumbnail_path.clone(),
                endpoint: self.endpoint("thumbnails", &artifact_id),
            },
            artifact_id,
            logical_id: encoded.id.logical().to_string(),
            duration_seconds: encoded.duration_seconds,
            slide_count: encoded.slide_count,
        };
        self.registry.insert(artifact.clone());
        tracing::info!(artifact_id = %artifact.artifact_id, "artifact published locally");
        Ok(artifact)
    }

    fn locate_video(&self, id: &str) -> SlidecastResult<Delivery> {
        self.locate(
            id,
            |a| &a.video,
            |parsed| self.layout.video_path(parsed),
            |logical| self.layout.latest_video(logical),
            VIDEO_CONTENT_TYPE,
        )
    }

    fn locate_thumbnail(&self, id: &str) -> SlidecastResult<Delivery> {
        self.locate(
            id,
            |a| &a.thumbnail,
            |parsed| self.layout.thumbnail_path(parsed),
            |logical| self.layout.latest_thumbnail(logical),
            THUMBNAIL_CONTENT_TYPE,
        )
    }

    fn list(&self) -> Vec<MediaArtifact> {
        self.registry.all()
    }
}

/// Bucket names and key namespace for durable uploads.
#[derive(Clone, Debug)]
pub struct DurableTargets {
    pub videos_bucket: String,
    pub images_bucket: String,
    /// Optional leading key segment, e.g. an environment name.
    pub key_prefix: Option<String>,
}

impl Default for DurableTargets {
    fn default() -> Self {
        Self {
            videos_bucket: "videos".to_string(),
            images_bucket: "images".to_string(),
            key_prefix: None,
        }
    }
}

impl DurableTargets {
    fn key(&self, logical: &str, filename: &str) -> String {
        match self.key_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{logical}/{filename}"),
            _ => format!("{logical}/{filename}"),
        }
    }

    /// `{logical}/{logical}_{run}.mp4`
    pub fn video_key(&self, id: &ArtifactId) -> String {
        self.key(id.logical(), &format!("{id}.mp4"))
    }

    /// `{logical}/{logical}_thumbnail.jpg`. Fixed per lesson so it can be derived without a
    /// lookup; a newer run overwrites it.
    pub fn thumbnail_key(&self, logical: &str) -> String {
        self.key(logical, &format!("{logical}_thumbnail.jpg"))
    }
}

/// Uploads every artifact to object storage and hands out public URLs.
pub struct DurableSink<S> {
    store: S,
    targets: DurableTargets,
    ensured: Mutex<HashSet<String>>,
    registry: Registry,
}

impl<S: ObjectStore> DurableSink<S> {
    pub fn new(store: S, targets: DurableTargets) -> Self {
        Self {
            store,
            targets,
            ensured: Mutex::new(HashSet::new()),
            registry: Registry::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The lock is not held across the storage call; racing publishers may both ensure the
    /// same bucket, which the store tolerates.
    fn ensure_bucket_once(&self, bucket: &str) -> SlidecastResult<()> {
        let known = self
            .ensured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(bucket);
        if known {
            return Ok(());
        }
        self.store.ensure_bucket(bucket, true)?;
        self.ensured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(bucket.to_string());
        Ok(())
    }

    fn upload(
        &self,
        bucket: &str,
        key: String,
        source: &std::path::Path,
        content_type: &str,
    ) -> SlidecastResult<ArtifactLocation> {
        self.ensure_bucket_once(bucket)?;
        let url = self.store.upload(bucket, &key, source, content_type)?;
        tracing::debug!(bucket, key = %key, "object uploaded");
        Ok(ArtifactLocation::Remote {
            url,
            object: StoredObjectRef {
                bucket: bucket.to_string(),
                key,
                content_type: content_type.to_string(),
            },
        })
    }
}

impl<S: ObjectStore> ArtifactSink for DurableSink<S> {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Durable
    }

    fn publish(&self, encoded: &EncodedArtifact) -> SlidecastResult<MediaArtifact> {
        require_file(&encoded.video_path, "video")?;
        require_file(&encoded.thumbnail_path, "thumbnail")?;

        let logical = encoded.id.logical();
        let video = self.upload(
            &self.targets.videos_bucket,
            self.targets.video_key(&encoded.id),
            &encoded.video_path,
            VIDEO_CONTENT_TYPE,
        )?;
        let thumbnail = self.upload(
            &self.targets.images_bucket,
            self.targets.thumbnail_key(logical),
            &encoded.thumbnail_path,
            THUMBNAIL_CONTENT_TYPE,
        )?;

        let artifact = MediaArtifact {
            artifact_id: encoded.id.to_string(),
            logical_id: logical.to_string(),
            video,
            thumbnail,
            duration_seconds: encoded.duration_seconds,
            slide_count: encoded.slide_count,
        };
        self.registry.insert(artifact.clone());
        tracing::info!(
            artifact_id = %artifact.artifact_id,
            video_url = artifact.video.href(),
            "artifact uploaded"
        );
        Ok(artifact)
    }

    fn locate_video(&self, id: &str) -> SlidecastResult<Delivery> {
        match self.registry.find(id) {
            Some(a) => Ok(Delivery::Remote {
                url: a.video.href().to_string(),
            }),
            None => Err(SlidecastError::not_found(id)),
        }
    }

    fn locate_thumbnail(&self, id: &str) -> SlidecastResult<Delivery> {
        if let Some(a) = self.registry.find(id) {
            return Ok(Delivery::Remote {
                url: a.thumbnail.href().to_string(),
            });
        }
        if validate_logical_id(id).is_err() {
            return Err(SlidecastError::not_found(id));
        }
        // The thumbnail key is a naming convention, so it can be derived for lessons published
        // by an earlier process. A full artifact id maps to its lesson; a logical id that merely
        // looks like one (`unit_2`) is tried as given afterwards.
        let parsed = ArtifactId::parse(id);
        let candidates = parsed
            .as_ref()
            .map(|p| p.logical())
            .into_iter()
            .chain(std::iter::once(id));
        let bucket = &self.targets.images_bucket;
        for logical in candidates {
            let key = self.targets.thumbnail_key(logical);
            if !self.store.exists(bucket, &key)? {
                continue;
            }
            if let Some(url) = self.store.public_url(bucket, &key) {
                return Ok(Delivery::Remote { url });
            }
        }
        Err(SlidecastError::not_found(id))
    }

    fn list(&self) -> Vec<MediaArtifact> {
        self.registry.all()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/sink.rs"]
mod tests;

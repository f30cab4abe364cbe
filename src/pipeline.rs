use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::config::AppConfig;
use crate::encode::ffmpeg::{AssemblyJob, Encoder, TempFileGuard};
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::foundation::layout::{ArtifactId, OutputLayout};
use crate::model::{LessonPackage, MediaArtifact};
use crate::planner::plan_for_package;
use crate::raster::slide::Rasterizer;
use crate::store::object::SupabaseStorage;
use crate::store::sink::{ArtifactSink, DurableSink, EncodedArtifact, LocalSink};

/// One lesson package plus narration in, one published [`MediaArtifact`] out.
///
/// Stages run in order: plan, rasterize (parallel across slides), assemble, thumbnail, probe,
/// publish. Any failure aborts the run before publication.
pub struct Pipeline {
    layout: OutputLayout,
    rasterizer: Rasterizer,
    encoder: Encoder,
    sink: Arc<dyn ArtifactSink>,
}

impl Pipeline {
    pub fn new(
        layout: OutputLayout,
        rasterizer: Rasterizer,
        encoder: Encoder,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            layout,
            rasterizer,
            encoder,
            sink,
        }
    }

    /// Build every stage from configuration. The delivery mode is decided here, once.
    ///
    /// Must be called outside an async runtime when durable storage is configured.
    pub fn from_config(cfg: &AppConfig) -> SlidecastResult<Self> {
        let layout = OutputLayout::new(&cfg.output_root);
        let rasterizer = Rasterizer::new(&cfg.render.rasterizer_opts())?;
        let encoder = Encoder::new(
            cfg.encoder.encoder_opts(),
            Arc::new(cfg.encoder.tool_runner()),
        );

        let sink: Arc<dyn ArtifactSink> = match cfg.durable_storage() {
            Some(storage) => {
                tracing::info!(url = %storage.url, videos = %storage.videos_bucket, images = %storage.images_bucket, "durable delivery");
                let store = SupabaseStorage::new(&storage.url, &storage.service_key)?;
                Arc::new(DurableSink::new(store, storage.targets()))
            }
            None => {
                tracing::info!(root = %layout.root().display(), "local delivery");
                Arc::new(LocalSink::new(
                    layout.clone(),
                    &cfg.server.public_base_path,
                ))
            }
        };

        Ok(Self::new(layout, rasterizer, encoder, sink))
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn sink(&self) -> &Arc<dyn ArtifactSink> {
        &self.sink
    }

    /// Run the whole pipeline. `narration` is copied into the run's audio slot and that copy is
    /// removed on every exit path; the caller's file is left alone.
    #[tracing::instrument(skip_all, fields(lesson = %package.id, slides = package.slides.len()))]
    pub fn run(&self, package: &LessonPackage, narration: &Path) -> SlidecastResult<MediaArtifact> {
        package.validate()?;
        if !narration.is_file() {
            return Err(SlidecastError::validation(format!(
                "narration audio '{}' does not exist",
                narration.display()
            )));
        }

        let plan = plan_for_package(package);
        let id = ArtifactId::allocate(&package.id)?;
        tracing::info!(
            artifact_id = %id,
            per_slide_seconds = plan.per_slide_duration_seconds,
            "run started"
        );
        self.layout.ensure_dirs()?;

        let staged_audio = self.layout.narration_path(&id, narration);
        let _staged_guard = TempFileGuard(Some(staged_audio.clone()));
        std::fs::copy(narration, &staged_audio).with_context(|| {
            format!(
                "stage narration '{}' to '{}'",
                narration.display(),
                staged_audio.display()
            )
        })?;

        let frames = self
            .rasterizer
            .render_all(&package.slides, &self.layout, &id)?;

        let staged_video = self.layout.staging_video_path(&id);
        let _video_guard = TempFileGuard(Some(staged_video.clone()));
        let frame_pattern = self.layout.frame_pattern(&id);
        let manifest_path = self.layout.manifest_path(&id);
        self.encoder.assemble_video(&AssemblyJob {
            frames: &frames,
            frame_pattern: &frame_pattern,
            audio: &staged_audio,
            per_slide_duration_seconds: plan.per_slide_duration_seconds,
            output: &staged_video,
            manifest_path: &manifest_path,
        })?;

        let staged_thumbnail = self.layout.staging_thumbnail_path(&id);
        let _thumbnail_guard = TempFileGuard(Some(staged_thumbnail.clone()));
        self.encoder
            .extract_thumbnail(&staged_video, &staged_thumbnail)?;

        let duration_seconds = match self.encoder.probe_duration(&staged_video) {
            Ok(d) => d,
            Err(err) => {
                let fallback = f64::from(plan.per_slide_duration_seconds) * frames.len() as f64;
                tracing::warn!(error = %err, fallback, "duration probe failed, using planned length");
                fallback
            }
        };

        // Encoding finished: move both files where lookups can see them. They are removed
        // again if publication fails.
        let video_path = self.layout.video_path(&id);
        let mut video_out = promote(&staged_video, &video_path)?;
        let thumbnail_path = self.layout.thumbnail_path(&id);
        let mut thumbnail_out = promote(&staged_thumbnail, &thumbnail_path)?;

        let artifact = self.sink.publish(&EncodedArtifact {
            id,
            video_path,
            thumbnail_path,
            duration_seconds,
            slide_count: frames.len(),
        })?;
        video_out.0.take();
        thumbnail_out.0.take();
        Ok(artifact)
    }
}

/// Rename a finished file into its final slot. The returned guard removes it again unless the
/// caller disarms it.
fn promote(staged: &Path, target: &Path) -> SlidecastResult<TempFileGuard> {
    std::fs::rename(staged, target)
        .with_context(|| format!("move '{}' to '{}'", staged.display(), target.display()))?;
    Ok(TempFileGuard(Some(target.to_path_buf())))
}

use axum::body::to_bytes;
use axum::http::Request;
use tower::ServiceExt as _;

use super::*;
use crate::encode::ffmpeg::{Encoder, EncoderOpts};
use crate::encode::process::{ToolInvocation, ToolOutput, ToolRunner};
use crate::foundation::layout::{ArtifactId, OutputLayout};
use crate::raster::slide::Rasterizer;
use crate::store::object::ObjectStore;
use crate::store::sink::{ArtifactSink, DurableSink, DurableTargets, LocalSink};

struct NoTools;

impl ToolRunner for NoTools {
    fn run(&self, _: &ToolInvocation) -> SlidecastResult<ToolOutput> {
        Ok(ToolOutput {
            exit_code: Some(1),
            ..Default::default()
        })
    }
}

struct LinkOnlyStore;

impl ObjectStore for LinkOnlyStore {
    fn ensure_bucket(&self, _: &str, _: bool) -> SlidecastResult<()> {
        Ok(())
    }

    fn upload(&self, bucket: &str, key: &str, _: &Path, _: &str) -> SlidecastResult<String> {
        Ok(format!("https://cdn.test/{bucket}/{key}"))
    }

    fn public_url(&self, bucket: &str, key: &str) -> Option<String> {
        Some(format!("https://cdn.test/{bucket}/{key}"))
    }

    fn exists(&self, _: &str, key: &str) -> SlidecastResult<bool> {
        Ok(key.starts_with("intro/"))
    }
}

fn pipeline_with(layout: OutputLayout, sink: Arc<dyn ArtifactSink>) -> Arc<Pipeline> {
    let rasterizer =
        Rasterizer::with_fontdb(Arc::new(usvg::fontdb::Database::new()), Some(1)).unwrap();
    let encoder = Encoder::new(
        EncoderOpts {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ..EncoderOpts::default()
        },
        Arc::new(NoTools),
    );
    Arc::new(Pipeline::new(layout, rasterizer, encoder, sink))
}

/// Local-mode app with a 1000-byte video and a small thumbnail for lesson `intro`, run 7.
fn local_app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(dir.path());
    layout.ensure_dirs().unwrap();
    let id = ArtifactId::new("intro", 7).unwrap();
    let video: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(layout.video_path(&id), &video).unwrap();
    std::fs::write(layout.thumbnail_path(&id), b"jpeg-bytes").unwrap();

    let sink = Arc::new(LocalSink::new(layout.clone(), "/api"));
    (dir, router(pipeline_with(layout, sink), "/api"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_range(uri: &str, range: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

fn header_str<'a>(resp: &'a Response, name: header::HeaderName) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn range_request_returns_exact_partial_content() {
    let (_dir, app) = local_app();
    let resp = app
        .oneshot(get_range("/api/videos/intro", "bytes=0-99"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes 0-99/1000");
    assert_eq!(header_str(&resp, header::ACCEPT_RANGES), "bytes");
    assert_eq!(header_str(&resp, header::CONTENT_LENGTH), "100");
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "video/mp4");

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(body[99], 99);
}

#[tokio::test]
async fn mid_file_range_reads_from_offset() {
    let (_dir, app) = local_app();
    let resp = app
        .oneshot(get_range("/api/videos/intro_7", "bytes=300-"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes 300-999/1000");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 700);
    assert_eq!(body[0], (300 % 251) as u8);
}

#[tokio::test]
async fn no_range_header_returns_whole_file() {
    let (_dir, app) = local_app();
    let resp = app.oneshot(get("/api/videos/intro")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_LENGTH), "1000");
    assert!(resp.headers().get(header::CONTENT_RANGE).is_none());
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 1000);
}

#[tokio::test]
async fn malformed_or_multi_range_falls_back_to_full_body() {
    let (_dir, app) = local_app();
    for range in ["bytes=0-10,20-30", "lines=1-2", "bytes=50-10"] {
        let resp = app
            .clone()
            .oneshot(get_range("/api/videos/intro", range))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{range}");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 1000);
    }
}

#[tokio::test]
async fn unsatisfiable_range_is_416() {
    let (_dir, app) = local_app();
    let resp = app
        .oneshot(get_range("/api/videos/intro", "bytes=1000-"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&resp, header::CONTENT_RANGE), "bytes */1000");
}

#[tokio::test]
async fn unknown_artifact_is_structured_404() {
    let (_dir, app) = local_app();
    for uri in ["/api/videos/never-made", "/api/thumbnails/never-made"] {
        let resp = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.stage, "retrieval");
        assert!(err.details.contains("never-made"));
    }
}

#[tokio::test]
async fn thumbnail_is_served_whole_as_jpeg() {
    let (_dir, app) = local_app();
    let resp = app
        .oneshot(get_range("/api/thumbnails/intro", "bytes=0-1"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::CONTENT_TYPE), "image/jpeg");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"jpeg-bytes");
}

#[tokio::test]
async fn health_reports_mode_and_encoder() {
    let (_dir, app) = local_app();
    let resp = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let health: HealthBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.delivery_mode, "local");
    assert!(!health.ffmpeg_available);
}

#[tokio::test]
async fn artifacts_listing_starts_empty() {
    let (_dir, app) = local_app();
    let resp = app.oneshot(get("/api/artifacts")).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let listed: Vec<MediaArtifact> = serde_json::from_slice(&body).unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn render_rejects_bad_payloads_as_validation() {
    let (dir, app) = local_app();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lessons/render")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"lesson": 3}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let payload = serde_json::json!({
        "lesson": {
            "id": "intro",
            "slides": [{"title": "One", "bullet_points": ["a"]}],
            "full_narration_text": "hello",
            "target_duration_seconds": 45
        },
        "narration_path": dir.path().join("missing.wav"),
    });
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lessons/render")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.stage, "validation");
    assert!(err.details.contains("missing.wav"));
}

#[tokio::test]
async fn durable_mode_redirects_to_public_urls() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(DurableSink::new(LinkOnlyStore, DurableTargets::default()));
    let app = router(pipeline_with(OutputLayout::new(dir.path()), sink), "");

    let resp = app.clone().oneshot(get("/thumbnails/intro")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        header_str(&resp, header::LOCATION),
        "https://cdn.test/images/intro/intro_thumbnail.jpg"
    );

    let resp = app.clone().oneshot(get("/thumbnails/never-made")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.oneshot(get("/videos/intro")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

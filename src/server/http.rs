use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};
use tokio_util::io::ReaderStream;

use crate::encode::process::is_tool_available;
use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::model::{LessonPackage, MediaArtifact};
use crate::pipeline::Pipeline;
use crate::server::range::{RangeError, parse_range, unsatisfied_content_range};
use crate::store::sink::Delivery;

/// Read size for streamed file bodies.
pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

/// All routes, mounted under `base_path` (e.g. `/api`, or `""` for the root).
pub fn router(pipeline: Arc<Pipeline>, base_path: &str) -> Router {
    let base = base_path.trim_end_matches('/');
    Router::new()
        .route(&format!("{base}/lessons/render"), post(render_lesson))
        .route(&format!("{base}/videos/{{id}}"), get(fetch_video))
        .route(&format!("{base}/thumbnails/{{id}}"), get(fetch_thumbnail))
        .route(&format!("{base}/artifacts"), get(list_artifacts))
        .route(&format!("{base}/health"), get(health))
        .with_state(AppState { pipeline })
}

pub async fn serve(addr: SocketAddr, pipeline: Arc<Pipeline>, base_path: &str) -> anyhow::Result<()> {
    let app = router(pipeline, base_path);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, base_path, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server failed")?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub lesson: LessonPackage,
    pub narration_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub stage: String,
    pub details: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub ffmpeg_available: bool,
    pub delivery_mode: String,
}

/// A [`SlidecastError`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub SlidecastError);

impl From<SlidecastError> for ApiError {
    fn from(err: SlidecastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            SlidecastError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid request"),
            SlidecastError::NotFound { .. } => (StatusCode::NOT_FOUND, "artifact not found"),
            SlidecastError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "encoder timed out"),
            SlidecastError::Storage { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "video generation failed"),
        };
        if status.is_server_error() {
            tracing::error!(stage = self.0.stage(), error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: error.to_string(),
            stage: self.0.stage().to_string(),
            details: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn blocking<T, F>(f: F) -> SlidecastResult<T>
where
    F: FnOnce() -> SlidecastResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SlidecastError::Other(anyhow::anyhow!("blocking task failed: {e}")))?
}

async fn render_lesson(
    State(state): State<AppState>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Json<MediaArtifact>, ApiError> {
    let Json(req) = payload.map_err(|e| SlidecastError::validation(e.body_text()))?;
    let pipeline = state.pipeline.clone();
    let artifact = blocking(move || pipeline.run(&req.lesson, &req.narration_path)).await?;
    Ok(Json(artifact))
}

async fn fetch_video(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let pipeline = state.pipeline.clone();
    let delivery = blocking(move || pipeline.sink().locate_video(&id)).await?;
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    Ok(deliver(delivery, range.as_deref()).await?)
}

async fn fetch_thumbnail(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let pipeline = state.pipeline.clone();
    let delivery = blocking(move || pipeline.sink().locate_thumbnail(&id)).await?;
    Ok(deliver(delivery, None).await?)
}

async fn list_artifacts(State(state): State<AppState>) -> Json<Vec<MediaArtifact>> {
    Json(state.pipeline.sink().list())
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let ffmpeg = state.pipeline.encoder().opts().ffmpeg.clone();
    let ffmpeg_available = tokio::task::spawn_blocking(move || is_tool_available(&ffmpeg))
        .await
        .unwrap_or(false);
    Json(HealthBody {
        status: "ok".to_string(),
        ffmpeg_available,
        delivery_mode: state.pipeline.sink().mode().as_str().to_string(),
    })
}

async fn deliver(delivery: Delivery, range: Option<&str>) -> SlidecastResult<Response> {
    match delivery {
        Delivery::Remote { url } => Ok(Redirect::temporary(&url).into_response()),
        Delivery::Local { path, content_type } => stream_file(&path, content_type, range).await,
    }
}

/// Stream `path` from disk, honoring a single byte range when `range` is given.
pub async fn stream_file(
    path: &Path,
    content_type: &'static str,
    range: Option<&str>,
) -> SlidecastResult<Response> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("open '{}'", path.display()))?;
    let total = file
        .metadata()
        .await
        .with_context(|| format!("stat '{}'", path.display()))?
        .len();

    let range = match range.map(|h| parse_range(h, total)) {
        None | Some(Err(RangeError::Malformed)) => None,
        Some(Ok(r)) => Some(r),
        Some(Err(RangeError::Unsatisfiable)) => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [
                    (header::CONTENT_RANGE, unsatisfied_content_range(total)),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
            )
                .into_response());
        }
    };

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
        .header(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let response = match range {
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total)
            .body(Body::from_stream(ReaderStream::with_capacity(
                file,
                STREAM_CHUNK_BYTES,
            ))),
        Some(r) => {
            file.seek(SeekFrom::Start(r.start))
                .await
                .with_context(|| format!("seek '{}' to {}", path.display(), r.start))?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_LENGTH, r.len())
                .header(header::CONTENT_RANGE, r.content_range(total))
                .body(Body::from_stream(ReaderStream::with_capacity(
                    file.take(r.len()),
                    STREAM_CHUNK_BYTES,
                )))
        }
    };
    response.map_err(|e| SlidecastError::Other(anyhow::anyhow!("build response: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/server/http.rs"]
mod tests;

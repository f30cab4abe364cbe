//! Durable object storage collaborator.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::foundation::error::{SlidecastError, SlidecastResult};

/// Minimal object-storage surface the durable sink needs.
pub trait ObjectStore: Send + Sync {
    /// Make sure `bucket` exists, creating it when absent; when `public` is set an existing
    /// private bucket is switched to public.
    fn ensure_bucket(&self, bucket: &str, public: bool) -> SlidecastResult<()>;

    /// Upload (upsert) the file at `source` under `bucket/key`, returning its public URL.
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> SlidecastResult<String>;

    /// Public URL for `bucket/key`. Does not check that the object exists.
    fn public_url(&self, bucket: &str, key: &str) -> Option<String>;

    /// Whether `bucket/key` currently holds an object.
    fn exists(&self, bucket: &str, key: &str) -> SlidecastResult<bool>;
}

/// Supabase Storage over its REST API.
pub struct SupabaseStorage {
    base_url: String,
    service_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BucketInfo {
    #[serde(default)]
    public: bool,
}

impl SupabaseStorage {
    /// Must be called outside an async context: the blocking client owns its own runtime.
    pub fn new(base_url: &str, service_key: &str) -> SlidecastResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| SlidecastError::storage("build http client", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/storage/v1/{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    fn get_bucket(&self, bucket: &str) -> SlidecastResult<Option<BucketInfo>> {
        let resp = self
            .authed(self.client.get(self.endpoint(&format!("bucket/{bucket}"))))
            .send()
            .map_err(|e| SlidecastError::storage("get bucket", e))?;

        let status = resp.status();
        if status.is_success() {
            let info = resp
                .json::<BucketInfo>()
                .map_err(|e| SlidecastError::storage("get bucket", e))?;
            return Ok(Some(info));
        }
        // Supabase answers a missing bucket with 404, or 400 with a "not found" body.
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        Err(SlidecastError::storage(
            "get bucket",
            format!("{status}: {}", resp.text().unwrap_or_default()),
        ))
    }
}

impl ObjectStore for SupabaseStorage {
    fn ensure_bucket(&self, bucket: &str, public: bool) -> SlidecastResult<()> {
        match self.get_bucket(bucket)? {
            Some(info) => {
                if public && !info.public {
                    let resp = self
                        .authed(self.client.put(self.endpoint(&format!("bucket/{bucket}"))))
                        .json(&serde_json::json!({ "id": bucket, "public": true }))
                        .send()
                        .map_err(|e| SlidecastError::storage("update bucket", e))?;
                    check_status("update bucket", resp)?;
                    tracing::info!(bucket, "bucket switched to public");
                }
                Ok(())
            }
            None => {
                let resp = self
                    .authed(self.client.post(self.endpoint("bucket")))
                    .json(&serde_json::json!({ "id": bucket, "name": bucket, "public": public }))
                    .send()
                    .map_err(|e| SlidecastError::storage("create bucket", e))?;
                // 409: another process created it first.
                if resp.status() == StatusCode::CONFLICT {
                    return Ok(());
                }
                check_status("create bucket", resp)?;
                tracing::info!(bucket, public, "bucket created");
                Ok(())
            }
        }
    }

    fn upload(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> SlidecastResult<String> {
        let file = std::fs::File::open(source)
            .map_err(|e| SlidecastError::storage(format!("open '{}'", source.display()), e))?;
        let len = file
            .metadata()
            .map_err(|e| SlidecastError::storage(format!("stat '{}'", source.display()), e))?
            .len();

        let resp = self
            .authed(
                self.client
                    .post(self.endpoint(&format!("object/{bucket}/{key}"))),
            )
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(reqwest::blocking::Body::sized(file, len))
            .send()
            .map_err(|e| SlidecastError::storage("upload", e))?;
        check_status("upload", resp)?;

        self.public_url(bucket, key)
            .ok_or_else(|| SlidecastError::storage("public url", "no public url for object"))
    }

    fn public_url(&self, bucket: &str, key: &str) -> Option<String> {
        Some(self.endpoint(&format!("object/public/{bucket}/{key}")))
    }

    fn exists(&self, bucket: &str, key: &str) -> SlidecastResult<bool> {
        let resp = self
            .authed(
                self.client
                    .head(self.endpoint(&format!("object/{bucket}/{key}"))),
            )
            .send()
            .map_err(|e| SlidecastError::storage("head object", e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }
        // Same 400/404 ambiguity as buckets.
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(false);
        }
        Err(SlidecastError::storage("head object", status.to_string()))
    }
}

fn check_status(operation: &str, resp: reqwest::blocking::Response) -> SlidecastResult<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().unwrap_or_default();
    Err(SlidecastError::storage(
        operation,
        format!("{status}: {}", body.trim()),
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/store/object.rs"]
mod tests;

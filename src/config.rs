//! Process configuration: an optional TOML file, then environment overrides.
//!
//! ```toml
//! output_root = "outputs"
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! public_base_path = "/api"
//!
//! [encoder]
//! strategy = "manifest"
//! timeout_secs = 900
//!
//! [storage]
//! url = "https://project.supabase.co"
//! service_key = "..."
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::encode::ffmpeg::{EncoderOpts, MuxStrategy};
use crate::encode::process::{DEFAULT_DIAGNOSTICS_LIMIT, SystemToolRunner};
use crate::raster::slide::RasterizerOpts;
use crate::store::sink::DurableTargets;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "AppConfig::default_output_root")]
    pub output_root: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Durable delivery is used only when this is present with both `url` and `service_key` set.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_root: Self::default_output_root(),
            server: ServerConfig::default(),
            render: RenderConfig::default(),
            encoder: EncoderConfig::default(),
            storage: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    fn default_output_root() -> PathBuf {
        PathBuf::from("outputs")
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("parse config toml")
    }

    /// Read `path` when given (defaults otherwise) and apply process environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read config '{}'", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("load config '{}'", path.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply the recognised environment variables through `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("SLIDECAST_OUTPUT_ROOT") {
            self.output_root = PathBuf::from(root);
        }
        if let Some(bind) = get("SLIDECAST_BIND") {
            self.server.bind = bind
                .parse()
                .with_context(|| format!("SLIDECAST_BIND '{bind}' is not a socket address"))?;
        }

        let url = get("SUPABASE_URL");
        let key = get("SUPABASE_SERVICE_ROLE_KEY").or_else(|| get("SUPABASE_ANON_KEY"));
        let videos = get("SUPABASE_BUCKET_VIDEOS");
        let images = get("SUPABASE_BUCKET_IMAGES");
        if url.is_some() || key.is_some() || videos.is_some() || images.is_some() {
            let storage = self.storage.get_or_insert_with(StorageConfig::default);
            if let Some(url) = url {
                storage.url = url;
            }
            if let Some(key) = key {
                storage.service_key = key;
            }
            if let Some(videos) = videos {
                storage.videos_bucket = videos;
            }
            if let Some(images) = images {
                storage.images_bucket = images;
            }
        }
        Ok(())
    }

    /// Storage settings when durable delivery is fully configured.
    pub fn durable_storage(&self) -> Option<&StorageConfig> {
        self.storage
            .as_ref()
            .filter(|s| !s.url.trim().is_empty() && !s.service_key.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: SocketAddr,
    /// Prefix of every route and of the endpoints recorded in local artifacts.
    #[serde(default = "ServerConfig::default_public_base_path")]
    pub public_base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            public_base_path: Self::default_public_base_path(),
        }
    }
}

impl ServerConfig {
    fn default_bind() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 5000))
    }

    fn default_public_base_path() -> String {
        "/api".to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub fonts_dir: Option<PathBuf>,
}

impl RenderConfig {
    pub fn rasterizer_opts(&self) -> RasterizerOpts {
        RasterizerOpts {
            threads: self.threads,
            fonts_dir: self.fonts_dir.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default = "EncoderConfig::default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "EncoderConfig::default_ffprobe")]
    pub ffprobe: PathBuf,
    #[serde(default)]
    pub strategy: MuxStrategy,
    #[serde(default = "EncoderConfig::default_output_fps")]
    pub output_fps: u32,
    /// Per child process. `0` disables the limit.
    #[serde(default = "EncoderConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "EncoderConfig::default_diagnostics_limit")]
    pub diagnostics_limit: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: Self::default_ffmpeg(),
            ffprobe: Self::default_ffprobe(),
            strategy: MuxStrategy::default(),
            output_fps: Self::default_output_fps(),
            timeout_secs: Self::default_timeout_secs(),
            diagnostics_limit: Self::default_diagnostics_limit(),
        }
    }
}

impl EncoderConfig {
    fn default_ffmpeg() -> PathBuf {
        PathBuf::from("ffmpeg")
    }

    fn default_ffprobe() -> PathBuf {
        PathBuf::from("ffprobe")
    }

    const fn default_output_fps() -> u32 {
        30
    }

    const fn default_timeout_secs() -> u64 {
        600
    }

    const fn default_diagnostics_limit() -> usize {
        DEFAULT_DIAGNOSTICS_LIMIT
    }

    pub fn encoder_opts(&self) -> EncoderOpts {
        EncoderOpts {
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            strategy: self.strategy,
            output_fps: self.output_fps,
            ..EncoderOpts::default()
        }
    }

    pub fn tool_runner(&self) -> SystemToolRunner {
        SystemToolRunner {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            diagnostics_limit: self.diagnostics_limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "StorageConfig::default_videos_bucket")]
    pub videos_bucket: String,
    #[serde(default = "StorageConfig::default_images_bucket")]
    pub images_bucket: String,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            videos_bucket: Self::default_videos_bucket(),
            images_bucket: Self::default_images_bucket(),
            key_prefix: None,
        }
    }
}

impl StorageConfig {
    fn default_videos_bucket() -> String {
        "videos".to_string()
    }

    fn default_images_bucket() -> String {
        "images".to_string()
    }

    pub fn targets(&self) -> DurableTargets {
        DurableTargets {
            videos_bucket: self.videos_bucket.clone(),
            images_bucket: self.images_bucket.clone(),
            key_prefix: self.key_prefix.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;

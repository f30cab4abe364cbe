use std::time::Duration;

/// Convenience result type used across slidecast.
pub type SlidecastResult<T> = Result<T, SlidecastError>;

/// Top-level error taxonomy. Each variant names the pipeline stage that failed.
#[derive(thiserror::Error, Debug)]
pub enum SlidecastError {
    /// Invalid caller-provided data (lesson package, ids, encoder inputs).
    #[error("validation error: {0}")]
    Validation(String),

    /// A slide could not be composed or rasterized. Aborts the whole run.
    #[error("rasterization error on slide {slide_index}: {cause}")]
    Rasterization { slide_index: usize, cause: String },

    /// The external encoder exited unsuccessfully. `diagnostics` is its captured stderr tail.
    #[error("encoding error (exit code {}): {diagnostics}", fmt_exit_code(.exit_code))]
    Encoding {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// An external tool exceeded its time budget and was killed.
    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    /// Durable storage rejected or failed an operation.
    #[error("storage error during {operation}: {cause}")]
    Storage { operation: String, cause: String },

    #[error("artifact not found: {artifact_id}")]
    NotFound { artifact_id: String },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

impl SlidecastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn rasterization(slide_index: usize, cause: impl std::fmt::Display) -> Self {
        Self::Rasterization {
            slide_index,
            cause: cause.to_string(),
        }
    }

    pub fn storage(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    pub fn not_found(artifact_id: impl Into<String>) -> Self {
        Self::NotFound {
            artifact_id: artifact_id.into(),
        }
    }

    /// Short stage label used in structured error responses.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Rasterization { .. } => "rasterization",
            Self::Encoding { .. } | Self::Timeout { .. } => "encoding",
            Self::Storage { .. } => "storage",
            Self::NotFound { .. } => "retrieval",
            Self::Other(_) => "internal",
        }
    }

    /// Whether re-running the same request may succeed without any input change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

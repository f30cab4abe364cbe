//! HTTP delivery of artifacts.

/// axum router and handlers.
pub mod http;
/// `Range` header parsing.
pub mod range;

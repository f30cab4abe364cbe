//! Slide rasterization.
//!
//! A slide is composed as an SVG document with character-count text layout, then rendered to a
//! 1920x1080 PNG frame.

/// SVG composition and PNG rendering.
pub mod slide;
/// Escaping, truncation and greedy word wrap.
pub mod text;

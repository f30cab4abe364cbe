//! Slidecast turns a lesson outline plus a narration track into a slideshow video.
//!
//! - [`planner`] sizes the outline and times each slide
//! - [`raster`] renders slides into 1920x1080 frames
//! - [`encode`] muxes frames and narration with `ffmpeg` and extracts a thumbnail
//! - [`store`] publishes the result to local disk or object storage
//! - [`server`] serves published artifacts over HTTP with byte-range support
//!
//! [`Pipeline`] wires the stages together.
#![forbid(unsafe_code)]

pub mod config;
pub mod encode;
pub mod foundation;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod raster;
pub mod server;
pub mod store;

pub use crate::config::AppConfig;
pub use crate::encode::ffmpeg::{AssemblyJob, Encoder, EncoderOpts, MuxStrategy};
pub use crate::encode::process::{SystemToolRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use crate::foundation::error::{SlidecastError, SlidecastResult};
pub use crate::foundation::layout::{ArtifactId, OutputLayout};
pub use crate::model::{
    ArtifactLocation, LessonPackage, MediaArtifact, Slide, SlideTiming, StoredObjectRef,
};
pub use crate::pipeline::Pipeline;
pub use crate::planner::{SlidePlan, plan_for_duration, plan_for_package};
pub use crate::raster::slide::{Rasterizer, RasterizerOpts, RenderedFrame};
pub use crate::store::sink::{ArtifactSink, Delivery, DeliveryMode, DurableSink, LocalSink};

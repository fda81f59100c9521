//! Frame pipeline and artifact export for vtrack.
//!
//! This crate provides:
//! - The frame pipeline: sampling, detection, tracking, overlay rendering
//! - CSV position logs and the HTML trajectory chart
//! - Single-image analysis
//! - Configuration and run logging for the `vtrack` binary

pub mod chart;
pub mod config;
pub mod error;
pub mod image_analysis;
pub mod logging;
pub mod pipeline;
pub mod position_log;

pub use chart::{ChartSeries, TrajectoryChart};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use image_analysis::{analyze_image, ImageAnalysis};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{ArtifactBundle, FramePipeline, RunOutput, RunState, RunSummary};
pub use position_log::PositionLogWriter;

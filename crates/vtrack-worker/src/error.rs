//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that end a processing run.
///
/// Detector failures on a single frame are not fatal and never surface here
/// from the frame loop; `Detector` is only produced by single-image analysis.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Chart export failed: {0}")]
    ChartFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] vtrack_media::MediaError),

    #[error("Detector error: {0}")]
    Detector(#[from] vtrack_detector::DetectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn unsupported_input(msg: impl Into<String>) -> Self {
        Self::UnsupportedInput(msg.into())
    }

    pub fn chart_failed(msg: impl Into<String>) -> Self {
        Self::ChartFailed(msg.into())
    }
}

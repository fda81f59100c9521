//! Client for the external object-detection service.
//!
//! The detector is a collaborator: given the encoded bytes of one frame it
//! returns labelled bounding boxes, or fails. Failures are ordinary values
//! (`DetectorError`) so callers can skip a frame instead of aborting a run.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use vtrack_models::Detection;

pub use client::{DetectorClient, DetectorConfig};
pub use error::{DetectorError, DetectorResult};
pub use types::{AnalyzeResponse, DetectedObject, ObjectRectangle};

/// Anything that can turn an encoded frame into detections.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Detect objects in one encoded image (JPEG/PNG bytes).
    async fn detect(&self, image: &[u8]) -> DetectorResult<Vec<Detection>>;
}

//! Detection service request/response types.

use serde::{Deserialize, Serialize};
use vtrack_models::{BoundingBox, Detection};

/// Response of the analyze endpoint (object features only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// One object reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Class name
    #[serde(rename = "object")]
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
    pub rectangle: ObjectRectangle,
}

/// Pixel rectangle; the service may send integral floats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectRectangle {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl From<DetectedObject> for Detection {
    fn from(obj: DetectedObject) -> Self {
        let rect = obj.rectangle;
        Detection::new(
            obj.label,
            obj.confidence,
            // Truncate toward zero to whole pixels
            BoundingBox::new(rect.x as i32, rect.y as i32, rect.w as i32, rect.h as i32),
        )
    }
}

impl AnalyzeResponse {
    pub fn into_detections(self) -> Vec<Detection> {
        self.objects.into_iter().map(Detection::from).collect()
    }
}

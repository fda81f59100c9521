use serde::{Deserialize, Serialize};

use crate::track::{TrackId, TrackedObject};

/// One row of the position log: a matched detection on a sampled frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    /// 1-based source frame index
    pub frame: u64,
    pub object_id: TrackId,
    pub label: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PositionRow {
    /// CSV column names, in row order.
    pub const HEADER: [&'static str; 7] = ["frame", "object_id", "label", "x", "y", "w", "h"];

    pub fn from_tracked(frame: u64, object: &TrackedObject) -> Self {
        Self {
            frame,
            object_id: object.id,
            label: object.label.clone(),
            x: object.bbox.x,
            y: object.bbox.y,
            w: object.bbox.w,
            h: object.bbox.h,
        }
    }
}

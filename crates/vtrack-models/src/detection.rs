use serde::{Deserialize, Serialize};

/// An integer pixel rectangle as reported by the detector.
///
/// Geometry is not validated: negative or zero extents are carried as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner
    pub x: i32,
    /// Y coordinate of the top-left corner
    pub y: i32,
    /// Width in pixels
    pub w: i32,
    /// Height in pixels
    pub h: i32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Geometric center, rounded down to whole pixels.
    ///
    /// Saturates at the `i32` range for out-of-range detector geometry.
    pub fn centroid(&self) -> Centroid {
        Centroid::new(
            self.x.saturating_add(self.w.div_euclid(2)),
            self.y.saturating_add(self.h.div_euclid(2)),
        )
    }

    /// Bottom-right corner (exclusive), saturating like [`centroid`](Self::centroid).
    pub fn max_corner(&self) -> (i32, i32) {
        (self.x.saturating_add(self.w), self.y.saturating_add(self.h))
    }
}

/// Center point of a bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Centroid {
    pub x: i32,
    pub y: i32,
}

impl Centroid {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another centroid.
    pub fn distance(&self, other: &Centroid) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

impl From<(i32, i32)> for Centroid {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// One labelled bounding box reported by the detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object class name (e.g. "car")
    pub label: String,
    /// Detector confidence [0, 1]
    pub confidence: f32,
    /// Pixel rectangle
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a new detection.
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    pub fn centroid(&self) -> Centroid {
        self.bbox.centroid()
    }
}

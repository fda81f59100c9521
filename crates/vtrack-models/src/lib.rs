//! Shared data models for vtrack.
//!
//! This crate provides Serde-serializable types for:
//! - Detector output (labelled bounding boxes)
//! - Tracked objects and their identity colors
//! - Position log rows

pub mod detection;
pub mod position;
pub mod track;

// Re-export common types
pub use detection::{BoundingBox, Centroid, Detection};
pub use position::PositionRow;
pub use track::{TrackColor, TrackId, TrackedObject};

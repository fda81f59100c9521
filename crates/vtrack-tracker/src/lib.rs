//! Object identity tracking across sampled frames.
//!
//! - [`CentroidTracker`] assigns persistent identities to per-frame
//!   detections by greedy nearest-centroid matching.
//! - [`TrailStore`] keeps the centroid history of every identity, with a
//!   suffix window for overlay rendering and the full sequence for export.

pub mod centroid;
pub mod trails;

pub use centroid::{CentroidTracker, TrackerConfig, DEFAULT_MAX_DISTANCE};
pub use trails::{Trail, TrailStore, DEFAULT_TRAIL_WINDOW};

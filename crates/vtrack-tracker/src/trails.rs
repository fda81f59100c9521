//! Per-identity centroid history.
//!
//! One append-only log per track identity with two read views: a suffix
//! window for drawing trail polylines, and the whole sequence for the
//! trajectory export.

use std::collections::HashMap;

use vtrack_models::{Centroid, TrackId};

/// Default number of recent points drawn as a trail.
pub const DEFAULT_TRAIL_WINDOW: usize = 10;

/// Centroid history of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trail {
    /// Display key, `{label}_{id}` using the label of the first sighting
    pub key: String,
    pub id: TrackId,
    pub points: Vec<Centroid>,
}

impl Trail {
    /// The last `limit` points, in append order.
    pub fn recent(&self, limit: usize) -> &[Centroid] {
        let start = self.points.len().saturating_sub(limit);
        &self.points[start..]
    }
}

/// Trail history for every identity seen in a run.
#[derive(Debug, Clone, Default)]
pub struct TrailStore {
    /// Trails in first-encounter order
    trails: Vec<Trail>,
    /// Identity -> position in `trails`
    index: HashMap<TrackId, usize>,
    /// Optional cap on stored points per trail (oldest dropped first)
    history_limit: Option<usize>,
}

impl TrailStore {
    /// Create a store that keeps the full history of every trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `limit` points per trail.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Append a centroid to the trail of `id`, creating it on first sight.
    pub fn append(&mut self, id: TrackId, label: &str, centroid: Centroid) {
        let slot = match self.index.get(&id) {
            Some(&slot) => slot,
            None => {
                self.trails.push(Trail {
                    key: format!("{}_{}", label, id),
                    id,
                    points: Vec::new(),
                });
                let slot = self.trails.len() - 1;
                self.index.insert(id, slot);
                slot
            }
        };

        let trail = &mut self.trails[slot];
        trail.points.push(centroid);
        if let Some(limit) = self.history_limit {
            if trail.points.len() > limit {
                let excess = trail.points.len() - limit;
                trail.points.drain(..excess);
            }
        }
    }

    /// The last `limit` points of the trail of `id` (empty if never seen).
    pub fn recent(&self, id: TrackId, limit: usize) -> &[Centroid] {
        self.get(id).map(|trail| trail.recent(limit)).unwrap_or(&[])
    }

    pub fn get(&self, id: TrackId) -> Option<&Trail> {
        self.index.get(&id).map(|&slot| &self.trails[slot])
    }

    /// Every trail as `(key, points)`, in first-encounter order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &[Centroid])> {
        self.trails
            .iter()
            .map(|trail| (trail.key.as_str(), trail.points.as_slice()))
    }

    pub fn trails(&self) -> &[Trail] {
        &self.trails
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}

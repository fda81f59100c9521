//! Centroid-distance tracker for maintaining object identity across frames.
//!
//! Uses greedy nearest-centroid matching: tracks are visited in ascending
//! order of their best distance to any detection, and each claims its
//! nearest detection that is still free, provided it lies within
//! `max_distance`.

use std::collections::BTreeMap;

use tracing::debug;
use vtrack_models::{BoundingBox, Centroid, Detection, TrackId, TrackedObject};

/// Default matching radius in pixels.
pub const DEFAULT_MAX_DISTANCE: f64 = 50.0;

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Maximum centroid distance (exclusive) for a detection to continue a track
    pub max_distance: f64,
    /// Drop a track after this many consecutive non-empty updates without a
    /// match. `None` keeps every track for the whole run.
    pub evict_after: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            evict_after: None,
        }
    }
}

/// Track information.
#[derive(Debug, Clone)]
struct Track {
    /// Last matched label
    label: String,
    /// Last matched bounding box
    bbox: BoundingBox,
    /// Last known centroid
    centroid: Centroid,
    /// Consecutive updates without a match
    missed: u32,
}

/// Nearest-centroid tracker.
#[derive(Debug, Clone, Default)]
pub struct CentroidTracker {
    config: TrackerConfig,
    /// Live tracks, ordered by id
    tracks: BTreeMap<TrackId, Track>,
    /// Next track ID to assign
    next_track_id: TrackId,
}

impl CentroidTracker {
    /// Create a new tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_track_id: 0,
        }
    }

    /// Create a tracker with the given matching radius and no eviction.
    pub fn with_max_distance(max_distance: f64) -> Self {
        Self::new(TrackerConfig {
            max_distance,
            ..TrackerConfig::default()
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Update tracks with the detections of one sampled frame.
    ///
    /// # Returns
    /// The tracks matched or created by this frame, keyed by id. Tracks that
    /// were not matched keep their previous state and are not returned.
    pub fn update(&mut self, detections: &[Detection]) -> BTreeMap<TrackId, TrackedObject> {
        let mut tracked = BTreeMap::new();
        if detections.is_empty() {
            return tracked;
        }

        let centroids: Vec<Centroid> = detections.iter().map(Detection::centroid).collect();
        let mut consumed = vec![false; detections.len()];

        if !self.tracks.is_empty() {
            let track_ids: Vec<TrackId> = self.tracks.keys().copied().collect();

            // rows = tracks (ascending id), cols = detections (input order)
            let distances: Vec<Vec<f64>> = self
                .tracks
                .values()
                .map(|track| centroids.iter().map(|c| track.centroid.distance(c)).collect())
                .collect();

            let mut order: Vec<(f64, usize)> = distances
                .iter()
                .enumerate()
                .map(|(row, row_distances)| {
                    let best = row_distances.iter().copied().fold(f64::INFINITY, f64::min);
                    (best, row)
                })
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut matched_rows = vec![false; track_ids.len()];

            for (_, row) in order {
                let nearest = distances[row]
                    .iter()
                    .enumerate()
                    .filter(|(col, _)| !consumed[*col])
                    .min_by(|a, b| a.1.total_cmp(b.1).then(a.0.cmp(&b.0)));

                let Some((col, &distance)) = nearest else {
                    // Every detection has been claimed
                    break;
                };

                if distance >= self.config.max_distance {
                    continue;
                }

                consumed[col] = true;
                matched_rows[row] = true;

                let id = track_ids[row];
                let detection = &detections[col];
                if let Some(track) = self.tracks.get_mut(&id) {
                    track.label.clone_from(&detection.label);
                    track.bbox = detection.bbox;
                    track.centroid = centroids[col];
                    track.missed = 0;
                }
                tracked.insert(id, tracked_object(id, detection, centroids[col]));
            }

            let unmatched: Vec<TrackId> = track_ids
                .iter()
                .zip(&matched_rows)
                .filter(|(_, matched)| !**matched)
                .map(|(id, _)| *id)
                .collect();
            self.age_tracks(&unmatched);
        }

        // Create new tracks for unmatched detections
        let mut created = 0usize;
        for (col, detection) in detections.iter().enumerate() {
            if consumed[col] {
                continue;
            }
            let id = self.register(detection, centroids[col]);
            tracked.insert(id, tracked_object(id, detection, centroids[col]));
            created += 1;
        }

        debug!(
            detections = detections.len(),
            matched = tracked.len() - created,
            created,
            live_tracks = self.tracks.len(),
            "Tracker updated"
        );

        tracked
    }

    /// Last known state of every live track, ordered by id.
    pub fn live_tracks(&self) -> Vec<TrackedObject> {
        self.tracks
            .iter()
            .map(|(&id, track)| TrackedObject {
                id,
                label: track.label.clone(),
                bbox: track.bbox,
                centroid: track.centroid,
            })
            .collect()
    }

    /// Last known state of one track.
    pub fn track(&self, id: TrackId) -> Option<TrackedObject> {
        self.tracks.get(&id).map(|track| TrackedObject {
            id,
            label: track.label.clone(),
            bbox: track.bbox,
            centroid: track.centroid,
        })
    }

    /// The id the next new track will receive (equals tracks created so far).
    pub fn next_id(&self) -> TrackId {
        self.next_track_id
    }

    /// Number of live tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn register(&mut self, detection: &Detection, centroid: Centroid) -> TrackId {
        let id = self.next_track_id;
        self.next_track_id += 1;
        self.tracks.insert(
            id,
            Track {
                label: detection.label.clone(),
                bbox: detection.bbox,
                centroid,
                missed: 0,
            },
        );
        id
    }

    fn age_tracks(&mut self, unmatched: &[TrackId]) {
        for id in unmatched {
            let evict = match self.tracks.get_mut(id) {
                Some(track) => {
                    track.missed += 1;
                    matches!(self.config.evict_after, Some(limit) if track.missed > limit)
                }
                None => false,
            };
            if evict {
                debug!(track_id = *id, "Evicting stale track");
                self.tracks.remove(id);
            }
        }
    }
}

fn tracked_object(id: TrackId, detection: &Detection, centroid: Centroid) -> TrackedObject {
    TrackedObject {
        id,
        label: detection.label.clone(),
        bbox: detection.bbox,
        centroid,
    }
}

//! Tracked objects and identity colors.

use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, Centroid};

/// Persistent identity of a track. Assigned ascending from 0, never reused.
pub type TrackId = u32;

/// One identity-labelled detection emitted by the tracker for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub id: TrackId,
    pub label: String,
    pub bbox: BoundingBox,
    pub centroid: Centroid,
}

impl TrackedObject {
    /// Overlay tag, e.g. `car_3`.
    pub fn tag(&self) -> String {
        format!("{}_{}", self.label, self.id)
    }

    /// Drawing color for this object's identity.
    pub fn color(&self) -> TrackColor {
        TrackColor::for_identity(self.id)
    }
}

/// RGB color used to draw a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Lowest channel value, keeps overlays readable on dark footage.
const CHANNEL_MIN: u64 = 100;
/// Number of values per channel (100..=254).
const CHANNEL_SPAN: u64 = 155;

impl TrackColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Deterministic color for a track identity.
    ///
    /// The identity is mixed with the splitmix64 finalizer and each channel is
    /// taken from a different slice of the hash, so neighbouring ids get
    /// visibly different colors while the same id always maps to the same one.
    pub fn for_identity(id: TrackId) -> Self {
        let mut z = u64::from(id).wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;

        let channel = |shift: u32| (CHANNEL_MIN + ((z >> shift) & 0xFFFF) % CHANNEL_SPAN) as u8;
        Self::new(channel(0), channel(16), channel(32))
    }

    /// Hex notation (`#rrggbb`) for HTML output.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

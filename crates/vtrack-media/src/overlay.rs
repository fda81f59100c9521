//! Track overlay rendering: boxes, tags and motion trails.
//!
//! Boxes are drawn as line segments rather than `Rect`s so degenerate or
//! negative geometry from the detector renders (or clips) instead of
//! panicking.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use tracing::{debug, warn};
use vtrack_models::{BoundingBox, Centroid, TrackColor, TrackedObject};

use crate::error::{MediaError, MediaResult};

/// Fonts tried when no font path is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Box outline thickness in pixels.
const BOX_THICKNESS: i32 = 2;
/// Gap between a tag's baseline area and the box top edge.
const TAG_OFFSET: i32 = 5;
const TEXT_SCALE: f32 = 18.0;
/// Tags anchored further than this left of or above the frame cannot be visible.
const TAG_REACH: i32 = 1 << 16;

/// Draws track annotations onto RGB frames.
///
/// Geometry is clipped to the frame before rasterizing, so boxes and trails
/// far outside the image cost nothing to draw.
pub struct OverlayRenderer {
    /// Without a font, tags are skipped and only geometry is drawn
    font: Option<FontVec>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Load the configured font, or the first system font found.
    ///
    /// An explicitly configured font that cannot be loaded is an error; a
    /// missing system font only disables text.
    pub fn load(font_path: Option<&Path>) -> MediaResult<Self> {
        if let Some(path) = font_path {
            let font = load_font(path)?;
            debug!(path = %path.display(), "Loaded overlay font");
            return Ok(Self::new(Some(font)));
        }

        let font = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .find_map(|p| load_font(&p).ok());

        if font.is_none() {
            warn!("No overlay font found, track tags will not be drawn");
        }
        Ok(Self::new(font))
    }

    /// Draw one tracked object: outline, `label_id` tag and its recent trail.
    pub fn draw_track(&self, frame: &mut RgbImage, object: &TrackedObject, trail: &[Centroid]) {
        let color = to_rgb(object.color());
        self.draw_box(frame, &object.bbox, color);
        self.draw_tag(frame, &object.tag(), object.bbox.x, object.bbox.y, color);
        self.draw_polyline(frame, trail, color);
    }

    /// Outline a bounding box.
    pub fn draw_box(&self, frame: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        let (x2, y2) = bbox.max_corner();
        for inset in 0..BOX_THICKNESS {
            let (left, top) = (bbox.x.saturating_add(inset), bbox.y.saturating_add(inset));
            let (right, bottom) = (x2.saturating_sub(inset), y2.saturating_sub(inset));
            draw_segment(frame, (left, top), (right, top), color);
            draw_segment(frame, (right, top), (right, bottom), color);
            draw_segment(frame, (right, bottom), (left, bottom), color);
            draw_segment(frame, (left, bottom), (left, top), color);
        }
    }

    /// Draw text just above the point (x, y).
    pub fn draw_tag(&self, frame: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let top = y
            .saturating_sub(TAG_OFFSET)
            .saturating_sub(TEXT_SCALE.ceil() as i32);
        let visible = |v: i32, extent: u32| v > -TAG_REACH && v < extent as i32;
        if !visible(x, frame.width()) || !visible(top, frame.height()) {
            return;
        }
        draw_text_mut(frame, color, x, top, PxScale::from(TEXT_SCALE), font, text);
    }

    /// Connect consecutive points with 1px segments.
    pub fn draw_polyline(&self, frame: &mut RgbImage, points: &[Centroid], color: Rgb<u8>) {
        for pair in points.windows(2) {
            draw_segment(frame, (pair[0].x, pair[0].y), (pair[1].x, pair[1].y), color);
        }
    }
}

/// Draw the part of a segment that falls inside the frame.
fn draw_segment(frame: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let bounds = (
        f64::from(frame.width()) - 1.0,
        f64::from(frame.height()) - 1.0,
    );
    let from = (f64::from(from.0), f64::from(from.1));
    let to = (f64::from(to.0), f64::from(to.1));
    if let Some((start, end)) = clip_segment(from, to, bounds) {
        draw_line_segment_mut(frame, start, end, color);
    }
}

/// Liang-Barsky clip of a segment to `[0, max.0] x [0, max.1]`.
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    max: (f64, f64),
) -> Option<((f32, f32), (f32, f32))> {
    if max.0 < 0.0 || max.1 < 0.0 {
        return None;
    }
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [
        (-dx, from.0),
        (dx, max.0 - from.0),
        (-dy, from.1),
        (dy, max.1 - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    let at = |t: f64| ((from.0 + t * dx) as f32, (from.1 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

pub fn to_rgb(color: TrackColor) -> Rgb<u8> {
    Rgb(color.to_array())
}

fn load_font(path: &Path) -> MediaResult<FontVec> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| MediaError::Font(format!("{}: {}", path.display(), e)))
}

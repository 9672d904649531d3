//! Sticky-note layout: content-driven sizes and collision-avoiding placement.
//!
//! Notes are placed one at a time by rejection sampling inside a spread
//! rectangle centered on the origin. A candidate is accepted when its center
//! is at least [`min_distance`] from every note already placed. After the
//! attempt budget is spent the note goes on a deterministic spiral instead,
//! and the placement reports that the budget was exhausted.
//!
//! Randomness is injected so callers (and tests) control the sequence.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use std::collections::BTreeMap;

use rand::Rng;

use crate::camera::{Point, Viewport};
use crate::config::LayoutParams;
use crate::consts::{
    FALLBACK_ANGLE_STEP, FALLBACK_RADIUS_RATIO, FULL_TURN, NOTE_BASE_HEIGHT, NOTE_BASE_WIDTH, NOTE_CHARS_PER_FACTOR,
    NOTE_MAX_FACTOR, SPREAD_HEIGHT_RATIO, SPREAD_MIN_HEIGHT, SPREAD_MIN_WIDTH, SPREAD_WIDTH_RATIO,
};
use crate::notes::{ContentRecord, StickyNote};

/// Note width and height in world units.
pub type Size = (f64, f64);

/// How a note's position was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Random candidate accepted on the given attempt (1-based).
    Placed { attempts: u32 },
    /// Attempt budget exhausted; spiral position used.
    Fallback,
    /// Position reused from an earlier pass or a synced update.
    Cached,
}

/// A note together with how it was placed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNote {
    pub note: StickyNote,
    pub placement: Placement,
}

// =============================================================================
// SIZING
// =============================================================================

/// Size from header and body lengths in characters.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn note_size(header_chars: usize, body_chars: usize) -> Size {
    let factor = ((header_chars + body_chars) as f64 / NOTE_CHARS_PER_FACTOR).clamp(1.0, NOTE_MAX_FACTOR);
    (NOTE_BASE_WIDTH * factor, NOTE_BASE_HEIGHT * factor)
}

#[must_use]
pub fn record_size(record: &ContentRecord) -> Size {
    note_size(record.header().chars().count(), record.body().chars().count())
}

/// Minimum center distance between two notes of the given sizes.
#[must_use]
pub fn min_distance(a: Size, b: Size, params: &LayoutParams) -> f64 {
    let largest = a.0.max(a.1).max(b.0).max(b.1);
    params.min_distance.max(params.distance_ratio * largest)
}

/// Spread rectangle for a pass of `note_count` notes, the largest of which
/// has size `largest`.
///
/// The base spread follows the viewport. It grows when a grid of
/// `ceil(sqrt(n))` cells at the pairwise threshold would not fit.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn spread(viewport: Viewport, note_count: usize, largest: Size, params: &LayoutParams) -> Size {
    let base_w = (viewport.width * SPREAD_WIDTH_RATIO).max(SPREAD_MIN_WIDTH);
    let base_h = (viewport.height * SPREAD_HEIGHT_RATIO).max(SPREAD_MIN_HEIGHT);

    let cells = (note_count as f64).sqrt().ceil();
    let threshold = min_distance(largest, largest, params);
    let needed = cells * threshold + 2.0 * params.margin;

    (base_w.max(needed + largest.0), base_h.max(needed + largest.1))
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Incremental placer holding every note placed so far.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    params: LayoutParams,
    occupied: Vec<(Point, Size)>,
}

impl LayoutEngine {
    #[must_use]
    pub fn new(params: LayoutParams) -> Self {
        Self { params, occupied: Vec::new() }
    }

    /// Register an already-positioned note so later placements avoid it.
    pub fn occupy(&mut self, position: Point, size: Size) {
        self.occupied.push((position, size));
    }

    #[must_use]
    pub fn occupied(&self) -> usize {
        self.occupied.len()
    }

    /// Place a note of `size` inside `spread`.
    pub fn place<R: Rng>(&mut self, size: Size, spread: Size, rng: &mut R) -> (Point, Placement) {
        let range_w = (spread.0 - 2.0 * self.params.margin - size.0).max(0.0);
        let range_h = (spread.1 - 2.0 * self.params.margin - size.1).max(0.0);

        for attempt in 1..=self.params.attempts {
            let candidate = Point::new(
                (rng.random::<f64>() - 0.5) * range_w,
                (rng.random::<f64>() - 0.5) * range_h,
            );
            if self.is_clear(candidate, size) {
                self.occupied.push((candidate, size));
                return (candidate, Placement::Placed { attempts: attempt });
            }
        }

        let position = self.spiral(size);
        tracing::debug!(
            attempts = self.params.attempts,
            x = position.x,
            y = position.y,
            "placement budget exhausted; using spiral"
        );
        self.occupied.push((position, size));
        (position, Placement::Fallback)
    }

    fn is_clear(&self, candidate: Point, size: Size) -> bool {
        self.occupied
            .iter()
            .all(|&(pos, other)| candidate.distance(pos) >= min_distance(size, other, &self.params))
    }

    #[allow(clippy::cast_precision_loss)]
    fn spiral(&self, size: Size) -> Point {
        let raw = self.occupied.len() as f64 * FALLBACK_ANGLE_STEP;
        let lap = (raw / FULL_TURN).floor();
        let angle = raw % FULL_TURN;
        let radius = FALLBACK_RADIUS_RATIO * min_distance(size, size, &self.params) * (1.0 + lap);
        Point::new(angle.cos() * radius, angle.sin() * radius)
    }
}

/// Lay out every record. Records with a known position keep it; the rest are
/// placed around them. Output order matches `records`.
pub fn layout_notes<R: Rng>(
    records: &[ContentRecord],
    viewport: Viewport,
    known: &BTreeMap<String, Point>,
    params: &LayoutParams,
    rng: &mut R,
) -> Vec<PlacedNote> {
    let sizes: Vec<Size> = records.iter().map(record_size).collect();
    let largest = sizes
        .iter()
        .copied()
        .fold((0.0_f64, 0.0_f64), |acc, s| (acc.0.max(s.0), acc.1.max(s.1)));
    let area = spread(viewport, records.len(), largest, params);

    let mut engine = LayoutEngine::new(*params);
    for (record, size) in records.iter().zip(&sizes) {
        if let Some(pos) = known.get(&record.id) {
            engine.occupy(*pos, *size);
        }
    }

    records
        .iter()
        .zip(sizes)
        .map(|(record, size)| {
            let (position, placement) = match known.get(&record.id) {
                Some(pos) => (*pos, Placement::Cached),
                None => engine.place(size, area, rng),
            };
            PlacedNote { note: StickyNote::from_record(record, position, size, rng), placement }
        })
        .collect()
}

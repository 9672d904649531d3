//! Drawing model: committed strokes and the single in-progress stroke.
//!
//! The store is append-only: strokes are committed once, keyed by id, and
//! only a full [`DrawingStore::clear`] removes them. Local gestures build up
//! the in-progress stroke, which is promoted on gesture end when it has at
//! least two points. Remote strokes arrive already committed and are deduped
//! by id, so replays from the sync medium are harmless.
//!
//! Every mutation bumps [`DrawingStore::revision`]; the renderer compares it
//! against the revision it last built geometry for.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashSet;

use frames::WireStroke;

use crate::camera::Point;

/// Minimum number of points for a stroke to be committed or drawn.
pub const MIN_STROKE_POINTS: usize = 2;

/// Unique identifier for a stroke (unique per authoring session).
pub type StrokeId = String;

/// A committed freehand stroke in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// CSS color string.
    pub color: String,
    /// Session id of the author.
    pub author: String,
}

impl Stroke {
    /// Whether the stroke has enough points to draw.
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= MIN_STROKE_POINTS
    }
}

impl From<WireStroke> for Stroke {
    fn from(wire: WireStroke) -> Self {
        Self {
            id: wire.id,
            points: wire.points.into_iter().map(Point::from).collect(),
            created_at: wire.created_at,
            color: wire.color,
            author: wire.author,
        }
    }
}

impl From<&Stroke> for WireStroke {
    fn from(stroke: &Stroke) -> Self {
        Self {
            id: stroke.id.clone(),
            points: stroke.points.iter().copied().map(Into::into).collect(),
            created_at: stroke.created_at,
            color: stroke.color.clone(),
            author: stroke.author.clone(),
        }
    }
}

/// Metadata stamped on a stroke when it is promoted from in-progress.
#[derive(Debug, Clone)]
pub struct StrokeMeta {
    pub id: StrokeId,
    pub created_at: i64,
    pub color: String,
    pub author: String,
}

/// Ordered committed strokes plus the in-progress point sequence.
#[derive(Debug, Default)]
pub struct DrawingStore {
    strokes: Vec<Stroke>,
    ids: HashSet<StrokeId>,
    in_progress: Option<Vec<Point>>,
    revision: u64,
}

impl DrawingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Committed ---

    /// Append a committed stroke. Returns `false` (and changes nothing) when a
    /// stroke with the same id is already present.
    pub fn commit_stroke(&mut self, stroke: Stroke) -> bool {
        if self.ids.contains(&stroke.id) {
            return false;
        }
        self.ids.insert(stroke.id.clone());
        self.strokes.push(stroke);
        self.bump();
        true
    }

    /// Remove every committed stroke. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.strokes.len();
        self.strokes.clear();
        self.ids.clear();
        if removed > 0 {
            self.bump();
        }
        removed
    }

    /// Committed strokes in commit order.
    #[must_use]
    pub fn list(&self) -> &[Stroke] {
        &self.strokes
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    // --- In-progress ---

    /// Start a new in-progress stroke, replacing any previous one.
    pub fn begin(&mut self, point: Point) {
        if !point.is_finite() {
            return;
        }
        self.in_progress = Some(vec![point]);
        self.bump();
    }

    /// Append to the in-progress stroke. Returns `false` when no stroke is
    /// in progress or the point is not finite.
    pub fn extend(&mut self, point: Point) -> bool {
        if !point.is_finite() {
            return false;
        }
        let Some(points) = self.in_progress.as_mut() else {
            return false;
        };
        points.push(point);
        self.bump();
        true
    }

    #[must_use]
    pub fn in_progress(&self) -> Option<&[Point]> {
        self.in_progress.as_deref()
    }

    /// Remove and return the in-progress points.
    pub fn take_in_progress(&mut self) -> Option<Vec<Point>> {
        let taken = self.in_progress.take();
        if taken.is_some() {
            self.bump();
        }
        taken
    }

    pub fn discard_in_progress(&mut self) {
        if self.take_in_progress().is_some() {
            tracing::trace!("discarded in-progress stroke");
        }
    }

    /// End the gesture: take the in-progress points and commit them as a
    /// stroke when there are at least two. The in-progress stroke is always
    /// cleared. Returns the committed stroke.
    pub fn promote_in_progress(&mut self, meta: StrokeMeta) -> Option<Stroke> {
        let points = self.take_in_progress()?;
        if points.len() < MIN_STROKE_POINTS {
            return None;
        }

        let stroke = Stroke { id: meta.id, points, created_at: meta.created_at, color: meta.color, author: meta.author };
        if self.commit_stroke(stroke.clone()) { Some(stroke) } else { None }
    }

    // --- Revision ---

    /// Changes on every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

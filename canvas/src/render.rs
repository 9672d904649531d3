//! Retained scene and frame presentation.
//!
//! The [`Scene`] owns everything that gets drawn: the dot grid (built once),
//! stroke polylines (rebuilt only when the drawing store revision changes),
//! sticky-note billboards (each texture baked once), and ghost cursors for
//! remote sessions. Every animation frame the session calls
//! [`Scene::present`], which walks the layers back to front and hands them to
//! a [`RenderTarget`].
//!
//! Layers, back to front:
//!
//! | Depth | Layer |
//! |-------|-------|
//! | -0.1 | dot grid |
//! | 0.0 | note billboards |
//! | 0.1 | committed strokes |
//! | 0.2 | in-progress stroke |
//! | top | ghost cursors |

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::cell::Cell;
use std::collections::BTreeMap;

use image::RgbaImage;

use crate::camera::{Bounds, Camera, Point, Viewport};
use crate::consts::{
    BACKGROUND_COLOR, GRID_COLOR, GRID_DEPTH, GRID_EXTENT, GRID_STEP, IN_PROGRESS_DEPTH, NOTE_DEPTH, STROKE_DEPTH,
};
use crate::doc::{DrawingStore, MIN_STROKE_POINTS};
use crate::notes::StickyNote;
use crate::texture::bake_note_texture;

/// Failure reported by a render target.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    /// The drawing context is gone and will not come back.
    #[error("rendering context lost")]
    ContextLost,
    /// A single draw call failed; later frames may succeed.
    #[error("draw call failed: {0}")]
    Backend(String),
}

/// Per-frame view parameters handed to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView<'a> {
    pub camera: Camera,
    pub viewport: Viewport,
    /// World-space bounds visible this frame.
    pub bounds: Bounds,
    pub background: &'a str,
}

/// A drawing surface. Coordinates are world space; the target projects them
/// through [`FrameView::bounds`].
pub trait RenderTarget {
    /// Clear to the background and set up the projection.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContextLost`] when the surface is gone.
    fn begin_frame(&mut self, view: &FrameView<'_>) -> Result<(), RenderError>;

    /// Draw grid dots.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn draw_dots(&mut self, dots: &[Point], color: &str, depth: f64) -> Result<(), RenderError>;

    /// Draw a note billboard.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn draw_billboard(&mut self, billboard: &Billboard) -> Result<(), RenderError>;

    /// Draw an open polyline.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn draw_polyline(&mut self, mesh: &StrokeMesh) -> Result<(), RenderError>;

    /// Draw a remote session's cursor marker.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn draw_cursor(&mut self, cursor: &GhostCursor) -> Result<(), RenderError>;

    /// Flush the frame.
    ///
    /// # Errors
    ///
    /// Backend failure.
    fn end_frame(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Geometry for one stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeMesh {
    pub points: Vec<Point>,
    pub color: String,
    pub depth: f64,
}

/// A flat, textured quad for a sticky note.
#[derive(Debug, Clone, PartialEq)]
pub struct Billboard {
    pub note_id: String,
    /// Center in world space.
    pub position: Point,
    pub width: f64,
    pub height: f64,
    pub rotation_deg: f64,
    pub depth: f64,
    pub texture: RgbaImage,
}

/// Last known pointer of a remote session.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostCursor {
    pub session: String,
    pub position: Point,
    pub drawing: bool,
}

/// Counters for work the scene has done; read by tests and debug overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub grid_builds: u32,
    pub stroke_builds: u32,
    pub texture_bakes: u32,
    pub frames: u64,
}

/// The retained scene.
#[derive(Debug)]
pub struct Scene {
    grid: Vec<Point>,
    strokes: Vec<StrokeMesh>,
    in_progress: Option<StrokeMesh>,
    built_revision: Option<u64>,
    billboards: Vec<Billboard>,
    cursors: BTreeMap<String, GhostCursor>,
    viewport: Viewport,
    bounds: Bounds,
    stats: SceneStats,
}

impl Scene {
    /// Build a scene for `viewport`, including the grid.
    #[must_use]
    pub fn new(viewport: Viewport, camera: &Camera) -> Self {
        let mut scene = Self {
            grid: Vec::new(),
            strokes: Vec::new(),
            in_progress: None,
            built_revision: None,
            billboards: Vec::new(),
            cursors: BTreeMap::new(),
            viewport,
            bounds: camera.projection_bounds(viewport),
            stats: SceneStats::default(),
        };
        scene.build_grid();
        scene
    }

    fn build_grid(&mut self) {
        #[allow(clippy::cast_possible_truncation)]
        let steps = (GRID_EXTENT / GRID_STEP).round() as i32;
        let coords: Vec<f64> = (-steps..=steps).map(|i| f64::from(i) * GRID_STEP).collect();
        self.grid = coords
            .iter()
            .flat_map(|&x| coords.iter().map(move |&y| Point::new(x, y)))
            .collect();
        self.stats.grid_builds += 1;
    }

    // --- Strokes ---

    /// Rebuild stroke geometry if the store changed since the last build.
    /// Returns whether a rebuild happened.
    pub fn sync_strokes(&mut self, store: &DrawingStore, in_progress_color: &str) -> bool {
        if self.built_revision == Some(store.revision()) {
            return false;
        }

        self.strokes = store
            .list()
            .iter()
            .filter(|s| s.is_drawable())
            .map(|s| StrokeMesh { points: s.points.clone(), color: s.color.clone(), depth: STROKE_DEPTH })
            .collect();
        self.in_progress = store
            .in_progress()
            .filter(|points| points.len() >= MIN_STROKE_POINTS)
            .map(|points| StrokeMesh {
                points: points.to_vec(),
                color: in_progress_color.to_owned(),
                depth: IN_PROGRESS_DEPTH,
            });

        self.built_revision = Some(store.revision());
        self.stats.stroke_builds += 1;
        true
    }

    #[must_use]
    pub fn strokes(&self) -> &[StrokeMesh] {
        &self.strokes
    }

    #[must_use]
    pub fn in_progress(&self) -> Option<&StrokeMesh> {
        self.in_progress.as_ref()
    }

    // --- Notes ---

    /// Add a billboard for `note`, baking its texture. A note already in the
    /// scene is left alone. Returns whether a billboard was added.
    pub fn add_note(&mut self, note: &StickyNote) -> bool {
        if self.billboards.iter().any(|b| b.note_id == note.id) {
            return false;
        }
        let texture = bake_note_texture(note);
        self.stats.texture_bakes += 1;
        self.billboards.push(Billboard {
            note_id: note.id.clone(),
            position: note.position,
            width: note.width,
            height: note.height,
            rotation_deg: note.rotation_deg,
            depth: NOTE_DEPTH,
            texture,
        });
        true
    }

    /// Move a billboard without re-baking. Returns whether it exists.
    pub fn move_note(&mut self, note_id: &str, position: Point) -> bool {
        match self.billboards.iter_mut().find(|b| b.note_id == note_id) {
            Some(b) => {
                b.position = position;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn billboards(&self) -> &[Billboard] {
        &self.billboards
    }

    // --- Cursors ---

    pub fn set_cursor(&mut self, session: &str, position: Point, drawing: bool) {
        self.cursors
            .insert(session.to_owned(), GhostCursor { session: session.to_owned(), position, drawing });
    }

    pub fn set_cursor_drawing(&mut self, session: &str, drawing: bool) {
        if let Some(cursor) = self.cursors.get_mut(session) {
            cursor.drawing = drawing;
        }
    }

    pub fn remove_cursor(&mut self, session: &str) {
        self.cursors.remove(session);
    }

    pub fn cursors(&self) -> impl Iterator<Item = &GhostCursor> {
        self.cursors.values()
    }

    // --- Projection ---

    /// Recompute the projection for a new viewport. World content is untouched.
    pub fn resize(&mut self, viewport: Viewport, camera: &Camera) {
        self.viewport = viewport;
        self.bounds = camera.projection_bounds(viewport);
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    #[must_use]
    pub fn grid(&self) -> &[Point] {
        &self.grid
    }

    #[must_use]
    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    // --- Present ---

    /// Draw one frame through `target`.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the target; the frame is abandoned.
    pub fn present(&mut self, target: &mut dyn RenderTarget, camera: &Camera) -> Result<(), RenderError> {
        self.bounds = camera.projection_bounds(self.viewport);
        let view = FrameView { camera: *camera, viewport: self.viewport, bounds: self.bounds, background: BACKGROUND_COLOR };

        target.begin_frame(&view)?;

        let visible: Vec<Point> = self.grid.iter().copied().filter(|p| self.bounds.contains(*p)).collect();
        target.draw_dots(&visible, GRID_COLOR, GRID_DEPTH)?;

        for billboard in &self.billboards {
            target.draw_billboard(billboard)?;
        }
        for mesh in &self.strokes {
            target.draw_polyline(mesh)?;
        }
        if let Some(mesh) = &self.in_progress {
            target.draw_polyline(mesh)?;
        }
        for cursor in self.cursors.values() {
            target.draw_cursor(cursor)?;
        }

        target.end_frame()?;
        self.stats.frames += 1;
        Ok(())
    }
}

// =============================================================================
// FRAME REQUESTS
// =============================================================================

/// The host's pending frame request, shared between the frame callback and
/// whoever stops the loop.
///
/// The callback calls [`FrameRequest::fired`] on entry and records each new
/// request with [`FrameRequest::scheduled`]. [`FrameRequest::stop`] hands
/// back the id still pending so the host can cancel it before the callback
/// is freed.
#[derive(Debug, Default)]
pub struct FrameRequest {
    pending: Cell<Option<i32>>,
    stopped: Cell<bool>,
}

impl FrameRequest {
    /// The pending frame has started running.
    pub fn fired(&self) {
        self.pending.set(None);
    }

    /// Record a newly requested frame. Returns `false` when the loop was
    /// stopped in the meantime; the caller must cancel `id` itself.
    pub fn scheduled(&self, id: i32) -> bool {
        if self.stopped.get() {
            return false;
        }
        self.pending.set(Some(id));
        true
    }

    /// Stop the loop and take the id that still needs cancelling.
    pub fn stop(&self) -> Option<i32> {
        self.stopped.set(true);
        self.pending.take()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    #[must_use]
    pub fn pending(&self) -> Option<i32> {
        self.pending.get()
    }
}

/// A target that draws nothing. Headless sessions present through it.
#[derive(Debug, Default)]
pub struct NullTarget {
    frames: u64,
}

impl NullTarget {
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderTarget for NullTarget {
    fn begin_frame(&mut self, _view: &FrameView<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_dots(&mut self, _dots: &[Point], _color: &str, _depth: f64) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_billboard(&mut self, _billboard: &Billboard) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_polyline(&mut self, _mesh: &StrokeMesh) -> Result<(), RenderError> {
        Ok(())
    }

    fn draw_cursor(&mut self, _cursor: &GhostCursor) -> Result<(), RenderError> {
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.frames += 1;
        Ok(())
    }
}

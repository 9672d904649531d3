#![allow(clippy::float_cmp)]

use super::*;
use crate::doc::{Stroke, StrokeMeta};
use crate::notes::{CornerFold, NoteColor};

#[derive(Default)]
struct RecordingTarget {
    calls: Vec<String>,
    dots: usize,
    fail_with: Option<RenderError>,
}

impl RenderTarget for RecordingTarget {
    fn begin_frame(&mut self, view: &FrameView<'_>) -> Result<(), RenderError> {
        if let Some(err) = self.fail_with.clone() {
            return Err(err);
        }
        self.calls.push(format!("begin:{}", view.background));
        Ok(())
    }

    fn draw_dots(&mut self, dots: &[Point], _color: &str, depth: f64) -> Result<(), RenderError> {
        self.dots = dots.len();
        self.calls.push(format!("dots@{depth}"));
        Ok(())
    }

    fn draw_billboard(&mut self, billboard: &Billboard) -> Result<(), RenderError> {
        self.calls.push(format!("note:{}@{}", billboard.note_id, billboard.depth));
        Ok(())
    }

    fn draw_polyline(&mut self, mesh: &StrokeMesh) -> Result<(), RenderError> {
        self.calls.push(format!("line:{}@{}", mesh.points.len(), mesh.depth));
        Ok(())
    }

    fn draw_cursor(&mut self, cursor: &GhostCursor) -> Result<(), RenderError> {
        self.calls.push(format!("cursor:{}", cursor.session));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.calls.push("end".to_owned());
        Ok(())
    }
}

fn vp() -> Viewport {
    Viewport::new(800.0, 600.0)
}

fn note(id: &str) -> StickyNote {
    StickyNote {
        id: id.to_owned(),
        header: "H".to_owned(),
        body: String::new(),
        icon: "!".to_owned(),
        color: NoteColor::Yellow,
        link: None,
        image: None,
        order_index: 0,
        position: Point::new(0.0, 0.0),
        width: 220.0,
        height: 180.0,
        rotation_deg: 3.0,
        corner_fold: CornerFold::Right,
    }
}

fn stroke(id: &str, n: usize) -> Stroke {
    Stroke {
        id: id.to_owned(),
        points: vec![Point::new(0.0, 0.0); n],
        created_at: 0,
        color: "#000000".to_owned(),
        author: "s".to_owned(),
    }
}

// =============================================================
// Grid
// =============================================================

#[test]
fn grid_is_built_once_with_full_extent() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    assert_eq!(scene.grid().len(), 121 * 121);
    assert!(scene.grid().contains(&Point::new(-3000.0, 3000.0)));

    let mut target = RecordingTarget::default();
    for _ in 0..5 {
        scene.present(&mut target, &cam).expect("present");
    }
    scene.resize(Viewport::new(1920.0, 1080.0), &cam);
    assert_eq!(scene.stats().grid_builds, 1);
}

#[test]
fn present_culls_dots_outside_view() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut target = RecordingTarget::default();
    scene.present(&mut target, &cam).expect("present");
    // x in [-400, 400] step 50 and y in [-300, 300] step 50.
    assert_eq!(target.dots, 17 * 13);
}

// =============================================================
// Strokes
// =============================================================

#[test]
fn strokes_rebuild_only_on_revision_change() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut store = DrawingStore::new();

    assert!(scene.sync_strokes(&store, "#000000"));
    assert!(!scene.sync_strokes(&store, "#000000"));

    store.commit_stroke(stroke("a", 3));
    assert!(scene.sync_strokes(&store, "#000000"));
    assert!(!scene.sync_strokes(&store, "#000000"));
    assert_eq!(scene.stats().stroke_builds, 2);
    assert_eq!(scene.strokes().len(), 1);
}

#[test]
fn short_strokes_are_not_drawn() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut store = DrawingStore::new();
    store.commit_stroke(stroke("one", 1));
    store.commit_stroke(stroke("two", 2));
    store.begin(Point::new(1.0, 1.0));
    scene.sync_strokes(&store, "#000000");

    assert_eq!(scene.strokes().len(), 1);
    assert!(scene.in_progress().is_none());

    store.extend(Point::new(2.0, 2.0));
    scene.sync_strokes(&store, "#000000");
    assert_eq!(scene.in_progress().map(|m| m.depth), Some(0.2));
}

#[test]
fn clear_removes_stroke_geometry() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut store = DrawingStore::new();
    store.begin(Point::new(0.0, 0.0));
    store.extend(Point::new(5.0, 5.0));
    store.promote_in_progress(StrokeMeta {
        id: "x".to_owned(),
        created_at: 0,
        color: "#000000".to_owned(),
        author: "s".to_owned(),
    });
    scene.sync_strokes(&store, "#000000");
    assert_eq!(scene.strokes().len(), 1);

    store.clear();
    scene.sync_strokes(&store, "#000000");
    assert!(scene.strokes().is_empty());
}

// =============================================================
// Notes
// =============================================================

#[test]
fn note_texture_is_baked_once() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    assert!(scene.add_note(&note("a")));
    assert!(!scene.add_note(&note("a")));
    assert!(scene.move_note("a", Point::new(100.0, -50.0)));
    assert_eq!(scene.stats().texture_bakes, 1);
    assert_eq!(scene.billboards()[0].position, Point::new(100.0, -50.0));
    assert_eq!(scene.billboards()[0].texture.dimensions(), (512, 512));
}

#[test]
fn moving_unknown_note_reports_false() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    assert!(!scene.move_note("missing", Point::new(0.0, 0.0)));
}

// =============================================================
// Presentation
// =============================================================

#[test]
fn present_walks_layers_back_to_front() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut store = DrawingStore::new();
    store.commit_stroke(stroke("a", 2));
    store.begin(Point::new(0.0, 0.0));
    store.extend(Point::new(1.0, 0.0));
    scene.sync_strokes(&store, "#000000");
    scene.add_note(&note("n"));
    scene.set_cursor("peer", Point::new(3.0, 3.0), true);

    let mut target = RecordingTarget::default();
    scene.present(&mut target, &cam).expect("present");
    assert_eq!(
        target.calls,
        vec!["begin:#ffffff", "dots@-0.1", "note:n@0", "line:2@0.1", "line:2@0.2", "cursor:peer", "end"]
    );
    assert_eq!(scene.stats().frames, 1);
}

#[test]
fn present_propagates_context_loss() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut target = RecordingTarget { fail_with: Some(RenderError::ContextLost), ..RecordingTarget::default() };
    assert_eq!(scene.present(&mut target, &cam), Err(RenderError::ContextLost));
    assert_eq!(scene.stats().frames, 0);
}

#[test]
fn resize_recomputes_bounds_from_zoom() {
    let mut cam = Camera::default();
    cam.set_zoom(2.0);
    let mut scene = Scene::new(vp(), &cam);
    scene.resize(Viewport::new(400.0, 200.0), &cam);
    let b = scene.bounds();
    assert_eq!((b.left, b.right, b.top, b.bottom), (-400.0, 400.0, 200.0, -200.0));
}

#[test]
fn cursors_can_be_removed() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    scene.set_cursor("a", Point::new(0.0, 0.0), true);
    scene.set_cursor_drawing("a", false);
    assert!(scene.cursors().all(|c| !c.drawing));
    scene.remove_cursor("a");
    assert_eq!(scene.cursors().count(), 0);
}

#[test]
fn null_target_counts_frames() {
    let cam = Camera::default();
    let mut scene = Scene::new(vp(), &cam);
    let mut target = NullTarget::default();
    scene.present(&mut target, &cam).expect("present");
    scene.present(&mut target, &cam).expect("present");
    assert_eq!(target.frames(), 2);
}

// --- Frame requests ---

#[test]
fn stopping_hands_back_the_pending_frame() {
    let request = FrameRequest::default();
    assert!(request.scheduled(7));
    assert_eq!(request.stop(), Some(7));
    assert!(request.is_stopped());
    assert_eq!(request.stop(), None);
}

#[test]
fn fired_frame_needs_no_cancel() {
    let request = FrameRequest::default();
    assert!(request.scheduled(1));
    request.fired();
    assert_eq!(request.pending(), None);
    assert_eq!(request.stop(), None);
}

#[test]
fn frames_requested_after_stop_are_refused() {
    let request = FrameRequest::default();
    request.stop();
    assert!(!request.scheduled(9));
    assert_eq!(request.pending(), None);
}

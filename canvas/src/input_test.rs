#![allow(clippy::float_cmp)]

use super::*;

fn vp() -> Viewport {
    Viewport::new(800.0, 600.0)
}

fn draw_router() -> InputRouter {
    let mut router = InputRouter::default();
    router.set_tool(Tool::Draw);
    router
}

// =============================================================
// Tool
// =============================================================

#[test]
fn tool_default_is_pan() {
    assert_eq!(Tool::default(), Tool::Pan);
    assert_eq!(InputRouter::default().tool(), Tool::Pan);
}

#[test]
fn button_from_dom_codes() {
    assert_eq!(Button::from_dom(0), Button::Primary);
    assert_eq!(Button::from_dom(1), Button::Middle);
    assert_eq!(Button::from_dom(2), Button::Secondary);
}

#[test]
fn switching_tool_mid_stroke_cancels_it() {
    let cam = Camera::default();
    let mut router = draw_router();
    router.pointer_down(Point::new(10.0, 10.0), Button::Primary, &cam, vp());
    let intents = router.set_tool(Tool::Pan);
    assert_eq!(intents, vec![Intent::CancelStroke]);
    assert_eq!(router.state(), InputState::Idle);
}

// =============================================================
// Mouse draw
// =============================================================

#[test]
fn draw_down_begins_stroke_in_world_space() {
    let cam = Camera::default();
    let mut router = draw_router();
    let intents = router.pointer_down(Point::new(400.0, 300.0), Button::Primary, &cam, vp());
    assert_eq!(intents, vec![Intent::BeginStroke(Point::new(0.0, 0.0))]);
    assert_eq!(router.state(), InputState::Drawing);
}

#[test]
fn draw_move_extends_and_up_finishes() {
    let cam = Camera::default();
    let mut router = draw_router();
    router.pointer_down(Point::new(400.0, 300.0), Button::Primary, &cam, vp());
    let moved = router.pointer_move(Point::new(410.0, 290.0), &cam, vp());
    assert_eq!(moved, vec![Intent::ExtendStroke(Point::new(10.0, 10.0))]);
    assert_eq!(router.pointer_up(), vec![Intent::FinishStroke]);
    assert_eq!(router.state(), InputState::Idle);
}

#[test]
fn non_primary_button_is_ignored() {
    let cam = Camera::default();
    let mut router = draw_router();
    assert!(router.pointer_down(Point::new(1.0, 1.0), Button::Secondary, &cam, vp()).is_empty());
    assert_eq!(router.state(), InputState::Idle);
}

#[test]
fn move_while_idle_produces_nothing() {
    let cam = Camera::default();
    let mut router = draw_router();
    assert!(router.pointer_move(Point::new(5.0, 5.0), &cam, vp()).is_empty());
    assert!(router.pointer_up().is_empty());
}

// =============================================================
// Mouse pan
// =============================================================

#[test]
fn pan_drag_emits_undamped_deltas() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    assert!(router.pointer_down(Point::new(100.0, 100.0), Button::Primary, &cam, vp()).is_empty());
    let a = router.pointer_move(Point::new(110.0, 95.0), &cam, vp());
    let b = router.pointer_move(Point::new(130.0, 95.0), &cam, vp());
    assert_eq!(a, vec![Intent::Pan { dx: 10.0, dy: -5.0 }]);
    assert_eq!(b, vec![Intent::Pan { dx: 20.0, dy: 0.0 }]);
    assert!(router.pointer_up().is_empty());
}

#[test]
fn non_finite_pointer_is_ignored() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    router.pointer_down(Point::new(0.0, 0.0), Button::Primary, &cam, vp());
    assert!(router.pointer_move(Point::new(f64::NAN, 0.0), &cam, vp()).is_empty());
}

// =============================================================
// Touch
// =============================================================

#[test]
fn touch_pan_is_damped() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    router.touch_start(&[Point::new(100.0, 100.0)], &cam, vp());
    let intents = router.touch_move(&[Point::new(120.0, 140.0)], &cam, vp());
    assert_eq!(intents, vec![Intent::Pan { dx: 10.0, dy: 20.0 }]);
}

#[test]
fn touch_draw_begins_and_finishes() {
    let cam = Camera::default();
    let mut router = draw_router();
    let begin = router.touch_start(&[Point::new(400.0, 300.0)], &cam, vp());
    assert!(matches!(begin.as_slice(), [Intent::BeginStroke(_)]));
    router.touch_move(&[Point::new(401.0, 300.0)], &cam, vp());
    assert_eq!(router.touch_end(&[], &cam, vp()), vec![Intent::FinishStroke]);
}

#[test]
fn second_touch_cancels_stroke_and_starts_pinch() {
    let mut cam = Camera::default();
    cam.set_zoom(2.0);
    let mut router = draw_router();
    router.touch_start(&[Point::new(100.0, 100.0)], &cam, vp());
    let intents = router.touch_start(&[Point::new(100.0, 100.0), Point::new(200.0, 100.0)], &cam, vp());
    assert_eq!(intents, vec![Intent::CancelStroke]);
    assert_eq!(router.state(), InputState::Pinching { initial_distance: 100.0, initial_zoom: 2.0 });
}

#[test]
fn pinch_spread_lowers_zoom_value() {
    let mut cam = Camera::default();
    cam.set_zoom(2.0);
    let mut router = InputRouter::default();
    router.touch_start(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], &cam, vp());
    let intents = router.touch_move(&[Point::new(0.0, 0.0), Point::new(200.0, 0.0)], &cam, vp());
    assert_eq!(intents, vec![Intent::SetZoom(1.0)]);
}

#[test]
fn pinch_with_coincident_fingers_emits_nothing() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    router.touch_start(&[Point::new(5.0, 5.0), Point::new(5.0, 5.0)], &cam, vp());
    assert!(router.touch_move(&[Point::new(5.0, 5.0), Point::new(50.0, 5.0)], &cam, vp()).is_empty());
}

#[test]
fn lifting_both_pinch_fingers_returns_to_idle() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    router.touch_start(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], &cam, vp());
    assert!(router.touch_end(&[], &cam, vp()).is_empty());
    assert_eq!(router.state(), InputState::Idle);
}

#[test]
fn remaining_touch_after_pinch_resumes_as_fresh_start() {
    let cam = Camera::default();
    let mut router = draw_router();
    router.touch_start(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], &cam, vp());
    let intents = router.touch_end(&[Point::new(400.0, 300.0)], &cam, vp());
    assert_eq!(intents, vec![Intent::BeginStroke(Point::new(0.0, 0.0))]);
    assert_eq!(router.state(), InputState::Drawing);
}

#[test]
fn remaining_touch_after_pinch_in_pan_mode_uses_touch_damping() {
    let cam = Camera::default();
    let mut router = InputRouter::default();
    router.touch_start(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], &cam, vp());
    router.touch_end(&[Point::new(50.0, 50.0)], &cam, vp());
    let intents = router.touch_move(&[Point::new(60.0, 50.0)], &cam, vp());
    assert_eq!(intents, vec![Intent::Pan { dx: 5.0, dy: 0.0 }]);
}

// =============================================================
// Wheel
// =============================================================

#[test]
fn wheel_emits_zoom_step() {
    let mut router = InputRouter::default();
    assert_eq!(router.wheel(-120.0), vec![Intent::ZoomStep(-120.0)]);
    assert!(router.wheel(0.0).is_empty());
    assert!(router.wheel(f64::NAN).is_empty());
}

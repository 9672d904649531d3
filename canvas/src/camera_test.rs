#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn vp() -> Viewport {
    Viewport::new(800.0, 600.0)
}

// --- Point ---

#[test]
fn point_distance() {
    assert!(approx_eq(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0));
}

#[test]
fn point_converts_to_and_from_wire() {
    let wire: frames::WirePoint = Point::new(1.5, -2.0).into();
    assert_eq!(wire, frames::WirePoint { x: 1.5, y: -2.0 });
    assert_eq!(Point::from(wire), Point::new(1.5, -2.0));
}

// --- Viewport ---

#[test]
fn viewport_center_includes_origin() {
    let v = Viewport::new(800.0, 600.0).with_origin(10.0, 20.0);
    assert_eq!(v.center(), Point::new(410.0, 320.0));
}

#[test]
fn zero_sized_viewport_is_not_usable() {
    assert!(!Viewport::new(0.0, 600.0).is_usable());
    assert!(!Viewport::new(f64::NAN, 600.0).is_usable());
    assert!(vp().is_usable());
}

#[test]
fn pixel_size_rounds_to_whole_pixels() {
    assert_eq!(Viewport::new(1280.0, 720.0).pixel_size(), Some((1280, 720)));
    assert_eq!(Viewport::new(1023.6, 0.4).pixel_size(), None);
    assert_eq!(Viewport::new(1023.6, 767.2).pixel_size(), Some((1024, 767)));
    assert_eq!(Viewport::new(f64::INFINITY, 600.0).pixel_size(), None);
}

// --- Defaults ---

#[test]
fn camera_default_is_origin_at_unit_zoom() {
    let cam = Camera::default();
    assert_eq!(cam.position(), Point::new(0.0, 0.0));
    assert_eq!(cam.zoom(), 1.0);
}

// --- pan ---

#[test]
fn pan_inverts_x_and_keeps_y() {
    let mut cam = Camera::default();
    cam.pan(10.0, 5.0);
    assert_eq!(cam.x(), -10.0);
    assert_eq!(cam.y(), 5.0);
}

#[test]
fn pan_accumulates_negated_deltas() {
    let mut cam = Camera::default();
    let deltas = [(3.0, 1.0), (-7.5, 2.0), (0.25, -4.0)];
    for (dx, dy) in deltas {
        cam.pan(dx, dy);
    }
    let sum_dx: f64 = deltas.iter().map(|d| d.0).sum();
    let sum_dy: f64 = deltas.iter().map(|d| d.1).sum();
    assert!(approx_eq(cam.x(), -sum_dx));
    assert!(approx_eq(cam.y(), sum_dy));
}

#[test]
fn pan_ignores_non_finite_deltas() {
    let mut cam = Camera::default();
    cam.pan(f64::NAN, 1.0);
    cam.pan(1.0, f64::INFINITY);
    assert_eq!(cam.position(), Point::new(0.0, 0.0));
}

// --- zoom ---

#[test]
fn zoom_by_clamps_exactly_to_max() {
    let mut cam = Camera::default();
    cam.set_zoom(4.5);
    cam.zoom_by(2.0, Point::new(100.0, 100.0));
    assert_eq!(cam.zoom(), 5.0);
}

#[test]
fn zoom_by_clamps_to_min() {
    let mut cam = Camera::default();
    cam.zoom_by(0.001, Point::new(0.0, 0.0));
    assert_eq!(cam.zoom(), 0.1);
}

#[test]
fn zoom_by_does_not_move_camera() {
    let mut cam = Camera::default();
    cam.pan(-40.0, 30.0);
    let before = cam.position();
    cam.zoom_by(1.5, Point::new(999.0, -999.0));
    assert_eq!(cam.position(), before);
}

#[test]
fn zoom_by_ignores_non_positive_and_non_finite_factors() {
    let mut cam = Camera::default();
    cam.zoom_by(0.0, Point::new(0.0, 0.0));
    cam.zoom_by(-2.0, Point::new(0.0, 0.0));
    cam.zoom_by(f64::NAN, Point::new(0.0, 0.0));
    assert_eq!(cam.zoom(), 1.0);
}

#[test]
fn zoom_step_follows_wheel_sign() {
    let mut cam = Camera::default();
    cam.zoom_step(120.0, 0.1);
    assert!(approx_eq(cam.zoom(), 1.1));
    cam.zoom_step(-3.0, 0.1);
    cam.zoom_step(-3.0, 0.1);
    assert!(approx_eq(cam.zoom(), 0.9));
}

#[test]
fn zoom_step_zero_delta_is_noop() {
    let mut cam = Camera::default();
    cam.zoom_step(0.0, 0.1);
    assert_eq!(cam.zoom(), 1.0);
}

#[test]
fn set_zoom_ignores_nan() {
    let mut cam = Camera::default();
    cam.set_zoom(f64::NAN);
    assert_eq!(cam.zoom(), 1.0);
}

// --- projection ---

#[test]
fn projection_bounds_scale_with_zoom() {
    let mut cam = Camera::default();
    cam.set_zoom(2.0);
    let b = cam.projection_bounds(vp());
    assert_eq!(b.left, -800.0);
    assert_eq!(b.right, 800.0);
    assert_eq!(b.top, 600.0);
    assert_eq!(b.bottom, -600.0);
}

#[test]
fn projection_bounds_follow_pan() {
    let mut cam = Camera::default();
    cam.pan(-100.0, 50.0);
    let b = cam.projection_bounds(vp());
    assert_eq!(b.left, -300.0);
    assert_eq!(b.top, 350.0);
    assert!(b.contains(Point::new(100.0, 50.0)));
}

// --- conversions ---

#[test]
fn screen_center_maps_to_camera_position() {
    let mut cam = Camera::default();
    cam.look_at(Point::new(12.0, -7.0));
    let world = cam.screen_to_world(vp().center(), vp());
    assert!(point_approx_eq(world, Point::new(12.0, -7.0)));
}

#[test]
fn screen_to_world_flips_y() {
    let cam = Camera::default();
    let world = cam.screen_to_world(Point::new(410.0, 290.0), vp());
    assert!(point_approx_eq(world, Point::new(10.0, 10.0)));
}

#[test]
fn screen_to_world_ignores_zoom() {
    let mut cam = Camera::default();
    let a = cam.screen_to_world(Point::new(500.0, 100.0), vp());
    cam.set_zoom(3.0);
    let b = cam.screen_to_world(Point::new(500.0, 100.0), vp());
    assert_eq!(a, b);
}

#[test]
fn screen_to_world_subtracts_surface_origin() {
    let cam = Camera::default();
    let v = vp().with_origin(100.0, 50.0);
    let world = cam.screen_to_world(Point::new(500.0, 350.0), v);
    assert!(point_approx_eq(world, Point::new(0.0, 0.0)));
}

#[test]
fn world_to_screen_inverts_screen_to_world_at_unit_zoom() {
    let mut cam = Camera::default();
    cam.pan(33.0, -12.0);
    let screen = Point::new(123.0, 456.0);
    let back = cam.world_to_screen(cam.screen_to_world(screen, vp()), vp());
    assert!(point_approx_eq(back, screen));
}

#[test]
fn world_to_screen_shrinks_with_zoom_out() {
    let mut cam = Camera::default();
    cam.set_zoom(2.0);
    let s = cam.world_to_screen(Point::new(200.0, 0.0), vp());
    assert!(point_approx_eq(s, Point::new(500.0, 300.0)));
}

#[test]
fn world_to_pointer_inverts_screen_to_world_at_any_zoom() {
    let mut cam = Camera::default();
    cam.pan(-40.0, 25.0);
    cam.set_zoom(3.0);
    let v = vp().with_origin(10.0, 20.0);
    for world in [Point::new(0.0, 0.0), Point::new(150.0, -80.0), Point::new(-7.5, 300.0)] {
        let pointer = cam.world_to_pointer(world, v);
        assert!(point_approx_eq(cam.screen_to_world(pointer, v), world));
    }
}

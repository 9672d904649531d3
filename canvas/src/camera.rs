#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::config::ZoomLimits;
use crate::consts::DEFAULT_ZOOM;

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<frames::WirePoint> for Point {
    fn from(p: frames::WirePoint) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<Point> for frames::WirePoint {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// The drawing surface rectangle in screen space (CSS pixels).
///
/// `left`/`top` are the surface's offset within the page, so raw client
/// coordinates can be converted without the caller subtracting them first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { left: 0.0, top: 0.0, width, height }
    }

    #[must_use]
    pub fn with_origin(mut self, left: f64, top: f64) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// Screen-space center of the surface.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Positive, finite dimensions.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Backing-store size in whole pixels, `None` when the viewport is not
    /// usable.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        if !self.is_usable() {
            return None;
        }
        let px = |v: f64| v.round().clamp(1.0, f64::from(u32::MAX)) as u32;
        Some((px(self.width), px(self.height)))
    }
}

/// Orthographic view bounds in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Bounds {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }
}

/// Camera state for pan/zoom on the infinite board.
///
/// `x`/`y` are the world-space point at the center of the view. `zoom`
/// multiplies the orthographic bounds, so larger values show more of the
/// world. World Y grows up; screen Y grows down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    x: f64,
    y: f64,
    zoom: f64,
    limits: ZoomLimits,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(ZoomLimits::default())
    }
}

impl Camera {
    #[must_use]
    pub fn new(limits: ZoomLimits) -> Self {
        Self { x: 0.0, y: 0.0, zoom: limits.clamp(DEFAULT_ZOOM), limits }
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    /// Apply a screen-space drag delta. Dragging right moves the view left,
    /// dragging down moves it up.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.x -= dx;
        self.y += dy;
    }

    /// Center the view on a world point.
    pub fn look_at(&mut self, target: Point) {
        if !target.is_finite() {
            return;
        }
        self.x = target.x;
        self.y = target.y;
    }

    /// Multiply the zoom by `factor`. Zoom is applied about the camera
    /// position; the anchor is accepted for API symmetry only.
    pub fn zoom_by(&mut self, factor: f64, _anchor: Point) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        self.zoom = self.limits.clamp(self.zoom * factor);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            return;
        }
        self.zoom = self.limits.clamp(zoom);
    }

    /// Wheel zoom: `+step` for a positive delta, `-step` for a negative one.
    pub fn zoom_step(&mut self, delta_y: f64, step: f64) {
        if !delta_y.is_finite() || !step.is_finite() || delta_y == 0.0 {
            return;
        }
        let signed = if delta_y > 0.0 { step } else { -step };
        self.zoom = self.limits.clamp(self.zoom + signed);
    }

    /// World-space bounds visible through `viewport` at the current zoom.
    #[must_use]
    pub fn projection_bounds(&self, viewport: Viewport) -> Bounds {
        let half_w = viewport.width / 2.0 * self.zoom;
        let half_h = viewport.height / 2.0 * self.zoom;
        Bounds {
            left: self.x - half_w,
            right: self.x + half_w,
            top: self.y + half_h,
            bottom: self.y - half_h,
        }
    }

    /// Convert a screen point to world coordinates.
    ///
    /// Zoom is not applied: a screen pixel maps to one world unit offset from
    /// the camera position regardless of zoom.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point, viewport: Viewport) -> Point {
        let center = viewport.center();
        Point {
            x: screen.x - center.x + self.x,
            y: -(screen.y - center.y) + self.y,
        }
    }

    /// The screen point that [`Camera::screen_to_world`] maps back to `world`.
    #[must_use]
    pub fn world_to_pointer(&self, world: Point, viewport: Viewport) -> Point {
        let center = viewport.center();
        Point {
            x: world.x - self.x + center.x,
            y: -(world.y - self.y) + center.y,
        }
    }

    /// Project a world point onto the screen through the zoomed bounds.
    #[must_use]
    pub fn world_to_screen(&self, world: Point, viewport: Viewport) -> Point {
        let bounds = self.projection_bounds(viewport);
        let (bw, bh) = (bounds.width(), bounds.height());
        if bw.abs() < f64::EPSILON || bh.abs() < f64::EPSILON {
            return viewport.center();
        }
        Point {
            x: viewport.left + (world.x - bounds.left) / bw * viewport.width,
            y: viewport.top + (bounds.top - world.y) / bh * viewport.height,
        }
    }

    /// World units per screen pixel at the current zoom.
    #[must_use]
    pub fn world_per_pixel(&self) -> f64 {
        self.zoom
    }
}

//! Input model: tools, buttons, intents, and the gesture state machine.
//!
//! [`InputRouter`] classifies raw pointer, touch, and wheel events into
//! [`Intent`]s based on the active [`Tool`] and how many touches are down.
//! It never mutates the camera or the drawing store itself; the session
//! applies the intents. The router only reads the camera to convert screen
//! coordinates into world coordinates for stroke points.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::{Camera, Point, Viewport};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Drag to move the view (default).
    #[default]
    Pan,
    /// Drag to draw a freehand stroke.
    Draw,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button.
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button.
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code.
    #[must_use]
    pub fn from_dom(code: i16) -> Self {
        match code {
            0 => Self::Primary,
            1 => Self::Middle,
            _ => Self::Secondary,
        }
    }
}

/// What the session should do in response to an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Start a new in-progress stroke at a world point.
    BeginStroke(Point),
    /// Append a world point to the in-progress stroke.
    ExtendStroke(Point),
    /// End the draw gesture; commit if the stroke has enough points.
    FinishStroke,
    /// Abandon the in-progress stroke without committing.
    CancelStroke,
    /// Pan the camera by a screen-space delta (damping already applied).
    Pan { dx: f64, dy: f64 },
    /// Set the zoom to an absolute value (pinch).
    SetZoom(f64),
    /// Step the zoom by the sign of a wheel delta.
    ZoomStep(f64),
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A draw gesture is active; the store holds the in-progress stroke.
    Drawing,
    /// A pan drag is active.
    Panning {
        /// Screen position of the previous event, used to compute the delta.
        last_screen: Point,
        /// Multiplier applied to each delta (1 for mouse, less for touch).
        damping: f64,
    },
    /// Two-finger pinch zoom.
    Pinching {
        /// Finger distance when the pinch began.
        initial_distance: f64,
        /// Camera zoom when the pinch began.
        initial_zoom: f64,
    },
}

/// The gesture state machine.
#[derive(Debug, Clone)]
pub struct InputRouter {
    tool: Tool,
    state: InputState,
    touch_damping: f64,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(crate::consts::TOUCH_PAN_DAMPING)
    }
}

impl InputRouter {
    #[must_use]
    pub fn new(touch_damping: f64) -> Self {
        Self { tool: Tool::default(), state: InputState::Idle, touch_damping }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn state(&self) -> InputState {
        self.state
    }

    /// Switch tools. An active gesture is abandoned first.
    pub fn set_tool(&mut self, tool: Tool) -> Vec<Intent> {
        let intents = self.cancel_active();
        self.tool = tool;
        intents
    }

    // --- Mouse ---

    pub fn pointer_down(&mut self, screen: Point, button: Button, camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        if button != Button::Primary || !screen.is_finite() {
            return Vec::new();
        }
        self.start_single(screen, 1.0, camera, viewport)
    }

    pub fn pointer_move(&mut self, screen: Point, camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        if !screen.is_finite() {
            return Vec::new();
        }
        self.move_single(screen, camera, viewport)
    }

    /// Pointer released or left the surface.
    pub fn pointer_up(&mut self) -> Vec<Intent> {
        self.end_single()
    }

    // --- Touch ---

    /// `touches` is every touch currently down, in screen space.
    pub fn touch_start(&mut self, touches: &[Point], camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        match touches {
            [] => Vec::new(),
            [single] => {
                if !matches!(self.state, InputState::Idle) || !single.is_finite() {
                    return Vec::new();
                }
                self.start_single(*single, self.touch_damping, camera, viewport)
            }
            [a, b, ..] => {
                let intents = self.cancel_active();
                self.state = InputState::Pinching { initial_distance: a.distance(*b), initial_zoom: camera.zoom() };
                intents
            }
        }
    }

    pub fn touch_move(&mut self, touches: &[Point], camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        match (self.state, touches) {
            (InputState::Pinching { initial_distance, initial_zoom }, [a, b, ..]) => {
                let distance = a.distance(*b);
                if !distance.is_finite() || distance <= f64::EPSILON || initial_distance <= f64::EPSILON {
                    return Vec::new();
                }
                vec![Intent::SetZoom(initial_zoom / (distance / initial_distance))]
            }
            (InputState::Pinching { .. }, _) => Vec::new(),
            (_, [single, ..]) if single.is_finite() => self.move_single(*single, camera, viewport),
            _ => Vec::new(),
        }
    }

    /// `remaining` is every touch still down after the lift.
    pub fn touch_end(&mut self, remaining: &[Point], camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        match (self.state, remaining) {
            (InputState::Pinching { .. }, []) => {
                self.state = InputState::Idle;
                Vec::new()
            }
            (InputState::Pinching { .. }, [single]) => {
                self.state = InputState::Idle;
                self.start_single(*single, self.touch_damping, camera, viewport)
            }
            (InputState::Pinching { .. }, _) => Vec::new(),
            (_, []) => self.end_single(),
            _ => Vec::new(),
        }
    }

    // --- Wheel ---

    pub fn wheel(&mut self, delta_y: f64) -> Vec<Intent> {
        if !delta_y.is_finite() || delta_y == 0.0 {
            return Vec::new();
        }
        vec![Intent::ZoomStep(delta_y)]
    }

    // --- Helpers ---

    fn start_single(&mut self, screen: Point, damping: f64, camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        match self.tool {
            Tool::Draw => {
                self.state = InputState::Drawing;
                vec![Intent::BeginStroke(camera.screen_to_world(screen, viewport))]
            }
            Tool::Pan => {
                self.state = InputState::Panning { last_screen: screen, damping };
                Vec::new()
            }
        }
    }

    fn move_single(&mut self, screen: Point, camera: &Camera, viewport: Viewport) -> Vec<Intent> {
        match self.state {
            InputState::Drawing => vec![Intent::ExtendStroke(camera.screen_to_world(screen, viewport))],
            InputState::Panning { last_screen, damping } => {
                self.state = InputState::Panning { last_screen: screen, damping };
                vec![Intent::Pan {
                    dx: (screen.x - last_screen.x) * damping,
                    dy: (screen.y - last_screen.y) * damping,
                }]
            }
            InputState::Idle | InputState::Pinching { .. } => Vec::new(),
        }
    }

    fn end_single(&mut self) -> Vec<Intent> {
        let intents = match self.state {
            InputState::Drawing => vec![Intent::FinishStroke],
            _ => Vec::new(),
        };
        self.state = InputState::Idle;
        intents
    }

    fn cancel_active(&mut self) -> Vec<Intent> {
        let intents = match self.state {
            InputState::Drawing => vec![Intent::CancelStroke],
            _ => Vec::new(),
        };
        self.state = InputState::Idle;
        intents
    }
}

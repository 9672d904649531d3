//! Shared numeric constants for the canvas crate.

use std::f64::consts::TAU;

// ── Camera ──────────────────────────────────────────────────────

/// Smallest zoom factor (most zoomed in).
pub const MIN_ZOOM: f64 = 0.1;

/// Largest zoom factor (most zoomed out).
pub const MAX_ZOOM: f64 = 5.0;

/// Initial zoom factor before any content loads.
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Zoom change per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.1;

/// Multiplier applied to touch pan deltas. Mouse pans are undamped.
pub const TOUCH_PAN_DAMPING: f64 = 0.5;

// ── Layout ──────────────────────────────────────────────────────

/// Base sticky-note width before the content factor is applied.
pub const NOTE_BASE_WIDTH: f64 = 220.0;

/// Base sticky-note height before the content factor is applied.
pub const NOTE_BASE_HEIGHT: f64 = 180.0;

/// Characters of header plus body that correspond to a content factor of 1.
pub const NOTE_CHARS_PER_FACTOR: f64 = 80.0;

/// Upper bound on the content size factor.
pub const NOTE_MAX_FACTOR: f64 = 2.0;

/// Lower bound on the pairwise center distance between notes.
pub const MIN_NOTE_DISTANCE: f64 = 280.0;

/// Pairwise distance as a multiple of the larger note's larger side.
pub const NOTE_DISTANCE_RATIO: f64 = 1.3;

/// Random placement attempts before falling back to the spiral.
pub const PLACEMENT_ATTEMPTS: u32 = 50;

/// Spiral fallback radius as a multiple of the distance threshold.
pub const FALLBACK_RADIUS_RATIO: f64 = 1.2;

/// Angular step per placed note on the fallback spiral.
pub const FALLBACK_ANGLE_STEP: f64 = 0.8;

/// One full turn, used to count spiral laps.
pub const FULL_TURN: f64 = TAU;

/// Spread width as a multiple of the viewport width.
pub const SPREAD_WIDTH_RATIO: f64 = 1.8;

/// Minimum spread width in world units.
pub const SPREAD_MIN_WIDTH: f64 = 1400.0;

/// Spread height as a multiple of the viewport height.
pub const SPREAD_HEIGHT_RATIO: f64 = 1.3;

/// Minimum spread height in world units.
pub const SPREAD_MIN_HEIGHT: f64 = 900.0;

/// Empty border kept inside the spread.
pub const SPREAD_MARGIN: f64 = 200.0;

/// Maximum tilt either side of the rotation bias, in degrees.
pub const NOTE_ROTATION_JITTER_DEG: f64 = 10.0;

/// Rotation bias, in degrees.
pub const NOTE_ROTATION_BIAS_DEG: f64 = 5.0;

// ── Scene ───────────────────────────────────────────────────────

/// Half-extent of the dot grid in world units.
pub const GRID_EXTENT: f64 = 3000.0;

/// Spacing between grid dots in world units.
pub const GRID_STEP: f64 = 50.0;

/// Grid depth (behind everything).
pub const GRID_DEPTH: f64 = -0.1;

/// Sticky-note billboard depth.
pub const NOTE_DEPTH: f64 = 0.0;

/// Committed stroke depth.
pub const STROKE_DEPTH: f64 = 0.1;

/// In-progress stroke depth (in front of committed strokes).
pub const IN_PROGRESS_DEPTH: f64 = 0.2;

/// Default stroke color.
pub const DEFAULT_STROKE_COLOR: &str = "#000000";

/// Scene background color.
pub const BACKGROUND_COLOR: &str = "#ffffff";

/// Grid dot color.
pub const GRID_COLOR: &str = "#d0d0d0";

// ── Sync ────────────────────────────────────────────────────────

/// Interval between presence heartbeats, in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: i64 = 5_000;

/// A session with no heartbeat for this long is considered gone.
pub const PRESENCE_TIMEOUT_MS: i64 = 10_000;

// ── Intro ───────────────────────────────────────────────────────

/// Zoom used while focusing on the first note after load.
pub const INTRO_FOCUS_ZOOM: f64 = 1.5;

/// Zoom once the intro settles on the origin.
pub const INTRO_OVERVIEW_ZOOM: f64 = 2.5;

/// Delay between the focus and overview intro steps.
pub const INTRO_DELAY_MS: i64 = 2_000;

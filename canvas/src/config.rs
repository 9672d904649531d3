//! Core tunables for a whiteboard session.
//!
//! Every knob has a default matching the shipped behavior, so hosts usually
//! construct [`BoardConfig::default`] and override a field or two. The web
//! host can also pass a JSON object, parsed with [`BoardConfig::from_json`];
//! missing fields keep their defaults.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_STROKE_COLOR, HEARTBEAT_INTERVAL_MS, INTRO_DELAY_MS, INTRO_FOCUS_ZOOM, INTRO_OVERVIEW_ZOOM, MAX_ZOOM,
    MIN_NOTE_DISTANCE, MIN_ZOOM, NOTE_DISTANCE_RATIO, PLACEMENT_ATTEMPTS, PRESENCE_TIMEOUT_MS, SPREAD_MARGIN,
    TOUCH_PAN_DAMPING, WHEEL_ZOOM_STEP,
};

/// Inclusive zoom range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: MIN_ZOOM, max: MAX_ZOOM }
    }
}

impl ZoomLimits {
    /// Clamp `zoom` into the range. A reversed range is treated as its
    /// normalized form; a non-finite bound falls back to the default range.
    #[must_use]
    pub fn clamp(&self, zoom: f64) -> f64 {
        let (lo, hi) = self.bounds();
        zoom.clamp(lo, hi)
    }

    fn bounds(&self) -> (f64, f64) {
        if !self.min.is_finite() || !self.max.is_finite() {
            return (MIN_ZOOM, MAX_ZOOM);
        }
        if self.min <= self.max { (self.min, self.max) } else { (self.max, self.min) }
    }
}

/// Sticky-note placement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Random candidates tried per note before the spiral fallback.
    pub attempts: u32,
    /// Floor on the pairwise center distance.
    pub min_distance: f64,
    /// Pairwise distance as a multiple of the larger side.
    pub distance_ratio: f64,
    /// Empty border inside the spread.
    pub margin: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            attempts: PLACEMENT_ATTEMPTS,
            min_distance: MIN_NOTE_DISTANCE,
            distance_ratio: NOTE_DISTANCE_RATIO,
            margin: SPREAD_MARGIN,
        }
    }
}

/// Camera intro played once after notes load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroConfig {
    pub enabled: bool,
    pub focus_zoom: f64,
    pub overview_zoom: f64,
    pub delay_ms: i64,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            focus_zoom: INTRO_FOCUS_ZOOM,
            overview_zoom: INTRO_OVERVIEW_ZOOM,
            delay_ms: INTRO_DELAY_MS,
        }
    }
}

/// Session-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub zoom: ZoomLimits,
    pub wheel_zoom_step: f64,
    pub touch_pan_damping: f64,
    pub layout: LayoutParams,
    pub heartbeat_interval_ms: i64,
    pub presence_timeout_ms: i64,
    pub intro: IntroConfig,
    /// Color stamped on strokes authored by this session.
    pub stroke_color: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomLimits::default(),
            wheel_zoom_step: WHEEL_ZOOM_STEP,
            touch_pan_damping: TOUCH_PAN_DAMPING,
            layout: LayoutParams::default(),
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            presence_timeout_ms: PRESENCE_TIMEOUT_MS,
            intro: IntroConfig::default(),
            stroke_color: DEFAULT_STROKE_COLOR.to_owned(),
        }
    }
}

impl BoardConfig {
    /// Parse a (possibly partial) JSON config object.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input or mistyped fields.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#![allow(clippy::float_cmp)]

use super::*;
use crate::camera::Camera;

#[test]
fn defaults_match_shipped_constants() {
    let config = BoardConfig::default();
    assert_eq!(config.zoom.min, 0.1);
    assert_eq!(config.zoom.max, 5.0);
    assert_eq!(config.wheel_zoom_step, 0.1);
    assert_eq!(config.touch_pan_damping, 0.5);
    assert_eq!(config.layout.attempts, 50);
    assert_eq!(config.heartbeat_interval_ms, 5_000);
    assert_eq!(config.presence_timeout_ms, 10_000);
    assert_eq!(config.stroke_color, "#000000");
    assert!(config.intro.enabled);
}

#[test]
fn partial_json_keeps_defaults() {
    let config = BoardConfig::from_json(r##"{"stroke_color":"#ff0000","intro":{"enabled":false}}"##).expect("parse");
    assert_eq!(config.stroke_color, "#ff0000");
    assert!(!config.intro.enabled);
    assert_eq!(config.intro.delay_ms, 2_000);
    assert_eq!(config.zoom, ZoomLimits::default());
}

#[test]
fn mistyped_json_is_rejected() {
    assert!(BoardConfig::from_json(r#"{"wheel_zoom_step":"fast"}"#).is_err());
}

#[test]
fn zoom_limits_clamp_both_ends() {
    let limits = ZoomLimits::default();
    assert_eq!(limits.clamp(0.01), 0.1);
    assert_eq!(limits.clamp(9.0), 5.0);
    assert_eq!(limits.clamp(2.0), 2.0);
}

#[test]
fn reversed_zoom_limits_are_normalized() {
    let limits = ZoomLimits { min: 5.0, max: 0.1 };
    assert_eq!(limits.clamp(9.0), 5.0);
    assert_eq!(limits.clamp(0.0), 0.1);
}

#[test]
fn partial_zoom_section_keeps_other_bound() {
    let config = BoardConfig::from_json(r#"{"zoom":{"min":0.2}}"#).expect("parse");
    assert_eq!(config.zoom.min, 0.2);
    assert_eq!(config.zoom.max, 5.0);
}

#[test]
fn non_finite_zoom_limits_fall_back_to_defaults() {
    let limits = ZoomLimits { min: f64::NAN, max: 3.0 };
    assert_eq!(limits.clamp(9.0), 5.0);
    assert_eq!(limits.clamp(0.0), 0.1);

    let camera = Camera::new(ZoomLimits { min: 0.5, max: f64::INFINITY });
    assert_eq!(camera.zoom(), 1.0);
}

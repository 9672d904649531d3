#![allow(clippy::float_cmp)]

use super::*;
use crate::camera::Point;
use crate::notes::NoteColor;

fn note(color: NoteColor, fold: CornerFold) -> StickyNote {
    StickyNote {
        id: "n".to_owned(),
        header: "Hello".to_owned(),
        body: "A short body".to_owned(),
        icon: "\u{1f4dd}".to_owned(),
        color,
        link: None,
        image: None,
        order_index: 0,
        position: Point::new(0.0, 0.0),
        width: 220.0,
        height: 180.0,
        rotation_deg: 2.0,
        corner_fold: fold,
    }
}

// --- Metrics ---

#[test]
fn side_has_floor_of_512() {
    let m = TextureMetrics::for_width(220.0);
    assert_eq!(m.side, 512);
    assert_eq!(m.inner, 472.0);
    assert_eq!(m.fold, 40.96);
    assert_eq!(m.icon_px, 80.0);
    assert_eq!(m.header_px, 51.2);
    assert_eq!(m.body_px, 33.28);
}

#[test]
fn side_scales_with_wide_notes() {
    let m = TextureMetrics::for_width(440.0);
    assert_eq!(m.side, 1100);
    assert_eq!(m.icon_px, 165.0);
}

#[test]
fn degenerate_width_uses_floor() {
    assert_eq!(TextureMetrics::for_width(f64::NAN).side, 512);
    assert_eq!(TextureMetrics::for_width(-10.0).side, 512);
}

#[test]
fn body_lines_fit_available_height() {
    let m = TextureMetrics::for_width(220.0);
    let available: f64 = 472.0 - (80.0 + 80.0) - 40.0;
    assert_eq!(m.body_max_lines(), (available / (33.28 * 1.4)).floor() as usize);
}

// --- Wrapping ---

#[test]
fn wrap_breaks_before_overflowing_word() {
    let wrapped = wrap_text("aa bb cc", 7.0, 30.0, 10);
    assert_eq!(wrapped.lines, vec!["aa", "bb", "cc"]);
    assert_eq!(wrapped.wrapped, 2);
    assert!(!wrapped.ellipsis);
}

#[test]
fn wrap_keeps_overlong_single_word_on_its_own_line() {
    let wrapped = wrap_text("abcdefghij", 7.0, 30.0, 10);
    assert_eq!(wrapped.lines, vec!["abcdefghij"]);
}

#[test]
fn wrap_drops_lines_past_limit_without_ellipsis_for_short_text() {
    let wrapped = wrap_text("aa bb cc", 7.0, 30.0, 2);
    assert_eq!(wrapped.lines, vec!["aa", "bb"]);
    assert!(!wrapped.ellipsis);
}

#[test]
fn wrap_adds_ellipsis_for_long_truncated_text() {
    let wrapped = wrap_text("a a a a a a a a a", 7.0, 30.0, 2);
    assert_eq!(wrapped.lines, vec!["a a", "a a"]);
    assert!(wrapped.ellipsis);
}

#[test]
fn wrap_empty_text_has_no_lines() {
    let wrapped = wrap_text("", 7.0, 30.0, 3);
    assert!(wrapped.lines.is_empty());
    assert!(!wrapped.ellipsis);
}

// --- Baking ---

#[test]
fn texture_is_square_at_metric_side() {
    let img = bake_note_texture(&note(NoteColor::Yellow, CornerFold::Right));
    assert_eq!(img.dimensions(), (512, 512));
}

#[test]
fn paper_uses_color_map() {
    let img = bake_note_texture(&note(NoteColor::Yellow, CornerFold::Right));
    assert_eq!(img.get_pixel(452, 452).0, [0xff, 0xff, 0x33, 255]);
    let img = bake_note_texture(&note(NoteColor::Blue, CornerFold::Right));
    assert_eq!(img.get_pixel(452, 452).0, [0xad, 0xd8, 0xe6, 255]);
}

#[test]
fn shadow_shows_below_right_and_corner_is_clear() {
    let img = bake_note_texture(&note(NoteColor::Yellow, CornerFold::Right));
    assert_eq!(img.get_pixel(480, 480).0, [0, 0, 0, 77]);
    assert_eq!(img.get_pixel(505, 505).0[3], 0);
}

#[test]
fn right_fold_has_white_and_darker_halves() {
    let img = bake_note_texture(&note(NoteColor::Yellow, CornerFold::Right));
    assert_eq!(img.get_pixel(467, 5).0, [255, 255, 255, 255]);
    assert_eq!(img.get_pixel(434, 37).0, [215, 215, 11, 255]);
}

#[test]
fn left_fold_mirrors_right() {
    let img = bake_note_texture(&note(NoteColor::Yellow, CornerFold::Left));
    assert_eq!(img.get_pixel(5, 5).0, [255, 255, 255, 255]);
    assert_eq!(img.get_pixel(38, 20).0, [215, 215, 11, 255]);
    assert_eq!(img.get_pixel(467, 5).0, [0xff, 0xff, 0x33, 255]);
}

#[test]
fn header_ink_is_drawn_after_icon() {
    let img = bake_note_texture(&note(NoteColor::White, CornerFold::Right));
    let ink = (125..200).any(|x| (45..97).any(|y| img.get_pixel(x, y).0 == [0, 0, 0, 255]));
    assert!(ink);
}

#[test]
fn baking_is_deterministic() {
    let a = bake_note_texture(&note(NoteColor::Green, CornerFold::Left));
    let b = bake_note_texture(&note(NoteColor::Green, CornerFold::Left));
    assert_eq!(a, b);
}

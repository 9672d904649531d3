//! Sticky-note texture baking.
//!
//! [`bake_note_texture`] is a pure function from a note to an RGBA image: it
//! draws the drop shadow, the colored square, the folded corner, a faint
//! border, and the icon, header, and word-wrapped body with the built-in
//! bitmap font. The renderer bakes each note once when it enters the scene.

#[cfg(test)]
#[path = "texture_test.rs"]
mod texture_test;

use image::{Rgba, RgbaImage};

use crate::font::{self, GLYPH_HEIGHT, GLYPH_WIDTH, Glyph};
use crate::notes::{CornerFold, StickyNote};

const MIN_SIDE: u32 = 512;
const SIDE_PER_WIDTH: f64 = 2.5;
const SHADOW_PADDING: u32 = 40;
const SHADOW_OFFSET: f64 = 15.0;
const BORDER_WIDTH: f64 = 3.0;
const FOLD_DARKEN: u8 = 40;
const TEXT_LEFT: f64 = 30.0;
const LINE_HEIGHT_RATIO: f64 = 1.4;
const ELLIPSIS_MIN_WORDS: usize = 8;

const SHADOW: Rgba<u8> = Rgba([0, 0, 0, 77]);
const BORDER: Rgba<u8> = Rgba([0, 0, 0, 26]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const FADED_INK: Rgba<u8> = Rgba([0x66, 0x66, 0x66, 255]);
const PAPER_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Geometry of a texture for a note of a given world width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMetrics {
    /// Square texture side in pixels.
    pub side: u32,
    /// Side of the paper square (the rest is shadow room).
    pub inner: f64,
    pub fold: f64,
    pub icon_px: f64,
    pub header_px: f64,
    pub body_px: f64,
}

impl TextureMetrics {
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_width(note_width: f64) -> Self {
        let wanted = (note_width.max(0.0) * SIDE_PER_WIDTH).ceil();
        let side = if wanted.is_finite() && wanted > f64::from(MIN_SIDE) {
            wanted.min(f64::from(u16::MAX)) as u32
        } else {
            MIN_SIDE
        };
        let s = f64::from(side);

        Self {
            side,
            inner: f64::from(side - SHADOW_PADDING),
            fold: (s * 0.08).max(40.0),
            icon_px: (s * 0.15).max(80.0),
            header_px: (s * 0.1).max(48.0),
            body_px: (s * 0.065).max(32.0),
        }
    }

    #[must_use]
    pub fn line_height(&self) -> f64 {
        self.body_px * LINE_HEIGHT_RATIO
    }

    /// Top of the first body line.
    #[must_use]
    pub fn body_top(&self) -> f64 {
        self.icon_px + 80.0
    }

    /// Widest a body line may be.
    #[must_use]
    pub fn body_max_width(&self) -> f64 {
        self.inner - 70.0
    }

    /// Body lines that fit above the bottom padding.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn body_max_lines(&self) -> usize {
        let available = self.inner - self.body_top() - 40.0;
        if available <= 0.0 { 0 } else { (available / self.line_height()).floor() as usize }
    }
}

/// Result of greedy word wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedText {
    pub lines: Vec<String>,
    /// Lines emitted because the next word overflowed (the trailing partial
    /// line is not counted).
    pub wrapped: usize,
    /// Whether a gray ellipsis follows the last line.
    pub ellipsis: bool,
}

/// Greedy word wrap on single spaces.
///
/// A line breaks before the word that would push it past `max_width`. At most
/// `max_lines` lines are produced. The ellipsis is shown when every line was
/// used by wrapping and the text has more than eight words.
#[must_use]
pub fn wrap_text(text: &str, font_px: f64, max_width: f64, max_lines: usize) -> WrappedText {
    let words: Vec<&str> = text.split(' ').collect();
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in &words {
        if lines.len() >= max_lines {
            break;
        }
        let candidate = format!("{line}{word} ");
        if font::text_width(&candidate, font_px) > max_width && !line.is_empty() {
            lines.push(line.trim().to_owned());
            line = format!("{word} ");
        } else {
            line = candidate;
        }
    }

    let wrapped = lines.len();
    if !line.trim().is_empty() && wrapped < max_lines {
        lines.push(line.trim().to_owned());
    }

    WrappedText { lines, wrapped, ellipsis: wrapped >= max_lines && words.len() > ELLIPSIS_MIN_WORDS }
}

/// Bake the texture for `note`.
#[must_use]
pub fn bake_note_texture(note: &StickyNote) -> RgbaImage {
    let m = TextureMetrics::for_width(note.width);
    let mut img = RgbaImage::new(m.side, m.side);
    let inner = m.inner;

    let [r, g, b] = note.color.rgb();
    let paper = Rgba([r, g, b, 255]);

    fill_rect(&mut img, SHADOW_OFFSET, SHADOW_OFFSET, inner, inner, SHADOW);
    fill_rect(&mut img, 0.0, 0.0, inner, inner, paper);
    draw_fold(&mut img, &m, note.corner_fold, darken(paper, FOLD_DARKEN));
    stroke_rect(&mut img, 0.0, 0.0, inner, inner, BORDER_WIDTH, BORDER);

    draw_text(&mut img, &note.icon, TEXT_LEFT, 30.0, m.icon_px, INK, false);
    draw_text(&mut img, &note.header, m.icon_px + 45.0, 45.0, m.header_px, INK, true);

    let body = wrap_text(&note.body, m.body_px, m.body_max_width(), m.body_max_lines());
    let line_height = m.line_height();
    let top = m.body_top();
    for (i, line) in (0_u32..).zip(&body.lines) {
        draw_text(&mut img, line, TEXT_LEFT, top + f64::from(i) * line_height, m.body_px, INK, false);
    }
    if body.ellipsis {
        #[allow(clippy::cast_precision_loss)]
        let y = top + (body.wrapped + 1) as f64 * line_height;
        draw_text(&mut img, "...", TEXT_LEFT, y, m.body_px * 0.8, FADED_INK, false);
    }

    img
}

// =============================================================================
// PRIMITIVES
// =============================================================================

fn darken(c: Rgba<u8>, by: u8) -> Rgba<u8> {
    let [r, g, b, a] = c.0;
    Rgba([r.saturating_sub(by), g.saturating_sub(by), b.saturating_sub(by), a])
}

fn draw_fold(img: &mut RgbaImage, m: &TextureMetrics, side: CornerFold, shade: Rgba<u8>) {
    let (edge, inset) = match side {
        CornerFold::Right => (m.inner, m.inner - m.fold),
        CornerFold::Left => (0.0, m.fold),
    };
    // The white half is the exposed corner; the shaded half is the flap.
    fill_triangle(img, (inset, 0.0), (edge, 0.0), (edge, m.fold), PAPER_WHITE);
    fill_triangle(img, (inset, 0.0), (inset, m.fold), (edge, m.fold), shade);
}

/// Source-over blend of `src` onto the pixel at `(x, y)`.
fn blend(img: &mut RgbaImage, x: u32, y: u32, src: Rgba<u8>) {
    let Some(dst) = img.get_pixel_mut_checked(x, y) else {
        return;
    };
    let sa = f32::from(src.0[3]) / 255.0;
    let da = f32::from(dst.0[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for i in 0..3 {
        let s = f32::from(src.0[i]);
        let d = f32::from(dst.0[i]);
        dst.0[i] = to_channel((s * sa + d * da * (1.0 - sa)) / out_a);
    }
    dst.0[3] = to_channel(out_a * 255.0);
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Pixel index range covering `[start, end)` in continuous coordinates,
/// clipped to `[0, limit)`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn span(start: f64, end: f64, limit: u32) -> std::ops::Range<u32> {
    let lo = start.round().max(0.0);
    let hi = end.round().min(f64::from(limit));
    if lo >= hi {
        return 0..0;
    }
    (lo as u32)..(hi as u32)
}

fn fill_rect(img: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    for py in span(y, y + h, height) {
        for px in span(x, x + w, width) {
            blend(img, px, py, color);
        }
    }
}

/// Stroke centered on the rectangle edge, like a canvas `strokeRect`.
fn stroke_rect(img: &mut RgbaImage, x: f64, y: f64, w: f64, h: f64, line: f64, color: Rgba<u8>) {
    let half = line / 2.0;
    fill_rect(img, x - half, y - half, w + line, line, color);
    fill_rect(img, x - half, y + h - half, w + line, line, color);
    fill_rect(img, x - half, y + half, line, h - line, color);
    fill_rect(img, x + w - half, y + half, line, h - line, color);
}

fn fill_triangle(img: &mut RgbaImage, a: (f64, f64), b: (f64, f64), c: (f64, f64), color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    let min_x = a.0.min(b.0).min(c.0);
    let max_x = a.0.max(b.0).max(c.0);
    let min_y = a.1.min(b.1).min(c.1);
    let max_y = a.1.max(b.1).max(c.1);

    let edge = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0);
    let area = edge(a, b, c);
    if area.abs() < f64::EPSILON {
        return;
    }

    for py in span(min_y, max_y, height) {
        for px in span(min_x, max_x, width) {
            let p = (f64::from(px) + 0.5, f64::from(py) + 0.5);
            let w0 = edge(b, c, p) / area;
            let w1 = edge(c, a, p) / area;
            let w2 = edge(a, b, p) / area;
            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                blend(img, px, py, color);
            }
        }
    }
}

/// Draw `text` with its top-left corner at `(x, y)`; `font_px` is the glyph
/// height in pixels.
fn draw_text(img: &mut RgbaImage, text: &str, x: f64, y: f64, font_px: f64, color: Rgba<u8>, bold: bool) {
    let unit = font::unit(font_px);
    let mut cursor = x;

    for c in text.chars() {
        let Glyph::Rows(rows) = font::glyph(c) else {
            continue;
        };
        for (row, bits) in (0..GLYPH_HEIGHT).zip(rows) {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = cursor + f64::from(col) * unit;
                let py = y + f64::from(row) * unit;
                let w = if bold { unit * 1.35 } else { unit };
                fill_rect(img, px, py, w, unit, color);
            }
        }
        cursor += f64::from(font::ADVANCE) * unit;
    }
}

//! Content records from the notes API and the sticky notes built from them.
//!
//! The content source returns a JSON array of records. Any failure to obtain
//! or decode that array is replaced by a single built-in fallback note so the
//! board always has something to show.

#[cfg(test)]
#[path = "notes_test.rs"]
mod notes_test;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::camera::Point;
use crate::consts::{NOTE_ROTATION_BIAS_DEG, NOTE_ROTATION_JITTER_DEG};

/// Header used when a record has none.
pub const DEFAULT_HEADER: &str = "Note";

/// Icon used when a record has none.
pub const DEFAULT_ICON: &str = "\u{1f4dd}";

/// Id of the built-in fallback note.
pub const FALLBACK_NOTE_ID: &str = "fallback-note";

// =============================================================================
// CONTENT RECORDS
// =============================================================================

/// One record as returned by the content API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub content: RecordContent,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The `content` object of a record. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordContent {
    pub header: Option<String>,
    pub text: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
}

impl ContentRecord {
    /// Header with the default applied.
    #[must_use]
    pub fn header(&self) -> &str {
        non_empty(self.content.header.as_deref()).unwrap_or(DEFAULT_HEADER)
    }

    /// Body text, empty when absent.
    #[must_use]
    pub fn body(&self) -> &str {
        self.content.text.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn icon(&self) -> &str {
        non_empty(self.content.icon.as_deref()).unwrap_or(DEFAULT_ICON)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Decode a content API response body.
///
/// # Errors
///
/// Returns the `serde_json` error when the body is not an array of records.
pub fn parse_records(body: &str) -> Result<Vec<ContentRecord>, serde_json::Error> {
    serde_json::from_str(body)
}

/// The single note shown when content cannot be loaded.
#[must_use]
pub fn fallback_records() -> Vec<ContentRecord> {
    vec![ContentRecord {
        id: FALLBACK_NOTE_ID.to_owned(),
        content: RecordContent {
            header: Some("API Error".to_owned()),
            text: Some("Failed to load notes from API. Check connection.".to_owned()),
            icon: Some("\u{26a0}\u{fe0f}".to_owned()),
            color: Some("red".to_owned()),
            link: None,
            image: None,
        },
        order_index: 0,
        created_at: None,
        updated_at: None,
    }]
}

/// Resolve a content fetch: records sorted by `order_index` (stable) on
/// success, the fallback note on any failure.
pub fn records_or_fallback<E: fmt::Display>(result: Result<Vec<ContentRecord>, E>) -> Vec<ContentRecord> {
    match result {
        Ok(mut records) => {
            records.sort_by_key(|r| r.order_index);
            records
        }
        Err(e) => {
            tracing::warn!(error = %e, "content fetch failed; using fallback note");
            fallback_records()
        }
    }
}

// =============================================================================
// STICKY NOTES
// =============================================================================

/// Color category of a note, mapped to a fixed fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Orange,
    Purple,
    Red,
    White,
    Cyan,
    Lime,
}

impl NoteColor {
    /// Parse a color category name. Unknown names map to yellow.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pink" => Self::Pink,
            "blue" => Self::Blue,
            "green" => Self::Green,
            "orange" => Self::Orange,
            "purple" => Self::Purple,
            "red" => Self::Red,
            "white" => Self::White,
            "cyan" => Self::Cyan,
            "lime" => Self::Lime,
            _ => Self::Yellow,
        }
    }

    /// Fill color as RGB. Red deliberately shares pink's soft fill.
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::Yellow => [0xff, 0xff, 0x33],
            Self::Pink | Self::Red => [0xff, 0xb6, 0xc1],
            Self::Blue => [0xad, 0xd8, 0xe6],
            Self::Green => [0x90, 0xee, 0x90],
            Self::Orange => [0xff, 0xa5, 0x00],
            Self::Purple => [0xdd, 0xa0, 0xdd],
            Self::White => [0xff, 0xff, 0xff],
            Self::Cyan => [0xe0, 0xff, 0xff],
            Self::Lime => [0xf0, 0xff, 0xf0],
        }
    }

    /// Fill color as a CSS hex string.
    #[must_use]
    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Which top corner of the note is folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerFold {
    Left,
    Right,
}

/// A sticky note placed on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct StickyNote {
    pub id: String,
    pub header: String,
    pub body: String,
    pub icon: String,
    pub color: NoteColor,
    pub link: Option<String>,
    pub image: Option<String>,
    pub order_index: i64,
    /// Center in world space.
    pub position: Point,
    pub width: f64,
    pub height: f64,
    /// Tilt in degrees.
    pub rotation_deg: f64,
    pub corner_fold: CornerFold,
}

impl StickyNote {
    /// Build a note from a record at a resolved position and size. Rotation
    /// and corner fold are drawn from `rng` once, here.
    pub fn from_record<R: Rng>(record: &ContentRecord, position: Point, size: (f64, f64), rng: &mut R) -> Self {
        let rotation_deg = (rng.random::<f64>() - 0.5) * NOTE_ROTATION_JITTER_DEG + NOTE_ROTATION_BIAS_DEG;
        let corner_fold = if rng.random_bool(0.5) { CornerFold::Left } else { CornerFold::Right };

        Self {
            id: record.id.clone(),
            header: record.header().to_owned(),
            body: record.body().to_owned(),
            icon: record.icon().to_owned(),
            color: record.content.color.as_deref().map(NoteColor::from_name).unwrap_or_default(),
            link: record.content.link.clone().filter(|s| !s.is_empty()),
            image: record.content.image.clone().filter(|s| !s.is_empty()),
            order_index: record.order_index,
            position,
            width: size.0,
            height: size.1,
            rotation_deg,
            corner_fold,
        }
    }
}

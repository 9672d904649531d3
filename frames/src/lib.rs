//! Shared sync message model and codecs for the whiteboard transport.
//!
//! This crate owns the wire representation used by the canvas core, the
//! relay server, and the CLI. Every mutation or presence signal travels as an
//! [`Envelope`] carrying one [`SyncMessage`]. JSON is used by text media
//! (browser storage, debug sockets); protobuf is the compact binary encoding
//! the relay speaks by default.

use std::collections::{BTreeMap, HashSet};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sender tag used for envelopes that originate from the medium itself
/// (snapshots, presence) rather than from a whiteboard session.
pub const RELAY_SENDER: &str = "relay";

/// Every message kind tag, in declaration order.
pub const MESSAGE_KINDS: [&str; 8] = [
    "stroke-committed",
    "clear-canvas",
    "cursor-position",
    "drawing-start",
    "drawing-end",
    "sticky-positions-updated",
    "snapshot",
    "presence",
];

/// Error returned by the decode helpers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireEnvelope`.
    #[error("failed to decode protobuf envelope: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The JSON text or payload did not match the message model.
    #[error("invalid envelope json: {0}")]
    Json(#[from] serde_json::Error),
    /// The `kind` on the wire is not one of [`MESSAGE_KINDS`].
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
}

/// A world-space point on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub x: f64,
    pub y: f64,
}

/// A committed stroke on the wire and in durable side-stores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireStroke {
    /// Unique per authoring session.
    pub id: String,
    /// World-space points in drawing order.
    pub points: Vec<WirePoint>,
    /// Milliseconds since the Unix epoch when the stroke was committed.
    #[serde(rename = "timestamp")]
    pub created_at: i64,
    /// CSS color string.
    pub color: String,
    /// Session identifier of the author.
    pub author: String,
}

/// Sticky-note positions keyed by note id.
pub type Positions = BTreeMap<String, WirePoint>;

/// Whether a message kind updates the medium's durable side-store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
    /// Applied to the side-store so late joiners can reconstruct state.
    Persisted,
    /// Fire-and-forget.
    Ephemeral,
}

/// The sync message taxonomy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// A stroke was committed by its author.
    StrokeCommitted { stroke: WireStroke },
    /// All committed strokes were cleared.
    ClearCanvas,
    /// Live pointer position while a peer draws.
    CursorPosition { point: WirePoint, drawing: bool },
    /// A peer started a draw gesture.
    DrawingStart { point: WirePoint },
    /// A peer finished a draw gesture.
    DrawingEnd,
    /// Sticky-note positions changed (last write wins per note).
    StickyPositionsUpdated { positions: Positions },
    /// Side-store contents, sent by the medium to a newly connected session.
    Snapshot { strokes: Vec<WireStroke>, positions: Positions },
    /// Number of sessions currently connected to the medium.
    Presence { sessions: u32 },
}

impl SyncMessage {
    /// The kebab-case kind tag used on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StrokeCommitted { .. } => "stroke-committed",
            Self::ClearCanvas => "clear-canvas",
            Self::CursorPosition { .. } => "cursor-position",
            Self::DrawingStart { .. } => "drawing-start",
            Self::DrawingEnd => "drawing-end",
            Self::StickyPositionsUpdated { .. } => "sticky-positions-updated",
            Self::Snapshot { .. } => "snapshot",
            Self::Presence { .. } => "presence",
        }
    }

    #[must_use]
    pub fn durability(&self) -> Durability {
        match self {
            Self::StrokeCommitted { .. } | Self::ClearCanvas | Self::StickyPositionsUpdated { .. } => {
                Durability::Persisted
            }
            _ => Durability::Ephemeral,
        }
    }

    /// Kinds only the medium may originate. Sessions never send these.
    #[must_use]
    pub fn is_medium_only(&self) -> bool {
        matches!(self, Self::Snapshot { .. } | Self::Presence { .. })
    }
}

/// A single message on the sync transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique identifier for this envelope.
    pub id: String,
    /// Sender session identifier, or [`RELAY_SENDER`].
    pub from: String,
    /// Milliseconds since the Unix epoch when the envelope was created.
    pub ts: i64,
    pub message: SyncMessage,
}

impl Envelope {
    #[must_use]
    pub fn new(id: impl Into<String>, from: impl Into<String>, ts: i64, message: SyncMessage) -> Self {
        Self { id: id.into(), from: from.into(), ts, message }
    }

    /// Whether this envelope was sent by `session`.
    #[must_use]
    pub fn is_from(&self, session: &str) -> bool {
        self.from == session
    }
}

// =============================================================================
// SIDE-STORE
// =============================================================================

/// Durable state a sync medium keeps so late joiners can catch up.
///
/// Strokes are append-only and deduped by id, clear empties them, and
/// positions merge last-write-wins per note id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideStore {
    strokes: Vec<WireStroke>,
    stroke_ids: HashSet<String>,
    positions: Positions,
}

impl SideStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a message into the store. Returns `false` when the message is a
    /// duplicate stroke and should not be fanned out again.
    pub fn apply(&mut self, message: &SyncMessage) -> bool {
        match message {
            SyncMessage::StrokeCommitted { stroke } => {
                if !self.stroke_ids.insert(stroke.id.clone()) {
                    return false;
                }
                self.strokes.push(stroke.clone());
                true
            }
            SyncMessage::ClearCanvas => {
                self.strokes.clear();
                self.stroke_ids.clear();
                true
            }
            SyncMessage::StickyPositionsUpdated { positions } => {
                self.positions
                    .extend(positions.iter().map(|(id, p)| (id.clone(), *p)));
                true
            }
            _ => true,
        }
    }

    /// A `snapshot` message carrying the current contents.
    #[must_use]
    pub fn snapshot(&self) -> SyncMessage {
        SyncMessage::Snapshot { strokes: self.strokes.clone(), positions: self.positions.clone() }
    }

    #[must_use]
    pub fn strokes(&self) -> &[WireStroke] {
        &self.strokes
    }

    #[must_use]
    pub fn positions(&self) -> &Positions {
        &self.positions
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Serialize an envelope to JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails (non-string map keys
/// cannot occur with this model, so this is not expected in practice).
pub fn envelope_to_json(envelope: &Envelope) -> Result<String, CodecError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Parse an envelope from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed text or payloads.
pub fn envelope_from_json(text: &str) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// PROTOBUF
// =============================================================================

/// Encode an envelope into protobuf bytes.
#[must_use]
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    let wire = envelope_to_wire(envelope);

    let mut out = Vec::with_capacity(wire.encoded_len());
    // Encoding into a growable Vec cannot run out of buffer space.
    wire.encode(&mut out).unwrap_or_default();
    out
}

/// Decode protobuf bytes into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes,
/// [`CodecError::UnknownKind`] for unrecognized kinds, and
/// [`CodecError::Json`] when the payload does not fit the kind.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let wire = WireEnvelope::decode(bytes)?;
    wire_to_envelope(wire)
}

fn envelope_to_wire(envelope: &Envelope) -> WireEnvelope {
    let payload = serde_json::to_value(&envelope.message)
        .ok()
        .and_then(|mut v| v.get_mut("data").map(Value::take));

    WireEnvelope {
        id: envelope.id.clone(),
        from: envelope.from.clone(),
        ts: envelope.ts,
        kind: envelope.message.kind().to_owned(),
        data: payload.as_ref().map(json_to_proto_value),
    }
}

fn wire_to_envelope(wire: WireEnvelope) -> Result<Envelope, CodecError> {
    if !MESSAGE_KINDS.contains(&wire.kind.as_str()) {
        return Err(CodecError::UnknownKind(wire.kind));
    }

    let mut tagged = Map::new();
    tagged.insert("type".into(), Value::String(wire.kind));
    if let Some(data) = &wire.data {
        tagged.insert("data".into(), proto_to_json_value(data));
    }
    let message: SyncMessage = serde_json::from_value(Value::Object(tagged))?;

    Ok(Envelope { id: wire.id, from: wire.from, ts: wire.ts, message })
}

fn json_to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => prost_types::value::Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(v) => prost_types::value::Kind::BoolValue(*v),
        Value::Number(v) => prost_types::value::Kind::NumberValue(v.as_f64().unwrap_or(0.0)),
        Value::String(v) => prost_types::value::Kind::StringValue(v.clone()),
        Value::Array(v) => prost_types::value::Kind::ListValue(prost_types::ListValue {
            values: v.iter().map(json_to_proto_value).collect(),
        }),
        Value::Object(v) => prost_types::value::Kind::StructValue(prost_types::Struct {
            fields: v
                .iter()
                .map(|(k, v)| (k.clone(), json_to_proto_value(v)))
                .collect(),
        }),
    };

    prost_types::Value { kind: Some(kind) }
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn proto_to_json_value(value: &prost_types::Value) -> Value {
    let Some(kind) = &value.kind else {
        return Value::Null;
    };

    match kind {
        prost_types::value::Kind::NullValue(_) => Value::Null,
        prost_types::value::Kind::NumberValue(v) => number_to_json(*v),
        prost_types::value::Kind::StringValue(v) => Value::String(v.clone()),
        prost_types::value::Kind::BoolValue(v) => Value::Bool(*v),
        prost_types::value::Kind::StructValue(v) => Value::Object(
            v.fields
                .iter()
                .map(|(k, v)| (k.clone(), proto_to_json_value(v)))
                .collect(),
        ),
        prost_types::value::Kind::ListValue(v) => Value::Array(v.values.iter().map(proto_to_json_value).collect()),
    }
}

/// Protobuf carries every number as f64. Integral values come back as JSON
/// integers so integer fields (timestamps, counts) deserialize again.
#[allow(clippy::cast_possible_truncation)]
fn number_to_json(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_INT {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

#[derive(Clone, PartialEq, Message)]
struct WireEnvelope {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, tag = "2")]
    from: String,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, tag = "4")]
    kind: String,
    #[prost(message, optional, tag = "5")]
    data: Option<prost_types::Value>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

//! WebSocket handler: per-board envelope relay.
//!
//! DESIGN
//! ======
//! On upgrade, the connection joins its board and enters a `select!` loop:
//! - Incoming client messages → decode + validate → `Outcome`
//! - Envelopes queued by board peers → encode → forward to client
//!
//! `process_inbound` is pure validation and returns an `Outcome`. The
//! dispatch layer owns the side effects: side-store writes and fan-out.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → join board → send `snapshot` → broadcast `presence`
//! 2. Client sends envelopes → re-stamped with the connection's session →
//!    published to the board, excluding the sender
//! 3. Close → part board → broadcast `presence`

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{Durability, Envelope};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, RelayError};
use crate::services;
use crate::services::board::Published;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of validating one inbound message. Handlers never send directly.
#[derive(Debug, PartialEq)]
enum Outcome {
    /// Publish to the board: apply to the side-store, then fan out to every
    /// peer except the sender.
    BroadcastExcludeSender(Envelope),
    /// Nothing to relay (keepalives, close).
    Done,
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Wire encoding for one connection's outbound envelopes. Inbound messages
/// are accepted in either encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Protobuf in binary websocket messages.
    Proto,
    /// JSON in text websocket messages.
    Json,
}

impl Encoding {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("" | "proto") => Some(Self::Proto),
            Some("json") => Some(Self::Json),
            Some(_) => None,
        }
    }

    fn encode(self, envelope: &Envelope) -> Result<Message, RelayError> {
        Ok(match self {
            Self::Proto => Message::Binary(frames::encode_envelope(envelope).into()),
            Self::Json => Message::Text(frames::envelope_to_json(envelope)?.into()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    session: Option<String>,
    board: Option<String>,
    encoding: Option<String>,
}

/// Identity and settings of one upgraded connection.
#[derive(Debug, Clone)]
struct Connection {
    client_id: Uuid,
    session: String,
    board: String,
    encoding: Encoding,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, Query(params): Query<WsParams>, ws: WebSocketUpgrade) -> Response {
    let Some(encoding) = Encoding::parse(params.encoding.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "encoding must be proto or json").into_response();
    };

    let session = non_empty(params.session).unwrap_or_else(|| format!("session-{}", Uuid::new_v4().simple()));
    let board = non_empty(params.board).unwrap_or_else(|| state.config.default_board.clone());
    let conn = Connection { client_id: Uuid::new_v4(), session, board, encoding };

    ws.on_upgrade(move |socket| run_ws(socket, state, conn))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, conn: Connection) {
    let (client_tx, mut client_rx) = mpsc::channel::<Envelope>(state.config.client_channel_capacity);

    let snapshot = services::board::join_board(&state, &conn.board, conn.client_id, &conn.session, client_tx).await;
    if send_envelope(&mut socket, conn.encoding, &snapshot).await.is_err() {
        services::board::part_board(&state, &conn.board, conn.client_id).await;
        return;
    }
    services::board::broadcast_presence(&state, &conn.board).await;

    info!(client_id = %conn.client_id, session = %conn.session, board = %conn.board, encoding = ?conn.encoding, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                if matches!(msg, Message::Close(_)) {
                    break;
                }
                dispatch_message(&state, &conn, msg).await;
            }
            Some(envelope) = client_rx.recv() => {
                if send_envelope(&mut socket, conn.encoding, &envelope).await.is_err() {
                    break;
                }
            }
        }
    }

    services::board::part_board(&state, &conn.board, conn.client_id).await;
    services::board::broadcast_presence(&state, &conn.board).await;
    info!(client_id = %conn.client_id, session = %conn.session, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

async fn dispatch_message(state: &AppState, conn: &Connection, msg: Message) {
    match process_inbound(conn, msg) {
        Ok(Outcome::BroadcastExcludeSender(envelope)) => {
            let kind = envelope.message.kind();
            match services::board::publish(state, &conn.board, &envelope, Some(conn.client_id)).await {
                Published::Duplicate => {
                    debug!(client_id = %conn.client_id, id = %envelope.id, kind, "ws: dropped duplicate");
                }
                Published::Delivered(peers) if envelope.message.durability() == Durability::Persisted => {
                    info!(client_id = %conn.client_id, id = %envelope.id, kind, peers, "ws: relayed");
                }
                Published::Delivered(_) => {}
            }
        }
        Ok(Outcome::Done) => {}
        Err(e) => {
            warn!(client_id = %conn.client_id, code = e.error_code(), error = %e, "ws: rejected inbound message");
        }
    }
}

/// Decode and validate one inbound websocket message.
///
/// The envelope's `from` is replaced with the connection's session so a
/// client cannot speak for another session.
fn process_inbound(conn: &Connection, msg: Message) -> Result<Outcome, RelayError> {
    let mut envelope = match msg {
        Message::Binary(bytes) => frames::decode_envelope(&bytes)?,
        Message::Text(text) => frames::envelope_from_json(text.as_str())?,
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => return Ok(Outcome::Done),
    };

    if envelope.message.is_medium_only() {
        return Err(RelayError::MediumOnly(envelope.message.kind()));
    }
    envelope.from.clone_from(&conn.session);

    Ok(Outcome::BroadcastExcludeSender(envelope))
}

async fn send_envelope(socket: &mut WebSocket, encoding: Encoding, envelope: &Envelope) -> Result<(), ()> {
    let msg = match encoding.encode(envelope) {
        Ok(m) => m,
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "ws: failed to encode envelope");
            return Err(());
        }
    };
    socket.send(msg).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

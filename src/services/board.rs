//! Board service: join/part, side-store publishing, and fan-out.
//!
//! DESIGN
//! ======
//! A board is created on first join and kept for the life of the process,
//! so its side-store survives the last client leaving. Publishing folds an
//! envelope into the side-store and queues it for peers under one write
//! lock, which keeps every client's view in side-store order.

use std::time::{SystemTime, UNIX_EPOCH};

use frames::{Envelope, RELAY_SENDER, SyncMessage};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AppState, BoardState, ConnectedClient};

/// What happened to a published envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Published {
    /// Applied and queued for this many peers.
    Delivered(usize),
    /// A stroke the board already has. Not applied, not fanned out.
    Duplicate,
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Wrap a medium-originated message in an envelope.
#[must_use]
pub fn relay_envelope(message: SyncMessage) -> Envelope {
    Envelope::new(format!("relay-{}", Uuid::new_v4().simple()), RELAY_SENDER, now_ms(), message)
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Register a client on a board, creating the board on first use.
///
/// Returns the snapshot envelope the client must receive before anything
/// else.
pub async fn join_board(
    state: &AppState,
    board: &str,
    client_id: Uuid,
    session: &str,
    tx: mpsc::Sender<Envelope>,
) -> Envelope {
    let mut boards = state.boards.write().await;
    let board_state = boards.entry(board.to_owned()).or_insert_with(BoardState::new);
    board_state
        .clients
        .insert(client_id, ConnectedClient { session: session.to_owned(), tx });

    info!(
        board,
        %client_id,
        session,
        clients = board_state.clients.len(),
        strokes = board_state.store.strokes().len(),
        "client joined board"
    );
    relay_envelope(board_state.store.snapshot())
}

pub async fn part_board(state: &AppState, board: &str, client_id: Uuid) {
    let mut boards = state.boards.write().await;
    let Some(board_state) = boards.get_mut(board) else {
        return;
    };

    board_state.clients.remove(&client_id);
    info!(board, %client_id, remaining = board_state.clients.len(), "client left board");
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Fold `envelope` into the board's side-store and queue it for every
/// client except `exclude`.
pub async fn publish(state: &AppState, board: &str, envelope: &Envelope, exclude: Option<Uuid>) -> Published {
    let mut boards = state.boards.write().await;
    let Some(board_state) = boards.get_mut(board) else {
        return Published::Delivered(0);
    };

    if !board_state.store.apply(&envelope.message) {
        return Published::Duplicate;
    }
    Published::Delivered(fan_out(board_state, envelope, exclude))
}

/// Tell every client on the board how many sessions are connected.
pub async fn broadcast_presence(state: &AppState, board: &str) {
    let boards = state.boards.read().await;
    let Some(board_state) = boards.get(board) else {
        return;
    };

    let sessions = u32::try_from(board_state.session_count()).unwrap_or(u32::MAX);
    let envelope = relay_envelope(SyncMessage::Presence { sessions });
    fan_out(board_state, &envelope, None);
}

fn fan_out(board_state: &BoardState, envelope: &Envelope, exclude: Option<Uuid>) -> usize {
    let mut delivered = 0;
    for (client_id, client) in &board_state.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: a full queue drops the frame for that client only.
        match client.tx.try_send(envelope.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!(%client_id, error = %e, "board: dropped frame for client"),
        }
    }
    delivered
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;

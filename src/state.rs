//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the relay config and a map of live boards keyed by name. Each
//! board owns the durable side-store late joiners are hydrated from and the
//! outbound queues of its connected clients. Boards outlive their last client
//! so a board that empties and refills keeps its drawing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use frames::{Envelope, SideStore};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::RelayConfig;

// =============================================================================
// BOARD STATE
// =============================================================================

/// One live connection on a board.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    /// Whiteboard session the connection speaks for. Several connections
    /// may share one session.
    pub session: String,
    pub tx: mpsc::Sender<Envelope>,
}

/// Per-board live state.
#[derive(Debug, Default)]
pub struct BoardState {
    pub store: SideStore,
    /// Connected clients: `client_id` -> outbound queue.
    pub clients: HashMap<Uuid, ConnectedClient>,
}

impl BoardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct sessions connected to the board.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.clients
            .values()
            .map(|c| c.session.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub boards: Arc<RwLock<HashMap<String, BoardState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { config: Arc::new(config), boards: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

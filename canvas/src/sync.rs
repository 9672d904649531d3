//! Sync channel abstraction and the in-process medium.
//!
//! A [`SyncChannel`] carries [`Envelope`]s between whiteboard sessions. The
//! session pushes its own mutations with [`SyncChannel::send`] and pulls
//! everything that arrived since the last frame with [`SyncChannel::drain`].
//! Which medium backs the channel is decided by [`ChannelConfig`]:
//!
//! - [`LocalBus`]: in-process, single-threaded. Sessions connected to the
//!   same bus see each other's messages. Used by tests and the CLI's
//!   `--channel local` mode.
//! - the CLI's WebSocket channel, talking to the relay server.
//! - the `web` feature's `localStorage` channel.
//!
//! Every medium keeps a [`SideStore`] so a session that connects late gets a
//! `snapshot` first, and tracks presence so sessions can show how many peers
//! are connected.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use frames::{CodecError, Envelope, RELAY_SENDER, SideStore, SyncMessage};
use tracing::debug;

use crate::consts::PRESENCE_TIMEOUT_MS;

/// Failure talking to a sync medium.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The medium cannot be used at all (storage disabled, relay down).
    #[error("sync medium unavailable")]
    Unavailable,
    /// The channel was closed by [`SyncChannel::close`].
    #[error("sync channel closed")]
    Closed,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("sync transport error: {0}")]
    Transport(String),
}

/// One session's connection to a sync medium.
pub trait SyncChannel {
    /// Publish an envelope to every other session on the medium.
    ///
    /// # Errors
    ///
    /// [`SyncError::Closed`] after [`SyncChannel::close`];
    /// [`SyncError::Unavailable`] when the medium went away.
    fn send(&mut self, envelope: &Envelope) -> Result<(), SyncError>;

    /// Take every envelope received since the last call, in receipt order.
    fn drain(&mut self) -> Vec<Envelope>;

    /// Refresh this session's presence entry.
    ///
    /// # Errors
    ///
    /// Same as [`SyncChannel::send`].
    fn heartbeat(&mut self, _now_ms: i64) -> Result<(), SyncError> {
        Ok(())
    }

    /// Detach from the medium. Idempotent.
    fn close(&mut self);
}

/// Opens channels for a session.
pub trait Connector {
    /// # Errors
    ///
    /// [`SyncError::Unavailable`] when the medium cannot be reached.
    fn connect(&self, session: &str, now_ms: i64) -> Result<Box<dyn SyncChannel>, SyncError>;
}

/// Which medium a session syncs over.
pub enum ChannelConfig {
    /// No medium; the session draws alone.
    Offline,
    Local(LocalBus),
    /// Any other medium, e.g. the network or browser storage.
    Custom(Box<dyn Connector>),
}

impl ChannelConfig {
    /// Connect `session`, or `Ok(None)` when offline.
    ///
    /// # Errors
    ///
    /// Whatever the medium reports.
    pub fn connect(&self, session: &str, now_ms: i64) -> Result<Option<Box<dyn SyncChannel>>, SyncError> {
        match self {
            Self::Offline => Ok(None),
            Self::Local(bus) => {
                let channel: Box<dyn SyncChannel> = Box::new(bus.connect(session, now_ms)?);
                Ok(Some(channel))
            }
            Self::Custom(connector) => connector.connect(session, now_ms).map(Some),
        }
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("Offline"),
            Self::Local(_) => f.write_str("Local"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

// =============================================================================
// LOCAL BUS
// =============================================================================

#[derive(Debug)]
struct Subscriber {
    id: u64,
    session: String,
    inbox: VecDeque<Envelope>,
}

#[derive(Debug)]
struct BusState {
    available: bool,
    store: SideStore,
    subscribers: Vec<Subscriber>,
    /// Last heartbeat per session, in ms.
    presence: BTreeMap<String, i64>,
    presence_timeout_ms: i64,
    next_subscriber: u64,
    next_envelope: u64,
    last_ts: i64,
}

impl BusState {
    fn medium_envelope(&mut self, message: SyncMessage) -> Envelope {
        self.next_envelope += 1;
        Envelope::new(format!("{RELAY_SENDER}-{}", self.next_envelope), RELAY_SENDER, self.last_ts, message)
    }

    /// Deliver to every subscriber except `skip`.
    fn fan_out(&mut self, envelope: &Envelope, skip: Option<u64>) {
        for sub in self.subscribers.iter_mut().filter(|s| Some(s.id) != skip) {
            sub.inbox.push_back(envelope.clone());
        }
    }

    fn broadcast_presence(&mut self) {
        let sessions = u32::try_from(self.presence.len()).unwrap_or(u32::MAX);
        let envelope = self.medium_envelope(SyncMessage::Presence { sessions });
        self.fan_out(&envelope, None);
    }

    /// Drop sessions whose last heartbeat is older than the timeout.
    /// Returns whether anything was removed.
    fn expire(&mut self, now_ms: i64) -> bool {
        let timeout = self.presence_timeout_ms;
        let before = self.presence.len();
        self.presence.retain(|_, seen| now_ms - *seen <= timeout);
        self.presence.len() != before
    }
}

/// An in-process broadcast medium shared by cloning.
#[derive(Debug, Clone)]
pub struct LocalBus {
    state: Rc<RefCell<BusState>>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(PRESENCE_TIMEOUT_MS)
    }
}

impl LocalBus {
    #[must_use]
    pub fn new(presence_timeout_ms: i64) -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                available: true,
                store: SideStore::new(),
                subscribers: Vec::new(),
                presence: BTreeMap::new(),
                presence_timeout_ms,
                next_subscriber: 0,
                next_envelope: 0,
                last_ts: 0,
            })),
        }
    }

    /// Simulate the medium being disabled. Existing channels start failing
    /// and new connections are refused.
    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.borrow().available
    }

    /// Connect a session. The new channel's inbox starts with a `snapshot`
    /// of the side-store; every subscriber then gets a `presence` update.
    ///
    /// # Errors
    ///
    /// [`SyncError::Unavailable`] when the bus is disabled.
    pub fn connect(&self, session: &str, now_ms: i64) -> Result<LocalChannel, SyncError> {
        let mut state = self.state.borrow_mut();
        if !state.available {
            return Err(SyncError::Unavailable);
        }
        state.last_ts = state.last_ts.max(now_ms);

        state.next_subscriber += 1;
        let id = state.next_subscriber;
        let snapshot = state.store.snapshot();
        let snapshot = state.medium_envelope(snapshot);
        state.subscribers.push(Subscriber { id, session: session.to_owned(), inbox: VecDeque::from([snapshot]) });

        state.expire(now_ms);
        state.presence.insert(session.to_owned(), now_ms);
        state.broadcast_presence();

        debug!(session, subscriber = id, "local bus: connected");
        Ok(LocalChannel { bus: self.clone(), id, session: session.to_owned(), closed: false })
    }

    /// Copy of the durable side-store.
    #[must_use]
    pub fn side_store(&self) -> SideStore {
        self.state.borrow().store.clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// Sessions currently counted as present.
    #[must_use]
    pub fn present_sessions(&self) -> Vec<String> {
        self.state.borrow().presence.keys().cloned().collect()
    }
}

impl Connector for LocalBus {
    fn connect(&self, session: &str, now_ms: i64) -> Result<Box<dyn SyncChannel>, SyncError> {
        let channel: Box<dyn SyncChannel> = Box::new(LocalBus::connect(self, session, now_ms)?);
        Ok(channel)
    }
}

/// One session's handle on a [`LocalBus`]. Closes itself on drop.
#[derive(Debug)]
pub struct LocalChannel {
    bus: LocalBus,
    id: u64,
    session: String,
    closed: bool,
}

impl LocalChannel {
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::Closed);
        }
        if !self.bus.is_available() {
            return Err(SyncError::Unavailable);
        }
        Ok(())
    }
}

impl SyncChannel for LocalChannel {
    fn send(&mut self, envelope: &Envelope) -> Result<(), SyncError> {
        self.check_open()?;
        if envelope.message.is_medium_only() {
            debug!(kind = envelope.message.kind(), "local bus: ignoring medium-only message from session");
            return Ok(());
        }

        let mut state = self.bus.state.borrow_mut();
        state.last_ts = state.last_ts.max(envelope.ts);
        if !state.store.apply(&envelope.message) {
            debug!(id = %envelope.id, "local bus: duplicate stroke dropped");
            return Ok(());
        }
        state.fan_out(envelope, Some(self.id));
        Ok(())
    }

    fn drain(&mut self) -> Vec<Envelope> {
        if self.closed {
            return Vec::new();
        }
        let mut state = self.bus.state.borrow_mut();
        state
            .subscribers
            .iter_mut()
            .find(|s| s.id == self.id)
            .map(|s| s.inbox.drain(..).collect())
            .unwrap_or_default()
    }

    fn heartbeat(&mut self, now_ms: i64) -> Result<(), SyncError> {
        self.check_open()?;
        let mut state = self.bus.state.borrow_mut();
        state.last_ts = state.last_ts.max(now_ms);
        let expired = state.expire(now_ms);
        let joined = state.presence.insert(self.session.clone(), now_ms).is_none();
        if expired || joined {
            state.broadcast_presence();
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.bus.state.borrow_mut();
        state.subscribers.retain(|s| s.id != self.id);
        let still_connected = state.subscribers.iter().any(|s| s.session == self.session);
        if !still_connected && state.presence.remove(&self.session).is_some() {
            state.broadcast_presence();
        }
        debug!(session = %self.session, subscriber = self.id, "local bus: closed");
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.close();
    }
}

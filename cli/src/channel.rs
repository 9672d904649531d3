//! Network sync channel: a whiteboard session's connection to the relay.
//!
//! DESIGN
//! ======
//! `SyncChannel` is synchronous and the session is single-threaded, so the
//! socket lives in a background tokio task. The channel talks to it through
//! two unbounded queues: outbound envelopes are encoded as protobuf binary
//! messages, inbound ones are decoded and parked until the session drains
//! them on its next tick.
//!
//! Connecting does not block. Envelopes sent before the handshake finishes
//! are queued and flushed once it does. If the relay cannot be reached the
//! task exits and later sends report `SyncError::Unavailable`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use canvas::sync::{Connector, SyncChannel, SyncError};
use frames::Envelope;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::CliError;

/// Build the relay websocket URL from an HTTP(S) base URL. The session and
/// board names are percent-encoded into the query.
///
/// # Errors
///
/// Returns [`CliError::InvalidBaseUrl`] for unparsable URLs and schemes other
/// than http/https.
pub fn relay_ws_url(base_url: &str, session: &str, board: &str) -> Result<String, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let mut url = reqwest::Url::parse(base_url).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|()| invalid())?;

    let path = format!("{}/api/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("session", session)
        .append_pair("board", board)
        .append_pair("encoding", "proto");
    Ok(url.into())
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Opens [`WsChannel`]s to one board on one relay.
///
/// Clones share the set of socket tasks so the caller can wait for queued
/// envelopes to flush after the session closes its channel.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
    board: String,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WsConnector {
    #[must_use]
    pub fn new(base_url: impl Into<String>, board: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), board: board.into(), tasks: Arc::default() }
    }

    /// Wait for every socket task opened through this connector to finish.
    /// Tasks finish once their channel is closed and the queue is flushed.
    pub async fn finish(&self) {
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "ws: socket task failed");
            }
        }
    }
}

impl Connector for WsConnector {
    fn connect(&self, session: &str, _now_ms: i64) -> Result<Box<dyn SyncChannel>, SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::Unavailable)?;
        let url = relay_ws_url(&self.base_url, session, &self.board).map_err(|e| SyncError::Transport(e.to_string()))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));

        let task = runtime.spawn(run_socket(url, out_rx, in_tx, Arc::clone(&live)));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);

        Ok(Box::new(WsChannel { outbound: Some(out_tx), inbound: in_rx, live }))
    }
}

// =============================================================================
// CHANNEL
// =============================================================================

/// One session's relay connection.
#[derive(Debug)]
pub struct WsChannel {
    outbound: Option<mpsc::UnboundedSender<Envelope>>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    live: Arc<AtomicBool>,
}

impl SyncChannel for WsChannel {
    fn send(&mut self, envelope: &Envelope) -> Result<(), SyncError> {
        let Some(outbound) = &self.outbound else {
            return Err(SyncError::Closed);
        };
        if !self.live.load(Ordering::Acquire) {
            return Err(SyncError::Unavailable);
        }
        outbound.send(envelope.clone()).map_err(|_| SyncError::Unavailable)
    }

    fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.inbound.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn close(&mut self) {
        // Dropping the sender lets the task flush what is queued, then close
        // the socket.
        self.outbound = None;
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    inbound: mpsc::UnboundedSender<Envelope>,
    live: Arc<AtomicBool>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(%url, error = %e, "ws: relay unreachable; session stays offline");
            live.store(false, Ordering::Release);
            return;
        }
    };
    info!(%url, "ws: connected to relay");
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(envelope) = next else {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "ws: close handshake failed");
                    }
                    break;
                };
                let bytes = frames::encode_envelope(&envelope);
                if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                    warn!(error = %e, "ws: send failed");
                    break;
                }
            }
            incoming = stream.next() => {
                let envelope = match incoming {
                    Some(Ok(Message::Binary(bytes))) => frames::decode_envelope(&bytes),
                    Some(Ok(Message::Text(text))) => frames::envelope_from_json(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "ws: receive failed");
                        break;
                    }
                };
                match envelope {
                    Ok(envelope) => {
                        if inbound.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ws: dropped undecodable envelope"),
                }
            }
        }
    }

    live.store(false, Ordering::Release);
    debug!(%url, "ws: socket task finished");
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;

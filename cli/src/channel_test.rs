use frames::{Positions, SyncMessage, WirePoint, WireStroke};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use super::*;

struct FakeRelay {
    base_url: String,
    received: mpsc::UnboundedReceiver<Envelope>,
    uri: oneshot::Receiver<String>,
}

/// Accept one websocket client, greet it with `greeting`, and forward every
/// binary envelope it sends.
async fn fake_relay(greeting: Envelope) -> FakeRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, received) = mpsc::unbounded_channel();
    let (uri_tx, uri) = oneshot::channel();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| {
            uri_tx.send(req.uri().to_string()).ok();
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(socket, callback).await.unwrap();
        ws.send(Message::Binary(frames::encode_envelope(&greeting).into()))
            .await
            .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Binary(bytes) = msg {
                tx.send(frames::decode_envelope(&bytes).unwrap()).unwrap();
            }
        }
    });

    FakeRelay { base_url: format!("http://{addr}"), received, uri }
}

fn snapshot() -> Envelope {
    Envelope::new("relay-1", frames::RELAY_SENDER, 1, SyncMessage::Snapshot { strokes: vec![], positions: Positions::new() })
}

fn stroke(id: &str) -> Envelope {
    let stroke = WireStroke {
        id: id.into(),
        points: vec![WirePoint { x: 0.0, y: 0.0 }, WirePoint { x: 1.0, y: 1.0 }],
        created_at: 5,
        color: "#000000".into(),
        author: "session-a".into(),
    };
    Envelope::new(format!("{id}-env"), "session-a", 5, SyncMessage::StrokeCommitted { stroke })
}

async fn drain_until_some(channel: &mut dyn SyncChannel) -> Vec<Envelope> {
    timeout(Duration::from_secs(2), async {
        loop {
            let drained = channel.drain();
            if !drained.is_empty() {
                return drained;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("nothing drained before timeout")
}

async fn recv(relay: &mut FakeRelay) -> Envelope {
    timeout(Duration::from_secs(2), relay.received.recv())
        .await
        .expect("relay receive timed out")
        .expect("relay task ended")
}

#[test]
fn relay_url_follows_base_scheme() {
    assert_eq!(
        relay_ws_url("http://127.0.0.1:3000/", "s1", "lobby").unwrap(),
        "ws://127.0.0.1:3000/api/ws?session=s1&board=lobby&encoding=proto"
    );
    assert_eq!(
        relay_ws_url("https://board.example", "s1", "b").unwrap(),
        "wss://board.example/api/ws?session=s1&board=b&encoding=proto"
    );
    assert!(matches!(relay_ws_url("ftp://x", "s1", "b"), Err(CliError::InvalidBaseUrl(_))));
    assert!(matches!(relay_ws_url("not a url", "s1", "b"), Err(CliError::InvalidBaseUrl(_))));
}

#[test]
fn relay_url_escapes_query_values() {
    let url = relay_ws_url("http://127.0.0.1:3000", "s 1", "team&x=1#draft").unwrap();
    assert_eq!(url, "ws://127.0.0.1:3000/api/ws?session=s+1&board=team%26x%3D1%23draft&encoding=proto");
}

#[test]
fn relay_url_keeps_a_base_path() {
    assert_eq!(
        relay_ws_url("https://host.example/board/", "s1", "b").unwrap(),
        "wss://host.example/board/api/ws?session=s1&board=b&encoding=proto"
    );
}

#[test]
fn connect_outside_runtime_is_unavailable() {
    let connector = WsConnector::new("http://127.0.0.1:1", "lobby");
    assert!(matches!(connector.connect("session-a", 0), Err(SyncError::Unavailable)));
}

#[tokio::test]
async fn envelopes_flow_both_ways() {
    let mut relay = fake_relay(snapshot()).await;
    let connector = WsConnector::new(&relay.base_url, "b1");
    let mut channel = connector.connect("session-a", 0).unwrap();

    let drained = drain_until_some(channel.as_mut()).await;
    assert_eq!(drained, vec![snapshot()]);

    channel.send(&stroke("s1")).unwrap();
    assert_eq!(recv(&mut relay).await, stroke("s1"));

    let uri = timeout(Duration::from_secs(2), relay.uri).await.unwrap().unwrap();
    assert_eq!(uri, "/api/ws?session=session-a&board=b1&encoding=proto");
}

#[tokio::test]
async fn queued_envelopes_flush_before_finish() {
    let mut relay = fake_relay(snapshot()).await;
    let connector = WsConnector::new(&relay.base_url, "b1");
    let mut channel = connector.connect("session-a", 0).unwrap();

    for id in ["s1", "s2", "s3"] {
        channel.send(&stroke(id)).unwrap();
    }
    channel.close();
    timeout(Duration::from_secs(2), connector.finish()).await.unwrap();

    for id in ["s1", "s2", "s3"] {
        assert_eq!(recv(&mut relay).await, stroke(id));
    }
}

#[tokio::test]
async fn send_after_close_is_closed() {
    let relay = fake_relay(snapshot()).await;
    let connector = WsConnector::new(&relay.base_url, "b1");
    let mut channel = connector.connect("session-a", 0).unwrap();

    channel.close();
    channel.close();
    assert!(matches!(channel.send(&stroke("s1")), Err(SyncError::Closed)));
}

#[tokio::test]
async fn unreachable_relay_degrades_to_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = WsConnector::new(format!("http://{addr}"), "b1");
    let mut channel = connector.connect("session-a", 0).unwrap();
    timeout(Duration::from_secs(5), connector.finish()).await.unwrap();

    assert!(matches!(channel.send(&stroke("s1")), Err(SyncError::Unavailable)));
    assert!(channel.drain().is_empty());
}

//! Integration tests — full session lifecycles over real WebSocket
//! connections on localhost: protocol sniffing, reconnection, clean
//! and unclean closes, stop semantics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use livecast_core::protocol::alis;
use livecast_core::{
    Driver, DriverConfig, EndReason, PlaybackListener, SessionState, StreamEvent,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Everything the driver told us, in call order.
#[derive(Default)]
struct Recording {
    events: Mutex<Vec<StreamEvent>>,
    resets: Mutex<Vec<(u16, u16, Option<String>)>>,
    states: Mutex<Vec<(SessionState, Option<EndReason>)>>,
}

impl PlaybackListener for Recording {
    fn feed(&self, event: StreamEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn reset(&self, cols: u16, rows: u16, init: Option<&str>) {
        self.resets
            .lock()
            .unwrap()
            .push((cols, rows, init.map(str::to_owned)));
    }

    fn state_changed(&self, state: SessionState, reason: Option<EndReason>) {
        self.states.lock().unwrap().push((state, reason));
    }
}

impl Recording {
    fn last_state(&self) -> Option<SessionState> {
        self.states.lock().unwrap().last().map(|(s, _)| *s)
    }

    fn saw_state(&self, wanted: SessionState) -> bool {
        self.states.lock().unwrap().iter().any(|(s, _)| *s == wanted)
    }
}

/// Spin up a listener on an OS-assigned port; returns it plus the
/// ws:// URL a driver should dial.
async fn ws_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// A driver wired for tests: no pacing delay, fast reconnects.
fn test_driver(url: &str, listener: Arc<Recording>) -> Driver {
    let mut config = DriverConfig::new(url);
    config.buffer_time = 0.0;
    config.reconnect_delay = Arc::new(|_| Duration::from_millis(20));
    Driver::new(config, listener)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

fn normal_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }))
}

// ── JSON sessions ────────────────────────────────────────────────

#[tokio::test]
async fn json_reset_then_events_then_clean_close() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Text(r#"{"cols":80,"rows":24,"time":0}"#.into()))
        .await
        .unwrap();

    wait_until(|| recording.saw_state(SessionState::Playing)).await;
    assert_eq!(
        recording.resets.lock().unwrap().as_slice(),
        &[(80, 24, None)]
    );
    assert_eq!(driver.current_time(), Some(0.0));

    server
        .send(Message::Text(r#"[0.0, "o", "hello "]"#.into()))
        .await
        .unwrap();
    server
        .send(Message::Text(r#"[0.01, "o", "world"]"#.into()))
        .await
        .unwrap();

    wait_until(|| recording.events.lock().unwrap().len() == 2).await;
    {
        let events = recording.events.lock().unwrap();
        assert_eq!(events[0].data, "hello ");
        assert_eq!(events[1].data, "world");
    }
    // The paced emissions advanced the clock.
    assert_eq!(driver.current_time(), Some(0.01));

    server.send(normal_close()).await.unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;

    let states = recording.states.lock().unwrap();
    assert_eq!(
        states.last(),
        Some(&(SessionState::Stopped, Some(EndReason::Ended)))
    );
    driver.join().await;
}

#[tokio::test]
async fn clean_close_never_reconnects() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    let mut server = accept_ws(&listener).await;
    server.send(normal_close()).await.unwrap();

    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    driver.join().await;

    // No second connection attempt arrives.
    let second = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(second.is_err(), "driver reconnected after a clean close");
}

// ── ALiS sessions ────────────────────────────────────────────────

#[tokio::test]
async fn alis_session_reaches_offline() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Binary(alis::encode_header(Some(0))))
        .await
        .unwrap();
    server
        .send(Message::Binary(alis::encode_frame(&alis::AlisFrame::Reset {
            cols: 100,
            rows: 30,
            time: 0.0,
            init: "$ ".into(),
        })))
        .await
        .unwrap();

    wait_until(|| recording.saw_state(SessionState::Playing)).await;
    assert_eq!(
        recording.resets.lock().unwrap().as_slice(),
        &[(100, 30, Some("$ ".to_owned()))]
    );

    server
        .send(Message::Binary(alis::encode_frame(&alis::AlisFrame::Output {
            time: 0.5,
            text: "uptime\r\n".into(),
        })))
        .await
        .unwrap();
    wait_until(|| !recording.events.lock().unwrap().is_empty()).await;

    // End-of-transmission: state goes offline, the clock goes absent.
    server
        .send(Message::Binary(alis::encode_frame(&alis::AlisFrame::Offline)))
        .await
        .unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Offline)).await;
    assert_eq!(driver.current_time(), None);

    server.send(normal_close()).await.unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    driver.join().await;
}

#[tokio::test]
async fn alis_bad_version_triggers_reconnect_then_good_stream_plays() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    // First connection advertises an unsupported version; the driver
    // must drop it and come back.
    let mut server = accept_ws(&listener).await;
    let mut bad_header = alis::encode_header(None);
    bad_header[4] = 9;
    server.send(Message::Binary(bad_header)).await.unwrap();

    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Binary(alis::encode_header(None)))
        .await
        .unwrap();
    server
        .send(Message::Binary(alis::encode_frame(&alis::AlisFrame::Reset {
            cols: 80,
            rows: 24,
            time: 0.0,
            init: String::new(),
        })))
        .await
        .unwrap();

    wait_until(|| recording.saw_state(SessionState::Playing)).await;
    server.send(normal_close()).await.unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    driver.join().await;
}

// ── Raw sessions ─────────────────────────────────────────────────

#[tokio::test]
async fn raw_stream_synthesizes_reset_from_sniffed_geometry() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Binary(b"\x1b[8;24;100t$ ".to_vec()))
        .await
        .unwrap();

    wait_until(|| recording.saw_state(SessionState::Playing)).await;
    assert_eq!(
        recording.resets.lock().unwrap().as_slice(),
        &[(100, 24, None)]
    );

    wait_until(|| !recording.events.lock().unwrap().is_empty()).await;
    assert!(recording.events.lock().unwrap()[0].data.contains("$ "));

    server.send(normal_close()).await.unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    driver.join().await;
}

// ── Reconnection ─────────────────────────────────────────────────

#[tokio::test]
async fn unclean_close_reconnects_and_recovers() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    // Kill the first connection without a close handshake.
    let server = accept_ws(&listener).await;
    drop(server);

    // The driver comes back; this time serve a real stream.
    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Text(r#"{"cols":80,"rows":24,"time":3.5}"#.into()))
        .await
        .unwrap();

    wait_until(|| recording.saw_state(SessionState::Playing)).await;
    assert_eq!(driver.current_time(), Some(3.5));

    // Reconnect re-entered loading before the second attempt.
    let loading_count = recording
        .states
        .lock()
        .unwrap()
        .iter()
        .filter(|(s, _)| *s == SessionState::Loading)
        .count();
    assert!(loading_count >= 2, "expected a reconnect through loading");

    server.send(normal_close()).await.unwrap();
    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    driver.join().await;
}

// ── Stop semantics ───────────────────────────────────────────────

#[tokio::test]
async fn stop_is_terminal_and_silences_callbacks() {
    let (listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));
    driver.play();

    let mut server = accept_ws(&listener).await;
    server
        .send(Message::Text(r#"{"cols":80,"rows":24,"time":0}"#.into()))
        .await
        .unwrap();
    wait_until(|| recording.saw_state(SessionState::Playing)).await;

    driver.stop();
    driver.stop(); // idempotent
    driver.join().await;

    wait_until(|| recording.last_state() == Some(SessionState::Stopped)).await;
    let states_after = recording.states.lock().unwrap().len();
    let events_after = recording.events.lock().unwrap().len();

    // Whatever the server sends now must go nowhere.
    let _ = server
        .send(Message::Text(r#"[9.0, "o", "ghost"]"#.into()))
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(recording.states.lock().unwrap().len(), states_after);
    assert_eq!(recording.events.lock().unwrap().len(), events_after);
    assert!(!recording
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.data == "ghost"));
}

#[tokio::test]
async fn stop_before_any_socket_exists() {
    let (_listener, url) = ws_listener().await;
    let recording = Arc::new(Recording::default());
    let mut driver = test_driver(&url, Arc::clone(&recording));

    driver.stop();
    driver.play();
    driver.join().await;

    assert_eq!(
        recording.states.lock().unwrap().last(),
        Some(&(SessionState::Stopped, Some(EndReason::Ended)))
    );
    assert_eq!(driver.current_time(), None);
}

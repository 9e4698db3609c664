//! Playback driver: socket lifecycle, reconnection, and the public
//! façade.
//!
//! One driver owns one WebSocket connection at a time, plus the active
//! pacing buffer and the stream clock. All session work happens on a
//! single spawned task; the only other execution context is the buffer
//! task, which owns downstream emission ordering.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{BufferFactory, BufferParams, EventBuffer, EventSink, PacedBuffer, TimeReport};
use crate::clock::StreamClock;
use crate::event::{Reset, StreamEvent, StreamItem};
use crate::protocol::{ProtocolDecoder, WireMessage};
use crate::state::{EndReason, SessionState};

/// How long a connection must survive before a later unclean close
/// resets the reconnect-attempt counter.
const STABILITY_WINDOW: Duration = Duration::from_secs(1);

// ── Listener ─────────────────────────────────────────────────────

/// Collaborator callbacks consumed by the driver.
pub trait PlaybackListener: Send + Sync + 'static {
    /// Sink for paced canonical events.
    fn feed(&self, event: StreamEvent);

    /// New terminal geometry and optional initial screen content.
    fn reset(&self, cols: u16, rows: u16, init: Option<&str>);

    /// Connection-state transition. `reason` accompanies the terminal
    /// `Stopped` state.
    fn state_changed(&self, state: SessionState, reason: Option<EndReason>);
}

// ── Configuration ────────────────────────────────────────────────

/// Maps a reconnect-attempt count to the delay before that attempt.
pub type ReconnectDelay = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// The default backoff schedule: 500 ms doubling per attempt, capped
/// at 5 s (500, 1000, 2000, 4000, 5000, 5000, …).
pub fn exponential_delay(attempt: u32) -> Duration {
    const BASE_MS: u64 = 500;
    const CAP_MS: u64 = 5000;
    // Clamp the exponent; anything past a few doublings is capped anyway.
    let exp = attempt.min(13);
    Duration::from_millis((BASE_MS << exp).min(CAP_MS))
}

/// Driver construction parameters.
pub struct DriverConfig {
    /// WebSocket endpoint carrying the stream.
    pub url: String,
    /// Pacing delay in seconds (see [`BufferParams`]).
    pub buffer_time: f64,
    /// Minimum emission interval passed through to the buffer.
    pub min_frame_time: Option<f64>,
    /// Backoff schedule for unclean closes.
    pub reconnect_delay: ReconnectDelay,
    /// Buffer construction seam; defaults to [`PacedBuffer`].
    pub buffer_factory: BufferFactory,
}

impl DriverConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            buffer_time: 0.1,
            min_frame_time: None,
            reconnect_delay: Arc::new(exponential_delay),
            buffer_factory: PacedBuffer::factory(),
        }
    }
}

// ── Driver ───────────────────────────────────────────────────────

/// The public playback surface: `play`, `stop`, `current_time`.
///
/// Single-use: one `play()` per instantiation.
pub struct Driver {
    clock: StreamClock,
    cancel: CancellationToken,
    session: Option<SessionTask>,
    handle: Option<JoinHandle<()>>,
}

impl Driver {
    pub fn new(config: DriverConfig, listener: Arc<dyn PlaybackListener>) -> Self {
        let clock = StreamClock::new();
        let cancel = CancellationToken::new();
        let session = SessionTask {
            config,
            listener,
            clock: clock.clone(),
            cancel: cancel.clone(),
            buffer: None,
            state: SessionState::Loading,
        };
        Self {
            clock,
            cancel,
            session: Some(session),
            handle: None,
        }
    }

    /// Begin connecting. The session runs on its own task until a
    /// clean close or [`stop`](Self::stop).
    pub fn play(&mut self) {
        match self.session.take() {
            Some(session) => self.handle = Some(tokio::spawn(session.run())),
            None => warn!("play() called twice; driver is single-use"),
        }
    }

    /// Terminate the session and suppress any further reconnects.
    /// Safe to call in any state, idempotent, irreversible.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// A cloneable handle that stops the driver from another task.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current virtual stream time, or `None` when no stream has ever
    /// reset (or the stream went offline).
    pub fn current_time(&self) -> Option<f64> {
        self.clock.get()
    }

    /// Wait for the session task to finish. Cancellation-safe.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let _ = handle.await;
            self.handle = None;
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Session task ─────────────────────────────────────────────────

/// How a connection ended.
enum Close {
    /// Normal closure (1000) or no-status (1005 / absent frame).
    Clean,
    /// Everything else; `connected` is how long the socket was up.
    Unclean { connected: Option<Duration> },
    /// `stop()` was called.
    Cancelled,
}

struct SessionTask {
    config: DriverConfig,
    listener: Arc<dyn PlaybackListener>,
    clock: StreamClock,
    cancel: CancellationToken,
    buffer: Option<Box<dyn EventBuffer>>,
    state: SessionState,
}

impl SessionTask {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        self.set_state(SessionState::Loading, None);

        loop {
            let close = self.run_connection().await;
            self.retire_buffer();

            match close {
                Close::Clean | Close::Cancelled => {
                    info!("stream ended");
                    self.set_state(SessionState::Stopped, Some(EndReason::Ended));
                    return;
                }
                Close::Unclean { connected } => {
                    // A connection that held for a while earns a fresh
                    // backoff schedule.
                    if connected.is_some_and(|up| up >= STABILITY_WINDOW) {
                        attempt = 0;
                    }
                    let delay = (self.config.reconnect_delay)(attempt);
                    attempt += 1;
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt, "connection lost; reconnecting"
                    );
                    self.set_state(SessionState::Loading, None);
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.set_state(SessionState::Stopped, Some(EndReason::Ended));
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One socket's lifetime: connect, sniff, decode until close.
    async fn run_connection(&mut self) -> Close {
        debug!(url = %self.config.url, "connecting");
        let connect = tokio::select! {
            _ = self.cancel.cancelled() => return Close::Cancelled,
            result = connect_async(self.config.url.as_str()) => result,
        };

        let (socket, _) = match connect {
            Ok(ok) => ok,
            Err(e) => {
                warn!("connect failed: {e}");
                return Close::Unclean { connected: None };
            }
        };
        let connected_at = Instant::now();
        debug!("socket open");

        let (mut sink, mut stream) = socket.split();
        let mut decoder: Option<ProtocolDecoder> = None;
        let unclean = |at: Instant| Close::Unclean {
            connected: Some(at.elapsed()),
        };

        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Close::Cancelled;
                }
                message = stream.next() => message,
            };

            let message = match message {
                None => return unclean(connected_at),
                Some(Err(e)) => {
                    warn!("transport error: {e}");
                    return unclean(connected_at);
                }
                Some(Ok(message)) => message,
            };

            let wire = match message {
                Message::Text(text) => WireMessage::Text(text),
                Message::Binary(data) => WireMessage::Binary(data),
                Message::Close(frame) => {
                    debug!(?frame, "close frame received");
                    return if is_clean_close(frame.as_ref()) {
                        Close::Clean
                    } else {
                        unclean(connected_at)
                    };
                }
                // Ping/pong are answered by the library.
                _ => continue,
            };

            let items = match decoder.as_mut() {
                None => match ProtocolDecoder::detect(&wire) {
                    Ok((bound, items)) => {
                        decoder = Some(bound);
                        items
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            error!("rejecting stream: {e}");
                        } else {
                            warn!("undecodable first message: {e}");
                        }
                        let _ = sink.send(Message::Close(None)).await;
                        return unclean(connected_at);
                    }
                },
                Some(bound) => match bound.decode(&wire) {
                    Ok(items) => items,
                    Err(e) => {
                        // Decode failures count as unclean closes; the
                        // reconnect loop takes over.
                        warn!("decode error: {e}");
                        let _ = sink.send(Message::Close(None)).await;
                        return unclean(connected_at);
                    }
                },
            };

            for item in items {
                self.apply(item);
            }
        }
    }

    fn apply(&mut self, item: StreamItem) {
        match item {
            StreamItem::Event(event) => {
                if let Some(buffer) = self.buffer.as_mut() {
                    if let Err(e) = buffer.push_event(event) {
                        warn!("dropping event: {e}");
                    }
                } else {
                    debug!("event before first reset; dropped");
                }
            }
            StreamItem::Text(text) => {
                if let Some(buffer) = self.buffer.as_mut() {
                    if let Err(e) = buffer.push_text(text) {
                        warn!("dropping text: {e}");
                    }
                } else {
                    debug!("text before first reset; dropped");
                }
            }
            StreamItem::Reset(reset) => self.handle_reset(reset),
            StreamItem::Offline => self.handle_offline(),
        }
    }

    /// A reset retires the active buffer and rebases the clock; the
    /// previous buffer is fully stopped before its replacement exists,
    /// so two buffers never emit concurrently.
    fn handle_reset(&mut self, reset: Reset) {
        info!(
            cols = reset.cols,
            rows = reset.rows,
            time = reset.time,
            "stream reset"
        );
        self.set_state(SessionState::Playing, None);
        self.retire_buffer();

        let params = BufferParams {
            buffer_time: self.config.buffer_time,
            base_time: reset.time,
            min_frame_time: self.config.min_frame_time,
        };
        let feed_to = Arc::clone(&self.listener);
        let sink: EventSink = Box::new(move |event| feed_to.feed(event));
        let report_to = self.clock.clone();
        let report: TimeReport = Box::new(move |time| report_to.set(time));
        self.buffer = Some((self.config.buffer_factory)(sink, report, &params));

        self.listener
            .reset(reset.cols, reset.rows, reset.init.as_deref());
        self.clock.set(reset.time.unwrap_or(0.0));
    }

    fn handle_offline(&mut self) {
        info!("stream went offline");
        self.set_state(SessionState::Offline, None);
        self.clock.clear();
    }

    fn retire_buffer(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.stop();
        }
    }

    /// `Stopped` is final: once reached, no further transition is
    /// recorded or notified.
    fn set_state(&mut self, state: SessionState, reason: Option<EndReason>) {
        if self.state.is_terminal() {
            return;
        }
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.listener.state_changed(state, reason);
    }
}

fn is_clean_close(frame: Option<&CloseFrame<'_>>) -> bool {
    frame.is_none_or(|f| matches!(f.code, CloseCode::Normal | CloseCode::Status))
}

// ── Tests ────────────────────────────────────────────────────────

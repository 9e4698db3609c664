//! Event pacing buffer.
//!
//! Network delivery is bursty; playback must not be. A buffer accepts
//! events (and, for raw streams, free-form text) as fast as they
//! arrive and releases them to the sink at their declared stream
//! times, shifted by a fixed buffering delay that absorbs jitter.
//!
//! The driver consumes buffers through the [`BufferFactory`] seam, so
//! the pacing strategy is replaceable; [`PacedBuffer`] is the stock
//! implementation.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::CastError;
use crate::event::{EventKind, StreamEvent};

// ── Contracts ────────────────────────────────────────────────────

/// Sink for paced canonical events (the collaborator's `feed`).
pub type EventSink = Box<dyn FnMut(StreamEvent) + Send>;

/// Receives each event's stream time just before it is emitted;
/// drives the playback clock.
pub type TimeReport = Box<dyn FnMut(f64) + Send>;

/// Construction parameters passed through the factory.
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Pacing delay in seconds added in front of every event.
    pub buffer_time: f64,
    /// Stream time of the reset this buffer was born from.
    pub base_time: Option<f64>,
    /// Minimum interval between emissions; rapid output bursts inside
    /// one interval are coalesced into a single emission.
    pub min_frame_time: Option<f64>,
}

/// An active pacing buffer. Exactly one exists per stream epoch; a
/// reset retires it and builds a replacement.
pub trait EventBuffer: Send {
    /// Queue a time-stamped event for paced emission.
    fn push_event(&mut self, event: StreamEvent) -> Result<(), CastError>;

    /// Queue raw text; the buffer stamps it with the current virtual
    /// time.
    fn push_text(&mut self, text: String) -> Result<(), CastError>;

    /// Halt emission immediately. Nothing reaches the sink afterwards.
    fn stop(&mut self);
}

/// Builds a buffer around the given sink and time-report callbacks.
pub type BufferFactory =
    Box<dyn Fn(EventSink, TimeReport, &BufferParams) -> Box<dyn EventBuffer> + Send + Sync>;

// ── PacedBuffer ──────────────────────────────────────────────────

enum Input {
    Event(StreamEvent),
    Text(String),
}

/// Stock buffer: a background task that sleeps each queued event until
/// `epoch + buffer_time + (event.time - base_time)` and then emits it.
/// Emission order always matches arrival order.
pub struct PacedBuffer {
    tx: mpsc::UnboundedSender<Input>,
    handle: JoinHandle<()>,
}

impl PacedBuffer {
    pub fn spawn(sink: EventSink, report: TimeReport, params: &BufferParams) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            rx,
            sink,
            report,
            epoch: Instant::now(),
            base: params.base_time.unwrap_or(0.0),
            latency: Duration::try_from_secs_f64(params.buffer_time.max(0.0))
                .unwrap_or_default(),
            min_frame: params
                .min_frame_time
                .and_then(|s| Duration::try_from_secs_f64(s.max(0.0)).ok()),
        };
        let handle = tokio::spawn(worker.run());
        Self { tx, handle }
    }

    /// The stock factory handed to drivers that don't supply their own.
    pub fn factory() -> BufferFactory {
        Box::new(|sink, report, params| Box::new(Self::spawn(sink, report, params)))
    }
}

impl EventBuffer for PacedBuffer {
    fn push_event(&mut self, event: StreamEvent) -> Result<(), CastError> {
        self.tx.send(Input::Event(event)).map_err(Into::into)
    }

    fn push_text(&mut self, text: String) -> Result<(), CastError> {
        self.tx.send(Input::Text(text)).map_err(Into::into)
    }

    fn stop(&mut self) {
        self.handle.abort();
    }
}

impl Drop for PacedBuffer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ── Worker ───────────────────────────────────────────────────────

/// Delays beyond this are treated as corrupt timestamps; the event is
/// released immediately instead of stalling the stream for hours.
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

struct Worker {
    rx: mpsc::UnboundedReceiver<Input>,
    sink: EventSink,
    report: TimeReport,
    epoch: Instant,
    base: f64,
    latency: Duration,
    min_frame: Option<Duration>,
}

impl Worker {
    async fn run(mut self) {
        // Output held back while a coalescing window is open.
        let mut pending: Option<StreamEvent> = None;

        loop {
            let next = match (pending.is_some(), self.min_frame) {
                (true, Some(window)) => {
                    match tokio::time::timeout(window, self.rx.recv()).await {
                        Ok(msg) => msg,
                        Err(_) => {
                            // Window elapsed with no new input: flush.
                            if let Some(ev) = pending.take() {
                                self.emit(ev);
                            }
                            continue;
                        }
                    }
                }
                _ => self.rx.recv().await,
            };

            let Some(input) = next else {
                if let Some(ev) = pending.take() {
                    self.emit(ev);
                }
                break;
            };

            let event = match input {
                Input::Event(ev) => ev,
                Input::Text(text) => {
                    // Raw text carries no timestamp; stamp with the
                    // current virtual position.
                    let time = self.base + self.epoch.elapsed().as_secs_f64();
                    StreamEvent::output(time, text)
                }
            };

            let Some(window) = self.min_frame else {
                let due = self.due(&event);
                tokio::time::sleep_until(due).await;
                self.emit(event);
                continue;
            };

            if let Some(held) = pending.as_mut() {
                // Same window: merge into the held emission. Outputs
                // far apart in stream time are never merged, no matter
                // how close together they arrived.
                if event.kind == EventKind::Output
                    && event.time - held.time < window.as_secs_f64()
                {
                    held.data.push_str(&event.data);
                    continue;
                }
            }
            if let Some(prev) = pending.take() {
                self.emit(prev);
            }
            let due = self.due(&event);
            tokio::time::sleep_until(due).await;
            if event.kind == EventKind::Output {
                // Open a coalescing window before emitting.
                pending = Some(event);
            } else {
                self.emit(event);
            }
        }
    }

    /// When the event is released: `epoch + latency + (time - base)`.
    /// Non-finite or unrepresentable timestamps are due immediately.
    fn due(&self, event: &StreamEvent) -> Instant {
        let offset = (event.time - self.base).max(0.0);
        match Duration::try_from_secs_f64(offset) {
            Ok(delay) if delay <= MAX_DELAY => self.epoch + self.latency + delay,
            _ => Instant::now(),
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        (self.report)(event.time);
        (self.sink)(event);
    }
}

// ── Tests ────────────────────────────────────────────────────────

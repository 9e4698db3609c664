//! # livecast-core
//!
//! Live-streaming playback driver for terminal sessions.
//!
//! Attaches to a WebSocket endpoint carrying a terminal session
//! recorded and replayed in real time, normalizes three wire formats
//! (ALiS binary, newline-delimited JSON, raw text) into one canonical
//! event stream, paces delivery against a virtual stream-time clock,
//! and recovers transparently from unclean disconnects.
//!
//! This crate contains:
//! - **Events**: `StreamEvent`, `Reset`, `StreamItem` — the canonical model
//! - **Protocol**: one-shot format sniffing and per-format decoders
//! - **Buffer**: the pacing buffer and its factory seam
//! - **Clock**: the shared optional virtual-time source
//! - **Driver**: socket lifecycle, backoff reconnection, public façade
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod buffer;
pub mod clock;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{BufferFactory, BufferParams, EventBuffer, EventSink, PacedBuffer, TimeReport};
pub use clock::StreamClock;
pub use driver::{exponential_delay, Driver, DriverConfig, PlaybackListener, ReconnectDelay};
pub use error::CastError;
pub use event::{EventKind, Reset, StreamEvent, StreamItem};
pub use protocol::{ProtocolDecoder, WireMessage};
pub use state::{EndReason, SessionState};

//! Canonical event model shared by all three wire formats.
//!
//! Every protocol decoder normalizes its input into [`StreamItem`]s;
//! downstream (buffer, driver, listener) only ever sees these.

use serde::Deserialize;

// ── EventKind ────────────────────────────────────────────────────

/// The kind of a canonical stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Terminal output text ("o" on the wire).
    Output,
    /// A terminal resize, payload `"<cols>x<rows>"` ("r" on the wire).
    Resize,
}

impl EventKind {
    /// Parse a wire code. Unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "o" => Some(Self::Output),
            "r" => Some(Self::Resize),
            _ => None,
        }
    }
}

// ── StreamEvent ──────────────────────────────────────────────────

/// A canonical, time-stamped event within the replayed session.
///
/// `time` is stream-relative seconds — virtual time, independent of
/// wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub time: f64,
    pub kind: EventKind,
    pub data: String,
}

impl StreamEvent {
    /// An output event carrying terminal text.
    pub fn output(time: f64, data: impl Into<String>) -> Self {
        Self {
            time,
            kind: EventKind::Output,
            data: data.into(),
        }
    }

    /// A resize event; the payload encodes the new geometry.
    pub fn resize(time: f64, cols: u16, rows: u16) -> Self {
        Self {
            time,
            kind: EventKind::Resize,
            data: format!("{cols}x{rows}"),
        }
    }
}

// ── Reset ────────────────────────────────────────────────────────

/// Re-establishes terminal geometry and optionally seeds initial
/// screen content at a given stream time; rebases buffer and clock.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reset {
    #[serde(alias = "width")]
    pub cols: u16,
    #[serde(alias = "height")]
    pub rows: u16,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub init: Option<String>,
}

impl Reset {
    /// A bare geometry reset at stream time 0 with no initial content.
    pub fn sized(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            time: Some(0.0),
            init: None,
        }
    }
}

// ── StreamItem ───────────────────────────────────────────────────

/// One normalized unit produced by a protocol decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A time-stamped event destined for the pacing buffer.
    Event(StreamEvent),
    /// A reset descriptor; retires the active buffer and rebases time.
    Reset(Reset),
    /// The remote ended the stream cleanly from its side.
    Offline,
    /// Free-form text (raw protocol only); the buffer stamps it itself.
    Text(String),
}

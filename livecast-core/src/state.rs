//! Session lifecycle state.
//!
//! ```text
//!  Loading ──► Playing ──► Offline
//!     ▲           │           │
//!     │◄──────────┴───────────┤   (unclean close → reconnect)
//!     │                       │
//!     └──────► Stopped ◄──────┘   (explicit stop / clean close)
//! ```
//!
//! `Loading` is both the initial state and the reconnect target;
//! `Stopped` is terminal and only reached through an explicit stop or a
//! clean socket close.

// ── SessionState ─────────────────────────────────────────────────

/// The observable state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connecting or reconnecting; no stream has emitted a reset yet.
    #[default]
    Loading,

    /// A stream is actively emitting events.
    Playing,

    /// The remote ended the stream cleanly from its side; the socket
    /// itself may still be open.
    Offline,

    /// Terminal. Explicit stop or clean close.
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Offline => "offline",
            Self::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

impl SessionState {
    /// Whether the session can never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

// ── EndReason ────────────────────────────────────────────────────

/// Detail accompanying the terminal `Stopped` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The stream ended: clean close or explicit stop.
    Ended,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ended => write!(f, "ended"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

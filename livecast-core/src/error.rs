//! Domain-specific error types for the livecast driver.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the livecast protocol and driver.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// The protocol version advertised in the ALiS header is not supported.
    ///
    /// Fatal for the connection: the socket is closed and the reconnect
    /// loop takes over.
    #[error("unsupported ALiS protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The compression algorithm advertised in the ALiS header is not
    /// supported (only 0 = none is accepted). Fatal for the connection.
    #[error("unsupported ALiS compression algorithm: {0}")]
    UnsupportedCompression(u8),

    /// A binary frame ended before all of its declared fields.
    #[error("truncated frame (tag {tag:#04x}): {len} bytes")]
    TruncatedFrame { tag: u8, len: usize },

    /// The ALiS header message is too short to carry magic + version.
    #[error("truncated ALiS header: {0} bytes")]
    TruncatedHeader(usize),

    // ── Decode Errors ────────────────────────────────────────────
    /// A text message did not parse as the expected JSON shape.
    #[error("malformed JSON message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A frame's text field was not valid UTF-8.
    #[error("invalid utf-8 in frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// An event was pushed into a buffer that has already been stopped.
    #[error("buffer channel closed")]
    ChannelClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

impl CastError {
    /// Whether this error must terminate the connection immediately
    /// (as opposed to being absorbed and logged).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion(_) | Self::UnsupportedCompression(_)
        )
    }
}

//! ALiS binary stream format.
//!
//! One frame per WebSocket message; frames never span messages. The
//! first message of a stream is the header, every later one a tagged
//! frame.
//!
//! ## Wire format
//!
//! **Header message** (5–6 bytes):
//! ```text
//! magic:        [u8; 4]  = "ALiS"
//! version:      u8       (only 1 is supported)
//! compression:  u8       (optional; 0 = none, anything else is fatal)
//! ```
//!
//! **Frame messages** (tag = first byte, fields little-endian):
//! ```text
//! 0x01 reset:    u16 cols, u16 rows, f32 time, u32 len, [len] utf-8 init
//! 0x6f output:   f32 time, u32 len, [len] utf-8 text
//! 0x72 resize:   f32 time, u16 cols, u16 rows
//! 0x04 offline:  (no fields)
//! other:         unknown — ignored, logged at debug
//! ```
//!
//! Two protocol revisions exist in the wild: one sends the compression
//! byte and uses the 0x72 resize tag, the other has neither. Both are
//! accepted here — the header length decides whether a compression tag
//! is present, and 0x72 is always in the frame table (bare-revision
//! streams simply never send it).

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::error::CastError;

/// ASCII magic opening every ALiS stream.
pub const MAGIC: &[u8; 4] = b"ALiS";

/// The one protocol version this decoder speaks.
pub const VERSION: u8 = 1;

// Frame tags.
const TAG_RESET: u8 = 0x01;
const TAG_OFFLINE: u8 = 0x04;
const TAG_OUTPUT: u8 = 0x6f; // 'o'
const TAG_RESIZE: u8 = 0x72; // 'r'

// ── AlisFrame ────────────────────────────────────────────────────

/// One decoded ALiS frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AlisFrame {
    Reset {
        cols: u16,
        rows: u16,
        time: f32,
        init: String,
    },
    Output {
        time: f32,
        text: String,
    },
    Resize {
        time: f32,
        cols: u16,
        rows: u16,
    },
    Offline,
    /// Unrecognized tag; skipped for forward compatibility.
    Unknown(u8),
}

/// Whether a binary message opens with the ALiS magic.
pub fn has_magic(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}

/// Validate a header message (magic + version + optional compression).
///
/// The caller has already checked [`has_magic`]. Bytes beyond the
/// compression tag are tolerated and ignored.
pub fn parse_header(data: &[u8]) -> Result<(), CastError> {
    if data.len() < MAGIC.len() + 1 {
        return Err(CastError::TruncatedHeader(data.len()));
    }

    let version = data[4];
    if version != VERSION {
        return Err(CastError::UnsupportedVersion(version));
    }

    if let Some(&compression) = data.get(5) {
        if compression != 0 {
            return Err(CastError::UnsupportedCompression(compression));
        }
    }

    if data.len() > 6 {
        debug!(extra = data.len() - 6, "ignoring trailing header bytes");
    }

    Ok(())
}

/// Decode one frame message.
pub fn decode_frame(data: &[u8]) -> Result<AlisFrame, CastError> {
    let Some(&tag) = data.first() else {
        return Err(CastError::TruncatedFrame { tag: 0, len: 0 });
    };

    let truncated = || CastError::TruncatedFrame {
        tag,
        len: data.len(),
    };
    let mut buf = &data[1..];

    match tag {
        TAG_RESET => {
            if buf.remaining() < 12 {
                return Err(truncated());
            }
            let cols = buf.get_u16_le();
            let rows = buf.get_u16_le();
            let time = buf.get_f32_le();
            let len = buf.get_u32_le() as usize;
            if buf.remaining() < len {
                return Err(truncated());
            }
            let init = String::from_utf8(buf[..len].to_vec())?;
            Ok(AlisFrame::Reset {
                cols,
                rows,
                time,
                init,
            })
        }
        TAG_OUTPUT => {
            if buf.remaining() < 8 {
                return Err(truncated());
            }
            let time = buf.get_f32_le();
            let len = buf.get_u32_le() as usize;
            if buf.remaining() < len {
                return Err(truncated());
            }
            let text = String::from_utf8(buf[..len].to_vec())?;
            Ok(AlisFrame::Output { time, text })
        }
        TAG_RESIZE => {
            if buf.remaining() < 8 {
                return Err(truncated());
            }
            let time = buf.get_f32_le();
            let cols = buf.get_u16_le();
            let rows = buf.get_u16_le();
            Ok(AlisFrame::Resize { time, cols, rows })
        }
        TAG_OFFLINE => Ok(AlisFrame::Offline),
        other => {
            debug!(tag = format_args!("{other:#04x}"), "unknown ALiS frame tag");
            Ok(AlisFrame::Unknown(other))
        }
    }
}

/// Encode a header message. `compression` selects the revision:
/// `Some(0)` emits the 6-byte header, `None` the bare 5-byte one.
pub fn encode_header(compression: Option<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6);
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    if let Some(c) = compression {
        buf.put_u8(c);
    }
    buf
}

/// Encode one frame message.
pub fn encode_frame(frame: &AlisFrame) -> Vec<u8> {
    let mut buf = Vec::new();
    match frame {
        AlisFrame::Reset {
            cols,
            rows,
            time,
            init,
        } => {
            buf.put_u8(TAG_RESET);
            buf.put_u16_le(*cols);
            buf.put_u16_le(*rows);
            buf.put_f32_le(*time);
            buf.put_u32_le(init.len() as u32);
            buf.put_slice(init.as_bytes());
        }
        AlisFrame::Output { time, text } => {
            buf.put_u8(TAG_OUTPUT);
            buf.put_f32_le(*time);
            buf.put_u32_le(text.len() as u32);
            buf.put_slice(text.as_bytes());
        }
        AlisFrame::Resize { time, cols, rows } => {
            buf.put_u8(TAG_RESIZE);
            buf.put_f32_le(*time);
            buf.put_u16_le(*cols);
            buf.put_u16_le(*rows);
        }
        AlisFrame::Offline => buf.put_u8(TAG_OFFLINE),
        AlisFrame::Unknown(tag) => buf.put_u8(*tag),
    }
    buf
}

// ── Tests ────────────────────────────────────────────────────────

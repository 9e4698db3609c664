//! Wire-format normalization.
//!
//! Three formats arrive over the same WebSocket endpoint:
//!
//! - **ALiS** — tagged binary frames behind an `"ALiS"` magic header;
//! - **JSON** — newline-delimited JSON values in text messages;
//! - **raw** — unframed terminal output.
//!
//! The format is sniffed exactly once, from the first inbound message,
//! and fixed for the lifetime of the socket. [`ProtocolDecoder`] is the
//! resulting sum type; every subsequent message is dispatched through
//! it statically.

pub mod alis;
pub mod json;
pub mod raw;

use tracing::info;

use crate::error::CastError;
use crate::event::{StreamEvent, StreamItem};

// ── WireMessage ──────────────────────────────────────────────────

/// One inbound WebSocket data message, detached from the transport so
/// decoders stay testable without sockets.
#[derive(Debug, Clone)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
}

// ── ProtocolDecoder ──────────────────────────────────────────────

/// Per-connection decoder, bound by the first message.
#[derive(Debug)]
pub enum ProtocolDecoder {
    /// Newline-delimited JSON text messages.
    Json,
    /// ALiS tagged binary frames (header already consumed).
    Alis,
    /// Unframed text; geometry was sniffed from the first message.
    Raw,
}

impl ProtocolDecoder {
    /// Sniff the first message of a connection.
    ///
    /// Returns the bound decoder plus the items produced by that first
    /// message itself — for JSON and raw streams the first message
    /// carries real data and must not be dropped; for ALiS it is the
    /// header and yields nothing. Raw streams additionally yield one
    /// synthesized reset (sniffed geometry, 80×24 fallback).
    pub fn detect(first: &WireMessage) -> Result<(Self, Vec<StreamItem>), CastError> {
        match first {
            WireMessage::Text(text) => {
                info!("first message is textual; binding JSON decoder");
                let items = json::decode_message(text)?;
                Ok((Self::Json, items))
            }
            WireMessage::Binary(data) if alis::has_magic(data) => {
                alis::parse_header(data)?;
                info!("ALiS header accepted; binding binary decoder");
                Ok((Self::Alis, Vec::new()))
            }
            WireMessage::Binary(data) => {
                info!("no ALiS magic; binding raw decoder");
                let text = raw::decode_text(data);
                let items = vec![raw::initial_reset(&text), StreamItem::Text(text)];
                Ok((Self::Raw, items))
            }
        }
    }

    /// Decode a subsequent message into zero or more stream items.
    pub fn decode(&mut self, message: &WireMessage) -> Result<Vec<StreamItem>, CastError> {
        match (self, message) {
            (Self::Json, WireMessage::Text(text)) => json::decode_message(text),
            (Self::Alis, WireMessage::Binary(data)) => {
                Ok(frame_items(alis::decode_frame(data)?))
            }
            (Self::Raw, WireMessage::Binary(data)) => {
                Ok(vec![StreamItem::Text(raw::decode_text(data))])
            }
            (Self::Raw, WireMessage::Text(text)) => {
                Ok(vec![StreamItem::Text(text.clone())])
            }
            // A format flip mid-stream; nothing sensible to decode.
            _ => Ok(Vec::new()),
        }
    }
}

fn frame_items(frame: alis::AlisFrame) -> Vec<StreamItem> {
    match frame {
        alis::AlisFrame::Reset {
            cols,
            rows,
            time,
            init,
        } => vec![StreamItem::Reset(crate::event::Reset {
            cols,
            rows,
            time: Some(f64::from(time)),
            init: if init.is_empty() { None } else { Some(init) },
        })],
        alis::AlisFrame::Output { time, text } => {
            vec![StreamItem::Event(StreamEvent::output(f64::from(time), text))]
        }
        alis::AlisFrame::Resize { time, cols, rows } => {
            vec![StreamItem::Event(StreamEvent::resize(
                f64::from(time),
                cols,
                rows,
            ))]
        }
        alis::AlisFrame::Offline => vec![StreamItem::Offline],
        alis::AlisFrame::Unknown(_) => Vec::new(),
    }
}

// ── Tests ────────────────────────────────────────────────────────

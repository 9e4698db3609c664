//! Line-delimited JSON text format.
//!
//! Each text message carries one or more newline-separated JSON values:
//!
//! - an array `[time, "o"|"r", data]` — a canonical event, passed
//!   through unchanged;
//! - an object with `cols`/`width` — a reset descriptor;
//! - an object whose `status` (alias `state`) is `"offline"` — the
//!   remote ended the stream;
//! - any other object shape is silently ignored (forward compatibility).

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CastError;
use crate::event::{EventKind, Reset, StreamEvent, StreamItem};

#[derive(Debug, Deserialize)]
struct StatusMsg {
    #[serde(alias = "state")]
    status: String,
}

/// Decode one text message into zero or more stream items.
pub fn decode_message(text: &str) -> Result<Vec<StreamItem>, CastError> {
    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(item) = decode_value(serde_json::from_str(line)?)? {
            items.push(item);
        }
    }
    Ok(items)
}

fn decode_value(value: Value) -> Result<Option<StreamItem>, CastError> {
    match value {
        Value::Array(_) => {
            let (time, code, data): (f64, String, String) = serde_json::from_value(value)?;
            match EventKind::from_code(&code) {
                Some(kind) => Ok(Some(StreamItem::Event(StreamEvent { time, kind, data }))),
                None => {
                    debug!(code, "ignoring event with unknown kind");
                    Ok(None)
                }
            }
        }
        Value::Object(ref map) => {
            if map.contains_key("cols") || map.contains_key("width") {
                let reset: Reset = serde_json::from_value(value)?;
                return Ok(Some(StreamItem::Reset(reset)));
            }
            if let Ok(msg) = serde_json::from_value::<StatusMsg>(value) {
                if msg.status == "offline" {
                    return Ok(Some(StreamItem::Offline));
                }
            }
            // Unknown object shape: tolerated by design.
            debug!("ignoring unrecognized JSON object");
            Ok(None)
        }
        other => {
            debug!(?other, "ignoring non-array, non-object JSON value");
            Ok(None)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Raw/legacy text format.
//!
//! No framing at all: every message payload is decoded as UTF-8 text
//! and handed to the buffer's text-ingestion path, which does its own
//! pacing and segmentation.
//!
//! The only structure recognized is in the *first* message, which may
//! reveal the terminal geometry through either an ANSI resize control
//! sequence (`ESC [ 8 ; rows ; cols t`) or a `script(1)`-style session
//! start marker (`COLUMNS="80" LINES="24"`). When found, a single reset
//! at stream time 0 is synthesized before the raw decoder takes over.

use crate::event::{Reset, StreamItem};

/// Default geometry when the first message reveals nothing.
const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Decode a raw message payload to text.
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Synthesize the initial reset from the first raw message.
///
/// Uses sniffed geometry when available, 80×24 otherwise, so a raw
/// stream always produces exactly one reset before any text.
pub fn initial_reset(first_text: &str) -> StreamItem {
    let (cols, rows) = sniff_geometry(first_text).unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
    StreamItem::Reset(Reset::sized(cols, rows))
}

/// Scan text for terminal geometry. Returns `(cols, rows)`.
pub fn sniff_geometry(text: &str) -> Option<(u16, u16)> {
    from_resize_seq(text).or_else(|| from_script_marker(text))
}

/// `ESC [ 8 ; <rows> ; <cols> t` — the xterm window-size report some
/// recorders emit at session start.
fn from_resize_seq(text: &str) -> Option<(u16, u16)> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while let Some(off) = find(&bytes[pos..], b"\x1b[8;") {
        let mut cursor = pos + off + 4;
        if let Some((rows, after_rows)) = read_u16(bytes, cursor) {
            cursor = after_rows;
            if bytes.get(cursor) == Some(&b';') {
                if let Some((cols, after_cols)) = read_u16(bytes, cursor + 1) {
                    if bytes.get(after_cols) == Some(&b't') {
                        return Some((cols, rows));
                    }
                }
            }
        }
        pos += off + 4;
    }
    None
}

/// `COLUMNS="80" LINES="24"` (quotes optional) — printed by
/// `script(1)` at the top of a recording.
fn from_script_marker(text: &str) -> Option<(u16, u16)> {
    let cols = value_after(text, "COLUMNS=")?;
    let rows = value_after(text, "LINES=")?;
    Some((cols, rows))
}

fn value_after(text: &str, marker: &str) -> Option<u16> {
    let start = text.find(marker)? + marker.len();
    let rest = text[start..].trim_start_matches('"');
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse up to 5 ASCII digits starting at `pos`; returns the value and
/// the position just past it.
fn read_u16(bytes: &[u8], pos: usize) -> Option<(u16, usize)> {
    let mut end = pos;
    while end < bytes.len() && end - pos < 5 && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == pos {
        return None;
    }
    let value: u32 = std::str::from_utf8(&bytes[pos..end]).ok()?.parse().ok()?;
    u16::try_from(value).ok().map(|v| (v, end))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Reset;

    #[test]
    fn resize_sequence_sniffed() {
        assert_eq!(sniff_geometry("\x1b[8;24;80t"), Some((80, 24)));
        assert_eq!(
            sniff_geometry("noise\x1b[8;50;132tmore"),
            Some((132, 50))
        );
    }

    #[test]
    fn script_marker_sniffed() {
        let text = "Script started on 2024-03-01 [TERM=\"xterm\" COLUMNS=\"211\" LINES=\"52\"]";
        assert_eq!(sniff_geometry(text), Some((211, 52)));
        assert_eq!(sniff_geometry("COLUMNS=100 LINES=30"), Some((100, 30)));
    }

    #[test]
    fn resize_sequence_wins_over_marker() {
        let text = "COLUMNS=10 LINES=10 \x1b[8;40;120t";
        assert_eq!(sniff_geometry(text), Some((120, 40)));
    }

    #[test]
    fn malformed_sequences_ignored() {
        assert_eq!(sniff_geometry("\x1b[8;24;80x"), None);
        assert_eq!(sniff_geometry("\x1b[8;;80t"), None);
        assert_eq!(sniff_geometry("COLUMNS= LINES=24"), None);
        assert_eq!(sniff_geometry("plain shell output"), None);
    }

    #[test]
    fn oversized_dimension_rejected() {
        assert_eq!(sniff_geometry("\x1b[8;24;99999t"), None);
    }

    #[test]
    fn initial_reset_defaults_without_geometry() {
        assert_eq!(
            initial_reset("just some output"),
            StreamItem::Reset(Reset::sized(80, 24))
        );
    }

    #[test]
    fn initial_reset_uses_sniffed_geometry() {
        assert_eq!(
            initial_reset("\x1b[8;30;90t$ "),
            StreamItem::Reset(Reset::sized(90, 30))
        );
    }

    #[test]
    fn lossy_text_decode() {
        assert_eq!(decode_text(b"ok"), "ok");
        // Invalid UTF-8 becomes replacement characters instead of failing.
        assert_eq!(decode_text(&[0xff, b'a']), "\u{fffd}a");
    }
}

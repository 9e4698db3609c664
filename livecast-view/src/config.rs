//! Viewer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Stream endpoint settings.
    pub stream: StreamConfig,
    /// Playback tuning.
    pub playback: PlaybackConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Stream endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// WebSocket URL carrying the live session.
    pub url: String,
}

/// Playback tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Pacing delay in seconds (smooths bursty delivery).
    pub buffer_time: f64,
    /// Minimum interval between emissions; 0 disables coalescing.
    pub min_frame_time: f64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (overridden by `RUST_LOG`).
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765/stream".into(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_time: 0.1,
            min_frame_time: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

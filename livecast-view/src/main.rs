//! livecast viewer — entry point.
//!
//! ```text
//! livecast-view <URL>                Follow a live stream
//! livecast-view --config <path>      Load settings from a TOML file
//! ```
//!
//! Decoded terminal output is passed through to stdout byte-for-byte;
//! lifecycle messages go to stderr via tracing. No terminal emulation
//! happens here — pipe into a real terminal.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use livecast_core::{
    Driver, DriverConfig, EndReason, EventKind, PlaybackListener, SessionState, StreamEvent,
};

mod config;
use config::ViewConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "livecast-view", about = "Follow a live terminal stream")]
struct Cli {
    /// Stream URL (overrides the config file).
    url: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "livecast-view.toml")]
    config: PathBuf,
}

// ── Listener ─────────────────────────────────────────────────────

/// Passes output events through to stdout; everything else is logged.
struct StdoutPassthrough;

impl PlaybackListener for StdoutPassthrough {
    fn feed(&self, event: StreamEvent) {
        if event.kind == EventKind::Output {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(event.data.as_bytes());
            let _ = out.flush();
        } else {
            info!(geometry = %event.data, "stream resized");
        }
    }

    fn reset(&self, cols: u16, rows: u16, init: Option<&str>) {
        info!(cols, rows, "stream reset");
        if let Some(init) = init {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(init.as_bytes());
            let _ = out.flush();
        }
    }

    fn state_changed(&self, state: SessionState, reason: Option<EndReason>) {
        match reason {
            Some(reason) => info!(%state, %reason, "state changed"),
            None => info!(%state, "state changed"),
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ViewConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let url = cli.url.unwrap_or_else(|| config.stream.url.clone());
    info!(%url, "following stream");

    let mut driver_config = DriverConfig::new(url);
    driver_config.buffer_time = config.playback.buffer_time;
    if config.playback.min_frame_time > 0.0 {
        driver_config.min_frame_time = Some(config.playback.min_frame_time);
    }

    let mut driver = Driver::new(driver_config, Arc::new(StdoutPassthrough));
    driver.play();

    let stop = driver.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted; stopping");
            stop.cancel();
        }
    });

    driver.join().await;
    Ok(())
}

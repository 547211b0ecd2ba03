//! # rally
//!
//! Rally lobby server binary: loads settings, starts the HTTP/WebSocket
//! server and waits for ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rally_core::logging::init_subscriber;
use rally_server::{RallyServer, ServerConfig};
use rally_settings::{AssetMode, RallySettings};

/// Rally lobby server.
#[derive(Parser, Debug)]
#[command(name = "rally", about = "Presence and squad lobby over WebSocket")]
struct Cli {
    /// Settings file (defaults to `~/.rally/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Asset mode: `development` or `production`.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<AssetMode>,

    /// Client bundle directory served in production mode.
    #[arg(long)]
    asset_dir: Option<PathBuf>,

    /// Log level filter (overridden by `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer CLI flags over loaded settings.
    fn apply(&self, settings: &mut RallySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(mode) = self.mode {
            settings.server.mode = mode;
        }
        if let Some(ref dir) = self.asset_dir {
            settings.server.asset_dir.clone_from(dir);
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn parse_mode(value: &str) -> std::result::Result<AssetMode, String> {
    AssetMode::parse(value).ok_or_else(|| format!("unknown mode '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // An explicit settings file must load; the default one is optional.
    let (mut settings, load_error) = match args.config {
        Some(ref path) => (
            rally_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None,
        ),
        None => match rally_settings::load_settings() {
            Ok(settings) => (settings, None),
            Err(e) => (RallySettings::default(), Some(e)),
        },
    };
    args.apply(&mut settings);

    init_subscriber(&settings.logging.level, settings.logging.format);
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "ignoring unreadable settings file, using defaults");
    }

    let metrics = rally_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let server = RallyServer::new(config, metrics);
    let handle = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        "Rally listening on http://{} (ws: /ws, mode: {})",
        handle.addr(),
        settings.server.mode.as_str()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let clean = server
        .shutdown()
        .graceful_shutdown(handle.into_tasks(), None)
        .await;
    if !clean {
        tracing::warn!("server tasks did not stop in time and were aborted");
    }
    Ok(())
}

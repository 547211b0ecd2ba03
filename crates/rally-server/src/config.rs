//! Server configuration.

use std::path::PathBuf;

use rally_settings::{AssetMode, ServerSettings};
use serde::{Deserialize, Serialize};

/// Configuration for the Rally server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `3000`, `0` for auto-assign).
    pub port: u16,
    /// Whether the router serves the built client bundle.
    pub mode: AssetMode,
    /// Client bundle directory, served in production mode.
    pub asset_dir: PathBuf,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound frame queue depth.
    pub outbound_queue: usize,
    /// Capacity of the channel feeding the lobby dispatcher.
    pub event_queue: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            mode: s.mode,
            asset_dir: s.asset_dir.clone(),
            max_connections: s.max_connections,
            outbound_queue: s.outbound_queue,
            event_queue: s.event_queue,
            max_message_size: s.max_message_bytes,
        }
    }
}

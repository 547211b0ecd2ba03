//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every struct is `#[serde(default)]` so
//! a partial file only overrides what it names.

use std::path::PathBuf;

use rally_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings for the lobby server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RallySettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Which asset pipeline serves the client bundle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetMode {
    /// Assets come from an external dev bundler; nothing is served here.
    #[default]
    Development,
    /// Serve the prebuilt bundle from `asset_dir` with SPA fallback.
    Production,
}

impl AssetMode {
    /// Parse a mode name (case-insensitive). `prod`/`dev` are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Asset serving mode.
    pub mode: AssetMode,
    /// Directory holding the built client bundle (production mode).
    pub asset_dir: PathBuf,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound frame queue length.
    pub outbound_queue: usize,
    /// Capacity of the shared inbound event queue.
    pub event_queue: usize,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mode: AssetMode::Development,
            asset_dir: PathBuf::from("dist"),
            max_connections: 1024,
            outbound_queue: 256,
            event_queue: 1024,
            max_message_bytes: 64 * 1024,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 3000);
        assert_eq!(s.mode, AssetMode::Development);
        assert_eq!(s.asset_dir, PathBuf::from("dist"));
        assert_eq!(s.max_message_bytes, 65_536);
    }

    #[test]
    fn logging_defaults() {
        let l = LoggingSettings::default();
        assert_eq!(l.level, "info");
        assert_eq!(l.format, LogFormat::Compact);
    }

    #[test]
    fn camel_case_on_disk() {
        let json = serde_json::to_value(RallySettings::default()).unwrap();
        assert!(json["server"].get("assetDir").is_some());
        assert!(json["server"].get("maxConnections").is_some());
        assert_eq!(json["server"]["mode"], "development");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: RallySettings =
            serde_json::from_str(r#"{"server": {"port": 8080, "mode": "production"}}"#).unwrap();
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.mode, AssetMode::Production);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn asset_mode_parse() {
        assert_eq!(AssetMode::parse("PRODUCTION"), Some(AssetMode::Production));
        assert_eq!(AssetMode::parse("dev"), Some(AssetMode::Development));
        assert_eq!(AssetMode::parse("staging"), None);
        assert_eq!(AssetMode::Production.as_str(), "production");
    }
}

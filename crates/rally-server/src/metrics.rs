//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Call once at
/// startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a recorder handle without installing it globally (tests, embedding).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket session lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// WebSocket upgrades refused at the connection limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Frames dropped because a client queue was full or closed (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Inbound frames that failed to decode (counter).
pub const WS_MALFORMED_FRAMES_TOTAL: &str = "ws_malformed_frames_total";
/// Lobby events applied (counter, labels: event).
pub const LOBBY_EVENTS_TOTAL: &str = "lobby_events_total";
/// Lobby events ignored as no-ops (counter, labels: event, reason).
pub const LOBBY_EVENTS_IGNORED_TOTAL: &str = "lobby_events_ignored_total";
/// Users in the lobby (gauge).
pub const LOBBY_USERS_ACTIVE: &str = "lobby_users_active";
/// Live squads (gauge).
pub const LOBBY_SQUADS_ACTIVE: &str = "lobby_squads_active";
/// Squads created (counter).
pub const SQUADS_CREATED_TOTAL: &str = "squads_created_total";
/// Squads dissolved after losing their last member (counter).
pub const SQUADS_DISSOLVED_TOTAL: &str = "squads_dissolved_total";

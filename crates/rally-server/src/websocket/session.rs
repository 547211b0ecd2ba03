//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use rally_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastHub;
use super::connection::ClientConnection;
use crate::dispatcher::LobbyEvent;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_MALFORMED_FRAMES_TOTAL,
};
use crate::protocol::{self, ClientEvent, ProtocolError, ServerEvent};

/// Everything a session needs besides the socket.
#[derive(Clone)]
pub struct SessionContext {
    /// Live connections, shared with the dispatcher.
    pub hub: Arc<BroadcastHub>,
    /// Dispatcher input.
    pub events: mpsc::Sender<LobbyEvent>,
    /// Outbound queue depth for this client.
    pub outbound_queue: usize,
    /// Server-wide stop signal.
    pub cancel: CancellationToken,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Queues `connection.established` with the connection ID
/// 2. Registers the connection with the hub
/// 3. Forwards decoded client events to the dispatcher
/// 4. Forwards queued broadcast frames to the socket
/// 5. Reports the disconnect exactly once
#[instrument(skip_all, fields(connection_id = %connection_id))]
pub async fn run_ws_session(ws: WebSocket, connection_id: ConnectionId, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.outbound_queue.max(1));
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    if !greet(&connection) {
        debug!("connection.established not queued");
    }
    ctx.hub.add(Arc::clone(&connection));

    let outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = ctx.cancel.cancelled() => {
                debug!("server shutting down, closing session");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let decoded = match msg {
            Message::Text(ref text) => protocol::decode(text.as_str()),
            Message::Binary(ref data) => protocol::decode_binary(data),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let Some(event) = accept(decoded) else { continue };
        let forwarded = ctx
            .events
            .send(LobbyEvent::Inbound {
                connection: connection_id.clone(),
                event,
            })
            .await;
        if forwarded.is_err() {
            warn!("lobby dispatcher is gone, closing session");
            break;
        }
    }

    outbound.abort();
    ctx.hub.remove(&connection_id);
    if ctx
        .events
        .send(LobbyEvent::Disconnected(connection_id.clone()))
        .await
        .is_err()
    {
        debug!("lobby dispatcher is gone, disconnect not reported");
    }

    let lifetime = connection.age();
    info!(duration_ms = lifetime.as_millis() as u64, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
}

/// Queue `connection.established` as the connection's first frame.
///
/// Must run before the connection joins the hub so no broadcast can be
/// queued ahead of it.
fn greet(connection: &ClientConnection) -> bool {
    let established = ServerEvent::ConnectionEstablished {
        connection_id: connection.id.clone(),
    };
    match established.to_frame() {
        Ok(frame) => connection.send(frame),
        Err(e) => {
            warn!(error = %e, "failed to serialize connection.established");
            false
        }
    }
}

/// Keep well-formed events. Malformed frames are logged and dropped.
fn accept(decoded: Result<ClientEvent, ProtocolError>) -> Option<ClientEvent> {
    match decoded {
        Ok(event) => {
            debug!(event = event.name(), "client event received");
            Some(event)
        }
        Err(e) => {
            counter!(WS_MALFORMED_FRAMES_TOTAL).increment(1);
            warn!(error = %e, "ignoring malformed frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_precedes_broadcasts() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(8);
        let connection = Arc::new(ClientConnection::new("conn_new".into(), tx));

        assert!(greet(&connection));
        hub.add(Arc::clone(&connection));
        let _ = hub.broadcast_all(&ServerEvent::ActiveUsers(Vec::new()));

        let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["event"], "connection.established");
        assert_eq!(first["data"]["connectionId"], "conn_new");
        let second: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(second["event"], "active_users");
    }

    #[test]
    fn accept_passes_valid_events() {
        let event = accept(protocol::decode(r#"{"event":"create_squad","data":"Alpha"}"#));
        assert_eq!(event, Some(ClientEvent::CreateSquad("Alpha".into())));
    }

    #[test]
    fn accept_drops_malformed_frames() {
        assert_eq!(accept(protocol::decode("{")), None);
        assert_eq!(accept(protocol::decode_binary(&[0xc3, 0x28])), None);
    }
}

//! HTTP router, WebSocket upgrade and server startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use rally_core::ConnectionId;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::assets;
use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, LobbyEvent, LobbyStats};
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastHub;
use crate::websocket::session::{SessionContext, run_ws_session};

/// Shared state handed to every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Live connections.
    pub hub: Arc<BroadcastHub>,
    /// Dispatcher input.
    pub events: mpsc::Sender<LobbyEvent>,
    /// Lobby counters published by the dispatcher.
    pub stats: Arc<LobbyStats>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Server-wide stop signal.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// One permit per allowed WebSocket session.
    pub slots: Arc<Semaphore>,
    /// When the server was created.
    pub start_time: Instant,
    /// Prometheus renderer for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The lobby server: router, dispatcher and shared state.
pub struct RallyServer {
    config: Arc<ServerConfig>,
    hub: Arc<BroadcastHub>,
    stats: Arc<LobbyStats>,
    shutdown: Arc<ShutdownCoordinator>,
    slots: Arc<Semaphore>,
    events: mpsc::Sender<LobbyEvent>,
    /// Taken by the first `listen` call.
    dispatcher: Mutex<Option<(Dispatcher, mpsc::Receiver<LobbyEvent>)>>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

/// Handle returned by [`RallyServer::listen`].
pub struct ServerHandle {
    addr: SocketAddr,
    server: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Background tasks, for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.dispatcher]
    }
}

impl RallyServer {
    /// Create a server with an empty lobby.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let hub = Arc::new(BroadcastHub::new());
        let stats = Arc::new(LobbyStats::default());
        let (events, rx) = mpsc::channel(config.event_queue.max(1));
        let dispatcher = Dispatcher::new(hub.clone(), stats.clone());
        let slots = Arc::new(Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS)));
        Self {
            config: Arc::new(config),
            hub,
            stats,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            slots,
            events,
            dispatcher: Mutex::new(Some((dispatcher, rx))),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            events: self.events.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            slots: self.slots.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        let router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST]);

        assets::with_assets(router, self.config.mode, &self.config.asset_dir)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and start the dispatcher and the HTTP server.
    ///
    /// Both tasks stop when the shutdown token is cancelled.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        let (dispatcher, rx) = self
            .dispatcher
            .lock()
            .take()
            .ok_or(ServerError::AlreadyListening)?;

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let dispatcher = tokio::spawn(dispatcher.run(rx, self.shutdown.token()));

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });

        info!(
            %addr,
            mode = self.config.mode.as_str(),
            max_connections = self.config.max_connections,
            "rally server listening"
        );
        Ok(ServerHandle {
            addr,
            server,
            dispatcher,
        })
    }

    /// Live connections.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Lobby counters.
    pub fn stats(&self) -> &Arc<LobbyStats> {
        &self.stats
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Held for the whole session.
    let Ok(slot) = Arc::clone(&state.slots).try_acquire_owned() else {
        let limit = state.config.max_connections;
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        warn!(limit, "connection limit reached, refusing upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    };

    let ctx = SessionContext {
        hub: state.hub.clone(),
        events: state.events.clone(),
        outbound_queue: state.config.outbound_queue,
        cancel: state.shutdown.token(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, ConnectionId::generate(), ctx).await;
            drop(slot);
        })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
        state.stats.users(),
        state.stats.squads(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

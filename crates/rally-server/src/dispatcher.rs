//! Lobby event dispatcher.
//!
//! Every WebSocket session forwards its events into one `mpsc` channel. A
//! single dispatcher task drains it, so each event's registry mutation and
//! the snapshot broadcast it triggers complete before the next event is
//! looked at. The dispatcher owns the [`SessionRegistry`] outright.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use rally_core::{ConnectionId, RegistryError, SessionRegistry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{
    LOBBY_EVENTS_IGNORED_TOTAL, LOBBY_EVENTS_TOTAL, LOBBY_SQUADS_ACTIVE, LOBBY_USERS_ACTIVE,
    SQUADS_CREATED_TOTAL, SQUADS_DISSOLVED_TOTAL,
};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::websocket::broadcast::BroadcastHub;

/// Input to the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A decoded client event.
    Inbound {
        /// Originating connection.
        connection: ConnectionId,
        /// The event.
        event: ClientEvent,
    },
    /// The transport closed the connection. Terminal for that ID.
    Disconnected(ConnectionId),
}

/// Lobby counters readable outside the dispatcher task.
#[derive(Debug, Default)]
pub struct LobbyStats {
    users: AtomicUsize,
    squads: AtomicUsize,
}

impl LobbyStats {
    /// Identified users.
    pub fn users(&self) -> usize {
        self.users.load(Ordering::Relaxed)
    }

    /// Live squads.
    pub fn squads(&self) -> usize {
        self.squads.load(Ordering::Relaxed)
    }

    fn record(&self, registry: &SessionRegistry) {
        let users = registry.user_count();
        let squads = registry.squad_count();
        self.users.store(users, Ordering::Relaxed);
        self.squads.store(squads, Ordering::Relaxed);
        gauge!(LOBBY_USERS_ACTIVE).set(users as f64);
        gauge!(LOBBY_SQUADS_ACTIVE).set(squads as f64);
    }
}

/// Applies lobby events to the registry and broadcasts the results.
pub struct Dispatcher {
    registry: SessionRegistry,
    hub: Arc<BroadcastHub>,
    stats: Arc<LobbyStats>,
}

impl Dispatcher {
    /// Create a dispatcher over an empty registry.
    pub fn new(hub: Arc<BroadcastHub>, stats: Arc<LobbyStats>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            hub,
            stats,
        }
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Apply one event and broadcast every resulting snapshot to all connections.
    ///
    /// Returns the events that were broadcast (empty for a no-op).
    pub fn apply(&mut self, event: LobbyEvent) -> Vec<ServerEvent> {
        let broadcasts = match event {
            LobbyEvent::Inbound { connection, event } => {
                counter!(LOBBY_EVENTS_TOTAL, "event" => event.name()).increment(1);
                self.handle_client_event(&connection, event)
            }
            LobbyEvent::Disconnected(connection) => {
                counter!(LOBBY_EVENTS_TOTAL, "event" => "disconnect").increment(1);
                self.handle_disconnect(&connection)
            }
        };
        self.stats.record(&self.registry);
        for event in &broadcasts {
            let _ = self.hub.broadcast_all(event);
        }
        broadcasts
    }

    fn handle_client_event(
        &mut self,
        connection: &ConnectionId,
        event: ClientEvent,
    ) -> Vec<ServerEvent> {
        let name = event.name();
        match event {
            ClientEvent::JoinLobby(profile) => {
                let user = self.registry.register_user(connection.clone(), profile);
                info!(connection_id = %connection, name = %user.profile.name, "joined lobby");
                vec![self.users_snapshot()]
            }
            ClientEvent::CreateSquad(squad_name) => {
                match self.registry.create_squad(squad_name, connection) {
                    Ok(squad) => {
                        let _ = self.hub.subscribe(connection, &squad.id);
                        counter!(SQUADS_CREATED_TOTAL).increment(1);
                        info!(connection_id = %connection, squad_id = %squad.id, name = %squad.name, "squad created");
                        vec![self.squads_snapshot()]
                    }
                    Err(e) => ignored(connection, name, &e),
                }
            }
            ClientEvent::JoinSquad(squad_id) => {
                match self.registry.join_squad(&squad_id, connection) {
                    Ok(squad) => {
                        let _ = self.hub.subscribe(connection, &squad.id);
                        info!(
                            connection_id = %connection,
                            squad_id = %squad.id,
                            members = squad.members.len(),
                            "joined squad"
                        );
                        vec![self.squads_snapshot()]
                    }
                    Err(e) => ignored(connection, name, &e),
                }
            }
        }
    }

    fn handle_disconnect(&mut self, connection: &ConnectionId) -> Vec<ServerEvent> {
        self.hub.remove(connection);
        let removal = self.registry.remove_user(connection);
        if !removal.dissolved.is_empty() {
            counter!(SQUADS_DISSOLVED_TOTAL).increment(removal.dissolved.len() as u64);
        }
        info!(
            connection_id = %connection,
            identified = removal.user.is_some(),
            left = removal.left.len(),
            dissolved = removal.dissolved.len(),
            "client left lobby"
        );
        vec![self.users_snapshot(), self.squads_snapshot()]
    }

    fn users_snapshot(&self) -> ServerEvent {
        ServerEvent::ActiveUsers(self.registry.list_users())
    }

    fn squads_snapshot(&self) -> ServerEvent {
        ServerEvent::ActiveSquads(self.registry.list_squads())
    }

    /// Drain `events` until cancelled or every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<LobbyEvent>, cancel: CancellationToken) {
        info!("lobby dispatcher started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let _ = self.apply(event);
                }
                () = cancel.cancelled() => break,
            }
        }
        info!("lobby dispatcher stopped");
    }
}

fn ignored(connection: &ConnectionId, event: &'static str, err: &RegistryError) -> Vec<ServerEvent> {
    counter!(LOBBY_EVENTS_IGNORED_TOTAL, "event" => event, "reason" => err.reason()).increment(1);
    debug!(connection_id = %connection, event, reason = %err, "event ignored");
    Vec::new()
}

//! Event fan-out to connected WebSocket clients.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use metrics::counter;
use parking_lot::RwLock;
use rally_core::{ConnectionId, SquadId};
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;
use crate::protocol::ServerEvent;

/// Tracks live connections and delivers server events to them.
///
/// Delivery is fire-and-forget: a frame that does not fit in a client's
/// outbound queue is dropped for that client only.
pub struct BroadcastHub {
    /// Connected clients in connect order.
    connections: RwLock<IndexMap<ConnectionId, Arc<ClientConnection>>>,
    /// Mirrors `connections.len()` so count queries skip the lock.
    active_count: AtomicUsize,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(IndexMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID. Unknown IDs are ignored.
    pub fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write();
        if conns.shift_remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Look up a connection.
    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().get(connection_id).cloned()
    }

    /// Subscribe a connection to a squad's broadcast group.
    ///
    /// Returns `false` if the connection is gone or already subscribed.
    pub fn subscribe(&self, connection_id: &ConnectionId, squad: &SquadId) -> bool {
        self.get(connection_id)
            .is_some_and(|conn| conn.join_group(squad.clone()))
    }

    /// Send an event to every connection. Returns the number of clients reached.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        self.broadcast_to(|_| true, event, "all")
    }

    /// Send an event to connections subscribed to a squad's group.
    pub fn broadcast_to_group(&self, squad: &SquadId, event: &ServerEvent) -> usize {
        self.broadcast_to(|c| c.in_group(squad), event, squad.as_str())
    }

    /// Serialize once, then fan out to matching clients.
    fn broadcast_to(
        &self,
        filter: impl Fn(&ClientConnection) -> bool,
        event: &ServerEvent,
        label: &str,
    ) -> usize {
        let frame = match event.to_frame() {
            Ok(f) => f,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to serialize event");
                return 0;
            }
        };
        let conns = self.connections.read();
        let mut delivered = 0usize;
        for conn in conns.values().filter(|c| filter(c)) {
            if conn.send(Arc::clone(&frame)) {
                delivered += 1;
            } else {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    connection_id = %conn.id,
                    label,
                    total_drops = conn.drop_count(),
                    "failed to send event to client (queue full or closed)"
                );
            }
        }
        debug!(event = event.name(), label, delivered, "broadcast event");
        delivered
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// IDs of connections subscribed to a squad's group.
    pub fn group_members(&self, squad: &SquadId) -> Vec<ConnectionId> {
        self.connections
            .read()
            .values()
            .filter(|c| c.in_group(squad))
            .map(|c| c.id.clone())
            .collect()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection_with_rx(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::new(id.into(), tx)), rx)
    }

    fn users_event() -> ServerEvent {
        ServerEvent::ActiveUsers(Vec::new())
    }

    #[test]
    fn add_and_remove_connection() {
        let hub = BroadcastHub::new();
        let (conn, _rx) = make_connection_with_rx("c1");
        hub.add(conn);
        assert_eq!(hub.connection_count(), 1);
        hub.remove(&"c1".into());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn remove_nonexistent_connection() {
        let hub = BroadcastHub::new();
        hub.remove(&"no_such".into());
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn add_same_id_overwrites() {
        let hub = BroadcastHub::new();
        let (c1, _rx1) = make_connection_with_rx("same");
        let (c2, _rx2) = make_connection_with_rx("same");
        hub.add(c1);
        hub.add(c2);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn broadcast_all_reaches_everyone() {
        let hub = BroadcastHub::new();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        let (c2, mut rx2) = make_connection_with_rx("c2");
        hub.add(c1);
        hub.add(c2);

        assert_eq!(hub.broadcast_all(&users_event()), 2);
        let frame = rx1.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "active_users");
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn broadcast_all_to_empty_hub() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast_all(&users_event()), 0);
    }

    #[test]
    fn group_broadcast_only_reaches_subscribers() {
        let hub = BroadcastHub::new();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        let (c2, mut rx2) = make_connection_with_rx("c2");
        hub.add(c1);
        hub.add(c2);
        let squad = SquadId::from("squad_a");
        assert!(hub.subscribe(&"c1".into(), &squad));
        assert!(!hub.subscribe(&"c1".into(), &squad));

        assert_eq!(hub.broadcast_to_group(&squad, &users_event()), 1);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
        assert_eq!(hub.group_members(&squad), vec![ConnectionId::from("c1")]);
    }

    #[test]
    fn subscribe_unknown_connection_fails() {
        let hub = BroadcastHub::new();
        assert!(!hub.subscribe(&"ghost".into(), &"squad_a".into()));
    }

    #[test]
    fn full_queue_drops_without_blocking_others() {
        let hub = BroadcastHub::new();
        let (tx, _slow_rx) = mpsc::channel(1);
        hub.add(Arc::new(ClientConnection::new("slow".into(), tx)));
        let (fast, mut fast_rx) = make_connection_with_rx("fast");
        hub.add(fast);

        assert_eq!(hub.broadcast_all(&users_event()), 2);
        assert_eq!(hub.broadcast_all(&users_event()), 1);
        assert_eq!(hub.get(&"slow".into()).unwrap().drop_count(), 1);
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());
    }
}

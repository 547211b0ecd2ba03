//! WebSocket connection state, per-client sessions and broadcast fan-out.

pub mod broadcast;
pub mod connection;
pub mod session;

//! # rally-server
//!
//! Axum HTTP + `WebSocket` lobby server.
//!
//! - `/ws`: one session per client; decoded events go to a single dispatcher
//! - Dispatcher: owns the session registry, broadcasts roster snapshots
//! - `/health` and `/metrics` endpoints
//! - Static client bundle in production mode
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod assets;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{RallyServer, ServerHandle};

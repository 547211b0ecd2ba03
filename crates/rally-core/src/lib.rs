//! # rally-core
//!
//! Presence and squad-membership state for the Rally lobby.
//!
//! - [`ids`]: branded connection and squad IDs
//! - [`types`]: profiles, users, squads and their broadcast snapshots
//! - [`registry`]: the [`SessionRegistry`] state machine
//! - [`errors`]: reasons a registry mutation is skipped
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod types;

pub use errors::RegistryError;
pub use ids::{ConnectionId, SquadId};
pub use registry::{Removal, SessionRegistry};
pub use types::{Profile, Squad, SquadView, User};

//! Registry error types.
//!
//! Every variant describes a request the registry declined without touching
//! state. Callers treat them as silent no-ops.

use thiserror::Error;

use crate::ids::{ConnectionId, SquadId};

/// Why a registry mutation was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The connection has not joined the lobby.
    #[error("connection {0} has not joined the lobby")]
    UnregisteredUser(ConnectionId),
    /// No squad with this ID exists.
    #[error("squad {0} does not exist")]
    UnknownSquad(SquadId),
    /// The connection is already in the squad.
    #[error("connection {connection} is already a member of squad {squad}")]
    AlreadyMember {
        /// The joining connection.
        connection: ConnectionId,
        /// The squad it is already in.
        squad: SquadId,
    },
}

impl RegistryError {
    /// Short machine-friendly reason, used as a metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnregisteredUser(_) => "unregistered_user",
            Self::UnknownSquad(_) => "unknown_squad",
            Self::AlreadyMember { .. } => "already_member",
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_display() {
        let err = RegistryError::UnregisteredUser("conn_1".into());
        assert_eq!(err.to_string(), "connection conn_1 has not joined the lobby");
    }

    #[test]
    fn already_member_display() {
        let err = RegistryError::AlreadyMember {
            connection: "conn_1".into(),
            squad: "squad_1".into(),
        };
        assert!(err.to_string().contains("already a member of squad squad_1"));
    }

    #[test]
    fn reasons_are_snake_case() {
        let errs = [
            RegistryError::UnregisteredUser("c".into()),
            RegistryError::UnknownSquad("s".into()),
            RegistryError::AlreadyMember {
                connection: "c".into(),
                squad: "s".into(),
            },
        ];
        for err in errs {
            assert!(err.reason().chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}

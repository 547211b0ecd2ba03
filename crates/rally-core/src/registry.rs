//! `SessionRegistry`: the canonical presence and squad-membership state.
//!
//! The registry is plain data behind `&mut self` methods. It performs no I/O
//! and holds no locks; whoever owns it serialises access (the lobby
//! dispatcher owns it by value and applies one event at a time).
//!
//! Invariants after every call:
//! - every squad member is a registered user
//! - no squad is empty
//! - a connection appears at most once per squad
//! - squad IDs are unique
//!
//! Both maps preserve insertion order so snapshots are deterministic.

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::{RegistryError, Result};
use crate::ids::{ConnectionId, SquadId};
use crate::types::{Profile, Squad, SquadView, User};

/// Outcome of [`SessionRegistry::remove_user`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// The removed user, if the connection had joined the lobby.
    pub user: Option<User>,
    /// Squads the connection was dropped from that still have members.
    pub left: Vec<SquadId>,
    /// Squads deleted because the connection was their last member.
    pub dissolved: Vec<SquadId>,
}

impl Removal {
    /// Whether any state changed.
    pub fn changed(&self) -> bool {
        self.user.is_some() || !self.left.is_empty() || !self.dissolved.is_empty()
    }
}

/// Users keyed by connection, squads keyed by squad ID.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    users: IndexMap<ConnectionId, User>,
    squads: IndexMap<SquadId, Squad>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the user bound to `connection`.
    ///
    /// Re-registering keeps the user's original position in the roster.
    pub fn register_user(&mut self, connection: ConnectionId, profile: Profile) -> User {
        let user = User::new(connection.clone(), profile);
        if self.users.insert(connection, user.clone()).is_some() {
            debug!(connection_id = %user.id, "profile replaced");
        }
        user
    }

    /// Create a squad led by `creator`, who becomes its first member.
    pub fn create_squad(&mut self, name: impl Into<String>, creator: &ConnectionId) -> Result<Squad> {
        if !self.users.contains_key(creator) {
            return Err(RegistryError::UnregisteredUser(creator.clone()));
        }
        let mut id = SquadId::generate();
        while self.squads.contains_key(&id) {
            id = SquadId::generate();
        }
        let squad = Squad {
            id: id.clone(),
            name: name.into(),
            leader: creator.clone(),
            members: vec![creator.clone()],
        };
        let _ = self.squads.insert(id, squad.clone());
        Ok(squad)
    }

    /// Append `connection` to the squad's member list.
    pub fn join_squad(&mut self, squad_id: &SquadId, connection: &ConnectionId) -> Result<Squad> {
        if !self.users.contains_key(connection) {
            return Err(RegistryError::UnregisteredUser(connection.clone()));
        }
        let squad = self
            .squads
            .get_mut(squad_id)
            .ok_or_else(|| RegistryError::UnknownSquad(squad_id.clone()))?;
        if squad.has_member(connection) {
            return Err(RegistryError::AlreadyMember {
                connection: connection.clone(),
                squad: squad_id.clone(),
            });
        }
        squad.members.push(connection.clone());
        Ok(squad.clone())
    }

    /// Drop the user and every squad membership it holds in one step.
    ///
    /// Squads left without members are deleted.
    pub fn remove_user(&mut self, connection: &ConnectionId) -> Removal {
        let user = self.users.shift_remove(connection);
        let mut left = Vec::new();
        let mut dissolved = Vec::new();
        self.squads.retain(|id, squad| {
            let before = squad.members.len();
            squad.members.retain(|m| m != connection);
            if squad.members.is_empty() {
                dissolved.push(id.clone());
                return false;
            }
            if squad.members.len() != before {
                left.push(id.clone());
            }
            true
        });
        Removal {
            user,
            left,
            dissolved,
        }
    }

    /// Users in join order.
    pub fn list_users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    /// Squads in creation order, members resolved to user records.
    pub fn list_squads(&self) -> Vec<SquadView> {
        self.squads
            .values()
            .map(|squad| SquadView {
                id: squad.id.clone(),
                name: squad.name.clone(),
                leader: squad.leader.clone(),
                members: squad
                    .members
                    .iter()
                    .filter_map(|m| self.users.get(m).cloned())
                    .collect(),
            })
            .collect()
    }

    /// Look up a user.
    pub fn user(&self, connection: &ConnectionId) -> Option<&User> {
        self.users.get(connection)
    }

    /// Look up a squad.
    pub fn squad(&self, id: &SquadId) -> Option<&Squad> {
        self.squads.get(id)
    }

    /// Number of users in the lobby.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of live squads.
    pub fn squad_count(&self) -> usize {
        self.squads.len()
    }

    /// Whether the lobby holds no users and no squads.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.squads.is_empty()
    }
}

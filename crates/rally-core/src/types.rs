//! Lobby data model: profiles, users, squads and their wire snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, SquadId};

/// Client-supplied display information.
///
/// `name` is required. Any further fields must be strings and are carried
/// through verbatim; they are flattened next to `name` on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name shown in rosters.
    pub name: String,
    /// Additional string fields (avatar, colour, ...), opaque to the lobby.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Profile {
    /// Profile carrying only a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Add an extra string field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.extra.insert(key.into(), value.into());
        self
    }
}

/// One identified client in the lobby.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Connection the user is bound to.
    pub id: ConnectionId,
    /// Display information.
    #[serde(flatten)]
    pub profile: Profile,
}

impl User {
    /// Bind a profile to a connection.
    ///
    /// A client-supplied `id` field is dropped: the connection ID always wins.
    pub fn new(id: ConnectionId, mut profile: Profile) -> Self {
        let _ = profile.extra.remove("id");
        Self { id, profile }
    }
}

/// A squad as stored in the registry. Members are connection references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Squad {
    /// Unique squad ID.
    pub id: SquadId,
    /// Client-supplied label.
    pub name: String,
    /// Connection that created the squad. Informational only.
    pub leader: ConnectionId,
    /// Members in join order. Never empty while the squad exists.
    pub members: Vec<ConnectionId>,
}

impl Squad {
    /// Whether `id` is already a member.
    pub fn has_member(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }
}

/// Snapshot of a squad as broadcast to clients: members resolved to users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadView {
    /// Unique squad ID.
    pub id: SquadId,
    /// Client-supplied label.
    pub name: String,
    /// Connection that created the squad.
    pub leader: ConnectionId,
    /// Member user records in join order.
    pub members: Vec<User>,
}

impl SquadView {
    /// Member IDs in join order.
    pub fn member_ids(&self) -> Vec<&ConnectionId> {
        self.members.iter().map(|m| &m.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_serializes_flat() {
        let user = User::new("conn_x".into(), Profile::named("X").with_field("avatar", "fox"));
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value, json!({"id": "conn_x", "name": "X", "avatar": "fox"}));
    }

    #[test]
    fn client_supplied_id_is_discarded() {
        let profile: Profile = serde_json::from_value(json!({"name": "X", "id": "spoof"})).unwrap();
        let user = User::new("conn_real".into(), profile);
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["id"], "conn_real");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn profile_requires_name() {
        let res: Result<Profile, _> = serde_json::from_value(json!({"avatar": "fox"}));
        assert!(res.is_err());
    }

    #[test]
    fn profile_rejects_non_string_fields() {
        let res: Result<Profile, _> = serde_json::from_value(json!({"name": "X", "level": 3}));
        assert!(res.is_err());
    }

    #[test]
    fn profile_keeps_extra_string_fields() {
        let profile: Profile =
            serde_json::from_value(json!({"name": "X", "color": "red"})).unwrap();
        assert_eq!(profile.extra.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn squad_view_wire_shape() {
        let view = SquadView {
            id: "squad_1".into(),
            name: "Alpha".into(),
            leader: "conn_x".into(),
            members: vec![User::new("conn_x".into(), Profile::named("X"))],
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "squad_1",
                "name": "Alpha",
                "leader": "conn_x",
                "members": [{"id": "conn_x", "name": "X"}],
            })
        );
        assert_eq!(view.member_ids(), vec![&ConnectionId::from("conn_x")]);
    }
}

//! Lobby wire protocol.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.

use std::sync::Arc;

use rally_core::{ConnectionId, Profile, SquadId, SquadView, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events a client may send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce presence with a profile.
    JoinLobby(Profile),
    /// Create a squad with the given name.
    CreateSquad(String),
    /// Join an existing squad by ID.
    JoinSquad(SquadId),
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinLobby(_) => "join_lobby",
            Self::CreateSquad(_) => "create_squad",
            Self::JoinSquad(_) => "join_squad",
        }
    }
}

/// Events the server emits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once to a new connection so it learns its own ID.
    #[serde(rename = "connection.established", rename_all = "camelCase")]
    ConnectionEstablished {
        /// The connection's ID.
        connection_id: ConnectionId,
    },
    /// Full roster of identified users.
    #[serde(rename = "active_users")]
    ActiveUsers(Vec<User>),
    /// Full list of squads.
    #[serde(rename = "active_squads")]
    ActiveSquads(Vec<SquadView>),
}

impl ServerEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection.established",
            Self::ActiveUsers(_) => "active_users",
            Self::ActiveSquads(_) => "active_squads",
        }
    }

    /// Serialize into a shareable text frame.
    pub fn to_frame(&self) -> Result<Arc<String>, ProtocolError> {
        Ok(Arc::new(serde_json::to_string(self)?))
    }
}

/// A frame that could not be turned into a [`ClientEvent`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, unknown event name, or wrong payload shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Binary frame that is not valid UTF-8.
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// Decode a text frame.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a binary frame carrying UTF-8 JSON.
pub fn decode_binary(data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
    decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn decode_join_lobby() {
        let ev = decode(r#"{"event":"join_lobby","data":{"name":"X","avatar":"fox"}}"#).unwrap();
        assert_eq!(
            ev,
            ClientEvent::JoinLobby(Profile::named("X").with_field("avatar", "fox"))
        );
        assert_eq!(ev.name(), "join_lobby");
    }

    #[test]
    fn decode_create_and_join_squad() {
        let create = decode(r#"{"event":"create_squad","data":"Alpha"}"#).unwrap();
        assert_eq!(create, ClientEvent::CreateSquad("Alpha".into()));
        let join = decode(r#"{"event":"join_squad","data":"squad_1"}"#).unwrap();
        assert_eq!(join, ClientEvent::JoinSquad("squad_1".into()));
    }

    #[test]
    fn unknown_event_is_malformed() {
        let err = decode(r#"{"event":"leave_squad","data":"squad_1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn wrong_payload_type_is_malformed() {
        assert!(decode(r#"{"event":"create_squad","data":{"name":"Alpha"}}"#).is_err());
        assert!(decode(r#"{"event":"join_lobby","data":"X"}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn binary_frames() {
        let ev = decode_binary(br#"{"event":"create_squad","data":"Alpha"}"#).unwrap();
        assert_eq!(ev, ClientEvent::CreateSquad("Alpha".into()));
        assert!(matches!(
            decode_binary(&[0xff, 0xfe]).unwrap_err(),
            ProtocolError::NotUtf8
        ));
    }

    #[test]
    fn active_users_envelope() {
        let ev = ServerEvent::ActiveUsers(vec![User::new("conn_x".into(), Profile::named("X"))]);
        let value: Value = serde_json::from_str(&ev.to_frame().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "active_users", "data": [{"id": "conn_x", "name": "X"}]})
        );
    }

    #[test]
    fn connection_established_envelope() {
        let ev = ServerEvent::ConnectionEstablished {
            connection_id: "conn_1".into(),
        };
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            value,
            json!({"event": "connection.established", "data": {"connectionId": "conn_1"}})
        );
        assert_eq!(ev.name(), "connection.established");
    }

    #[test]
    fn empty_squad_list_envelope() {
        let value = serde_json::to_value(ServerEvent::ActiveSquads(Vec::new())).unwrap();
        assert_eq!(value, json!({"event": "active_squads", "data": []}));
    }
}

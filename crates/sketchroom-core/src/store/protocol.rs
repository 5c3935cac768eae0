//! JSON protocol between [`RelayStore`](super::RelayStore) clients and the relay server.
//!
//! ```json
//! { "type": "join", "room": "creative-space-abc" }
//! { "type": "put", "path": "canvas/state", "value": { ... } }
//! { "type": "set", "path": "canvas/strokes", "key": "9f0c...", "value": { ... } }
//! { "type": "subscribe", "path": "canvas/strokes" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room namespace. Replaces any previous room and subscriptions.
    Join { room: String },
    /// Overwrite the value at a path.
    Put { path: String, value: Value },
    /// Append a keyed record to the set at a path.
    Set { path: String, key: String, value: Value },
    /// Receive current and future values at a path.
    Subscribe { path: String },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join.
    Joined { room: String, peer_count: usize },
    /// A value at a subscribed path.
    Change {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        value: Value,
    },
    /// Error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::Join {
            room: "creative-space-abc".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"join""#));
        assert!(json.contains("creative-space-abc"));
    }

    #[test]
    fn test_server_message_deserialize() {
        let json = r#"{"type":"change","path":"canvas/state","value":{"a":1}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Change {
                path: "canvas/state".to_string(),
                key: None,
                value: json!({"a": 1}),
            }
        );

        let json = r#"{"type":"joined","room":"r","peer_count":2}"#;
        match serde_json::from_str::<ServerMessage>(json).unwrap() {
            ServerMessage::Joined { room, peer_count } => {
                assert_eq!(room, "r");
                assert_eq!(peer_count, 2);
            }
            other => panic!("Wrong message type: {other:?}"),
        }
    }
}

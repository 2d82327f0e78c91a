//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded; the envelope uses snake_case type tags
//! while the engine payloads keep their camelCase field naming.

use scribe_engine::{Conflict, CoreEvent, EditOp, PresenceUpdate};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit an edit operation for the subscribed document.
    Submit {
        /// Operation kind: "insert", "delete" or "replace"
        kind: String,
        /// Character offset into the document
        position: u64,
        /// Required for delete/replace
        #[serde(default)]
        length: Option<u64>,
        /// Required for insert/replace
        #[serde(default)]
        content: Option<String>,
        /// Author-supplied logical clock (milliseconds, may be fractional)
        #[serde(default)]
        client_timestamp: Option<f64>,
        /// Last-seen watermark; defaults to the client timestamp
        #[serde(default)]
        watermark: Option<f64>,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Update the sender's presence (typing, cursor, selection).
    Presence {
        #[serde(flatten)]
        update: PresenceUpdate,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A broadcast core event for the subscribed topic.
    Event {
        #[serde(flatten)]
        payload: CoreEvent,
    },

    /// Response to a submit request.
    SubmitResult {
        /// "applied" or "conflict_resolved"
        status: String,
        /// The transformed, persisted operation
        operation: Box<EditOp>,
        /// Conflicts resolved along the way
        #[serde(skip_serializing_if = "Vec::is_empty")]
        conflicts: Vec<Conflict>,
        /// Request ID from the original request
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Wrap a core event for broadcast.
    pub fn event(payload: CoreEvent) -> Self {
        ServerMessage::Event { payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_submit_deserialization() {
        let json = r#"{
            "type": "submit",
            "kind": "insert",
            "position": 4,
            "content": "hello",
            "client_timestamp": 1706745600000.5,
            "request_id": "req-1"
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Submit {
                kind,
                position,
                content,
                length,
                request_id,
                ..
            } => {
                assert_eq!(kind, "insert");
                assert_eq!(position, 4);
                assert_eq!(content.as_deref(), Some("hello"));
                assert_eq!(length, None);
                assert_eq!(request_id.as_deref(), Some("req-1"));
            }
            _ => panic!("Expected Submit message"),
        }
    }

    #[test]
    fn client_presence_deserialization() {
        let json = r#"{"type": "presence", "typing": true, "cursor": 12}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Presence { update } => {
                assert_eq!(update.typing, Some(true));
                assert_eq!(update.cursor, Some(12));
            }
            _ => panic!("Expected Presence message"),
        }

        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn server_message_serialization() {
        let msg = ServerMessage::Pong;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let msg = ServerMessage::error("test error", Some("req-1".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""message":"test error""#));
        assert!(json.contains(r#""request_id":"req-1""#));
    }

    #[test]
    fn event_envelope_flattens_the_core_event() {
        let msg = ServerMessage::event(CoreEvent::UserJoined {
            session_id: "sess-1".into(),
            user_id: "alice".into(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains(r#""event":"user_joined""#));
        assert!(json.contains(r#""session_id":"sess-1""#));
    }
}

//! WebSocket subscription hub.
//!
//! Tracks connected clients per session and per document, and fans
//! broadcast events out to the matching topic. Sends are fire-and-forget:
//! a full or closed channel drops the message for that subscriber, who
//! catches up through reconnection.

use std::sync::Arc;

use dashmap::DashMap;
use scribe_engine::CoreEvent;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single subscribed connection.
#[derive(Debug)]
pub struct Subscriber {
    /// Session topic the client subscribed to
    pub session_id: String,
    /// Document topic the client subscribed to
    pub document_id: String,
    /// Authenticated user behind the connection
    pub user_id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket subscriptions.
///
/// Thread-safe and shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct SessionHub {
    subscribers: DashMap<String, Subscriber>,
    /// Index of connection ids by session topic
    by_session: DashMap<String, Vec<String>>,
    /// Index of connection ids by document topic
    by_document: DashMap<String, Vec<String>>,
}

impl SessionHub {
    /// Create a new hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new hub wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a subscription. Returns the connection ID.
    pub fn register(
        &self,
        session_id: String,
        document_id: String,
        user_id: String,
        sender: MessageSender,
    ) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.by_session
            .entry(session_id.clone())
            .or_default()
            .push(conn_id.clone());
        self.by_document
            .entry(document_id.clone())
            .or_default()
            .push(conn_id.clone());
        self.subscribers.insert(
            conn_id.clone(),
            Subscriber {
                session_id,
                document_id,
                user_id,
                sender,
            },
        );

        tracing::info!(conn_id = %conn_id, "WebSocket subscription registered");

        conn_id
    }

    /// Unregister a subscription.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, subscriber)) = self.subscribers.remove(conn_id) {
            Self::drop_from_index(&self.by_session, &subscriber.session_id, conn_id);
            Self::drop_from_index(&self.by_document, &subscriber.document_id, conn_id);

            tracing::info!(
                conn_id = %conn_id,
                user_id = %subscriber.user_id,
                "WebSocket subscription unregistered"
            );
        }
    }

    fn drop_from_index(index: &DashMap<String, Vec<String>>, key: &str, conn_id: &str) {
        if let Some(mut conn_ids) = index.get_mut(key) {
            conn_ids.retain(|id| id != conn_id);
            if conn_ids.is_empty() {
                drop(conn_ids);
                index.remove(key);
            }
        }
    }

    /// Broadcast a core event to its topic: the session topic when it has
    /// one, the document topic otherwise.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn broadcast_event(&self, event: CoreEvent) -> usize {
        let message = ServerMessage::event(event.clone());
        let sent = match (event.session_topic(), event.document_topic()) {
            (Some(session_id), _) => self.broadcast_to_session(session_id, message),
            (None, Some(document_id)) => self.broadcast_to_document(document_id, message),
            (None, None) => 0,
        };

        tracing::debug!(event = event.name(), recipients = sent, "Broadcast event");
        sent
    }

    /// Broadcast a message to every subscriber of a session topic.
    pub fn broadcast_to_session(&self, session_id: &str, message: ServerMessage) -> usize {
        self.broadcast_index(&self.by_session, session_id, message)
    }

    /// Broadcast a message to every subscriber of a document topic.
    pub fn broadcast_to_document(&self, document_id: &str, message: ServerMessage) -> usize {
        self.broadcast_index(&self.by_document, document_id, message)
    }

    fn broadcast_index(
        &self,
        index: &DashMap<String, Vec<String>>,
        key: &str,
        message: ServerMessage,
    ) -> usize {
        let Some(conn_ids) = index.get(key) else {
            return 0;
        };

        let mut sent_count = 0;
        for conn_id in conn_ids.iter() {
            if let Some(subscriber) = self.subscribers.get(conn_id) {
                if subscriber.sender.send(message.clone()).is_ok() {
                    sent_count += 1;
                }
            }
        }
        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) {
        if let Some(subscriber) = self.subscribers.get(conn_id) {
            let _ = subscriber.sender.send(message);
        }
    }

    /// Number of active subscriptions.
    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of sessions with at least one subscriber.
    #[allow(dead_code)]
    pub fn session_count(&self) -> usize {
        self.by_session.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_pair(hub: &SessionHub) -> (String, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = hub.register(
            "sess-1".to_string(),
            "doc-1".to_string(),
            "alice".to_string(),
            tx,
        );
        (conn_id, rx)
    }

    #[test]
    fn register_unregister() {
        let hub = SessionHub::new();
        let (conn_id, _rx) = register_pair(&hub);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.session_count(), 1);

        hub.unregister(&conn_id);
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn session_events_reach_session_subscribers() {
        let hub = SessionHub::new();
        let (_conn, mut rx) = register_pair(&hub);

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(
            "sess-2".to_string(),
            "doc-2".to_string(),
            "bob".to_string(),
            tx2,
        );

        let sent = hub.broadcast_event(CoreEvent::UserJoined {
            session_id: "sess-1".into(),
            user_id: "carol".into(),
        });
        assert_eq!(sent, 1);

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::Event { .. }
        ));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn document_events_route_by_document_topic() {
        let hub = SessionHub::new();
        let (_conn, mut rx) = register_pair(&hub);

        let op = scribe_engine::EditOp::insert(
            "op-1",
            "doc-1",
            "alice",
            0,
            "x",
            scribe_engine::ClockStamp::new(100, "alice"),
        )
        .into_applied(1_000);

        let sent = hub.broadcast_event(CoreEvent::OperationApplied {
            document_id: "doc-1".into(),
            operation: Box::new(op),
            conflicts: Vec::new(),
        });
        assert_eq!(sent, 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn closed_channel_is_skipped_silently() {
        let hub = SessionHub::new();
        let (_conn, rx) = register_pair(&hub);
        drop(rx);

        let sent = hub.broadcast_event(CoreEvent::UserJoined {
            session_id: "sess-1".into(),
            user_id: "carol".into(),
        });
        assert_eq!(sent, 0);
    }
}

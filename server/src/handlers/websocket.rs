//! WebSocket handler for real-time collaboration.
//!
//! Each connection subscribes to one session (and its document). The
//! loop forwards broadcast events out and accepts submit/presence/ping
//! messages in, reusing the same handlers as the HTTP surface.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use scribe_engine::Actor;

use crate::websocket::{ClientMessage, ServerMessage};
use crate::AppState;

use super::{handle_presence_update, handle_submit, SubmitRequest};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the subscription with the hub
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    session_id: String,
    document_id: String,
    actor: Actor,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages to this connection.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = state.hub.register(
        session_id.clone(),
        document_id.clone(),
        actor.user_id.clone(),
        tx,
    );

    tracing::info!(
        conn_id = %conn_id,
        session_id = %session_id,
        user_id = %actor.user_id,
        "WebSocket client connected"
    );

    // Forward messages from the channel to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    // Process incoming messages.
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(response) =
                    process_message(&text, &state, &session_id, &document_id, &actor).await
                {
                    state.hub.send_to(&conn_id, response);
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up. Presence is left to its TTL: the spec's removal paths
    // are explicit leave and expiry, not transport drops.
    state.hub.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        user_id = %actor.user_id,
        active_connections = state.hub.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Process one client message. `None` means nothing to send back
/// (fire-and-forget presence traffic).
async fn process_message(
    text: &str,
    state: &AppState,
    session_id: &str,
    document_id: &str,
    actor: &Actor,
) -> Option<ServerMessage> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return Some(ServerMessage::error(
                format!("Invalid message format: {}", e),
                None,
            ));
        }
    };

    match client_msg {
        ClientMessage::Submit {
            kind,
            position,
            length,
            content,
            client_timestamp,
            watermark,
            request_id,
        } => {
            let request = SubmitRequest {
                session_id: session_id.to_string(),
                kind,
                position,
                length,
                content,
                client_timestamp,
                watermark,
            };

            match handle_submit(state, actor, document_id, request).await {
                Ok(response) => Some(ServerMessage::SubmitResult {
                    status: response.status.to_string(),
                    operation: Box::new(response.operation),
                    conflicts: response.conflicts,
                    request_id,
                }),
                Err(e) => Some(ServerMessage::error(e.to_string(), request_id)),
            }
        }

        ClientMessage::Presence { update } => {
            // Broadcast happens inside the handler; errors are reported,
            // success is silent.
            match handle_presence_update(state, actor, session_id, update) {
                Ok(_) => None,
                Err(e) => Some(ServerMessage::error(e.to_string(), None)),
            }
        }

        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}

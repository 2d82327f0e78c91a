//! Presence handlers: typing, cursor, and selection updates.
//!
//! Pure presence-field traffic: nothing here touches the operation log.
//! Updates are broadcast to session subscribers fire-and-forget.

use scribe_engine::{
    Actor, CoreEvent, Error as EngineError, PresenceEntry, PresenceUpdate, SessionStatus,
};
use serde::Serialize;

use crate::error::Result;
use crate::state::{self, now_ms};
use crate::AppState;

/// Acknowledgement for a presence update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceAck {
    pub status: &'static str,
    pub entry: PresenceEntry,
}

/// Apply a presence update for the acting user and broadcast it.
pub fn handle_presence_update(
    state: &AppState,
    actor: &Actor,
    session_id: &str,
    update: PresenceUpdate,
) -> Result<PresenceAck> {
    let now = now_ms();

    {
        let sessions = state::lock(&state.collab.sessions)?;
        let session = sessions
            .get(session_id)
            .filter(|session| {
                session.status == SessionStatus::Active && !session.is_expired(now)
            })
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        if !session.has_member(&actor.user_id) {
            return Err(EngineError::Unauthorized(format!(
                "{} is not a member of session {}",
                actor.user_id, session_id
            ))
            .into());
        }
    }

    let entry =
        state::lock(&state.collab.presence)?.upsert(session_id, &actor.user_id, update, now);

    state.hub.broadcast_event(CoreEvent::PresenceUpdated {
        session_id: session_id.to_string(),
        entry: Box::new(entry.clone()),
    });

    Ok(PresenceAck {
        status: "ok",
        entry,
    })
}

/// Live presence for a session, expired entries dropped on read.
pub fn handle_presence_list(state: &AppState, session_id: &str) -> Result<Vec<PresenceEntry>> {
    let now = now_ms();
    Ok(state::lock(&state.collab.presence)?.list(session_id, now))
}

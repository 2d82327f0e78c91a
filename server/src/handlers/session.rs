//! Session lifecycle handlers: start, join, leave, terminate.

use scribe_engine::{Actor, CollabSession, PresenceUpdate, SessionSettings};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::{self, now_ms};
use crate::AppState;

/// Request body for starting a session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub document_id: String,
    #[serde(default)]
    pub settings: SessionSettings,
}

/// Response carrying a session snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// "created", "session_exists", "joined", "terminated"
    pub status: &'static str,
    pub session: CollabSession,
}

/// Response for leaving a session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub status: &'static str,
    /// Whether the session ended because the last member left
    pub ended: bool,
}

/// Request body for terminating a session.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Start a session for a document, idempotently.
pub fn handle_start(
    state: &AppState,
    actor: &Actor,
    request: StartSessionRequest,
) -> Result<SessionResponse> {
    let now = now_ms();
    let session_id = uuid::Uuid::new_v4().to_string();

    let outcome = state::lock(&state.collab.sessions)?.start(
        session_id,
        &request.document_id,
        &actor.user_id,
        request.settings,
        now,
    );

    if outcome.created {
        state::lock(&state.collab.presence)?.upsert(
            &outcome.session.session_id,
            &actor.user_id,
            PresenceUpdate::default(),
            now,
        );
    }
    for event in outcome.events {
        state.hub.broadcast_event(event);
    }

    tracing::info!(
        session_id = %outcome.session.session_id,
        document_id = %request.document_id,
        created = outcome.created,
        "Session start"
    );

    Ok(SessionResponse {
        status: if outcome.created {
            "created"
        } else {
            "session_exists"
        },
        session: outcome.session,
    })
}

/// Join an active session.
pub fn handle_join(state: &AppState, actor: &Actor, session_id: &str) -> Result<SessionResponse> {
    let now = now_ms();

    let (session, events) =
        state::lock(&state.collab.sessions)?.join(session_id, &actor.user_id, now)?;
    state::lock(&state.collab.presence)?.upsert(
        session_id,
        &actor.user_id,
        PresenceUpdate::default(),
        now,
    );
    for event in events {
        state.hub.broadcast_event(event);
    }

    Ok(SessionResponse {
        status: "joined",
        session,
    })
}

/// Leave a session; the last member out ends it.
pub fn handle_leave(state: &AppState, actor: &Actor, session_id: &str) -> Result<LeaveResponse> {
    let (ended, events) = state::lock(&state.collab.sessions)?.leave(session_id, &actor.user_id)?;
    state::lock(&state.collab.presence)?.remove(session_id, &actor.user_id);
    for event in events {
        state.hub.broadcast_event(event);
    }

    Ok(LeaveResponse {
        status: "left",
        ended,
    })
}

/// Force-terminate a session (owner or administrator), clearing its
/// presence and releasing every lock on the underlying document.
pub fn handle_terminate(
    state: &AppState,
    actor: &Actor,
    session_id: &str,
    request: TerminateRequest,
) -> Result<SessionResponse> {
    let reason = request.reason.unwrap_or_else(|| "terminated".to_string());

    let (session, events) =
        state::lock(&state.collab.sessions)?.terminate(session_id, actor, &reason)?;
    state::lock(&state.collab.presence)?.clear_session(session_id);
    let released = state::lock(&state.collab.locks)?.release_all(&session.document_id);
    for event in events {
        state.hub.broadcast_event(event);
    }

    tracing::info!(
        session_id = %session_id,
        document_id = %session.document_id,
        released_locks = released,
        "Session terminated"
    );

    Ok(SessionResponse {
        status: "terminated",
        session,
    })
}

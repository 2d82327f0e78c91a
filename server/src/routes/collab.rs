//! Collaboration routes: sessions, presence, locks, operations,
//! reconnection, and the WebSocket subscription endpoint.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use scribe_engine::{
    Error as EngineError, Lock, PresenceEntry, PresenceUpdate, ReconnectSnapshot, SessionStatus,
};
use serde::Deserialize;

use crate::auth::AuthActor;
use crate::error::Result;
use crate::handlers::{
    handle_acquire, handle_join, handle_leave, handle_lock_list, handle_presence_list,
    handle_presence_update, handle_reconnect, handle_release, handle_socket, handle_start,
    handle_submit, handle_terminate, AcquireLockRequest, LeaveResponse, PresenceAck,
    ReconnectRequest, ReleaseResponse, SessionResponse, StartSessionRequest, SubmitRequest,
    SubmitResponse, TerminateRequest,
};
use crate::state::{self, now_ms};
use crate::AppState;

/// Create collaboration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/{session_id}/join", post(join_session))
        .route("/sessions/{session_id}/leave", post(leave_session))
        .route("/sessions/{session_id}/terminate", post(terminate_session))
        .route(
            "/sessions/{session_id}/presence",
            get(list_presence).put(update_presence),
        )
        .route("/documents/{document_id}/operations", post(submit_operation))
        .route("/documents/{document_id}/reconnect", post(reconnect))
        .route(
            "/documents/{document_id}/locks",
            get(list_locks).post(acquire_lock),
        )
        .route(
            "/documents/{document_id}/locks/{lock_id}",
            delete(release_lock),
        )
        .route("/ws", get(ws_upgrade))
}

/// POST /sessions - Start (or return) the active session for a document.
async fn start_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>> {
    Ok(Json(handle_start(&state, &actor, request)?))
}

/// POST /sessions/{session_id}/join - Take a seat in a session.
async fn join_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>> {
    Ok(Json(handle_join(&state, &actor, &session_id)?))
}

/// POST /sessions/{session_id}/leave - Give up a seat.
async fn leave_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(session_id): Path<String>,
) -> Result<Json<LeaveResponse>> {
    Ok(Json(handle_leave(&state, &actor, &session_id)?))
}

/// POST /sessions/{session_id}/terminate - Force-end a session.
async fn terminate_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(session_id): Path<String>,
    Json(request): Json<TerminateRequest>,
) -> Result<Json<SessionResponse>> {
    Ok(Json(handle_terminate(&state, &actor, &session_id, request)?))
}

/// GET /sessions/{session_id}/presence - Who is here right now.
async fn list_presence(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<PresenceEntry>>> {
    Ok(Json(handle_presence_list(&state, &session_id)?))
}

/// PUT /sessions/{session_id}/presence - Typing/cursor/selection update.
async fn update_presence(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(session_id): Path<String>,
    Json(update): Json<PresenceUpdate>,
) -> Result<Json<PresenceAck>> {
    Ok(Json(handle_presence_update(
        &state,
        &actor,
        &session_id,
        update,
    )?))
}

/// POST /documents/{document_id}/operations - Submit an edit.
async fn submit_operation(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(document_id): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    Ok(Json(
        handle_submit(&state, &actor, &document_id, request).await?,
    ))
}

/// POST /documents/{document_id}/reconnect - Catch-up snapshot.
async fn reconnect(
    State(state): State<AppState>,
    AuthActor(_actor): AuthActor,
    Path(document_id): Path<String>,
    Json(request): Json<ReconnectRequest>,
) -> Result<Json<ReconnectSnapshot>> {
    Ok(Json(handle_reconnect(&state, &document_id, request).await?))
}

/// GET /documents/{document_id}/locks - Live locks.
async fn list_locks(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<Vec<Lock>>> {
    Ok(Json(handle_lock_list(&state, &document_id)?))
}

/// POST /documents/{document_id}/locks - Acquire a lock.
async fn acquire_lock(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(document_id): Path<String>,
    Json(request): Json<AcquireLockRequest>,
) -> Result<Json<Lock>> {
    Ok(Json(handle_acquire(&state, &actor, &document_id, request)?))
}

/// DELETE /documents/{document_id}/locks/{lock_id} - Release a lock.
async fn release_lock(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path((document_id, lock_id)): Path<(String, String)>,
) -> Result<Json<ReleaseResponse>> {
    Ok(Json(handle_release(
        &state,
        &actor,
        &document_id,
        &lock_id,
    )?))
}

/// Query parameters for the WebSocket subscription.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsParams {
    session_id: String,
    document_id: String,
}

/// GET /ws?sessionId=&documentId= - Subscribe to a session's events.
async fn ws_upgrade(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    // Membership is checked before the upgrade completes.
    let now = now_ms();
    {
        let sessions = state::lock(&state.collab.sessions)?;
        let session = sessions
            .get(&params.session_id)
            .filter(|session| {
                session.document_id == params.document_id
                    && session.status == SessionStatus::Active
                    && !session.is_expired(now)
            })
            .ok_or_else(|| EngineError::SessionNotFound(params.session_id.clone()))?;
        if !session.has_member(&actor.user_id) {
            return Err(EngineError::Unauthorized(format!(
                "{} is not a member of session {}",
                actor.user_id, params.session_id
            ))
            .into());
        }
    }

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, params.session_id, params.document_id, actor)
    }))
}

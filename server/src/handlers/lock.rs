//! Lock acquisition, release, and inspection handlers.

use scribe_engine::{Actor, CoreEvent, Lock, LockKind, Section};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::state::{self, now_ms};
use crate::AppState;

/// Request body for acquiring a lock.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireLockRequest {
    /// "read" or "write"
    pub lock_type: String,
    /// Locked range; omitted = whole document
    #[serde(default)]
    pub section: Option<Section>,
    /// Lifetime override in milliseconds (default 5 minutes)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Response for releasing a lock.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub status: &'static str,
    pub lock_id: String,
}

/// Acquire a lock on a document range.
pub fn handle_acquire(
    state: &AppState,
    actor: &Actor,
    document_id: &str,
    request: AcquireLockRequest,
) -> Result<Lock> {
    let kind = match request.lock_type.as_str() {
        "read" => LockKind::Read,
        "write" => LockKind::Write,
        other => {
            return Err(AppError::BadRequest(format!("unknown lock type: {other}")));
        }
    };

    let now = now_ms();
    let lock = state::lock(&state.collab.locks)?.acquire(
        uuid::Uuid::new_v4().to_string(),
        document_id,
        &actor.user_id,
        kind,
        request.section,
        request.timeout_ms,
        now,
    )?;

    state.hub.broadcast_event(CoreEvent::LockAcquired {
        document_id: document_id.to_string(),
        lock: Box::new(lock.clone()),
    });

    Ok(lock)
}

/// Release a lock. Holder or administrator only.
pub fn handle_release(
    state: &AppState,
    actor: &Actor,
    document_id: &str,
    lock_id: &str,
) -> Result<ReleaseResponse> {
    let now = now_ms();
    let lock = state::lock(&state.collab.locks)?.release(document_id, lock_id, actor, now)?;

    state.hub.broadcast_event(CoreEvent::LockReleased {
        document_id: document_id.to_string(),
        lock_id: lock.lock_id.clone(),
    });

    Ok(ReleaseResponse {
        status: "released",
        lock_id: lock.lock_id,
    })
}

/// Live locks on a document; expiry is reconciled on the way out.
pub fn handle_lock_list(state: &AppState, document_id: &str) -> Result<Vec<Lock>> {
    let now = now_ms();
    Ok(state::lock(&state.collab.locks)?.active_locks(document_id, now))
}

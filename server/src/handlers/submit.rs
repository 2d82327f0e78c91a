//! Operation submission, the correctness-critical path.
//!
//! Membership and locks are checked before the engine is reached; then
//! the document gate serializes read-reconcile-write: load the window
//! since the client's watermark, transform, apply, append, persist.
//! Submissions for different documents run in parallel; two submissions
//! for the same document never interleave, which is what rules out the
//! lost-update race.

use scribe_engine::{
    transform, ClockStamp, Conflict, CoreEvent, EditKind, EditOp, Error as EngineError,
    ResolutionStrategy, SessionStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::{self, now_ms, now_ticks};
use crate::{db, AppState};

/// Request body for operation submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Session the author is editing through
    pub session_id: String,
    /// Operation kind: "insert", "delete" or "replace"
    pub kind: String,
    /// Character offset into the document
    pub position: u64,
    /// Required for delete/replace
    #[serde(default)]
    pub length: Option<u64>,
    /// Required for insert/replace
    #[serde(default)]
    pub content: Option<String>,
    /// Author-supplied logical clock (milliseconds, may be fractional);
    /// the server assigns one when absent
    #[serde(default)]
    pub client_timestamp: Option<f64>,
    /// Last-seen watermark; defaults to the client timestamp
    #[serde(default)]
    pub watermark: Option<f64>,
}

/// Response for operation submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// "applied" or "conflict_resolved"
    pub status: &'static str,
    /// The transformed, persisted operation
    pub operation: EditOp,
    /// Conflicts resolved along the way
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
    /// Strategy used, present iff a conflict was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<ResolutionStrategy>,
}

/// Process an operation submission.
pub async fn handle_submit(
    state: &AppState,
    actor: &scribe_engine::Actor,
    document_id: &str,
    request: SubmitRequest,
) -> Result<SubmitResponse> {
    let now = now_ms();

    // Membership gate: rejected before anything reaches the engine.
    {
        let sessions = state::lock(&state.collab.sessions)?;
        let session = sessions
            .get(&request.session_id)
            .filter(|session| {
                session.document_id == document_id
                    && session.status == SessionStatus::Active
                    && !session.is_expired(now)
            })
            .ok_or_else(|| EngineError::SessionNotFound(request.session_id.clone()))?;
        if !session.has_member(&actor.user_id) {
            return Err(EngineError::Unauthorized(format!(
                "{} is not a member of session {}",
                actor.user_id, request.session_id
            ))
            .into());
        }
    }

    let op = build_operation(&request, actor, document_id)?;

    // Lock gate: another user's live write lock over the affected range
    // rejects the submission outright.
    {
        let mut locks = state::lock(&state.collab.locks)?;
        let span = op.affected_span();
        if let Some(conflicting) = locks.blocks_edit(document_id, &op.author_id, &span, now) {
            return Err(EngineError::LockConflict {
                conflicting: Box::new(conflicting),
            }
            .into());
        }
    }

    let watermark = request
        .watermark
        .map(ClockStamp::ticks_from_millis)
        .unwrap_or(op.stamp.ticks);

    // The serialized read-reconcile-write sequence.
    let gate = state.collab.document(document_id);
    let mut collab = gate.lock().await;
    collab.hydrate(&state.pool).await?;

    let window = collab.log.window_since(watermark);
    let outcome = transform::reconcile(op, &window)?;

    let applied = outcome.transformed.clone().into_applied(now);
    collab.state.apply(&applied);
    collab.log.append(applied.clone())?;
    db::insert_operation(&state.pool, &applied).await?;
    drop(collab);

    // The author is visibly active.
    state::lock(&state.collab.presence)?.touch(&request.session_id, &actor.user_id, now);

    state.hub.broadcast_event(CoreEvent::OperationApplied {
        document_id: document_id.to_string(),
        operation: Box::new(applied.clone()),
        conflicts: outcome.conflicts.clone(),
    });

    let status = if outcome.had_conflict() {
        "conflict_resolved"
    } else {
        "applied"
    };
    Ok(SubmitResponse {
        status,
        operation: applied,
        conflicts: outcome.conflicts,
        resolution_strategy: outcome.strategy,
    })
}

/// Turn the wire shape into a pending engine operation.
fn build_operation(
    request: &SubmitRequest,
    actor: &scribe_engine::Actor,
    document_id: &str,
) -> Result<EditOp> {
    let kind = match request.kind.as_str() {
        "insert" => EditKind::Insert {
            content: request
                .content
                .clone()
                .ok_or_else(|| EngineError::InvalidOperation("insert requires content".into()))?,
        },
        "delete" => EditKind::Delete {
            length: request
                .length
                .ok_or_else(|| EngineError::InvalidOperation("delete requires length".into()))?,
        },
        "replace" => EditKind::Replace {
            length: request
                .length
                .ok_or_else(|| EngineError::InvalidOperation("replace requires length".into()))?,
            content: request
                .content
                .clone()
                .ok_or_else(|| EngineError::InvalidOperation("replace requires content".into()))?,
        },
        other => {
            return Err(
                EngineError::InvalidOperation(format!("unknown operation kind: {other}")).into(),
            )
        }
    };

    let ticks = request
        .client_timestamp
        .map(ClockStamp::ticks_from_millis)
        .filter(|ticks| *ticks > 0)
        .unwrap_or_else(now_ticks);
    let stamp = ClockStamp::new(ticks, actor.user_id.clone());

    let op_id = uuid::Uuid::new_v4().to_string();
    let op = match kind {
        EditKind::Insert { content } => EditOp::insert(
            op_id,
            document_id,
            &actor.user_id,
            request.position,
            content,
            stamp,
        ),
        EditKind::Delete { length } => EditOp::delete(
            op_id,
            document_id,
            &actor.user_id,
            request.position,
            length,
            stamp,
        ),
        EditKind::Replace { length, content } => EditOp::replace(
            op_id,
            document_id,
            &actor.user_id,
            request.position,
            length,
            content,
            stamp,
        ),
    };
    op.validate()?;
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_engine::Actor;

    fn request(kind: &str, length: Option<u64>, content: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            session_id: "sess-1".to_string(),
            kind: kind.to_string(),
            position: 3,
            length,
            content: content.map(String::from),
            client_timestamp: Some(1_000.0),
            watermark: None,
        }
    }

    #[test]
    fn build_operation_maps_the_wire_kinds() {
        let actor = Actor::user("alice");

        let op = build_operation(&request("insert", None, Some("hi")), &actor, "doc-1").unwrap();
        assert!(matches!(op.kind, EditKind::Insert { .. }));
        assert_eq!(op.author_id, "alice");
        assert_eq!(op.stamp.ticks, 1_000_000);

        let op = build_operation(&request("delete", Some(4), None), &actor, "doc-1").unwrap();
        assert!(matches!(op.kind, EditKind::Delete { length: 4 }));

        let op = build_operation(&request("replace", Some(4), Some("hi")), &actor, "doc-1").unwrap();
        assert!(matches!(op.kind, EditKind::Replace { .. }));
    }

    #[test]
    fn build_operation_rejects_malformed_input() {
        let actor = Actor::user("alice");

        assert!(build_operation(&request("insert", None, None), &actor, "doc-1").is_err());
        assert!(build_operation(&request("delete", None, None), &actor, "doc-1").is_err());
        assert!(build_operation(&request("burn", None, None), &actor, "doc-1").is_err());
    }

    #[test]
    fn server_assigns_a_stamp_when_the_client_omits_one() {
        let actor = Actor::user("alice");
        let mut req = request("insert", None, Some("hi"));
        req.client_timestamp = None;

        let op = build_operation(&req, &actor, "doc-1").unwrap();
        assert!(op.stamp.ticks > 0);
    }
}

//! Broadcast event vocabulary.
//!
//! The engine emits these as plain values; delivering them (sockets,
//! pub/sub, whatever the hosting application runs) is not the core's
//! concern. Delivery is fire-and-forget at-most-once — a client that
//! misses an event recovers through reconnection, so events are never
//! part of the correctness argument.

use crate::{
    transform::Conflict, DocumentId, EditOp, Lock, LockId, PresenceEntry, SessionId, UserId,
};
use serde::{Deserialize, Serialize};

/// A named event published to a per-document or per-session topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    SessionStarted {
        session_id: SessionId,
        document_id: DocumentId,
        owner_id: UserId,
    },
    UserJoined {
        session_id: SessionId,
        user_id: UserId,
    },
    UserLeft {
        session_id: SessionId,
        user_id: UserId,
    },
    SessionEnded {
        session_id: SessionId,
        document_id: DocumentId,
    },
    SessionTerminated {
        session_id: SessionId,
        document_id: DocumentId,
        reason: String,
    },
    OperationApplied {
        document_id: DocumentId,
        operation: Box<EditOp>,
        conflicts: Vec<Conflict>,
    },
    PresenceUpdated {
        session_id: SessionId,
        entry: Box<PresenceEntry>,
    },
    LockAcquired {
        document_id: DocumentId,
        lock: Box<Lock>,
    },
    LockReleased {
        document_id: DocumentId,
        lock_id: LockId,
    },
}

impl CoreEvent {
    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::SessionStarted { .. } => "session_started",
            CoreEvent::UserJoined { .. } => "user_joined",
            CoreEvent::UserLeft { .. } => "user_left",
            CoreEvent::SessionEnded { .. } => "session_ended",
            CoreEvent::SessionTerminated { .. } => "session_terminated",
            CoreEvent::OperationApplied { .. } => "operation_applied",
            CoreEvent::PresenceUpdated { .. } => "presence_updated",
            CoreEvent::LockAcquired { .. } => "lock_acquired",
            CoreEvent::LockReleased { .. } => "lock_released",
        }
    }

    /// The session topic this event belongs to, if any.
    pub fn session_topic(&self) -> Option<&SessionId> {
        match self {
            CoreEvent::SessionStarted { session_id, .. }
            | CoreEvent::UserJoined { session_id, .. }
            | CoreEvent::UserLeft { session_id, .. }
            | CoreEvent::SessionEnded { session_id, .. }
            | CoreEvent::SessionTerminated { session_id, .. }
            | CoreEvent::PresenceUpdated { session_id, .. } => Some(session_id),
            CoreEvent::OperationApplied { .. }
            | CoreEvent::LockAcquired { .. }
            | CoreEvent::LockReleased { .. } => None,
        }
    }

    /// The document topic this event belongs to, if any.
    pub fn document_topic(&self) -> Option<&DocumentId> {
        match self {
            CoreEvent::SessionStarted { document_id, .. }
            | CoreEvent::SessionEnded { document_id, .. }
            | CoreEvent::SessionTerminated { document_id, .. }
            | CoreEvent::OperationApplied { document_id, .. }
            | CoreEvent::LockAcquired { document_id, .. }
            | CoreEvent::LockReleased { document_id, .. } => Some(document_id),
            CoreEvent::UserJoined { .. }
            | CoreEvent::UserLeft { .. }
            | CoreEvent::PresenceUpdated { .. } => None,
        }
    }
}

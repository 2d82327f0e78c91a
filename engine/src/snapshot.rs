//! Reconnection catch-up snapshots.
//!
//! A client that lost its connection hands over its last-seen watermark
//! and receives everything needed to resume: the current content and
//! version, who is in the session, which locks are live, and the
//! operations it missed. The missed slice is hard-capped; past the cap
//! the client must fall back to a full content resync, which bounds both
//! the response size and the query cost.

use crate::{
    DocumentId, DocumentState, EditOp, Lock, LockTable, OpLog, PresenceEntry, PresenceMap,
    Ticks, Timestamp, Version,
};
use serde::{Deserialize, Serialize};

/// Maximum number of missed operations returned by catch-up.
pub const CATCH_UP_LIMIT: usize = 100;

/// Everything a reconnecting client needs to resume editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectSnapshot {
    pub document_id: DocumentId,
    /// Materialized content at the time of the snapshot
    pub current_content: String,
    /// Version matching `current_content`
    pub current_version: Version,
    /// Live members of the session
    pub active_users: Vec<PresenceEntry>,
    /// Live locks on the document
    pub active_locks: Vec<Lock>,
    /// Applied operations with stamps past the watermark, ascending
    pub missed_operations: Vec<EditOp>,
    /// True when more than `CATCH_UP_LIMIT` operations were missed; the
    /// client should resync content instead of replaying
    pub truncated: bool,
}

impl ReconnectSnapshot {
    /// Number of missed operations included.
    pub fn missed_count(&self) -> usize {
        self.missed_operations.len()
    }
}

/// Assemble a reconnection snapshot from the live stores.
///
/// Presence and locks are read through their lazily-expiring views, so a
/// snapshot never reports lapsed records.
#[allow(clippy::too_many_arguments)]
pub fn catch_up(
    state: &DocumentState,
    log: &OpLog,
    presence: &mut PresenceMap,
    locks: &mut LockTable,
    session_id: &str,
    watermark: Ticks,
    now: Timestamp,
) -> ReconnectSnapshot {
    let (missed_operations, truncated) = log.missed_since(watermark, CATCH_UP_LIMIT);
    ReconnectSnapshot {
        document_id: log.document_id().clone(),
        current_content: state.content.clone(),
        current_version: state.version,
        active_users: presence.list(session_id, now),
        active_locks: locks.active_locks(log.document_id(), now),
        missed_operations,
        truncated,
    }
}

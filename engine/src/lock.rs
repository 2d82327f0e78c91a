//! Section locks over document ranges.
//!
//! Locks are advisory claims arbitrated at acquisition time. They expire
//! on their own: eviction happens lazily whenever the table is read,
//! never from a background sweeper, so a stale lock costs nothing until
//! someone looks.

use crate::{
    error::Result, session::Actor, AuthorId, DocumentId, Error, LockId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default lock lifetime: 5 minutes.
pub const DEFAULT_LOCK_TTL_MS: u64 = 5 * 60 * 1_000;

/// A half-open character range `[start, end)` within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub start: u64,
    pub end: u64,
}

impl Section {
    /// Create a section. `end < start` is normalized to an empty range.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Whether the range covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Ranges overlap unless one ends at or before the other starts.
    pub fn overlaps(&self, other: &Section) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

/// Kind of claim a lock makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    Read,
    Write,
}

/// An exclusive or shared claim over a document range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    /// Unique lock id
    pub lock_id: LockId,
    /// Document the lock applies to
    pub document_id: DocumentId,
    /// User holding the lock
    pub holder_id: UserId,
    /// Read or write claim
    pub kind: LockKind,
    /// Locked range; `None` claims the whole document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    /// When the lock was granted
    pub acquired_at: Timestamp,
    /// When the lock lapses
    pub expires_at: Timestamp,
}

impl Lock {
    /// Create a lock expiring `ttl_ms` after `now`.
    pub fn new(
        lock_id: impl Into<LockId>,
        document_id: impl Into<DocumentId>,
        holder_id: impl Into<UserId>,
        kind: LockKind,
        section: Option<Section>,
        now: Timestamp,
        ttl_ms: u64,
    ) -> Self {
        Self {
            lock_id: lock_id.into(),
            document_id: document_id.into(),
            holder_id: holder_id.into(),
            kind,
            section,
            acquired_at: now,
            expires_at: now + ttl_ms,
        }
    }

    /// Whether the lock has lapsed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether the lock's range touches `span`. A whole-document lock
    /// touches everything.
    pub fn touches(&self, span: &Section) -> bool {
        match &self.section {
            Some(section) => section.overlaps(span),
            None => true,
        }
    }

    /// Conflict rule between two locks held by different users: a write
    /// on either side always conflicts; two reads conflict only when
    /// their sections overlap (a missing section is the whole document).
    fn conflicts_with(&self, kind: LockKind, section: Option<&Section>) -> bool {
        if self.kind == LockKind::Write || kind == LockKind::Write {
            return true;
        }
        match (&self.section, section) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => true,
        }
    }
}

/// All locks, grouped per document.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    locks: HashMap<DocumentId, Vec<Lock>>,
}

impl LockTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            locks: HashMap::new(),
        }
    }

    /// Attempt to acquire a lock, arbitrating against every other
    /// holder's live lock on the document. The first conflicting lock is
    /// reported back to the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn acquire(
        &mut self,
        lock_id: impl Into<LockId>,
        document_id: impl Into<DocumentId>,
        holder_id: impl Into<UserId>,
        kind: LockKind,
        section: Option<Section>,
        ttl_ms: Option<u64>,
        now: Timestamp,
    ) -> Result<Lock> {
        let document_id = document_id.into();
        let holder_id = holder_id.into();
        self.evict_expired(&document_id, now);

        if let Some(existing) = self.locks.get(&document_id) {
            if let Some(conflicting) = existing
                .iter()
                .filter(|lock| lock.holder_id != holder_id)
                .find(|lock| lock.conflicts_with(kind, section.as_ref()))
            {
                return Err(Error::LockConflict {
                    conflicting: Box::new(conflicting.clone()),
                });
            }
        }

        let lock = Lock::new(
            lock_id,
            document_id.clone(),
            holder_id,
            kind,
            section,
            now,
            ttl_ms.unwrap_or(DEFAULT_LOCK_TTL_MS),
        );
        self.locks
            .entry(document_id)
            .or_default()
            .push(lock.clone());
        Ok(lock)
    }

    /// Release a lock. Only the holder or an administrator may release;
    /// an expired lock is already gone and reports `LockNotFound`.
    pub fn release(
        &mut self,
        document_id: &str,
        lock_id: &str,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Lock> {
        self.evict_expired(document_id, now);

        let locks = self
            .locks
            .get_mut(document_id)
            .ok_or_else(|| Error::LockNotFound(lock_id.to_string()))?;
        let idx = locks
            .iter()
            .position(|lock| lock.lock_id == lock_id)
            .ok_or_else(|| Error::LockNotFound(lock_id.to_string()))?;

        if locks[idx].holder_id != actor.user_id && !actor.admin {
            return Err(Error::Unauthorized(format!(
                "lock {} is held by {}",
                lock_id, locks[idx].holder_id
            )));
        }
        Ok(locks.remove(idx))
    }

    /// Live locks on a document. Expired locks are discarded on the way.
    pub fn active_locks(&mut self, document_id: &str, now: Timestamp) -> Vec<Lock> {
        self.evict_expired(document_id, now);
        self.locks.get(document_id).cloned().unwrap_or_default()
    }

    /// Drop every lock on a document, expired or not. Used by session
    /// termination.
    pub fn release_all(&mut self, document_id: &str) -> usize {
        self.locks.remove(document_id).map_or(0, |locks| locks.len())
    }

    /// The pre-submission gate: another user's live write lock touching
    /// the span an operation modifies blocks the edit. Read locks never
    /// block edits.
    pub fn blocks_edit(
        &mut self,
        document_id: &str,
        author_id: &AuthorId,
        span: &Section,
        now: Timestamp,
    ) -> Option<Lock> {
        self.evict_expired(document_id, now);
        self.locks.get(document_id).and_then(|locks| {
            locks
                .iter()
                .filter(|lock| lock.kind == LockKind::Write && &lock.holder_id != author_id)
                .find(|lock| lock.touches(span))
                .cloned()
        })
    }

    fn evict_expired(&mut self, document_id: &str, now: Timestamp) {
        if let Some(locks) = self.locks.get_mut(document_id) {
            locks.retain(|lock| !lock.is_expired(now));
            if locks.is_empty() {
                self.locks.remove(document_id);
            }
        }
    }
}

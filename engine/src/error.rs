//! Error types for the Scribe engine.

use crate::{DocumentId, Lock, LockId, SessionId};
use thiserror::Error;

/// All possible errors from the Scribe engine.
///
/// Transform conflicts are deliberately absent: an overlapping edit is a
/// successful outcome with resolution metadata, never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    // Session errors
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session is full: limit of {max_users} users reached")]
    SessionFull { max_users: u32 },

    // Lock errors
    #[error("lock conflict: lock {} held by {}", .conflicting.lock_id, .conflicting.holder_id)]
    LockConflict { conflicting: Box<Lock> },

    #[error("lock not found: {0}")]
    LockNotFound(LockId),

    // Permission errors
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lock, LockKind};

    #[test]
    fn error_display() {
        let err = Error::SessionNotFound("sess-1".into());
        assert_eq!(err.to_string(), "session not found: sess-1");

        let err = Error::SessionFull { max_users: 2 };
        assert_eq!(err.to_string(), "session is full: limit of 2 users reached");

        let err = Error::InvalidOperation("position must be >= 0".into());
        assert_eq!(err.to_string(), "invalid operation: position must be >= 0");
    }

    #[test]
    fn lock_conflict_names_the_holder() {
        let lock = Lock::new("lock-1", "doc-1", "alice", LockKind::Write, None, 0, 300_000);
        let err = Error::LockConflict {
            conflicting: Box::new(lock),
        };
        assert_eq!(err.to_string(), "lock conflict: lock lock-1 held by alice");
    }
}

//! Operation types for expressing edits.
//!
//! Edits are expressed as operations, not direct mutations. This enables
//! transformation against concurrent edits, append-only logging, and
//! deterministic replay.

use crate::{
    error::Result, lock::Section, transform::ResolutionStrategy, AuthorId, ClockStamp, DocumentId,
    Error, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Unique identifier for an operation.
pub type OperationId = String;

/// What an operation does to the document.
///
/// The variant carries exactly the fields that kind requires, so a delete
/// without a length or an insert without content is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EditKind {
    /// Insert `content` at the operation position.
    Insert { content: String },
    /// Remove `length` characters starting at the position.
    Delete { length: u64 },
    /// Remove `length` characters and insert `content` in their place.
    Replace { length: u64, content: String },
}

impl EditKind {
    /// Characters this kind removes from the document.
    pub fn removed_len(&self) -> u64 {
        match self {
            EditKind::Insert { .. } => 0,
            EditKind::Delete { length } | EditKind::Replace { length, .. } => *length,
        }
    }

    /// Characters this kind adds to the document.
    pub fn inserted_len(&self) -> u64 {
        match self {
            EditKind::Delete { .. } => 0,
            EditKind::Insert { content } | EditKind::Replace { content, .. } => {
                content.chars().count() as u64
            }
        }
    }
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    /// Submitted, not yet reconciled and persisted
    #[default]
    Pending,
    /// Reconciled and appended to the log; immutable from here on
    Applied,
    /// Rejected before persistence
    Failed,
}

/// An edit intention from one author against one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOp {
    /// Operation ID, unique across the system
    pub op_id: OperationId,
    /// Document this operation targets
    pub document_id: DocumentId,
    /// Author that issued the operation
    pub author_id: AuthorId,
    /// What the operation does
    pub kind: EditKind,
    /// Character offset into the document text
    pub position: u64,
    /// Clock stamp used for total ordering
    pub stamp: ClockStamp,
    /// Lifecycle status
    pub status: OpStatus,
    /// Server time at which the operation was persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<Timestamp>,
    /// Whether transformation resolved a conflict for this operation
    pub conflict_resolved: bool,
    /// How the conflict was resolved, if one occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStrategy>,
}

impl EditOp {
    fn new(
        op_id: impl Into<OperationId>,
        document_id: impl Into<DocumentId>,
        author_id: impl Into<AuthorId>,
        position: u64,
        kind: EditKind,
        stamp: ClockStamp,
    ) -> Self {
        Self {
            op_id: op_id.into(),
            document_id: document_id.into(),
            author_id: author_id.into(),
            kind,
            position,
            stamp,
            status: OpStatus::Pending,
            applied_at: None,
            conflict_resolved: false,
            resolution: None,
        }
    }

    /// Create a pending insert operation.
    pub fn insert(
        op_id: impl Into<OperationId>,
        document_id: impl Into<DocumentId>,
        author_id: impl Into<AuthorId>,
        position: u64,
        content: impl Into<String>,
        stamp: ClockStamp,
    ) -> Self {
        Self::new(
            op_id,
            document_id,
            author_id,
            position,
            EditKind::Insert {
                content: content.into(),
            },
            stamp,
        )
    }

    /// Create a pending delete operation.
    pub fn delete(
        op_id: impl Into<OperationId>,
        document_id: impl Into<DocumentId>,
        author_id: impl Into<AuthorId>,
        position: u64,
        length: u64,
        stamp: ClockStamp,
    ) -> Self {
        Self::new(
            op_id,
            document_id,
            author_id,
            position,
            EditKind::Delete { length },
            stamp,
        )
    }

    /// Create a pending replace operation.
    pub fn replace(
        op_id: impl Into<OperationId>,
        document_id: impl Into<DocumentId>,
        author_id: impl Into<AuthorId>,
        position: u64,
        length: u64,
        content: impl Into<String>,
        stamp: ClockStamp,
    ) -> Self {
        Self::new(
            op_id,
            document_id,
            author_id,
            position,
            EditKind::Replace {
                length,
                content: content.into(),
            },
            stamp,
        )
    }

    /// Validate the structural invariants of a submitted operation.
    ///
    /// Position being unsigned already rules out negative offsets; what is
    /// left is non-empty identifiers and the per-kind field requirements.
    pub fn validate(&self) -> Result<()> {
        if self.op_id.is_empty() {
            return Err(Error::InvalidOperation("missing operation id".into()));
        }
        if self.document_id.is_empty() {
            return Err(Error::InvalidOperation("missing document id".into()));
        }
        if self.author_id.is_empty() {
            return Err(Error::InvalidOperation("missing author id".into()));
        }
        match &self.kind {
            EditKind::Insert { content } if content.is_empty() => {
                Err(Error::InvalidOperation("insert requires content".into()))
            }
            EditKind::Delete { length } if *length == 0 => Err(Error::InvalidOperation(
                "delete requires a non-zero length".into(),
            )),
            EditKind::Replace { length, content } if *length == 0 && content.is_empty() => Err(
                Error::InvalidOperation("replace requires a length or content".into()),
            ),
            _ => Ok(()),
        }
    }

    /// The character span this operation modifies, for lock arbitration.
    /// An insert is a zero-width span at its position.
    pub fn affected_span(&self) -> Section {
        Section::new(self.position, self.position + self.kind.removed_len())
    }

    /// Consume the operation, marking it applied at `now`.
    pub fn into_applied(mut self, now: Timestamp) -> Self {
        self.status = OpStatus::Applied;
        self.applied_at = Some(now);
        self
    }

    /// Consume the operation, marking it failed.
    pub fn into_failed(mut self) -> Self {
        self.status = OpStatus::Failed;
        self.applied_at = None;
        self
    }
}

/// Ordering for operations: `(stamp, op_id)`. The stamp already totally
/// orders operations from distinct authors; the op id breaks the
/// pathological case of one author reusing a tick.
impl Ord for EditOp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.stamp.cmp(&other.stamp) {
            std::cmp::Ordering::Equal => self.op_id.cmp(&other.op_id),
            other => other,
        }
    }
}

impl PartialOrd for EditOp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

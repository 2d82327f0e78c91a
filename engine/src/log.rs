//! Append-only operation log, the single source of truth per document.
//!
//! Every applied operation is recorded exactly once, keyed by its unique
//! operation id. The log answers the two queries the rest of the core is
//! built on: the transform window since a client's watermark (in
//! application order) and the stamp-ordered catch-up slice for
//! reconnection.

use crate::{error::Result, DocumentId, EditOp, Error, OpStatus, OperationId, Ticks};
use std::collections::HashSet;

/// Append-only log of applied operations for one document.
#[derive(Debug, Clone, Default)]
pub struct OpLog {
    document_id: DocumentId,
    entries: Vec<EditOp>,
    seen: HashSet<OperationId>,
}

impl OpLog {
    /// Create an empty log for a document.
    pub fn new(document_id: impl Into<DocumentId>) -> Self {
        Self {
            document_id: document_id.into(),
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// The document this log belongs to.
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Append an applied operation.
    ///
    /// Only `Applied` records enter the log, and never twice: an applied
    /// operation is immutable, so a duplicate id means the caller is
    /// trying to rewrite history.
    pub fn append(&mut self, op: EditOp) -> Result<()> {
        if op.document_id != self.document_id {
            return Err(Error::InvalidOperation(format!(
                "operation targets document {}, log holds {}",
                op.document_id, self.document_id
            )));
        }
        if op.status != OpStatus::Applied {
            return Err(Error::InvalidOperation(
                "only applied operations enter the log".into(),
            ));
        }
        if !self.seen.insert(op.op_id.clone()) {
            return Err(Error::InvalidOperation(format!(
                "duplicate operation id: {}",
                op.op_id
            )));
        }
        self.entries.push(op);
        Ok(())
    }

    /// Whether an operation id is already recorded.
    pub fn contains(&self, op_id: &str) -> bool {
        self.seen.contains(op_id)
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in application order.
    pub fn entries(&self) -> &[EditOp] {
        &self.entries
    }

    /// The transform window: operations applied after the watermark, in
    /// application order.
    pub fn window_since(&self, watermark: Ticks) -> Vec<EditOp> {
        self.entries
            .iter()
            .filter(|op| op.stamp.ticks > watermark)
            .cloned()
            .collect()
    }

    /// Missed operations for catch-up: stamp-ascending, at most `limit`
    /// records. The bool reports truncation, telling the caller to fall
    /// back to a full content resync.
    pub fn missed_since(&self, watermark: Ticks, limit: usize) -> (Vec<EditOp>, bool) {
        let mut missed: Vec<EditOp> = self
            .entries
            .iter()
            .filter(|op| op.stamp.ticks > watermark)
            .cloned()
            .collect();
        missed.sort();
        let truncated = missed.len() > limit;
        missed.truncate(limit);
        (missed, truncated)
    }

    /// Operations whose stamps fall in `[from, to)`, application order.
    pub fn in_range(&self, from: Ticks, to: Ticks) -> Vec<&EditOp> {
        self.entries
            .iter()
            .filter(|op| op.stamp.ticks >= from && op.stamp.ticks < to)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClockStamp;

    fn applied_insert(op_id: &str, ticks: u64) -> EditOp {
        EditOp::insert(
            op_id,
            "doc-1",
            "author-1",
            0,
            "x",
            ClockStamp::new(ticks, "author-1"),
        )
        .into_applied(1_000)
    }

    #[test]
    fn append_and_query() {
        let mut log = OpLog::new("doc-1");
        log.append(applied_insert("op-1", 100)).unwrap();
        log.append(applied_insert("op-2", 200)).unwrap();

        assert_eq!(log.len(), 2);
        assert!(log.contains("op-1"));
        assert!(!log.contains("op-9"));
    }

    #[test]
    fn append_rejects_duplicates() {
        let mut log = OpLog::new("doc-1");
        log.append(applied_insert("op-1", 100)).unwrap();
        let err = log.append(applied_insert("op-1", 200)).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn append_rejects_pending_ops() {
        let mut log = OpLog::new("doc-1");
        let pending = EditOp::insert(
            "op-1",
            "doc-1",
            "author-1",
            0,
            "x",
            ClockStamp::new(1, "author-1"),
        );
        assert!(log.append(pending).is_err());
    }

    #[test]
    fn append_rejects_wrong_document() {
        let mut log = OpLog::new("doc-1");
        let other = EditOp::insert(
            "op-1",
            "doc-2",
            "author-1",
            0,
            "x",
            ClockStamp::new(1, "author-1"),
        )
        .into_applied(1_000);
        assert!(log.append(other).is_err());
    }

    #[test]
    fn window_since_is_strictly_greater() {
        let mut log = OpLog::new("doc-1");
        log.append(applied_insert("op-1", 100)).unwrap();
        log.append(applied_insert("op-2", 200)).unwrap();
        log.append(applied_insert("op-3", 300)).unwrap();

        let window = log.window_since(200);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].op_id, "op-3");

        assert_eq!(log.window_since(0).len(), 3);
    }

    #[test]
    fn missed_since_sorts_by_stamp() {
        let mut log = OpLog::new("doc-1");
        // Application order differs from stamp order.
        log.append(applied_insert("op-1", 300)).unwrap();
        log.append(applied_insert("op-2", 100)).unwrap();
        log.append(applied_insert("op-3", 200)).unwrap();

        let (missed, truncated) = log.missed_since(0, 10);
        assert!(!truncated);
        let ids: Vec<_> = missed.iter().map(|op| op.op_id.as_str()).collect();
        assert_eq!(ids, vec!["op-2", "op-3", "op-1"]);
    }

    #[test]
    fn missed_since_caps_and_reports_truncation() {
        let mut log = OpLog::new("doc-1");
        for i in 0..5 {
            log.append(applied_insert(&format!("op-{i}"), 100 + i))
                .unwrap();
        }

        let (missed, truncated) = log.missed_since(0, 3);
        assert!(truncated);
        assert_eq!(missed.len(), 3);
        assert_eq!(missed[0].op_id, "op-0");
    }

    #[test]
    fn in_range_is_half_open() {
        let mut log = OpLog::new("doc-1");
        log.append(applied_insert("op-1", 100)).unwrap();
        log.append(applied_insert("op-2", 200)).unwrap();
        log.append(applied_insert("op-3", 300)).unwrap();

        let ops = log.in_range(100, 300);
        let ids: Vec<_> = ops.iter().map(|op| op.op_id.as_str()).collect();
        assert_eq!(ids, vec!["op-1", "op-2"]);
    }
}

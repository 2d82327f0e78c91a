//! Operational transformation of concurrent edits.
//!
//! This is the core of convergence. Given one incoming operation and the
//! window of operations already applied since the client's watermark,
//! this module rewrites the incoming positions so that applying it to the
//! current document preserves the author's intent.
//!
//! # Algorithm
//!
//! 1. Validate the incoming operation
//! 2. Transform it against each window operation, in application order
//! 3. Overlapping removals are conflicts: the applied effect is kept and
//!    the incoming range is truncated (`timestamp_priority`)
//! 4. Return the transformed operation plus conflict details
//!
//! A replace is decomposed into delete-then-insert for transformation but
//! stays one atomic record. A prior insert landing strictly inside an
//! incoming removal range widens the incoming operation into a replace
//! that re-emits the inserted text, so the concurrent insertion survives.

use crate::{error::Result, ClockStamp, EditKind, EditOp, OperationId};
use serde::{Deserialize, Serialize};

/// Deterministic rule used to settle overlapping removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The operation with the earlier stamp keeps its effect; the later
    /// one loses the overlapping portion.
    #[default]
    TimestampPriority,
}

/// Classification of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two removals covered overlapping character ranges.
    OverlappingDelete,
}

/// A detected conflict between the incoming operation and an applied one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// What kind of conflict occurred
    pub kind: ConflictKind,
    /// The already-applied operation whose effect was kept
    pub applied_op: OperationId,
    /// The incoming operation that was truncated
    pub incoming_op: OperationId,
    /// Characters of the incoming range discarded as already removed
    pub discarded: u64,
}

/// Result of reconciling one incoming operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutcome {
    /// The incoming operation with positions rewritten for the current
    /// document state. Still `Pending`; the caller applies and persists.
    pub transformed: EditOp,
    /// Conflicts encountered along the way (empty for clean merges)
    pub conflicts: Vec<Conflict>,
    /// Strategy used, present iff at least one conflict was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ResolutionStrategy>,
}

impl TransformOutcome {
    /// Whether the reconciliation had to resolve a conflict.
    pub fn had_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Reconcile an incoming operation against the applied window.
///
/// `window` must hold the operations applied since the submitting
/// client's watermark, in the order they were applied. The returned
/// operation is safe to apply to the document state the window produced;
/// appending it to the log keeps every replica convergent.
pub fn reconcile(incoming: EditOp, window: &[EditOp]) -> Result<TransformOutcome> {
    incoming.validate()?;

    let mut op = incoming;
    let mut conflicts = Vec::new();

    for prior in window {
        transform_against(&mut op, prior, &mut conflicts);
    }

    if conflicts.is_empty() {
        Ok(TransformOutcome {
            transformed: op,
            conflicts,
            strategy: None,
        })
    } else {
        op.conflict_resolved = true;
        op.resolution = Some(ResolutionStrategy::TimestampPriority);
        Ok(TransformOutcome {
            transformed: op,
            conflicts,
            strategy: Some(ResolutionStrategy::TimestampPriority),
        })
    }
}

/// Transform `op` against one applied operation.
fn transform_against(op: &mut EditOp, prior: &EditOp, conflicts: &mut Vec<Conflict>) {
    match &prior.kind {
        EditKind::Insert { content } => {
            against_insert(op, prior.position, content, &prior.stamp, true);
        }
        EditKind::Delete { length } => {
            against_delete(op, prior.position, *length, &prior.op_id, conflicts);
        }
        EditKind::Replace { length, content } => {
            let end = prior.position + *length;
            let replacement_len = content.chars().count() as u64;

            // Anything at or past the end of the replaced range never
            // competes for the replacement's slot; it just shifts by the
            // net size change. The generic decomposition below cannot
            // tell that apart from landing on the collapse point from
            // inside the range.
            if *length > 0 && op.position >= end {
                op.position = op.position - *length + replacement_len;
                return;
            }
            // Delete-then-insert decomposition; both halves carry the
            // prior operation's stamp and identity. The insert half does
            // not slot-compete: a range already rewritten by the delete
            // half sits after the replacement text by construction.
            against_delete(op, prior.position, *length, &prior.op_id, conflicts);
            against_insert(op, prior.position, content, &prior.stamp, false);
        }
    }
}

/// Transform `op` against an applied insert of `content` at `at`.
///
/// `competes` is true when the prior really is a standalone insert: an
/// incoming replace starting at the same position then competes for the
/// slot by stamp. The insert half of a replace decomposition passes
/// false — ranges it meets at its position were already rewritten by the
/// delete half and sit after the replacement text by construction.
fn against_insert(op: &mut EditOp, at: u64, content: &str, prior_stamp: &ClockStamp, competes: bool) {
    let inserted = content.chars().count() as u64;

    match &op.kind {
        EditKind::Insert { .. } => {
            // Earlier position shifts the later insert; at the same
            // position the earlier stamp keeps the slot.
            if at < op.position || (at == op.position && prior_stamp < &op.stamp) {
                op.position += inserted;
            }
        }
        EditKind::Delete { length } => {
            let (start, length) = (op.position, *length);
            if at <= start {
                op.position += inserted;
            } else if at < start + length {
                // The insert landed inside the range this operation
                // removes. Widen into a replace that re-emits the
                // inserted text so the concurrent insertion survives.
                op.kind = EditKind::Replace {
                    length: length + inserted,
                    content: content.to_string(),
                };
            }
            // An insert at or past the end leaves the range untouched.
        }
        EditKind::Replace {
            length,
            content: own,
        } => {
            let (start, length) = (op.position, *length);
            if at < start || (at == start && !competes) {
                op.position += inserted;
            } else if at == start {
                // The prior insert and the replacement text compete for
                // the same slot; the earlier stamp goes first. When the
                // prior insert yields, widen so its text survives behind
                // the replacement content.
                if prior_stamp < &op.stamp {
                    op.position += inserted;
                } else {
                    op.kind = EditKind::Replace {
                        length: length + inserted,
                        content: format!("{own}{content}"),
                    };
                }
            } else if at < start + length {
                // Strictly inside: widen, surviving texts ordered by
                // stamp, mirroring the insert/insert slot rule.
                let merged = if prior_stamp < &op.stamp {
                    format!("{content}{own}")
                } else {
                    format!("{own}{content}")
                };
                op.kind = EditKind::Replace {
                    length: length + inserted,
                    content: merged,
                };
            }
        }
    }
}

/// Transform `op` against an applied removal of `[at, at + removed)`.
fn against_delete(
    op: &mut EditOp,
    at: u64,
    removed: u64,
    prior_id: &OperationId,
    conflicts: &mut Vec<Conflict>,
) {
    if removed == 0 {
        return;
    }
    let prior_end = at + removed;

    match &mut op.kind {
        EditKind::Insert { .. } => {
            if op.position >= prior_end {
                op.position -= removed;
            } else if op.position > at {
                // Inside the removed range: the insert lands where the
                // range collapsed.
                op.position = at;
            }
        }
        EditKind::Delete { length } | EditKind::Replace { length, .. } => {
            let start = op.position;
            let end = start + *length;
            if prior_end <= start {
                op.position -= removed;
            } else if end <= at {
                // Entirely before the removed range.
            } else {
                // Overlapping removals: a genuine conflict. The applied
                // effect is kept; the incoming range loses the overlap.
                let overlap = end.min(prior_end) - start.max(at);
                conflicts.push(Conflict {
                    kind: ConflictKind::OverlappingDelete,
                    applied_op: prior_id.clone(),
                    incoming_op: op.op_id.clone(),
                    discarded: overlap,
                });
                op.position = start.min(at);
                *length -= overlap;
            }
        }
    }
}

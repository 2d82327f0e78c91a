//! Document state materialized from the operation log.
//!
//! The engine never mutates stored content directly; the hosting
//! application supplies a canonical base and the current text is inferred
//! by replaying applied operations over it. Positions are character
//! offsets, so multi-byte text behaves the same on every replica.

use crate::{EditKind, EditOp, Version};
use serde::{Deserialize, Serialize};

/// A document's materialized text and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    /// Current text content
    pub content: String,
    /// Version number, incremented once per applied operation
    pub version: Version,
}

impl DocumentState {
    /// Create a state from the hosting application's canonical content.
    pub fn new(content: impl Into<String>, version: Version) -> Self {
        Self {
            content: content.into(),
            version,
        }
    }

    /// Length of the content in characters.
    pub fn char_len(&self) -> u64 {
        self.content.chars().count() as u64
    }

    /// Apply one transformed operation.
    ///
    /// Transformed ranges are clamped to the document tail rather than
    /// rejected: the transform engine always yields a convergent result,
    /// and a range that ran past the end after truncation must still
    /// apply cleanly on every replica.
    pub fn apply(&mut self, op: &EditOp) {
        let len = self.char_len();
        match &op.kind {
            EditKind::Insert { content } => {
                let at = byte_offset(&self.content, op.position.min(len));
                self.content.insert_str(at, content);
            }
            EditKind::Delete { length } => {
                let start = op.position.min(len);
                let end = (op.position + length).min(len);
                let range = byte_offset(&self.content, start)..byte_offset(&self.content, end);
                self.content.replace_range(range, "");
            }
            EditKind::Replace { length, content } => {
                let start = op.position.min(len);
                let end = (op.position + length).min(len);
                let range = byte_offset(&self.content, start)..byte_offset(&self.content, end);
                self.content.replace_range(range, content);
            }
        }
        self.version += 1;
    }

    /// Replay a sequence of applied operations in order.
    pub fn replay<'a>(&mut self, ops: impl IntoIterator<Item = &'a EditOp>) {
        for op in ops {
            self.apply(op);
        }
    }
}

/// Byte offset of the `char_idx`-th character, saturating at the end.
fn byte_offset(s: &str, char_idx: u64) -> usize {
    s.char_indices()
        .nth(char_idx as usize)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClockStamp;

    fn stamp(ticks: u64) -> ClockStamp {
        ClockStamp::new(ticks, "author-1")
    }

    #[test]
    fn insert_at_position() {
        let mut doc = DocumentState::new("hello world", 0);
        let op = EditOp::insert("op-1", "doc", "a", 5, ",", stamp(1)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "hello, world");
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn delete_range() {
        let mut doc = DocumentState::new("hello world", 0);
        let op = EditOp::delete("op-1", "doc", "a", 5, 6, stamp(1)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "hello");
    }

    #[test]
    fn replace_range() {
        let mut doc = DocumentState::new("hello world", 0);
        let op = EditOp::replace("op-1", "doc", "a", 6, 5, "scribe", stamp(1)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "hello scribe");
    }

    #[test]
    fn positions_are_char_offsets() {
        let mut doc = DocumentState::new("héllo", 0);
        let op = EditOp::insert("op-1", "doc", "a", 5, "!", stamp(1)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "héllo!");

        let op = EditOp::delete("op-2", "doc", "a", 1, 1, stamp(2)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "hllo!");
    }

    #[test]
    fn out_of_range_edits_clamp_to_tail() {
        let mut doc = DocumentState::new("abc", 0);
        let op = EditOp::insert("op-1", "doc", "a", 99, "!", stamp(1)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "abc!");

        let op = EditOp::delete("op-2", "doc", "a", 2, 99, stamp(2)).into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "ab");
    }

    #[test]
    fn zero_length_delete_is_a_noop_but_counts() {
        let mut doc = DocumentState::new("abc", 7);
        let op = EditOp {
            kind: EditKind::Delete { length: 0 },
            ..EditOp::delete("op-1", "doc", "a", 1, 1, stamp(1))
        }
        .into_applied(1_000);
        doc.apply(&op);
        assert_eq!(doc.content, "abc");
        assert_eq!(doc.version, 8);
    }

    #[test]
    fn replay_applies_in_order() {
        let mut doc = DocumentState::new("", 0);
        let ops = vec![
            EditOp::insert("op-1", "doc", "a", 0, "world", stamp(1)).into_applied(1_000),
            EditOp::insert("op-2", "doc", "a", 0, "hello ", stamp(2)).into_applied(1_000),
        ];
        doc.replay(&ops);
        assert_eq!(doc.content, "hello world");
        assert_eq!(doc.version, 2);
    }
}

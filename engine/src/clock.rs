//! Clock stamps for total ordering of operations.
//!
//! The stamp provides a total ordering across all authors, which is
//! essential for deterministic transformation and conflict resolution.

use crate::{AuthorId, Ticks};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A logical timestamp identifying when an author issued an operation.
///
/// Ordering rules:
/// 1. Lower ticks come first
/// 2. If ticks are equal, lexicographically lower author_id comes first
///
/// `ticks` is the client-supplied logical clock held at microsecond
/// resolution. It is never interpreted as trustworthy wall-clock time;
/// the author id tie-break is what makes the order total, so skewed
/// client clocks degrade fairness but never determinism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockStamp {
    /// Logical clock value (microseconds)
    pub ticks: Ticks,
    /// Author that issued the operation
    pub author_id: AuthorId,
}

impl ClockStamp {
    /// Create a stamp for an author at a specific tick value.
    pub fn new(ticks: Ticks, author_id: impl Into<AuthorId>) -> Self {
        Self {
            ticks,
            author_id: author_id.into(),
        }
    }

    /// Convert a client-supplied millisecond timestamp (possibly
    /// fractional) into ticks. Negative and non-finite values collapse
    /// to zero rather than panicking.
    pub fn ticks_from_millis(millis: f64) -> Ticks {
        if !millis.is_finite() || millis <= 0.0 {
            return 0;
        }
        (millis * 1_000.0) as Ticks
    }

    /// Check whether this stamp precedes another in the total order.
    pub fn precedes(&self, other: &ClockStamp) -> bool {
        self < other
    }

    /// Check if two stamps are concurrent: same ticks, different authors.
    pub fn is_concurrent_with(&self, other: &ClockStamp) -> bool {
        self.ticks == other.ticks && self.author_id != other.author_id
    }
}

impl Ord for ClockStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.ticks.cmp(&other.ticks) {
            Ordering::Equal => self.author_id.cmp(&other.author_id),
            other => other,
        }
    }
}

impl PartialOrd for ClockStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

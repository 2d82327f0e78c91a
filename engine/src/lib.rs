//! # Scribe Engine
//!
//! The collaborative-editing core for multi-user document editing.
//!
//! This crate provides the concurrency-critical logic of a real-time
//! editor: reconciling concurrent edit operations, tracking who is in a
//! session, arbitrating section locks, and replaying missed operations
//! for reconnecting clients. Everything around it (storage, transport,
//! authentication, rendering) belongs to the hosting application.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of sockets, databases, or
//!   wall clocks — callers pass `now` explicitly
//! - **Deterministic**: the same inputs always produce the same outputs
//! - **Testable**: pure logic, no mocks needed
//! - **Convergent**: replicas that observe the same operation log reach
//!   identical content
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! Edits are expressed as operations, not direct mutations:
//! [`EditKind::Insert`], [`EditKind::Delete`], [`EditKind::Replace`].
//! Each operation carries a [`ClockStamp`] — a logical timestamp plus the
//! author id — giving all operations from all authors a total order.
//!
//! ### Transformation
//!
//! [`transform::reconcile`] takes one incoming operation and the window
//! of operations applied since the client's watermark, and rewrites the
//! incoming positions so that applying it to the current state preserves
//! the author's intent. Overlapping deletions are a genuine conflict and
//! are resolved deterministically (`timestamp_priority`); the outcome is
//! still a success, never an error.
//!
//! ### Sessions, Presence, Locks
//!
//! [`SessionRegistry`] enforces one active session per document and seat
//! capacity. [`PresenceMap`] and [`LockTable`] are TTL-bearing maps whose
//! expiry is enforced lazily on read — there is no background sweeper.
//!
//! ### Catch-up
//!
//! [`snapshot::catch_up`] assembles the reconnection payload: current
//! content and version, active users and locks, and the operations the
//! client missed since its watermark (capped, stamp-ascending).
//!
//! ## Quick Start
//!
//! ```rust
//! use scribe_engine::{transform, ClockStamp, EditOp, OpLog};
//!
//! let mut log = OpLog::new("doc-1");
//!
//! // An already-applied insert from another author.
//! let prior = EditOp::insert("op-1", "doc-1", "alice", 0, "hello ", ClockStamp::new(100, "alice"));
//! log.append(prior.into_applied(1_000)).unwrap();
//!
//! // A concurrent insert that has not seen the prior one yet.
//! let incoming = EditOp::insert("op-2", "doc-1", "bob", 0, "well, ", ClockStamp::new(200, "bob"));
//! let outcome = transform::reconcile(incoming, &log.window_since(0)).unwrap();
//!
//! // Bob's insert shifted past Alice's earlier one.
//! assert_eq!(outcome.transformed.position, 6);
//! ```

pub mod clock;
pub mod document;
pub mod error;
pub mod event;
pub mod lock;
pub mod log;
pub mod operation;
pub mod presence;
pub mod session;
pub mod snapshot;
pub mod transform;

// Re-export main types at crate root
pub use clock::ClockStamp;
pub use document::DocumentState;
pub use error::Error;
pub use event::CoreEvent;
pub use lock::{Lock, LockKind, LockTable, Section, DEFAULT_LOCK_TTL_MS};
pub use log::OpLog;
pub use operation::{EditKind, EditOp, OpStatus, OperationId};
pub use presence::{PresenceEntry, PresenceMap, PresenceUpdate, DEFAULT_PRESENCE_TTL_MS};
pub use session::{
    Actor, CollabSession, SessionRegistry, SessionSettings, SessionStatus, StartOutcome,
};
pub use snapshot::{catch_up, ReconnectSnapshot, CATCH_UP_LIMIT};
pub use transform::{Conflict, ConflictKind, ResolutionStrategy, TransformOutcome};

/// Type aliases for clarity
pub type DocumentId = String;
pub type AuthorId = String;
pub type UserId = String;
pub type SessionId = String;
pub type LockId = String;
/// Milliseconds since the Unix epoch, supplied by the caller.
pub type Timestamp = u64;
/// Logical clock value (microsecond resolution), totally ordered per author.
pub type Ticks = u64;
pub type Version = u64;

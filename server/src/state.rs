//! Shared collaboration state and the per-document serialization gate.
//!
//! The transform engine's correctness depends on reading the applied
//! window and writing the new operation without interleaving, so every
//! document gets its own async mutex: submissions for the same document
//! queue up, submissions for different documents run in parallel.
//!
//! Sessions, presence, and locks live in separate mutex-guarded stores.
//! They are weakly consistent by design — last writer wins, staleness
//! heals via TTL — so a plain sync mutex held for map access is enough.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use scribe_engine::{DocumentState, LockTable, OpLog, PresenceMap, SessionRegistry, Timestamp};

/// In-memory collaboration state for one document: its operation log and
/// the content materialized from it. Guarded by the document gate.
pub struct DocumentCollab {
    pub state: DocumentState,
    pub log: OpLog,
    /// Whether the log has been hydrated from the database
    pub hydrated: bool,
}

impl DocumentCollab {
    fn new(document_id: &str) -> Self {
        Self {
            state: DocumentState::new("", 0),
            log: OpLog::new(document_id),
            hydrated: false,
        }
    }

    /// Load the canonical base content and replay the persisted log over
    /// it. Runs once per document, under the document gate; a missing
    /// document row is `DocumentNotFound` before the engine is touched.
    pub async fn hydrate(&mut self, pool: &crate::db::Pool) -> crate::error::Result<()> {
        if self.hydrated {
            return Ok(());
        }
        let document_id = self.log.document_id().clone();
        let stored = crate::db::get_document(pool, &document_id)
            .await?
            .ok_or_else(|| scribe_engine::Error::DocumentNotFound(document_id.clone()))?;
        self.state = DocumentState::new(stored.content, stored.version.max(0) as u64);

        let rows = crate::db::get_document_operations(pool, &document_id).await?;
        let count = rows.len();
        for row in rows {
            match row.to_operation() {
                Ok(op) => {
                    self.state.apply(&op);
                    if let Err(e) = self.log.append(op) {
                        tracing::warn!("Skipping stored operation {}: {}", row.op_id, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to convert stored operation {}: {}", row.op_id, e);
                }
            }
        }
        self.hydrated = true;
        tracing::debug!(document_id = %document_id, operations = count, "Document hydrated");
        Ok(())
    }
}

/// All collaboration stores, shared across handlers via `Arc`.
pub struct CollabState {
    pub sessions: Mutex<SessionRegistry>,
    pub presence: Mutex<PresenceMap>,
    pub locks: Mutex<LockTable>,
    /// Per-document gates serializing read-reconcile-write
    documents: DashMap<String, Arc<tokio::sync::Mutex<DocumentCollab>>>,
}

impl CollabState {
    /// Create empty collaboration state.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::new()),
            presence: Mutex::new(PresenceMap::new()),
            locks: Mutex::new(LockTable::new()),
            documents: DashMap::new(),
        }
    }

    /// Create collaboration state wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The gate for a document, created on first touch. Holding the
    /// returned mutex is what serializes same-document submissions.
    pub fn document(&self, document_id: &str) -> Arc<tokio::sync::Mutex<DocumentCollab>> {
        self.documents
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(DocumentCollab::new(document_id))))
            .clone()
    }

    /// Number of documents with live in-memory state.
    #[allow(dead_code)]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Default for CollabState {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a collaboration store, surfacing poisoning as an internal error
/// instead of panicking in a request handler.
pub fn lock<T>(mutex: &Mutex<T>) -> crate::error::Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| crate::error::AppError::Internal("collaboration store lock poisoned".into()))
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

/// Current wall-clock time in microseconds, used when a client does not
/// supply its own logical timestamp.
pub fn now_ticks() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

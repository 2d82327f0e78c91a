//! Collaboration sessions: one live editing group per document.
//!
//! The registry owns the session state machine. Sessions only ever move
//! `Active -> Ended` (last member leaves) or `Active -> Terminated`
//! (owner/admin force); both states are terminal and a new `start` is
//! required afterward. At most one Active session exists per document.

use crate::{
    error::Result, event::CoreEvent, DocumentId, Error, SessionId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Hard ceiling on session capacity.
pub const MAX_SESSION_USERS: u32 = 50;

/// Default session capacity when the caller does not specify one.
pub const DEFAULT_SESSION_USERS: u32 = 10;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_MS: u64 = 24 * 60 * 60 * 1_000;

/// Who is asking. Administrators may terminate sessions and release
/// locks they do not own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub admin: bool,
}

impl Actor {
    /// A regular user.
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            admin: false,
        }
    }

    /// An administrator.
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            admin: true,
        }
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
    Terminated,
}

impl SessionStatus {
    /// Ended and Terminated are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Terminated)
    }
}

/// Caller-supplied knobs for a new session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Seat limit, clamped to `1..=MAX_SESSION_USERS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_users: Option<u32>,
    /// Session lifetime override in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ttl_ms: Option<u64>,
    /// Opaque host-application settings, carried verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One live editing session scoped to exactly one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabSession {
    pub session_id: SessionId,
    pub document_id: DocumentId,
    pub owner_id: UserId,
    pub status: SessionStatus,
    pub max_users: u32,
    /// Current members, owner included
    members: BTreeSet<UserId>,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl CollabSession {
    fn new(
        session_id: SessionId,
        document_id: DocumentId,
        owner_id: UserId,
        settings: SessionSettings,
        now: Timestamp,
    ) -> Self {
        let max_users = settings
            .max_users
            .unwrap_or(DEFAULT_SESSION_USERS)
            .clamp(1, MAX_SESSION_USERS);
        let ttl = settings.session_ttl_ms.unwrap_or(DEFAULT_SESSION_TTL_MS);
        let mut members = BTreeSet::new();
        members.insert(owner_id.clone());
        Self {
            session_id,
            document_id,
            owner_id,
            status: SessionStatus::Active,
            max_users,
            members,
            started_at: now,
            expires_at: now + ttl,
            settings: settings.extra,
        }
    }

    /// Number of members currently in the session.
    pub fn active_users_count(&self) -> u32 {
        self.members.len() as u32
    }

    /// Current members in stable order.
    pub fn members(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter()
    }

    /// Whether `user_id` currently holds a seat.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    /// Whether the session has outlived its lifetime.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Active, in-lifetime session.
    fn is_live(&self, now: Timestamp) -> bool {
        self.status == SessionStatus::Active && !self.is_expired(now)
    }
}

/// Result of a `start` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    /// The session now active for the document
    pub session: CollabSession,
    /// False when an existing active session was returned instead
    pub created: bool,
    /// Events to broadcast
    pub events: Vec<CoreEvent>,
}

/// Registry of all sessions, with a per-document active index.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, CollabSession>,
    active_by_document: HashMap<DocumentId, SessionId>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for a document, or return the one already active.
    ///
    /// `session_id` is only consumed when a new session is created. An
    /// expired-but-Active session found here is reaped first.
    pub fn start(
        &mut self,
        session_id: impl Into<SessionId>,
        document_id: impl Into<DocumentId>,
        owner_id: impl Into<UserId>,
        settings: SessionSettings,
        now: Timestamp,
    ) -> StartOutcome {
        let document_id = document_id.into();
        let mut events = Vec::new();

        if let Some(existing_id) = self.active_by_document.get(&document_id).cloned() {
            if let Some(existing) = self.sessions.get(&existing_id) {
                if existing.is_live(now) {
                    return StartOutcome {
                        session: existing.clone(),
                        created: false,
                        events,
                    };
                }
            }
            events.extend(self.reap(&existing_id));
        }

        let session = CollabSession::new(
            session_id.into(),
            document_id.clone(),
            owner_id.into(),
            settings,
            now,
        );
        events.push(CoreEvent::SessionStarted {
            session_id: session.session_id.clone(),
            document_id: document_id.clone(),
            owner_id: session.owner_id.clone(),
        });
        self.active_by_document
            .insert(document_id, session.session_id.clone());
        self.sessions
            .insert(session.session_id.clone(), session.clone());

        StartOutcome {
            session,
            created: true,
            events,
        }
    }

    /// Join a session. Fails with `SessionNotFound` for a missing,
    /// terminal, or expired session and `SessionFull` at capacity.
    /// Rejoining is a refresh, not a second seat.
    pub fn join(
        &mut self,
        session_id: &str,
        user_id: impl Into<UserId>,
        now: Timestamp,
    ) -> Result<(CollabSession, Vec<CoreEvent>)> {
        let user_id = user_id.into();
        let session = match self.sessions.get_mut(session_id) {
            Some(session) if session.is_live(now) => session,
            _ => return Err(Error::SessionNotFound(session_id.to_string())),
        };

        if session.has_member(&user_id) {
            return Ok((session.clone(), Vec::new()));
        }
        if session.active_users_count() >= session.max_users {
            return Err(Error::SessionFull {
                max_users: session.max_users,
            });
        }

        session.members.insert(user_id.clone());
        let events = vec![CoreEvent::UserJoined {
            session_id: session.session_id.clone(),
            user_id,
        }];
        Ok((session.clone(), events))
    }

    /// Leave a session. When the last member leaves, the session ends.
    pub fn leave(
        &mut self,
        session_id: &str,
        user_id: &str,
    ) -> Result<(bool, Vec<CoreEvent>)> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let mut events = Vec::new();
        if session.members.remove(user_id) {
            events.push(CoreEvent::UserLeft {
                session_id: session.session_id.clone(),
                user_id: user_id.to_string(),
            });
        }

        let ended = session.members.is_empty() && session.status == SessionStatus::Active;
        if ended {
            session.status = SessionStatus::Ended;
            events.push(CoreEvent::SessionEnded {
                session_id: session.session_id.clone(),
                document_id: session.document_id.clone(),
            });
            self.active_by_document.remove(&session.document_id);
        }
        Ok((ended, events))
    }

    /// Force-terminate a session. Owner or administrator only. The caller
    /// is responsible for clearing presence and releasing the document's
    /// locks alongside.
    pub fn terminate(
        &mut self,
        session_id: &str,
        actor: &Actor,
        reason: &str,
    ) -> Result<(CollabSession, Vec<CoreEvent>)> {
        let session = self
            .sessions
            .get_mut(session_id)
            .filter(|session| session.status == SessionStatus::Active)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        if session.owner_id != actor.user_id && !actor.admin {
            return Err(Error::Unauthorized(format!(
                "session {} is owned by {}",
                session_id, session.owner_id
            )));
        }

        session.status = SessionStatus::Terminated;
        session.members.clear();
        self.active_by_document.remove(&session.document_id);

        let events = vec![CoreEvent::SessionTerminated {
            session_id: session.session_id.clone(),
            document_id: session.document_id.clone(),
            reason: reason.to_string(),
        }];
        Ok((session.clone(), events))
    }

    /// Look up a session by id, regardless of status.
    pub fn get(&self, session_id: &str) -> Option<&CollabSession> {
        self.sessions.get(session_id)
    }

    /// The live session for a document, if any.
    pub fn active_for_document(&self, document_id: &str, now: Timestamp) -> Option<&CollabSession> {
        self.active_by_document
            .get(document_id)
            .and_then(|id| self.sessions.get(id))
            .filter(|session| session.is_live(now))
    }

    /// Whether `user_id` holds a seat in a live session.
    pub fn is_member(&self, session_id: &str, user_id: &str, now: Timestamp) -> bool {
        self.sessions
            .get(session_id)
            .map(|session| session.is_live(now) && session.has_member(user_id))
            .unwrap_or(false)
    }

    /// Drop terminal sessions from the registry. Callers decide when the
    /// history is no longer needed for inspection.
    pub fn sweep_terminal(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.status.is_terminal());
        before - self.sessions.len()
    }

    fn reap(&mut self, session_id: &str) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        if let Some(session) = self.sessions.get_mut(session_id) {
            if session.status == SessionStatus::Active {
                session.status = SessionStatus::Ended;
                session.members.clear();
                events.push(CoreEvent::SessionEnded {
                    session_id: session.session_id.clone(),
                    document_id: session.document_id.clone(),
                });
            }
            self.active_by_document.remove(&session.document_id);
        }
        events
    }
}

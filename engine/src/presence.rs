//! Ephemeral presence tracking per session.
//!
//! Presence is a TTL-bearing map, one record per (session, user),
//! independent of the operation log. Records are written on join, touched
//! on every activity, and dropped on explicit leave or lazily once the
//! TTL lapses. Races are tolerated: the last writer wins and staleness
//! heals itself through expiry.

use crate::{lock::Section, SessionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default presence lifetime: 1 hour.
pub const DEFAULT_PRESENCE_TTL_MS: u64 = 60 * 60 * 1_000;

/// A user's live state within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: UserId,
    /// Name shown to other members
    pub display_name: String,
    pub joined_at: Timestamp,
    pub last_seen: Timestamp,
    pub typing: bool,
    /// Caret position, a character offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
    /// Highlighted range, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Section>,
}

impl PresenceEntry {
    fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            display_name: user_id.clone(),
            user_id,
            joined_at: now,
            last_seen: now,
            typing: false,
            cursor: None,
            selection: None,
        }
    }

    fn is_expired(&self, now: Timestamp, ttl_ms: u64) -> bool {
        now >= self.last_seen + ttl_ms
    }
}

/// Fields a presence update may change. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub display_name: Option<String>,
    pub typing: Option<bool>,
    pub cursor: Option<u64>,
    pub selection: Option<Section>,
}

/// TTL map of connected users per session.
#[derive(Debug, Clone)]
pub struct PresenceMap {
    ttl_ms: u64,
    sessions: HashMap<SessionId, HashMap<UserId, PresenceEntry>>,
}

impl Default for PresenceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceMap {
    /// Create a map with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_PRESENCE_TTL_MS)
    }

    /// Create a map with a custom TTL.
    pub fn with_ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            sessions: HashMap::new(),
        }
    }

    /// Write or refresh a user's presence, applying the given fields.
    /// Returns the resulting entry for broadcast.
    pub fn upsert(
        &mut self,
        session_id: impl Into<SessionId>,
        user_id: impl Into<UserId>,
        update: PresenceUpdate,
        now: Timestamp,
    ) -> PresenceEntry {
        let user_id = user_id.into();
        let entry = self
            .sessions
            .entry(session_id.into())
            .or_default()
            .entry(user_id.clone())
            .or_insert_with(|| PresenceEntry::new(user_id, now));

        entry.last_seen = now;
        if let Some(display_name) = update.display_name {
            entry.display_name = display_name;
        }
        if let Some(typing) = update.typing {
            entry.typing = typing;
        }
        if let Some(cursor) = update.cursor {
            entry.cursor = Some(cursor);
        }
        if let Some(selection) = update.selection {
            entry.selection = Some(selection);
        }
        entry.clone()
    }

    /// Refresh `last_seen` without changing any field. No-op for a user
    /// that has no record.
    pub fn touch(&mut self, session_id: &str, user_id: &str, now: Timestamp) {
        if let Some(entry) = self
            .sessions
            .get_mut(session_id)
            .and_then(|users| users.get_mut(user_id))
        {
            entry.last_seen = now;
        }
    }

    /// Remove a user's record. Returns whether one existed.
    pub fn remove(&mut self, session_id: &str, user_id: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(users) => {
                let removed = users.remove(user_id).is_some();
                if users.is_empty() {
                    self.sessions.remove(session_id);
                }
                removed
            }
            None => false,
        }
    }

    /// Drop every record for a session. Used by termination.
    pub fn clear_session(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Live presence for a session, expired records evicted on the way,
    /// ordered by user id for stable output.
    pub fn list(&mut self, session_id: &str, now: Timestamp) -> Vec<PresenceEntry> {
        let ttl_ms = self.ttl_ms;
        let Some(users) = self.sessions.get_mut(session_id) else {
            return Vec::new();
        };
        users.retain(|_, entry| !entry.is_expired(now, ttl_ms));
        if users.is_empty() {
            self.sessions.remove(session_id);
            return Vec::new();
        }
        let mut entries: Vec<_> = users.values().cloned().collect();
        entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Timestamp = 1_000_000;

    #[test]
    fn upsert_creates_then_updates() {
        let mut presence = PresenceMap::new();
        let entry = presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
        assert_eq!(entry.display_name, "alice");
        assert!(!entry.typing);

        let entry = presence.upsert(
            "sess-1",
            "alice",
            PresenceUpdate {
                typing: Some(true),
                cursor: Some(42),
                ..Default::default()
            },
            NOW + 100,
        );
        assert!(entry.typing);
        assert_eq!(entry.cursor, Some(42));
        assert_eq!(entry.joined_at, NOW);
        assert_eq!(entry.last_seen, NOW + 100);
    }

    #[test]
    fn absent_fields_keep_their_value() {
        let mut presence = PresenceMap::new();
        presence.upsert(
            "sess-1",
            "alice",
            PresenceUpdate {
                typing: Some(true),
                ..Default::default()
            },
            NOW,
        );

        let entry = presence.upsert(
            "sess-1",
            "alice",
            PresenceUpdate {
                cursor: Some(7),
                ..Default::default()
            },
            NOW + 10,
        );
        assert!(entry.typing);
        assert_eq!(entry.cursor, Some(7));
    }

    #[test]
    fn list_is_scoped_per_session() {
        let mut presence = PresenceMap::new();
        presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
        presence.upsert("sess-2", "bob", PresenceUpdate::default(), NOW);

        let listed = presence.list("sess-1", NOW);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, "alice");
    }

    #[test]
    fn expiry_is_enforced_on_read() {
        let mut presence = PresenceMap::with_ttl(1_000);
        presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
        presence.upsert("sess-1", "bob", PresenceUpdate::default(), NOW + 500);

        let listed = presence.list("sess-1", NOW + 1_000);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, "bob");
    }

    #[test]
    fn touch_keeps_a_record_alive() {
        let mut presence = PresenceMap::with_ttl(1_000);
        presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
        presence.touch("sess-1", "alice", NOW + 900);

        assert_eq!(presence.list("sess-1", NOW + 1_500).len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut presence = PresenceMap::new();
        presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
        presence.upsert("sess-1", "bob", PresenceUpdate::default(), NOW);

        assert!(presence.remove("sess-1", "alice"));
        assert!(!presence.remove("sess-1", "alice"));
        assert_eq!(presence.list("sess-1", NOW).len(), 1);

        presence.clear_session("sess-1");
        assert!(presence.list("sess-1", NOW).is_empty());
    }

    #[test]
    fn list_orders_by_user_id() {
        let mut presence = PresenceMap::new();
        presence.upsert("sess-1", "zoe", PresenceUpdate::default(), NOW);
        presence.upsert("sess-1", "amy", PresenceUpdate::default(), NOW);

        let ids: Vec<_> = presence
            .list("sess-1", NOW)
            .into_iter()
            .map(|entry| entry.user_id)
            .collect();
        assert_eq!(ids, vec!["amy", "zoe"]);
    }
}

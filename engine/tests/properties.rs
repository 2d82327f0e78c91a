//! End-to-end properties of the collaboration core.
//!
//! These tests drive the same pipeline the server runs per document:
//! reconcile an incoming operation against the log window, apply it to
//! the document state, append it to the log.

use scribe_engine::{
    catch_up, transform, Actor, ClockStamp, DocumentState, EditKind, EditOp, Error, LockKind,
    LockTable, OpLog, PresenceMap, PresenceUpdate, Section, SessionRegistry, SessionSettings,
    TransformOutcome, CATCH_UP_LIMIT,
};

const NOW: u64 = 1_000_000;

/// Run one operation through the serialized read-reconcile-write path.
fn submit(
    state: &mut DocumentState,
    log: &mut OpLog,
    op: EditOp,
    watermark: u64,
) -> TransformOutcome {
    let window = log.window_since(watermark);
    let outcome = transform::reconcile(op, &window).expect("valid operation");
    let applied = outcome.transformed.clone().into_applied(NOW);
    state.apply(&applied);
    log.append(applied).expect("unique operation id");
    outcome
}

fn fresh_doc(content: &str) -> (DocumentState, OpLog) {
    (DocumentState::new(content, 0), OpLog::new("doc-1"))
}

// ============================================================================
// Convergence
// ============================================================================

#[test]
fn concurrent_inserts_converge_under_every_arrival_order() {
    let ops = [
        EditOp::insert("op-a", "doc-1", "amy", 1, "X", ClockStamp::new(100, "amy")),
        EditOp::insert("op-b", "doc-1", "bob", 3, "Y", ClockStamp::new(200, "bob")),
        EditOp::insert("op-c", "doc-1", "carol", 5, "Z", ClockStamp::new(300, "carol")),
    ];
    const ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut contents = Vec::new();
    for order in ORDERS {
        let (mut state, mut log) = fresh_doc("abcdef");
        for idx in order {
            submit(&mut state, &mut log, ops[idx].clone(), 0);
        }
        contents.push(state.content);
    }

    assert!(
        contents.windows(2).all(|pair| pair[0] == pair[1]),
        "divergent contents: {contents:?}"
    );
    assert_eq!(contents[0], "aXbcYdeZf");
}

#[test]
fn concurrent_insert_and_delete_converge_in_both_orders() {
    let insert = EditOp::insert("op-a", "doc-1", "amy", 5, "XY", ClockStamp::new(100, "amy"));
    let delete = EditOp::delete("op-b", "doc-1", "bob", 0, 10, ClockStamp::new(200, "bob"));

    let (mut state_ab, mut log_ab) = fresh_doc("0123456789");
    submit(&mut state_ab, &mut log_ab, insert.clone(), 0);
    submit(&mut state_ab, &mut log_ab, delete.clone(), 0);

    let (mut state_ba, mut log_ba) = fresh_doc("0123456789");
    submit(&mut state_ba, &mut log_ba, delete, 0);
    submit(&mut state_ba, &mut log_ba, insert, 0);

    assert_eq!(state_ab.content, state_ba.content);
    // The concurrent insertion survives the deletion in both orders.
    assert_eq!(state_ab.content, "XY");
}

#[test]
fn submission_pipeline_is_deterministic() {
    let run = || {
        let (mut state, mut log) = fresh_doc("the quick brown fox");
        submit(
            &mut state,
            &mut log,
            EditOp::replace("op-1", "doc-1", "amy", 4, 5, "slow", ClockStamp::new(100, "amy")),
            0,
        );
        submit(
            &mut state,
            &mut log,
            EditOp::delete("op-2", "doc-1", "bob", 8, 6, ClockStamp::new(200, "bob")),
            0,
        );
        submit(
            &mut state,
            &mut log,
            EditOp::insert("op-3", "doc-1", "carol", 0, ">> ", ClockStamp::new(300, "carol")),
            0,
        );
        state.content
    };

    assert_eq!(run(), run());
}

// ============================================================================
// No lost updates
// ============================================================================

#[test]
fn non_overlapping_concurrent_inserts_both_survive() {
    let (mut state, mut log) = fresh_doc("hello world");

    // Neither author has seen the other's edit: both watermarks are 0.
    submit(
        &mut state,
        &mut log,
        EditOp::insert("op-a", "doc-1", "amy", 0, "<< ", ClockStamp::new(100, "amy")),
        0,
    );
    submit(
        &mut state,
        &mut log,
        EditOp::insert("op-b", "doc-1", "bob", 11, " >>", ClockStamp::new(200, "bob")),
        0,
    );

    assert_eq!(state.content, "<< hello world >>");
    assert_eq!(log.len(), 2);
}

// ============================================================================
// Overlap conflict resolution
// ============================================================================

#[test]
fn overlapping_deletes_resolve_by_timestamp_priority() {
    let (mut state, mut log) = fresh_doc("0123456789ABCDEF");

    let first = submit(
        &mut state,
        &mut log,
        EditOp::delete("op-a", "doc-1", "amy", 0, 10, ClockStamp::new(100, "amy")),
        0,
    );
    assert!(!first.had_conflict());

    let second = submit(
        &mut state,
        &mut log,
        EditOp::delete("op-b", "doc-1", "bob", 5, 10, ClockStamp::new(200, "bob")),
        0,
    );

    // Exactly one conflict record, resolved by timestamp priority.
    assert_eq!(second.conflicts.len(), 1);
    assert_eq!(
        serde_json::to_value(second.strategy.unwrap()).unwrap(),
        serde_json::json!("timestamp_priority")
    );
    assert!(second.transformed.conflict_resolved);

    // The earlier operation's effect is preserved: [0, 10) is gone in
    // full, and the later delete kept only its non-overlapping tail
    // [10, 15), truncated from ten characters down to five.
    assert_eq!(second.transformed.kind, EditKind::Delete { length: 5 });
    assert_eq!(state.content, "F");
}

// ============================================================================
// Session capacity and lifecycle
// ============================================================================

#[test]
fn third_join_on_a_two_seat_session_is_rejected() {
    let mut registry = SessionRegistry::new();
    let settings = SessionSettings {
        max_users: Some(2),
        ..Default::default()
    };
    registry.start("sess-1", "doc-1", "alice", settings, NOW);
    registry.join("sess-1", "bob", NOW).unwrap();

    let err = registry.join("sess-1", "carol", NOW).unwrap_err();
    assert_eq!(err, Error::SessionFull { max_users: 2 });
    assert_eq!(registry.get("sess-1").unwrap().active_users_count(), 2);
}

#[test]
fn start_twice_returns_the_same_session() {
    let mut registry = SessionRegistry::new();
    let first = registry.start("sess-1", "doc-1", "alice", SessionSettings::default(), NOW);
    let second = registry.start("sess-2", "doc-1", "bob", SessionSettings::default(), NOW + 50);

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.session.session_id, second.session.session_id);
    assert!(registry.get("sess-2").is_none());
}

// ============================================================================
// Lock arbitration
// ============================================================================

#[test]
fn second_write_lock_always_conflicts() {
    let mut locks = LockTable::new();
    locks
        .acquire(
            "lock-1",
            "doc-1",
            "alice",
            LockKind::Write,
            Some(Section::new(0, 5)),
            None,
            NOW,
        )
        .unwrap();

    // Any section, even a disjoint one.
    let err = locks
        .acquire(
            "lock-2",
            "doc-1",
            "bob",
            LockKind::Write,
            Some(Section::new(100, 200)),
            None,
            NOW,
        )
        .unwrap_err();
    assert!(matches!(err, Error::LockConflict { .. }));
}

#[test]
fn disjoint_read_locks_never_conflict() {
    let mut locks = LockTable::new();
    locks
        .acquire(
            "lock-1",
            "doc-1",
            "alice",
            LockKind::Read,
            Some(Section::new(0, 5)),
            None,
            NOW,
        )
        .unwrap();
    locks
        .acquire(
            "lock-2",
            "doc-1",
            "bob",
            LockKind::Read,
            Some(Section::new(10, 15)),
            None,
            NOW,
        )
        .unwrap();

    assert_eq!(locks.active_locks("doc-1", NOW).len(), 2);
}

#[test]
fn expired_lock_disappears_without_release() {
    let mut locks = LockTable::new();
    locks
        .acquire(
            "lock-1",
            "doc-1",
            "alice",
            LockKind::Write,
            None,
            Some(1_000),
            NOW,
        )
        .unwrap();

    assert_eq!(locks.active_locks("doc-1", NOW + 999).len(), 1);
    assert!(locks.active_locks("doc-1", NOW + 1_000).is_empty());
}

// ============================================================================
// Reconnection catch-up
// ============================================================================

#[test]
fn reconnect_returns_exactly_the_missed_operations() {
    let (mut state, mut log) = fresh_doc("");
    for i in 1..=10u64 {
        let char_len = state.char_len();
        submit(
            &mut state,
            &mut log,
            EditOp::insert(
                &format!("op-{i}"),
                "doc-1",
                "amy",
                (i - 1).min(char_len),
                "x",
                ClockStamp::new(i * 100, "amy"),
            ),
            (i.saturating_sub(1)) * 100,
        );
    }

    let mut presence = PresenceMap::new();
    let mut locks = LockTable::new();
    presence.upsert("sess-1", "amy", PresenceUpdate::default(), NOW);

    // The client last saw operation #7.
    let snapshot = catch_up(&state, &log, &mut presence, &mut locks, "sess-1", 700, NOW);

    let ids: Vec<_> = snapshot
        .missed_operations
        .iter()
        .map(|op| op.op_id.as_str())
        .collect();
    assert_eq!(ids, vec!["op-8", "op-9", "op-10"]);
    assert!(!snapshot.truncated);
    assert_eq!(snapshot.current_version, 10);
    assert_eq!(snapshot.active_users.len(), 1);

    // Replaying the missed slice over the client's stale copy catches up
    // to the server's content.
    let mut stale = DocumentState::new(&state.content[..7], 7);
    stale.replay(&snapshot.missed_operations);
    assert_eq!(stale.content, state.content);
}

#[test]
fn reconnect_truncates_past_the_cap() {
    let (mut state, mut log) = fresh_doc("");
    for i in 1..=(CATCH_UP_LIMIT as u64 + 5) {
        submit(
            &mut state,
            &mut log,
            EditOp::insert(
                &format!("op-{i}"),
                "doc-1",
                "amy",
                0,
                "x",
                ClockStamp::new(i * 100, "amy"),
            ),
            (i.saturating_sub(1)) * 100,
        );
    }

    let mut presence = PresenceMap::new();
    let mut locks = LockTable::new();
    let snapshot = catch_up(&state, &log, &mut presence, &mut locks, "sess-1", 0, NOW);
    assert_eq!(snapshot.missed_count(), CATCH_UP_LIMIT);
    assert!(snapshot.truncated);
}

// ============================================================================
// Termination clears the document's collaboration state
// ============================================================================

#[test]
fn terminate_releases_locks_and_presence() {
    let mut registry = SessionRegistry::new();
    let mut presence = PresenceMap::new();
    let mut locks = LockTable::new();

    registry.start("sess-1", "doc-1", "alice", SessionSettings::default(), NOW);
    registry.join("sess-1", "bob", NOW).unwrap();
    presence.upsert("sess-1", "alice", PresenceUpdate::default(), NOW);
    presence.upsert("sess-1", "bob", PresenceUpdate::default(), NOW);
    locks
        .acquire("lock-1", "doc-1", "bob", LockKind::Write, None, None, NOW)
        .unwrap();

    // The composition the server runs on terminate.
    let (session, events) = registry
        .terminate("sess-1", &Actor::admin("root"), "maintenance")
        .unwrap();
    presence.clear_session(&session.session_id);
    locks.release_all(&session.document_id);

    assert_eq!(events.len(), 1);
    assert!(presence.list("sess-1", NOW).is_empty());
    assert!(locks.active_locks("doc-1", NOW).is_empty());
    assert!(registry.active_for_document("doc-1", NOW).is_none());
}

// SPDX-License-Identifier: Apache-2.0

use serde_json::json;
use tally_model::{AuditAction, EntityKind, EntityRecord, PeriodKey, RecordId, Role, UserDirectoryEntry};
use tally_store::{SyncStore, UpsertOutcome};

const EPOCH: &str = "1970-01-01T00:00:00.000Z";

fn record(id: &str, period: &str, version: u64) -> EntityRecord {
    let mut rec = EntityRecord::new(
        RecordId::parse(id).expect("record id"),
        PeriodKey::parse(period).expect("period key"),
    );
    rec.version = version;
    rec.with_field("score", json!(80))
}

fn period(key: &str) -> PeriodKey {
    PeriodKey::parse(key).expect("period key")
}

#[test]
fn insert_starts_at_version_one() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    let outcome = store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 0), "u1")
        .expect("upsert");
    match outcome {
        UpsertOutcome::Accepted(stored) => {
            assert_eq!(stored.version, 1);
            assert!(stored.updated_at.is_some());
        }
        other => panic!("expected accepted insert, got {other:?}"),
    }
}

#[test]
fn versions_increase_by_exactly_one() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    let mut expected = 0;
    for round in 0..5 {
        let outcome = store
            .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", expected), "u1")
            .expect("upsert");
        match outcome {
            UpsertOutcome::Accepted(stored) => {
                assert_eq!(stored.version, expected + 1, "round {round}");
                expected = stored.version;
            }
            other => panic!("round {round}: {other:?}"),
        }
    }
    assert_eq!(expected, 5);
}

#[test]
fn stale_expected_version_conflicts_with_current_record() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 0), "u1")
        .expect("insert");
    store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 1), "u1")
        .expect("update to v2");

    // A second writer still holding version 1 must not silently overwrite.
    let outcome = store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 1), "u2")
        .expect("conflicting upsert");
    match outcome {
        UpsertOutcome::Conflict(current) => assert_eq!(current.version, 2),
        other => panic!("expected conflict, got {other:?}"),
    }

    // The losing attempt left no trace: version unchanged, no audit entry.
    let stored = store
        .get(EntityKind::KpiEntries, &RecordId::parse("k1").expect("id"))
        .expect("get")
        .expect("record exists");
    assert_eq!(stored.version, 2);
    assert_eq!(store.audit_len().expect("audit len"), 2);
}

#[test]
fn nonzero_expectation_on_missing_record_is_an_error() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    let err = store
        .upsert(EntityKind::KpiEntries, &record("ghost", "2025-01", 3), "u1")
        .expect_err("must reject");
    let msg = err.to_string();
    assert!(msg.contains("ghost"), "unexpected error: {msg}");
}

#[test]
fn locked_period_rejects_writes_and_leaves_storage_untouched() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    store
        .upsert(EntityKind::Complaints, &record("c1", "2025-01", 0), "u1")
        .expect("seed record");
    store
        .set_lock(&period("2025-01"), true, "admin", Some("month closed"))
        .expect("lock period");

    let before = store.changes_since(EPOCH).expect("snapshot before");
    let audit_before = store.audit_len().expect("audit len");

    let outcome = store
        .upsert(EntityKind::Complaints, &record("c1", "2025-01", 1), "u1")
        .expect("rejected upsert");
    assert!(matches!(outcome, UpsertOutcome::PeriodLocked(_)));

    let after = store.changes_since(EPOCH).expect("snapshot after");
    assert_eq!(before, after, "storage must be unchanged after a locked write");
    assert_eq!(store.audit_len().expect("audit len"), audit_before);

    // A different, unlocked period still accepts writes.
    let outcome = store
        .upsert(EntityKind::Complaints, &record("c2", "2025-02", 0), "u1")
        .expect("upsert");
    assert!(matches!(outcome, UpsertOutcome::Accepted(_)));
}

#[test]
fn padded_wire_period_cannot_slip_past_a_lock() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    store
        .set_lock(&period("2025-01"), true, "admin", Some("month closed"))
        .expect("lock period");

    // Deserialization normalizes the padded key, so the lock row matches.
    let rec: EntityRecord = serde_json::from_value(json!({
        "id": "k1",
        "period": " 2025-01",
        "version": 0,
        "score": 80
    }))
    .expect("deserialize wire record");
    assert_eq!(rec.period.as_str(), "2025-01");

    let outcome = store
        .upsert(EntityKind::KpiEntries, &rec, "u1")
        .expect("upsert");
    assert!(matches!(outcome, UpsertOutcome::PeriodLocked(_)));
    assert_eq!(store.audit_len().expect("audit len"), 1);
}

#[test]
fn unlock_is_audited_and_reopens_the_period() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    let key = period("2025-01");
    store
        .set_lock(&key, true, "admin", Some("close"))
        .expect("lock");
    store.set_lock(&key, false, "admin", None).expect("unlock");
    assert!(!store.is_locked(&key).expect("is_locked"));

    let actions: Vec<AuditAction> = store
        .recent_audit(10)
        .expect("recent audit")
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Unlock, AuditAction::Lock]);

    let outcome = store
        .upsert(EntityKind::Leads, &record("l1", "2025-01", 0), "u1")
        .expect("upsert after unlock");
    assert!(matches!(outcome, UpsertOutcome::Accepted(_)));
}

#[test]
fn lock_metadata_survives_unlock() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    let key = period("2025-03");
    let locked = store
        .set_lock(&key, true, "admin", Some("quarter close"))
        .expect("lock");
    assert_eq!(locked.locked_by.as_deref(), Some("admin"));
    let unlocked = store.set_lock(&key, false, "admin", None).expect("unlock");
    assert!(!unlocked.is_locked);
    assert_eq!(unlocked.reason.as_deref(), Some("quarter close"));
}

#[test]
fn changes_since_returns_all_records_at_or_after_watermark() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 0), "u1")
        .expect("insert k1");
    let stored = store
        .get(EntityKind::KpiEntries, &RecordId::parse("k1").expect("id"))
        .expect("get")
        .expect("exists");
    let wm = stored.updated_at.clone().expect("updated_at");

    // Inclusive boundary: the record stamped exactly at the watermark is
    // still delivered.
    let tables = store.changes_since(&wm).expect("changes at boundary");
    assert_eq!(tables[&EntityKind::KpiEntries].len(), 1);

    // A later watermark excludes it.
    let later = format!("{}~", wm);
    let tables = store.changes_since(&later).expect("changes after");
    assert!(tables[&EntityKind::KpiEntries].is_empty());

    // Every synced kind is present in the map even when empty.
    assert_eq!(tables.len(), 4);
}

#[test]
fn audit_payload_snapshots_the_accepted_record() {
    let mut store = SyncStore::open_in_memory().expect("open store");
    store
        .upsert(EntityKind::Leads, &record("l9", "2025-02", 0), "u7")
        .expect("insert");
    let entries = store.recent_audit(1).expect("recent audit");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.actor_id, "u7");
    assert_eq!(entry.action, AuditAction::Upsert);
    assert_eq!(entry.entity, "leads");
    assert_eq!(entry.entity_id, "l9");
    assert_eq!(entry.payload["version"], 1);
    assert_eq!(entry.payload["score"], 80);
}

#[test]
fn login_verifies_pin_and_hides_hashes() {
    let store = SyncStore::open_in_memory().expect("open store");
    store
        .add_user(
            &UserDirectoryEntry {
                id: "u1".to_string(),
                name: "General Manager".to_string(),
                role: Role::Admin,
                dept: "executive".to_string(),
            },
            "admin",
            "1234",
        )
        .expect("add user");

    let user = store
        .verify_login("admin", "1234")
        .expect("verify")
        .expect("valid login");
    assert_eq!(user.id, "u1");
    assert_eq!(user.role, Role::Admin);

    assert!(store.verify_login("admin", "9999").expect("verify").is_none());
    assert!(store.verify_login("nobody", "1234").expect("verify").is_none());

    let (_, users) = store.bootstrap().expect("bootstrap");
    let as_json = serde_json::to_string(&users).expect("serialize directory");
    assert!(!as_json.contains("pin"), "directory must not leak pin data");
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("tally.db");
    {
        let mut store = SyncStore::open(&db).expect("open store");
        store
            .upsert(EntityKind::MaintenanceTickets, &record("m1", "2025-01", 0), "u1")
            .expect("insert");
    }
    let store = SyncStore::open(&db).expect("reopen store");
    let stored = store
        .get(
            EntityKind::MaintenanceTickets,
            &RecordId::parse("m1").expect("id"),
        )
        .expect("get")
        .expect("record survived reopen");
    assert_eq!(stored.version, 1);
}

// SPDX-License-Identifier: Apache-2.0

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tally_client::{
    ConflictPolicy, CycleOutcome, LocalMirror, SubmitOutcome, SyncConfig, SyncError,
    SyncOrchestrator,
};
use tally_model::{EntityKind, EntityRecord, PeriodKey, RecordId, Role, UserDirectoryEntry};
use tally_server::{build_router, AppState, ServerConfig};
use tally_store::SyncStore;
use tokio::sync::Mutex;

fn record(id: &str, period: &str, version: u64, score: i64) -> EntityRecord {
    let mut rec = EntityRecord::new(
        RecordId::parse(id).expect("id"),
        PeriodKey::parse(period).expect("period"),
    );
    rec.version = version;
    rec.with_field("score", json!(score))
}

fn seeded_store() -> SyncStore {
    let mut store = SyncStore::open_in_memory().expect("open store");
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
        .expect("seed admin");
    store
        .upsert(EntityKind::KpiEntries, &record("k1", "2025-01", 0, 80), "u1")
        .expect("seed k1");
    store
        .upsert(EntityKind::Leads, &record("l1", "2025-01", 0, 5), "u1")
        .expect("seed l1");
    store
}

async fn spawn_server(store: SyncStore) -> SocketAddr {
    let app = build_router(AppState::new(store, ServerConfig::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve app");
    });
    addr
}

fn orchestrator(addr: SocketAddr, policy: ConflictPolicy) -> Arc<SyncOrchestrator> {
    let mut config = SyncConfig::new(&format!("http://{addr}"), "u1");
    config.conflict_policy = policy;
    SyncOrchestrator::new(config, Arc::new(Mutex::new(LocalMirror::in_memory())))
        .expect("build orchestrator")
}

#[tokio::test]
async fn cold_client_converges_to_server_state() {
    let addr = spawn_server(seeded_store()).await;
    let sync = orchestrator(addr, ConflictPolicy::AcceptServer);

    let outcome = sync.sync_once().await.expect("sync");
    assert_eq!(outcome, CycleOutcome::Completed);
    assert!(sync.is_online());

    let mirror = sync.mirror();
    let mirror = mirror.lock().await;
    assert_eq!(mirror.records(EntityKind::KpiEntries).len(), 1);
    assert_eq!(mirror.records(EntityKind::Leads).len(), 1);
    let k1 = mirror.get(EntityKind::KpiEntries, "k1").expect("k1 mirrored");
    assert_eq!(k1.version, 1);
    assert!(mirror.watermark() > "2020-01-01T00:00:00.000Z");
    assert_eq!(mirror.state().users.len(), 1);
}

#[tokio::test]
async fn second_cycle_with_no_server_writes_changes_nothing_but_watermark() {
    let addr = spawn_server(seeded_store()).await;
    let sync = orchestrator(addr, ConflictPolicy::AcceptServer);
    sync.sync_once().await.expect("first sync");
    let before = { sync.mirror().lock().await.state().tables.clone() };
    sync.sync_once().await.expect("second sync");
    let after = { sync.mirror().lock().await.state().tables.clone() };
    assert_eq!(before, after);
}

#[tokio::test]
async fn accepted_submit_confirms_server_version_in_mirror() {
    let addr = spawn_server(seeded_store()).await;
    let sync = orchestrator(addr, ConflictPolicy::AcceptServer);
    sync.sync_once().await.expect("sync");

    let outcome = sync
        .submit(EntityKind::KpiEntries, record("k1", "2025-01", 1, 95))
        .await
        .expect("submit");
    assert_eq!(outcome, SubmitOutcome::Accepted { version: 2 });

    let mirror = sync.mirror();
    let mirror = mirror.lock().await;
    let k1 = mirror.get(EntityKind::KpiEntries, "k1").expect("k1");
    assert_eq!(k1.version, 2);
    assert_eq!(k1.fields["score"], 95);
}

#[tokio::test]
async fn conflict_hands_back_server_record_and_follows_policy() {
    let addr = spawn_server(seeded_store()).await;

    // Writer B advances k1 to version 2 behind A's back.
    let b = orchestrator(addr, ConflictPolicy::AcceptServer);
    b.sync_once().await.expect("b sync");
    let won = b
        .submit(EntityKind::KpiEntries, record("k1", "2025-01", 1, 70))
        .await
        .expect("b submit");
    assert_eq!(won, SubmitOutcome::Accepted { version: 2 });

    // A still holds version 1 and loses; AcceptServer takes the winner.
    let a = orchestrator(addr, ConflictPolicy::AcceptServer);
    let outcome = a
        .submit(EntityKind::KpiEntries, record("k1", "2025-01", 1, 90))
        .await
        .expect("a submit");
    match outcome {
        SubmitOutcome::Conflict { server_record } => {
            assert_eq!(server_record.version, 2);
            assert_eq!(server_record.fields["score"], 70);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    {
        let mirror = a.mirror();
        let mirror = mirror.lock().await;
        let k1 = mirror.get(EntityKind::KpiEntries, "k1").expect("k1");
        assert_eq!(k1.fields["score"], 70, "AcceptServer takes the server value");
    }

    // KeepLocal leaves the optimistic value for the caller to resolve.
    let c = orchestrator(addr, ConflictPolicy::KeepLocal);
    let outcome = c
        .submit(EntityKind::KpiEntries, record("k1", "2025-01", 1, 42))
        .await
        .expect("c submit");
    assert!(matches!(outcome, SubmitOutcome::Conflict { .. }));
    let mirror = c.mirror();
    let mirror = mirror.lock().await;
    let k1 = mirror.get(EntityKind::KpiEntries, "k1").expect("k1");
    assert_eq!(k1.fields["score"], 42, "KeepLocal keeps the local value");
}

#[tokio::test]
async fn locked_period_rolls_the_optimistic_write_back() {
    let mut store = seeded_store();
    store
        .set_lock(
            &PeriodKey::parse("2025-01").expect("period"),
            true,
            "u1",
            Some("month closed"),
        )
        .expect("lock");
    let addr = spawn_server(store).await;

    let sync = orchestrator(addr, ConflictPolicy::AcceptServer);
    sync.sync_once().await.expect("sync");
    let before = {
        let mirror = sync.mirror();
        let snapshot = mirror.lock().await.get(EntityKind::KpiEntries, "k1").cloned();
        snapshot.expect("k1 present")
    };

    let outcome = sync
        .submit(EntityKind::KpiEntries, record("k1", "2025-01", 1, 99))
        .await
        .expect("submit");
    assert_eq!(outcome, SubmitOutcome::PeriodLocked);

    let mirror = sync.mirror();
    let mirror = mirror.lock().await;
    let k1 = mirror.get(EntityKind::KpiEntries, "k1").expect("k1");
    assert_eq!(k1, &before, "hard rejection restores the pre-mutation value");
}

#[tokio::test]
async fn invalid_write_rejected_by_the_server_is_rolled_back() {
    let addr = spawn_server(seeded_store()).await;
    let sync = orchestrator(addr, ConflictPolicy::AcceptServer);
    sync.sync_once().await.expect("sync");

    // A nonzero expectation on a record the server has never seen is a
    // hard 400; the optimistic value must not linger in the mirror.
    let err = sync
        .submit(EntityKind::KpiEntries, record("ghost", "2025-01", 4, 10))
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, SyncError::Http(_)));

    let mirror = sync.mirror();
    let mirror = mirror.lock().await;
    assert!(mirror.get(EntityKind::KpiEntries, "ghost").is_none());
}

#[tokio::test]
async fn offline_edit_stays_locally_authoritative() {
    // Nothing listens here; connections are refused immediately.
    let dead = SyncConfig::new("http://127.0.0.1:9", "u1");
    let mirror = Arc::new(Mutex::new(LocalMirror::in_memory()));
    let offline_sync =
        SyncOrchestrator::new(dead, Arc::clone(&mirror)).expect("build orchestrator");

    let outcome = offline_sync.sync_once().await.expect("offline cycle");
    assert_eq!(outcome, CycleOutcome::Offline);
    assert!(!offline_sync.is_online());

    let local_id = uuid::Uuid::new_v4().to_string();
    let outcome = offline_sync
        .submit(EntityKind::Complaints, record(&local_id, "2025-02", 0, 1))
        .await
        .expect("offline submit");
    assert_eq!(outcome, SubmitOutcome::Offline);
    assert!(
        mirror.lock().await.get(EntityKind::Complaints, &local_id).is_some(),
        "offline write is retained, not rolled back"
    );

    // Connectivity returns: the same mirror syncs against a real server.
    // The server has no record for the local id, so the edit survives.
    let addr = spawn_server(seeded_store()).await;
    let online_sync = SyncOrchestrator::new(
        SyncConfig::new(&format!("http://{addr}"), "u1"),
        Arc::clone(&mirror),
    )
    .expect("build orchestrator");
    let outcome = online_sync.sync_once().await.expect("recovery cycle");
    assert_eq!(outcome, CycleOutcome::Completed);

    let mirror = mirror.lock().await;
    assert!(
        mirror.get(EntityKind::Complaints, &local_id).is_some(),
        "sync must not silently revert an edit the server has no record for"
    );
    assert_eq!(mirror.records(EntityKind::KpiEntries).len(), 1);
}

#[tokio::test]
async fn mirror_blob_survives_restart_with_watermark() {
    let addr = spawn_server(seeded_store()).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mirror.json");

    let mirror = Arc::new(Mutex::new(LocalMirror::load_or_default(&path)));
    let sync = SyncOrchestrator::new(
        SyncConfig::new(&format!("http://{addr}"), "u1"),
        Arc::clone(&mirror),
    )
    .expect("build orchestrator");
    sync.sync_once().await.expect("sync");
    let watermark = { mirror.lock().await.watermark().to_string() };

    let reloaded = LocalMirror::load_or_default(&path);
    assert_eq!(reloaded.watermark(), watermark);
    assert!(reloaded.get(EntityKind::KpiEntries, "k1").is_some());
}

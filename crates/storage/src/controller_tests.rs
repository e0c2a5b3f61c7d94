// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::db::JsonDbFactory;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use tug_actor::ActorScheduler;
use tug_core::IndexedEntry;

struct Fixture {
    // NOTE(lifetime): keeps the on-disk fixture alive for the test
    #[allow(dead_code)]
    root: TempDir,
    runtime_dir: std::path::PathBuf,
    store: SnapshotStore,
    controller: StateController<JsonDbFactory>,
    exporter: Arc<Mutex<Position>>,
}

/// Controller over a JsonDb with an entry supplier that covers every
/// non-negative position (index = position + 100, term 1) and a settable
/// exporter position.
fn fixture(scheduler: &ActorScheduler) -> Fixture {
    let root = tempdir().unwrap();
    let runtime_dir = root.path().join("runtime");
    let store = SnapshotStore::open(&root.path().join("snapshots-root")).unwrap();
    let exporter = Arc::new(Mutex::new(0));

    let exporter_handle = Arc::clone(&exporter);
    let controller = StateController::new(
        scheduler.actor("state-controller"),
        runtime_dir.clone(),
        store.clone(),
        JsonDbFactory::new(),
        Arc::new(|position| {
            if position < 0 {
                None
            } else {
                Some(IndexedEntry::new(position as u64 + 100, 1))
            }
        }),
        Arc::new(move |_db| *exporter_handle.lock()),
    );

    Fixture { root, runtime_dir, store, controller, exporter }
}

fn pending_is_empty(store_root: &Path) -> bool {
    std::fs::read_dir(store_root.join("pending")).unwrap().count() == 0
}

#[tokio::test]
async fn open_db_sets_the_slot_and_is_idempotent() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    assert!(!fx.controller.is_db_opened());
    let db = fx.controller.open_db().await.unwrap();
    assert!(fx.controller.is_db_opened());

    db.put("k", b"v").unwrap();
    let again = fx.controller.open_db().await.unwrap();
    assert_eq!(again.get("k").unwrap(), Some(b"v".to_vec()));
}

#[tokio::test]
async fn close_db_clears_the_slot_and_deletes_the_runtime_dir() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    fx.controller.open_db().await.unwrap();
    assert!(fx.runtime_dir.exists());

    fx.controller.close_db().await.unwrap();
    assert!(!fx.controller.is_db_opened());
    assert!(!fx.runtime_dir.exists());
}

#[tokio::test]
async fn snapshot_with_closed_db_resolves_none_without_touching_disk() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    let result = fx.controller.take_transient_snapshot(3).await.unwrap();
    assert!(result.is_none());
    assert!(pending_is_empty(fx.store.root()));
}

#[tokio::test]
async fn snapshot_position_is_the_lower_of_bound_and_exporter() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    *fx.exporter.lock() = 1;

    let transient = fx.controller.take_transient_snapshot(5).await.unwrap().unwrap();

    // The id encodes the raw positions; the entry is looked up at min(5, 1).
    assert_eq!(transient.id().processed_position, 5);
    assert_eq!(transient.id().exported_position, 1);
    assert_eq!(transient.id().index, 101);
    assert_eq!(transient.id().compaction_bound(), 1);
}

#[tokio::test]
async fn missing_indexed_entry_fails_and_leaves_no_pending_dir() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    *fx.exporter.lock() = -1;

    let err = fx.controller.take_transient_snapshot(5).await.unwrap_err();
    assert!(
        matches!(err, StateControllerError::PositionNotInLog { position: -1 }),
        "got: {err}"
    );
    assert!(pending_is_empty(fx.store.root()));
}

#[tokio::test]
async fn store_refusal_resolves_none() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    *fx.exporter.lock() = 9;

    let transient = fx.controller.take_transient_snapshot(9).await.unwrap().unwrap();
    transient.persist().await.unwrap();

    // A lower bound below the persisted snapshot cannot advance it.
    *fx.exporter.lock() = 2;
    let refused = fx.controller.take_transient_snapshot(2).await.unwrap();
    assert!(refused.is_none());
}

#[tokio::test]
async fn snapshot_restore_round_trips_database_state() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    let db = fx.controller.open_db().await.unwrap();
    db.put("x", b"3").unwrap();
    *fx.exporter.lock() = 3;

    let transient = fx.controller.take_transient_snapshot(2).await.unwrap().unwrap();
    transient.persist().await.unwrap();

    fx.controller.close_db().await.unwrap();
    let restored = fx.controller.recover().await.unwrap();
    assert!(restored.is_some());
    assert!(!fx.controller.is_db_opened(), "recover must not open the database");

    let db = fx.controller.open_db().await.unwrap();
    assert_eq!(db.get("x").unwrap(), Some(b"3".to_vec()));
}

#[tokio::test]
async fn recover_without_snapshot_leaves_the_db_closed() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    fx.controller.open_db().await.unwrap();
    fx.controller.close_db().await.unwrap();

    let restored = fx.controller.recover().await.unwrap();
    assert!(restored.is_none());
    assert!(!fx.controller.is_db_opened());
    assert!(!fx.runtime_dir.exists());
}

#[tokio::test]
async fn corrupted_snapshot_fails_on_open_not_on_recover() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);

    let db = fx.controller.open_db().await.unwrap();
    db.put("x", b"3").unwrap();
    *fx.exporter.lock() = 5;
    let transient = fx.controller.take_transient_snapshot(5).await.unwrap().unwrap();
    let persisted = transient.persist().await.unwrap();
    fx.controller.close_db().await.unwrap();

    // Corrupt the database image inside the persisted snapshot.
    std::fs::write(persisted.path().join("state.json"), b"{ tampered").unwrap();

    assert!(fx.controller.recover().await.unwrap().is_some());
    let err = fx.controller.open_db().await.unwrap_err();
    assert!(matches!(err, StateControllerError::Db(DbError::Corrupt { .. })), "got: {err}");

    assert_eq!(fx.controller.valid_snapshot_count().await.unwrap(), 0);
}

#[tokio::test]
async fn snapshot_ids_grow_even_at_unchanged_positions() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    *fx.exporter.lock() = 4;

    let first = fx.controller.take_transient_snapshot(4).await.unwrap().unwrap();
    let first_id = *first.id();
    first.persist().await.unwrap();

    let second = fx.controller.take_transient_snapshot(4).await.unwrap().unwrap();
    assert!(second.id() > &first_id);
    assert_eq!(second.id().compaction_bound(), first_id.compaction_bound());
}

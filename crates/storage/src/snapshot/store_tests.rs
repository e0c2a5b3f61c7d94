// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

fn write_db_file(dir: &Path) -> Result<bool, std::io::Error> {
    std::fs::write(dir.join("state.json"), b"{\"entries\":{}}")?;
    Ok(true)
}

async fn persist_at(
    store: &SnapshotStore,
    index: u64,
    term: u64,
    processed: i64,
    exported: i64,
) -> PersistedSnapshot {
    let mut transient = store
        .new_transient(index, term, processed, exported)
        .unwrap()
        .expect("transient refused");
    assert!(transient.take(write_db_file).await.unwrap());
    transient.persist().await.unwrap()
}

#[tokio::test]
async fn empty_store_has_no_latest() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    assert!(store.latest().is_none());
    assert_eq!(store.valid_snapshot_count().await.unwrap(), 0);
}

#[tokio::test]
async fn take_and_persist_publishes_the_snapshot() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let persisted = persist_at(&store, 10, 1, 2, 3).await;

    assert_eq!(persisted.id(), &SnapshotId::new(2, 3, 10, 1, 0));
    assert_eq!(persisted.compaction_bound(), 2);
    assert!(persisted.path().join("state.json").exists());
    assert!(persisted.path().join("CHECKSUM").exists());
    assert!(persisted.path().join("metadata.json").exists());
    assert_eq!(store.latest().unwrap().id(), persisted.id());

    // The pending slot no longer exists.
    assert_eq!(std::fs::read_dir(root.path().join("pending")).unwrap().count(), 0);
}

#[tokio::test]
async fn declined_write_discards_the_pending_directory() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let mut transient = store.new_transient(10, 1, 2, 3).unwrap().unwrap();
    let written = transient
        .take(|_dir: &Path| Ok::<_, std::io::Error>(false))
        .await
        .unwrap();
    assert!(!written);
    assert_eq!(std::fs::read_dir(root.path().join("pending")).unwrap().count(), 0);

    let err = transient.persist().await.unwrap_err();
    assert!(matches!(err, SnapshotStoreError::NotWritten(_)), "got: {err}");
    assert!(store.latest().is_none());
}

#[tokio::test]
async fn failing_write_surfaces_the_error() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let mut transient = store.new_transient(10, 1, 2, 3).unwrap().unwrap();
    let err = transient
        .take(|_dir: &Path| {
            Err::<bool, _>(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotStoreError::Write(_)), "got: {err}");
}

#[tokio::test]
async fn persist_deletes_all_older_snapshots() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    persist_at(&store, 10, 1, 1, 1).await;
    persist_at(&store, 20, 1, 3, 3).await;
    let latest = persist_at(&store, 30, 1, 5, 5).await;

    assert_eq!(store.valid_snapshot_count().await.unwrap(), 1);
    assert_eq!(store.latest().unwrap().id(), latest.id());
    assert_eq!(
        std::fs::read_dir(root.path().join("snapshots")).unwrap().count(),
        1
    );
}

#[tokio::test]
async fn unchanged_positions_get_a_fresh_larger_ordinal() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let first = persist_at(&store, 10, 1, 4, 4).await;
    let second = persist_at(&store, 10, 1, 4, 4).await;

    assert!(second.id() > first.id());
    assert_eq!(second.id().compaction_bound(), first.id().compaction_bound());
    assert_eq!(second.id().prefix(), first.id().prefix());
}

#[tokio::test]
async fn snapshot_that_cannot_advance_is_refused() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    persist_at(&store, 20, 2, 5, 5).await;

    assert!(store.new_transient(10, 1, 3, 3).unwrap().is_none());
    // Equal coordinates are still allowed.
    assert!(store.new_transient(20, 2, 5, 5).unwrap().is_some());
}

#[tokio::test]
async fn negative_positions_are_refused() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    assert!(store.new_transient(1, 1, -1, 3).unwrap().is_none());
    assert!(store.new_transient(1, 1, 3, -1).unwrap().is_none());
}

#[tokio::test]
async fn abort_deletes_the_pending_directory() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let mut transient = store.new_transient(10, 1, 2, 3).unwrap().unwrap();
    assert!(transient.take(write_db_file).await.unwrap());
    transient.abort().await.unwrap();

    assert_eq!(std::fs::read_dir(root.path().join("pending")).unwrap().count(), 0);
    assert!(store.latest().is_none());
}

#[tokio::test]
async fn reopening_indexes_existing_snapshots_and_cleans_pending() {
    let root = tempdir().unwrap();
    {
        let store = SnapshotStore::open(root.path()).unwrap();
        persist_at(&store, 10, 1, 2, 3).await;
        // Simulate a crash mid-construction.
        std::fs::create_dir_all(root.path().join("pending").join("0-0-0-0-9")).unwrap();
    }

    let store = SnapshotStore::open(root.path()).unwrap();
    assert_eq!(store.latest().unwrap().id(), &SnapshotId::new(2, 3, 10, 1, 0));
    assert_eq!(std::fs::read_dir(root.path().join("pending")).unwrap().count(), 0);

    // Ordinals continue above everything seen on disk.
    let next = store.new_transient(10, 1, 2, 3).unwrap().unwrap();
    assert!(next.id().ordinal >= 1);
}

#[tokio::test]
async fn second_open_of_a_locked_store_fails() {
    let root = tempdir().unwrap();
    let _store = SnapshotStore::open(root.path()).unwrap();
    let err = SnapshotStore::open(root.path()).unwrap_err();
    assert!(matches!(err, SnapshotStoreError::Locked(_)), "got: {err}");
}

#[tokio::test]
async fn corrupted_latest_falls_back_to_the_next_valid_snapshot() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    let older = persist_at(&store, 10, 1, 2, 2).await.id().clone();

    // Plant a newer snapshot by hand so two are present at once.
    let newer = SnapshotId::new(5, 5, 20, 1, 7);
    let newer_dir = root.path().join("snapshots").join(newer.to_string());
    std::fs::create_dir_all(&newer_dir).unwrap();
    std::fs::write(newer_dir.join("state.json"), b"{}").unwrap();
    crate::checksum::write(&newer_dir).unwrap();
    drop(store);

    let store = SnapshotStore::open(root.path()).unwrap();
    assert_eq!(store.latest().unwrap().id(), &newer);

    // Corrupt the newer snapshot; probing marks it invalid.
    std::fs::write(newer_dir.join("state.json"), b"{ tampered").unwrap();
    assert_eq!(store.valid_snapshot_count().await.unwrap(), 1);
    assert_eq!(store.latest().unwrap().id(), &older);
}

#[tokio::test]
async fn persist_listener_sees_every_new_snapshot() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    store.add_persist_listener(move |_snapshot| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    persist_at(&store, 10, 1, 1, 1).await;
    persist_at(&store, 20, 1, 2, 2).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn copy_reproduces_the_snapshot_byte_for_byte() {
    let root = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    let persisted = persist_at(&store, 10, 1, 2, 3).await;

    let target = dst.path().join("runtime");
    store.copy(&persisted, &target).await.unwrap();

    for name in ["state.json", "CHECKSUM", "metadata.json"] {
        let original = std::fs::read(persisted.path().join(name)).unwrap();
        let copied = std::fs::read(target.join(name)).unwrap();
        assert_eq!(original, copied, "{name} differs");
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::services::stream_processor::{StreamProcessor, StreamProcessorMode};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tug_actor::ActorScheduler;
use tug_storage::{JsonDbFactory, SnapshotStore, StateDb};

struct Fixture {
    // NOTE(lifetime): keeps the on-disk fixture alive for the test
    #[allow(dead_code)]
    root: TempDir,
    store: SnapshotStore,
    controller: Arc<StateController<JsonDbFactory>>,
    processor: StreamProcessor,
}

fn fixture(scheduler: &ActorScheduler) -> Fixture {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(&root.path().join("snapshots-root")).unwrap();
    let controller = Arc::new(StateController::new(
        scheduler.actor("state-controller"),
        root.path().join("runtime"),
        store.clone(),
        JsonDbFactory::new(),
        Arc::new(|position| {
            (position >= 0).then(|| tug_core::IndexedEntry::new(position as u64 + 100, 1))
        }),
        Arc::new(|db| crate::services::ExporterDirector::read_position(db)),
    ));
    let processor = StreamProcessor::new(PartitionId(1), StreamProcessorMode::Processing);
    Fixture { root, store, controller, processor }
}

fn director(
    scheduler: &ActorScheduler,
    fx: &Fixture,
    mode: SnapshotDirectorMode,
) -> SnapshotDirector<JsonDbFactory> {
    let processor = fx.processor.clone();
    SnapshotDirector::install(
        &scheduler.actor("snapshot-director"),
        PartitionId(1),
        mode,
        Arc::clone(&fx.controller),
        move || processor.last_processed_position(),
        Duration::from_secs(3600),
    )
}

async fn wait_for_latest(store: &SnapshotStore) -> tug_storage::PersistedSnapshot {
    for _ in 0..100 {
        if let Some(latest) = store.latest() {
            return latest;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no snapshot was persisted");
}

#[tokio::test]
async fn nothing_processed_skips_the_attempt() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    let director = director(&scheduler, &fx, SnapshotDirectorMode::Replay);

    assert_eq!(director.take_snapshot().await.unwrap(), SnapshotOutcome::Skipped);
    assert!(fx.store.latest().is_none());
}

#[tokio::test]
async fn replay_mode_persists_immediately() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    let db = fx.controller.open_db().await.unwrap();
    db.put("x", b"1").unwrap();
    fx.processor.record_processed(3);

    let director = director(&scheduler, &fx, SnapshotDirectorMode::Replay);
    let outcome = director.take_snapshot().await.unwrap();

    let SnapshotOutcome::Persisted(id) = outcome else {
        panic!("expected Persisted, got {outcome:?}");
    };
    assert_eq!(id.processed_position, 3);
    assert_eq!(fx.store.latest().unwrap().id(), &id);
}

#[tokio::test]
async fn processing_mode_waits_for_the_commit_index() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    fx.processor.record_processed(3);

    let director = director(&scheduler, &fx, SnapshotDirectorMode::Processing);
    let outcome = director.take_snapshot().await.unwrap();

    let SnapshotOutcome::AwaitingCommit(id) = outcome else {
        panic!("expected AwaitingCommit, got {outcome:?}");
    };
    assert!(fx.store.latest().is_none(), "snapshot must not publish before commit");

    // Commit progress below the snapshot index changes nothing.
    director.on_committed_entry(tug_core::IndexedEntry::new(id.index - 1, 1));
    assert!(director.persist_ready().await.is_none());

    // Commit past the index publishes it.
    director.on_committed_entry(tug_core::IndexedEntry::new(id.index, 1));
    let latest = wait_for_latest(&fx.store).await;
    assert_eq!(latest.id(), &id);
}

#[tokio::test]
async fn commit_progress_seen_before_the_attempt_skips_the_gate() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    fx.processor.record_processed(3);

    let director = director(&scheduler, &fx, SnapshotDirectorMode::Processing);
    director.on_committed_entry(tug_core::IndexedEntry::new(500, 1));

    let outcome = director.take_snapshot().await.unwrap();
    assert!(matches!(outcome, SnapshotOutcome::Persisted(_)), "got {outcome:?}");
}

#[tokio::test]
async fn newer_pending_snapshot_supersedes_the_old_one() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    fx.processor.record_processed(3);

    let director = director(&scheduler, &fx, SnapshotDirectorMode::Processing);
    director.take_snapshot().await.unwrap();

    fx.processor.record_processed(7);
    director.take_snapshot().await.unwrap();

    // Only the newer pending construction remains on disk.
    let pending: Vec<_> = std::fs::read_dir(fx.store.root().join("pending"))
        .unwrap()
        .collect();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn closed_director_skips_and_aborts_its_pending_snapshot() {
    let scheduler = ActorScheduler::new();
    let fx = fixture(&scheduler);
    fx.controller.open_db().await.unwrap();
    fx.processor.record_processed(3);

    let director = director(&scheduler, &fx, SnapshotDirectorMode::Processing);
    director.take_snapshot().await.unwrap();
    director.close().await;

    assert_eq!(
        std::fs::read_dir(fx.store.root().join("pending")).unwrap().count(),
        0
    );
    assert_eq!(director.take_snapshot().await.unwrap(), SnapshotOutcome::Skipped);
}

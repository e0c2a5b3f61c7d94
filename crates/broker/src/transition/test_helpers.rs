// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for transition tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tug_actor::ActorScheduler;
use tug_core::{IndexedEntry, PartitionId};
use tug_storage::{JsonDbFactory, SnapshotStore, StateController};

use crate::health::HealthMonitor;
use crate::services::ExporterDirector;
use crate::test_support::{FakeRaft, RecordingCompactor};
use crate::transition::TransitionContext;

pub(crate) struct TransitionFixture {
    // NOTE(lifetime): keeps the on-disk fixture alive for the test
    #[allow(dead_code)]
    pub root: TempDir,
    pub ctx: TransitionContext<JsonDbFactory>,
    pub raft: FakeRaft,
    pub compactor: Arc<RecordingCompactor>,
    pub store: SnapshotStore,
}

/// A context over a JsonDb partition with an entry supplier covering all
/// non-negative positions (index = position + 100, term 1).
pub(crate) fn transition_fixture(scheduler: &ActorScheduler) -> TransitionFixture {
    let root = tempfile::tempdir().unwrap();
    let partition_id = PartitionId(1);
    let raft = FakeRaft::new();
    let compactor = Arc::new(RecordingCompactor::default());
    let store = SnapshotStore::open(&root.path().join("snapshots")).unwrap();

    let controller = Arc::new(StateController::new(
        scheduler.actor("state-controller"),
        root.path().join("runtime"),
        store.clone(),
        JsonDbFactory::new(),
        Arc::new(|position| {
            (position >= 0).then(|| IndexedEntry::new(position as u64 + 100, 1))
        }),
        Arc::new(ExporterDirector::<tug_storage::JsonDb>::read_position),
    ));

    let ctx = TransitionContext::new(
        partition_id,
        scheduler.actor("partition-1"),
        Arc::new(raft.clone()),
        controller,
        HealthMonitor::new("partition-1"),
        compactor.clone(),
        Duration::from_secs(3600),
    );

    TransitionFixture { root, ctx, raft, compactor, store }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::path::Path;
use tempfile::tempdir;
use tug_storage::SnapshotStore;

#[derive(Default)]
struct RecordingCompactor {
    bounds: Mutex<Vec<u64>>,
}

impl LogCompactor for RecordingCompactor {
    fn compact(&self, bound: u64) {
        self.bounds.lock().push(bound);
    }
}

async fn persist_at(store: &SnapshotStore, processed: i64, exported: i64) {
    let mut transient = store
        .new_transient(10, 1, processed, exported)
        .unwrap()
        .unwrap();
    let written = transient
        .take(|dir: &Path| {
            std::fs::write(dir.join("state.json"), b"{}")?;
            Ok::<_, std::io::Error>(true)
        })
        .await
        .unwrap();
    assert!(written);
    transient.persist().await.unwrap();
}

#[tokio::test]
async fn each_persisted_snapshot_compacts_to_its_bound() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    let compactor = Arc::new(RecordingCompactor::default());

    let service = LogDeletionService::new(tug_core::PartitionId(1), compactor.clone());
    service.attach(&store);

    persist_at(&store, 2, 5).await;
    persist_at(&store, 7, 6).await;

    assert_eq!(*compactor.bounds.lock(), vec![2, 6]);
}

#[tokio::test]
async fn dropping_the_service_detaches_the_listener() {
    let root = tempdir().unwrap();
    let store = SnapshotStore::open(root.path()).unwrap();
    let compactor = Arc::new(RecordingCompactor::default());

    let service = LogDeletionService::new(tug_core::PartitionId(1), compactor.clone());
    service.attach(&store);
    drop(service);

    persist_at(&store, 3, 3).await;
    assert!(compactor.bounds.lock().is_empty());
}

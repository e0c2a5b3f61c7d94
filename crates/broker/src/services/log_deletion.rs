// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log deletion service.
//!
//! Every persisted snapshot raises the partition's compaction bound; the
//! log below it is no longer needed for recovery. This service bridges
//! snapshot-persist events to the log's compactor. The store listener
//! holds only a weak handle, so dropping the service detaches it without
//! the store having to support listener removal.

use std::sync::{Arc, Weak};

use tug_core::PartitionId;
use tug_storage::SnapshotStore;

/// Consumed interface of the consensus log's compaction side.
pub trait LogCompactor: Send + Sync + 'static {
    /// Delete log entries below `bound`. Keeping more than asked is
    /// always safe.
    fn compact(&self, bound: u64);
}

struct DeletionInner {
    partition_id: PartitionId,
    compactor: Arc<dyn LogCompactor>,
}

/// Compacts the log as snapshots advance the compaction bound.
pub struct LogDeletionService {
    inner: Arc<DeletionInner>,
}

impl LogDeletionService {
    pub fn new(partition_id: PartitionId, compactor: Arc<dyn LogCompactor>) -> Self {
        Self { inner: Arc::new(DeletionInner { partition_id, compactor }) }
    }

    /// Subscribe to the store's persist events. The subscription dies
    /// with this service.
    pub fn attach(&self, store: &SnapshotStore) {
        let weak: Weak<DeletionInner> = Arc::downgrade(&self.inner);
        store.add_persist_listener(move |snapshot| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tracing::debug!(
                partition_id = %inner.partition_id,
                snapshot = %snapshot.id(),
                bound = snapshot.compaction_bound(),
                "compacting log below snapshot"
            );
            inner.compactor.compact(snapshot.compaction_bound());
        });
    }
}

#[cfg(test)]
#[path = "log_deletion_tests.rs"]
mod tests;

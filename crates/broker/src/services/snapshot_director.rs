// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot director.
//!
//! Periodically turns the running database into a persisted snapshot.
//! In processing mode (leader) a finished snapshot is only published
//! once the consensus log has committed past its index, so a snapshot
//! can never describe state the cluster might still roll back; in
//! replay mode (follower) everything applied is already committed and
//! snapshots publish immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tug_actor::{Actor, TimerHandle};
use tug_core::{IndexedEntry, PartitionId};
use tug_storage::{
    DbFactory, SnapshotId, StateController, StateControllerError, TransientSnapshot,
};

/// Publication policy for finished snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDirectorMode {
    /// Leader: hold snapshots until the log commits past their index.
    Processing,
    /// Follower: publish as soon as written.
    Replay,
}

/// What one snapshot attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Written and published.
    Persisted(SnapshotId),
    /// Written; waiting for the commit position to catch up.
    AwaitingCommit(SnapshotId),
    /// Nothing to snapshot, or the store refused.
    Skipped,
}

struct DirectorState {
    commit_index: u64,
    pending: Option<TransientSnapshot>,
    closed: bool,
}

struct DirectorInner<F: DbFactory> {
    partition_id: PartitionId,
    mode: SnapshotDirectorMode,
    controller: Arc<StateController<F>>,
    lower_bound: Box<dyn Fn() -> tug_core::Position + Send + Sync>,
    state: Mutex<DirectorState>,
    timer: Mutex<Option<TimerHandle>>,
}

/// Drives the periodic snapshot loop for one partition.
pub struct SnapshotDirector<F: DbFactory> {
    inner: Arc<DirectorInner<F>>,
}

impl<F: DbFactory> Clone for SnapshotDirector<F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<F: DbFactory> SnapshotDirector<F> {
    /// Create the director and schedule it on `actor` every `period`.
    ///
    /// `lower_bound` supplies the stream processor's last processed
    /// position at the moment a snapshot is attempted.
    pub fn install<L>(
        actor: &Actor,
        partition_id: PartitionId,
        mode: SnapshotDirectorMode,
        controller: Arc<StateController<F>>,
        lower_bound: L,
        period: Duration,
    ) -> Self
    where
        L: Fn() -> tug_core::Position + Send + Sync + 'static,
    {
        let director = Self {
            inner: Arc::new(DirectorInner {
                partition_id,
                mode,
                controller,
                lower_bound: Box::new(lower_bound),
                state: Mutex::new(DirectorState { commit_index: 0, pending: None, closed: false }),
                timer: Mutex::new(None),
            }),
        };

        let on_tick = director.clone();
        let timer = actor.run_at_fixed_rate(period, move || {
            let director = on_tick.clone();
            tokio::spawn(async move {
                match director.take_snapshot().await {
                    Ok(outcome) => tracing::debug!(
                        partition_id = %director.inner.partition_id,
                        ?outcome,
                        "periodic snapshot attempt"
                    ),
                    Err(e) => tracing::error!(
                        partition_id = %director.inner.partition_id,
                        error = %e,
                        "periodic snapshot failed"
                    ),
                }
            });
        });
        *director.inner.timer.lock() = Some(timer);

        tracing::info!(
            partition_id = %partition_id,
            ?mode,
            period_secs = period.as_secs(),
            "snapshot director installed"
        );
        director
    }

    pub fn mode(&self) -> SnapshotDirectorMode {
        self.inner.mode
    }

    /// Attempt one snapshot now.
    pub async fn take_snapshot(&self) -> Result<SnapshotOutcome, StateControllerError> {
        if self.inner.state.lock().closed {
            return Ok(SnapshotOutcome::Skipped);
        }

        let lower_bound = (self.inner.lower_bound)();
        if lower_bound < 0 {
            tracing::debug!(
                partition_id = %self.inner.partition_id,
                "nothing processed yet; skipping snapshot"
            );
            return Ok(SnapshotOutcome::Skipped);
        }

        let Some(transient) = self.inner.controller.take_transient_snapshot(lower_bound).await?
        else {
            return Ok(SnapshotOutcome::Skipped);
        };
        let id = *transient.id();

        let gated = self.inner.mode == SnapshotDirectorMode::Processing
            && self.inner.state.lock().commit_index < id.index;
        if gated {
            let superseded = {
                let mut state = self.inner.state.lock();
                state.pending.replace(transient)
            };
            if let Some(old) = superseded {
                tracing::debug!(snapshot = %old.id(), "newer snapshot supersedes pending one");
                if let Err(e) = old.abort().await {
                    tracing::warn!(error = %e, "failed to abort superseded snapshot");
                }
            }
            tracing::info!(
                partition_id = %self.inner.partition_id,
                snapshot = %id,
                "snapshot written; awaiting commit"
            );
            return Ok(SnapshotOutcome::AwaitingCommit(id));
        }

        let persisted = transient.persist().await?;
        Ok(SnapshotOutcome::Persisted(*persisted.id()))
    }

    /// Commit progress from the consensus log. Processing mode only; a
    /// pending snapshot is published once the commit index reaches it.
    pub fn on_committed_entry(&self, entry: IndexedEntry) {
        let ready = {
            let mut state = self.inner.state.lock();
            state.commit_index = state.commit_index.max(entry.index);
            state
                .pending
                .as_ref()
                .is_some_and(|pending| pending.id().index <= state.commit_index)
        };
        if !ready {
            return;
        }
        let director = self.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                director.persist_ready().await;
            });
        }
    }

    /// Publish the pending snapshot if the commit index has caught up.
    pub async fn persist_ready(&self) -> Option<SnapshotId> {
        let transient = {
            let mut state = self.inner.state.lock();
            let satisfied = state
                .pending
                .as_ref()
                .is_some_and(|pending| pending.id().index <= state.commit_index);
            if !satisfied {
                return None;
            }
            state.pending.take()
        }?;

        match transient.persist().await {
            Ok(persisted) => {
                tracing::info!(
                    partition_id = %self.inner.partition_id,
                    snapshot = %persisted.id(),
                    "committed snapshot persisted"
                );
                Some(*persisted.id())
            }
            Err(e) => {
                tracing::error!(
                    partition_id = %self.inner.partition_id,
                    error = %e,
                    "failed to persist committed snapshot"
                );
                None
            }
        }
    }

    /// Stop the periodic schedule and abandon any pending snapshot.
    pub async fn close(&self) {
        if let Some(timer) = self.inner.timer.lock().take() {
            timer.cancel();
        }
        let pending = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.pending.take()
        };
        if let Some(pending) = pending {
            if let Err(e) = pending.abort().await {
                tracing::warn!(error = %e, "failed to abort pending snapshot on close");
            }
        }
        tracing::debug!(partition_id = %self.inner.partition_id, "snapshot director closed");
    }
}

#[cfg(test)]
#[path = "snapshot_director_tests.rs"]
mod tests;

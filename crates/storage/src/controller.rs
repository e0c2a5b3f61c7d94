// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State controller: the partition's local database lifecycle.
//!
//! Owns the runtime directory, opens and closes the database in it,
//! restores it from the latest persisted snapshot, and drives the
//! transient-to-persisted snapshot handshake. Every decision runs on the
//! controller's actor; only the bulk filesystem work (snapshot writes,
//! copies) runs on blocking workers.
//!
//! `recover` restores the on-disk image but does not open it — opening
//! is its own step, so corruption in a restored snapshot surfaces as an
//! `open_db` failure that callers can answer by probing the store.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tug_actor::{Actor, ActorError};
use tug_core::{IndexedEntry, Position};

use crate::db::{DbError, DbFactory, StateDb};
use crate::snapshot::{PersistedSnapshot, SnapshotStore, SnapshotStoreError, TransientSnapshot};

/// Resolves a log-stream position to the consensus log entry covering it.
pub type EntrySupplier = Arc<dyn Fn(Position) -> Option<IndexedEntry> + Send + Sync>;

/// Reads the exporter pipeline's lowest externalized position from the
/// database.
pub type ExporterPositionFn<Db> = Arc<dyn Fn(&Db) -> Position + Send + Sync>;

/// Errors raised by the state controller.
#[derive(Debug, Error)]
pub enum StateControllerError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Store(#[from] SnapshotStoreError),

    #[error("no indexed entry at position {position}; snapshot bound cannot be reconciled with the log")]
    PositionNotInLog { position: Position },

    #[error("state controller is closed")]
    Closed,

    #[error("state worker failed: {0}")]
    Worker(String),
}

impl From<ActorError> for StateControllerError {
    fn from(_: ActorError) -> Self {
        StateControllerError::Closed
    }
}

struct ControllerState<Db> {
    db: Option<Db>,
    snapshot_in_flight: bool,
}

struct Shared<F: DbFactory> {
    runtime_dir: PathBuf,
    store: SnapshotStore,
    factory: F,
    entry_supplier: EntrySupplier,
    exporter_position: ExporterPositionFn<F::Db>,
    state: Mutex<ControllerState<F::Db>>,
}

/// Coordinates a partition's runtime database and its snapshot store.
pub struct StateController<F: DbFactory> {
    actor: Actor,
    shared: Arc<Shared<F>>,
}

impl<F: DbFactory> StateController<F> {
    pub fn new(
        actor: Actor,
        runtime_dir: PathBuf,
        store: SnapshotStore,
        factory: F,
        entry_supplier: EntrySupplier,
        exporter_position: ExporterPositionFn<F::Db>,
    ) -> Self {
        Self {
            actor,
            shared: Arc::new(Shared {
                runtime_dir,
                store,
                factory,
                entry_supplier,
                exporter_position,
                state: Mutex::new(ControllerState { db: None, snapshot_in_flight: false }),
            }),
        }
    }

    /// Open the database in the runtime directory, creating it when
    /// absent. Returns the existing handle if already open.
    pub async fn open_db(&self) -> Result<F::Db, StateControllerError> {
        let shared = Arc::clone(&self.shared);
        self.actor
            .submit(move || -> Result<F::Db, StateControllerError> {
                let mut state = shared.state.lock();
                if let Some(db) = &state.db {
                    return Ok(db.clone());
                }
                let db = shared.factory.open(&shared.runtime_dir)?;
                state.db = Some(db.clone());
                tracing::info!(dir = %shared.runtime_dir.display(), "opened runtime database");
                Ok(db)
            })
            .await?
    }

    /// Close the database handle and delete the runtime directory.
    /// Deletion is best-effort; a leftover directory is replaced on the
    /// next `recover`.
    pub async fn close_db(&self) -> Result<(), StateControllerError> {
        let shared = Arc::clone(&self.shared);
        self.actor
            .submit(move || {
                if shared.state.lock().db.take().is_some() {
                    tracing::info!("closed runtime database");
                }
                if shared.runtime_dir.exists() {
                    if let Err(e) = std::fs::remove_dir_all(&shared.runtime_dir) {
                        tracing::warn!(
                            dir = %shared.runtime_dir.display(),
                            error = %e,
                            "failed to delete runtime directory"
                        );
                    }
                }
            })
            .await?;
        Ok(())
    }

    /// Replace the runtime directory with the latest persisted snapshot.
    ///
    /// The database is left closed; callers open it as their next step.
    /// Returns the snapshot that was restored, `None` when the store is
    /// empty (the runtime directory is then simply gone).
    pub async fn recover(&self) -> Result<Option<PersistedSnapshot>, StateControllerError> {
        let shared = Arc::clone(&self.shared);
        self.actor
            .submit(move || {
                shared.state.lock().db = None;
            })
            .await?;

        let shared = Arc::clone(&self.shared);
        let latest = tokio::task::spawn_blocking(
            move || -> Result<Option<PersistedSnapshot>, StateControllerError> {
                if shared.runtime_dir.exists() {
                    std::fs::remove_dir_all(&shared.runtime_dir)?;
                }
                Ok(shared.store.latest())
            },
        )
        .await
        .map_err(|e| StateControllerError::Worker(e.to_string()))??;

        let Some(snapshot) = latest else {
            tracing::info!("no persisted snapshot; runtime directory left empty");
            return Ok(None);
        };

        // One local retry on a failed copy, then surface it: a runtime
        // directory with half a snapshot in it must not be opened.
        if let Err(first) = self.shared.store.copy(&snapshot, &self.shared.runtime_dir).await {
            tracing::warn!(
                snapshot = %snapshot.id(),
                error = %first,
                "snapshot copy failed; retrying"
            );
            if self.shared.runtime_dir.exists() {
                std::fs::remove_dir_all(&self.shared.runtime_dir)?;
            }
            self.shared.store.copy(&snapshot, &self.shared.runtime_dir).await?;
        }

        tracing::info!(snapshot = %snapshot.id(), "restored runtime directory from snapshot");
        Ok(Some(snapshot))
    }

    /// Begin constructing a snapshot whose compaction bound is at most
    /// `lower_bound`.
    ///
    /// Resolves `None` when the database is closed, a construction is
    /// already in flight, the store refuses the coordinates, or the
    /// database declines the write. Fails when the computed snapshot
    /// position has no covering log entry.
    pub async fn take_transient_snapshot(
        &self,
        lower_bound: Position,
    ) -> Result<Option<TransientSnapshot>, StateControllerError> {
        let shared = Arc::clone(&self.shared);
        let prepared = self
            .actor
            .submit(move || Self::prepare_transient(&shared, lower_bound))
            .await??;

        let Some((mut transient, db)) = prepared else {
            return Ok(None);
        };

        let result = transient.take(move |dir| db.create_snapshot(dir).map(|()| true)).await;

        // Clear the in-flight guard whatever the outcome was.
        let shared = Arc::clone(&self.shared);
        let _ = self
            .actor
            .submit(move || {
                shared.state.lock().snapshot_in_flight = false;
            })
            .await;

        match result {
            Ok(true) => Ok(Some(transient)),
            Ok(false) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Steps 1-4 of the snapshot flow; runs as a single actor task.
    #[allow(clippy::type_complexity)]
    fn prepare_transient(
        shared: &Shared<F>,
        lower_bound: Position,
    ) -> Result<Option<(TransientSnapshot, F::Db)>, StateControllerError> {
        let mut state = shared.state.lock();
        let Some(db) = state.db.clone() else {
            tracing::warn!("snapshot requested but the database is closed");
            return Ok(None);
        };
        if state.snapshot_in_flight {
            tracing::warn!("snapshot construction already in flight; ignoring request");
            return Ok(None);
        }

        let exported = (shared.exporter_position)(&db);
        let snapshot_position = lower_bound.min(exported);
        let Some(entry) = (shared.entry_supplier)(snapshot_position) else {
            tracing::error!(
                snapshot_position,
                lower_bound,
                exported,
                "no indexed entry at snapshot position"
            );
            return Err(StateControllerError::PositionNotInLog { position: snapshot_position });
        };

        let Some(transient) =
            shared.store.new_transient(entry.index, entry.term, lower_bound, exported)?
        else {
            return Ok(None);
        };

        tracing::debug!(
            snapshot = %transient.id(),
            index = entry.index,
            term = entry.term,
            "reserved transient snapshot"
        );
        state.snapshot_in_flight = true;
        Ok(Some((transient, db)))
    }

    /// Whether the runtime database is currently open.
    pub fn is_db_opened(&self) -> bool {
        self.shared.state.lock().db.is_some()
    }

    /// How many persisted snapshots currently verify.
    pub async fn valid_snapshot_count(&self) -> Result<usize, StateControllerError> {
        Ok(self.shared.store.valid_snapshot_count().await?)
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.shared.store
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

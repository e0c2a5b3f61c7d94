// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store of immutable, content-addressed snapshots.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tug_core::Position;

use crate::checksum::{self, ChecksumError};
use crate::snapshot::SnapshotId;

const PENDING_DIR: &str = "pending";
const SNAPSHOTS_DIR: &str = "snapshots";
const LOCK_FILE: &str = "store.lock";
const METADATA_FILE: &str = "metadata.json";

/// Current snapshot metadata schema version
const CURRENT_METADATA_VERSION: u32 = 1;

/// Errors raised by the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("snapshot store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot store at {0} is locked by another process")]
    Locked(PathBuf),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot write failed: {0}")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("pending snapshot {0} failed checksum verification")]
    CorruptPending(SnapshotId),

    #[error("snapshot {0} was never written; nothing to persist")]
    NotWritten(SnapshotId),

    #[error("snapshot worker failed: {0}")]
    Worker(String),
}

/// Descriptor of snapshot contents, written next to the raw database
/// files and covered by the checksum.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMetadata {
    /// Schema version for migrations
    #[serde(rename = "v")]
    version: u32,
    id: SnapshotId,
    created_at: DateTime<Utc>,
}

type PersistListener = Box<dyn Fn(&PersistedSnapshot) + Send + Sync>;

#[derive(Debug)]
struct StoreState {
    /// Every snapshot currently present under `snapshots/`.
    persisted: BTreeSet<SnapshotId>,
    /// Snapshots that failed checksum verification since open.
    invalid: HashSet<SnapshotId>,
    /// Next ordinal to hand out; strictly above every ordinal ever seen.
    next_ordinal: u64,
}

struct StoreInner {
    root: PathBuf,
    pending_dir: PathBuf,
    snapshots_dir: PathBuf,
    // NOTE(lifetime): held to keep the exclusive store lock; released on drop
    #[allow(dead_code)]
    lock_file: std::fs::File,
    state: Mutex<StoreState>,
    listeners: Mutex<Vec<PersistListener>>,
}

impl std::fmt::Debug for StoreInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInner")
            .field("root", &self.root)
            .field("pending_dir", &self.pending_dir)
            .field("snapshots_dir", &self.snapshots_dir)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Persistent directory of immutable, named snapshots.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl SnapshotStore {
    /// Open (or initialize) the store rooted at `root`.
    ///
    /// Takes an exclusive lock on the root, deletes leftover pending
    /// directories from a previous crash, and indexes the persisted
    /// snapshots by name.
    pub fn open(root: &Path) -> Result<Self, SnapshotStoreError> {
        let pending_dir = root.join(PENDING_DIR);
        let snapshots_dir = root.join(SNAPSHOTS_DIR);
        std::fs::create_dir_all(&pending_dir)?;
        std::fs::create_dir_all(&snapshots_dir)?;

        let lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| SnapshotStoreError::Locked(root.to_path_buf()))?;

        // A pending directory that survived a restart belongs to a
        // construction that will never finish.
        for entry in std::fs::read_dir(&pending_dir)? {
            let path = entry?.path();
            tracing::debug!(path = %path.display(), "removing stale pending snapshot");
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }

        let mut persisted = BTreeSet::new();
        let mut next_ordinal = 0;
        for entry in std::fs::read_dir(&snapshots_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_string_lossy().parse::<SnapshotId>() {
                Ok(id) => {
                    next_ordinal = next_ordinal.max(id.ordinal + 1);
                    persisted.insert(id);
                }
                Err(e) => {
                    tracing::warn!(
                        name = %name.to_string_lossy(),
                        error = %e,
                        "ignoring unrecognized entry in snapshot directory"
                    );
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            snapshots = persisted.len(),
            next_ordinal,
            "opened snapshot store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                root: root.to_path_buf(),
                pending_dir,
                snapshots_dir,
                lock_file,
                state: Mutex::new(StoreState { persisted, invalid: HashSet::new(), next_ordinal }),
                listeners: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// The largest snapshot that still verifies, by name order.
    pub fn latest(&self) -> Option<PersistedSnapshot> {
        let state = self.inner.state.lock();
        self.latest_locked(&state)
    }

    fn latest_locked(&self, state: &StoreState) -> Option<PersistedSnapshot> {
        state
            .persisted
            .iter()
            .rev()
            .find(|id| !state.invalid.contains(id))
            .map(|id| self.persisted_snapshot(*id))
    }

    fn persisted_snapshot(&self, id: SnapshotId) -> PersistedSnapshot {
        PersistedSnapshot { path: self.inner.snapshots_dir.join(id.to_string()), id }
    }

    /// Reserve a pending directory for a snapshot at the given
    /// coordinates.
    ///
    /// Returns `Ok(None)` when such a snapshot could not advance the
    /// compaction bound beyond the latest persisted one — that is, when
    /// its identity would sort strictly below the latest or its bound
    /// would regress. A request at unchanged positions is allowed and
    /// receives a fresh, larger ordinal.
    pub fn new_transient(
        &self,
        index: u64,
        term: u64,
        processed_position: Position,
        exported_position: Position,
    ) -> Result<Option<TransientSnapshot>, SnapshotStoreError> {
        let (processed, exported) = match (u64::try_from(processed_position), u64::try_from(exported_position)) {
            (Ok(p), Ok(e)) => (p, e),
            _ => {
                tracing::warn!(
                    processed_position,
                    exported_position,
                    "refusing snapshot at negative position"
                );
                return Ok(None);
            }
        };

        let id = {
            let mut state = self.inner.state.lock();
            if let Some(latest) = self.latest_locked(&state) {
                let candidate = SnapshotId::new(processed, exported, index, term, 0);
                if candidate.compaction_bound() < latest.id.compaction_bound()
                    || candidate.prefix() < latest.id.prefix()
                {
                    tracing::debug!(
                        latest = %latest.id,
                        candidate = %candidate,
                        "refusing snapshot that cannot advance past the latest"
                    );
                    return Ok(None);
                }
            }
            let ordinal = state.next_ordinal;
            state.next_ordinal += 1;
            SnapshotId::new(processed, exported, index, term, ordinal)
        };

        let dir = self.inner.pending_dir.join(id.to_string());
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(snapshot = %id, "reserved pending snapshot");
        Ok(Some(TransientSnapshot { id, dir, store: self.clone(), written: false }))
    }

    /// Byte-for-byte copy of a persisted snapshot into `dst`.
    pub async fn copy(
        &self,
        snapshot: &PersistedSnapshot,
        dst: &Path,
    ) -> Result<(), SnapshotStoreError> {
        let src = snapshot.path.clone();
        let dst = dst.to_path_buf();
        run_blocking(move || copy_dir(&src, &dst).map_err(SnapshotStoreError::Io)).await
    }

    /// Re-verify every persisted snapshot and report how many are
    /// currently readable. Failures are remembered so `latest()` skips
    /// them.
    pub async fn valid_snapshot_count(&self) -> Result<usize, SnapshotStoreError> {
        let store = self.clone();
        run_blocking(move || store.verify_all()).await
    }

    fn verify_all(&self) -> Result<usize, SnapshotStoreError> {
        let ids: Vec<SnapshotId> = self.inner.state.lock().persisted.iter().copied().collect();
        let mut valid = 0;
        for id in ids {
            if checksum::verify(&self.inner.snapshots_dir.join(id.to_string()))? {
                valid += 1;
            } else {
                tracing::warn!(snapshot = %id, "snapshot failed checksum verification");
                self.inner.state.lock().invalid.insert(id);
            }
        }
        Ok(valid)
    }

    /// Register a callback invoked for every newly persisted snapshot.
    pub fn add_persist_listener<F>(&self, listener: F)
    where
        F: Fn(&PersistedSnapshot) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().push(Box::new(listener));
    }

    fn persist_pending(
        &self,
        id: SnapshotId,
        pending: &Path,
    ) -> Result<PersistedSnapshot, SnapshotStoreError> {
        if !checksum::verify(pending)? {
            return Err(SnapshotStoreError::CorruptPending(id));
        }

        let target = self.inner.snapshots_dir.join(id.to_string());
        std::fs::rename(pending, &target)?;

        let older: Vec<SnapshotId> = {
            let mut state = self.inner.state.lock();
            let older = state.persisted.range(..id).copied().collect();
            state.persisted.insert(id);
            for old in &older {
                state.persisted.remove(old);
                state.invalid.remove(old);
            }
            older
        };
        for old in older {
            let path = self.inner.snapshots_dir.join(old.to_string());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(snapshot = %old, error = %e, "failed to delete superseded snapshot");
            }
        }

        let persisted = self.persisted_snapshot(id);
        for listener in self.inner.listeners.lock().iter() {
            listener(&persisted);
        }
        tracing::info!(
            snapshot = %id,
            compaction_bound = id.compaction_bound(),
            "snapshot persisted"
        );
        Ok(persisted)
    }
}

/// A snapshot under construction in the store's pending area.
///
/// Move-only: persisting consumes the handle, so a snapshot cannot be
/// persisted twice or touched afterwards.
#[derive(Debug)]
pub struct TransientSnapshot {
    id: SnapshotId,
    dir: PathBuf,
    store: SnapshotStore,
    written: bool,
}

impl TransientSnapshot {
    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    /// Fill the pending directory on a worker thread.
    ///
    /// `write` returns `true` when it produced a complete snapshot, in
    /// which case metadata and checksum files are added alongside.
    /// `false` discards the reservation and deletes the directory.
    pub async fn take<F, E>(&mut self, write: F) -> Result<bool, SnapshotStoreError>
    where
        F: FnOnce(&Path) -> Result<bool, E> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let id = self.id;
        let dir = self.dir.clone();
        let written = run_blocking(move || match write(&dir) {
            Ok(true) => {
                let metadata = SnapshotMetadata {
                    version: CURRENT_METADATA_VERSION,
                    id,
                    created_at: Utc::now(),
                };
                std::fs::write(dir.join(METADATA_FILE), serde_json::to_vec_pretty(&metadata)?)?;
                checksum::write(&dir)?;
                Ok(true)
            }
            Ok(false) => {
                tracing::debug!(snapshot = %id, "snapshot writer declined; discarding");
                std::fs::remove_dir_all(&dir)?;
                Ok(false)
            }
            Err(e) => Err(SnapshotStoreError::Write(Box::new(e))),
        })
        .await?;
        self.written = written;
        Ok(written)
    }

    /// Atomically publish this snapshot, superseding all older ones.
    pub async fn persist(self) -> Result<PersistedSnapshot, SnapshotStoreError> {
        if !self.written {
            return Err(SnapshotStoreError::NotWritten(self.id));
        }
        let store = self.store.clone();
        let id = self.id;
        let pending = self.dir.clone();
        run_blocking(move || store.persist_pending(id, &pending)).await
    }

    /// Abandon the construction and delete the pending directory.
    pub async fn abort(self) -> Result<(), SnapshotStoreError> {
        let dir = self.dir.clone();
        let id = self.id;
        run_blocking(move || {
            tracing::debug!(snapshot = %id, "aborting pending snapshot");
            std::fs::remove_dir_all(&dir).map_err(SnapshotStoreError::Io)
        })
        .await
    }
}

/// An immutable, published snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSnapshot {
    id: SnapshotId,
    path: PathBuf,
}

impl PersistedSnapshot {
    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compaction_bound(&self) -> u64 {
        self.id.compaction_bound()
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, SnapshotStoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SnapshotStoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SnapshotStoreError::Worker(e.to_string()))?
}

fn copy_dir(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

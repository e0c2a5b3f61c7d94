// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State database abstraction.
//!
//! The state machine sees a key-value store opened from a runtime
//! directory. The snapshot subsystem only needs `create_snapshot`; the
//! rest of the surface exists so the engine (and the tests) can read and
//! write state. `JsonDb` is the embedded engine: an ordered in-memory
//! map persisted as a single JSON file, written through on every
//! mutation. A production column-store engine would implement the same
//! pair of traits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a state database.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt database image at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// A partition's key-value state store.
///
/// Handles are cheap clones of one underlying database; all clones see
/// the same data. `create_snapshot` must produce a consistent image even
/// while other handles keep writing — the caller runs it on a worker
/// thread.
pub trait StateDb: Clone + Send + Sync + 'static {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), DbError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError>;
    fn delete(&self, key: &str) -> Result<(), DbError>;

    /// Write a consistent copy of the database into `dir`.
    fn create_snapshot(&self, dir: &Path) -> Result<(), DbError>;
}

/// Opens databases in runtime directories.
pub trait DbFactory: Send + Sync + 'static {
    type Db: StateDb;

    /// Open the database in `dir`, creating it when absent. Fails when
    /// an existing on-disk image cannot be read back.
    fn open(&self, dir: &Path) -> Result<Self::Db, DbError>;
}

const DATA_FILE: &str = "state.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Image {
    entries: BTreeMap<String, Vec<u8>>,
}

/// Embedded JSON-backed state database.
#[derive(Debug, Clone)]
pub struct JsonDb {
    inner: Arc<JsonDbInner>,
}

#[derive(Debug)]
struct JsonDbInner {
    data_path: PathBuf,
    image: Mutex<Image>,
}

impl JsonDb {
    fn open(dir: &Path) -> Result<Self, DbError> {
        std::fs::create_dir_all(dir)?;
        let data_path = dir.join(DATA_FILE);
        let image = if data_path.exists() {
            let raw = std::fs::read(&data_path)?;
            serde_json::from_slice(&raw).map_err(|e| DbError::Corrupt {
                path: data_path.clone(),
                reason: e.to_string(),
            })?
        } else {
            Image::default()
        };
        Ok(Self { inner: Arc::new(JsonDbInner { data_path, image: Mutex::new(image) }) })
    }

    /// Serialize the image under the lock and write it via temp file +
    /// rename, so readers never observe a torn file.
    fn persist_locked(&self, image: &Image, target: &Path) -> Result<(), DbError> {
        let raw = match serde_json::to_vec_pretty(image) {
            Ok(raw) => raw,
            Err(e) => {
                return Err(DbError::Corrupt {
                    path: target.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        let tmp = target.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, target)?;
        Ok(())
    }
}

impl StateDb for JsonDb {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        let mut image = self.inner.image.lock();
        image.entries.insert(key.to_string(), value.to_vec());
        self.persist_locked(&image, &self.inner.data_path)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        Ok(self.inner.image.lock().entries.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        let mut image = self.inner.image.lock();
        image.entries.remove(key);
        self.persist_locked(&image, &self.inner.data_path)
    }

    fn create_snapshot(&self, dir: &Path) -> Result<(), DbError> {
        std::fs::create_dir_all(dir)?;
        // Holding the lock for the duration makes the copy consistent.
        let image = self.inner.image.lock();
        self.persist_locked(&image, &dir.join(DATA_FILE))
    }
}

/// Factory for [`JsonDb`] instances.
#[derive(Debug, Default, Clone)]
pub struct JsonDbFactory;

impl JsonDbFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DbFactory for JsonDbFactory {
    type Db = JsonDb;

    fn open(&self, dir: &Path) -> Result<JsonDb, DbError> {
        JsonDb::open(dir)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;

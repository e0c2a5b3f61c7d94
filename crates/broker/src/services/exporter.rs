// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exporter director.
//!
//! Tracks how far the exporter pipeline has externalized the log. The
//! acknowledged position lives in the state database under a well-known
//! key so it survives fail-over inside snapshots; the state controller
//! reads it back when computing a snapshot's compaction bound.

use std::sync::Arc;

use parking_lot::Mutex;
use tug_core::{PartitionId, Position};
use tug_storage::{DbError, StateDb};

/// Database key holding the lowest exported position.
pub const EXPORTER_POSITION_KEY: &str = "exporter.position";

/// Whether this node's exporters actually ship records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterMode {
    /// Leader: exporters consume and acknowledge records.
    Active,
    /// Follower: exporter state is replicated, nothing is shipped.
    Passive,
}

struct ExporterInner<Db> {
    partition_id: PartitionId,
    mode: ExporterMode,
    db: Db,
    paused: Mutex<bool>,
}

/// Handle to one partition's exporter pipeline.
#[derive(Clone)]
pub struct ExporterDirector<Db: StateDb> {
    inner: Arc<ExporterInner<Db>>,
}

impl<Db: StateDb> ExporterDirector<Db> {
    pub fn new(partition_id: PartitionId, mode: ExporterMode, db: Db) -> Self {
        tracing::debug!(partition_id = %partition_id, ?mode, "starting exporter director");
        Self { inner: Arc::new(ExporterInner { partition_id, mode, db, paused: Mutex::new(false) }) }
    }

    pub fn mode(&self) -> ExporterMode {
        self.inner.mode
    }

    /// Record that everything up to `position` has been externalized.
    /// Ignored while paused or passive.
    pub fn acknowledge(&self, position: Position) -> Result<(), DbError> {
        if self.inner.mode == ExporterMode::Passive {
            return Ok(());
        }
        if *self.inner.paused.lock() {
            tracing::debug!(
                partition_id = %self.inner.partition_id,
                position,
                "exporter paused; dropping acknowledgement"
            );
            return Ok(());
        }
        // Compare against the raw record: an absent record means nothing
        // was acknowledged yet, not "unconstrained".
        let current = self
            .inner
            .db
            .get(EXPORTER_POSITION_KEY)
            .ok()
            .flatten()
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|s| s.parse::<Position>().ok());
        if current.is_some_and(|c| c >= position) {
            return Ok(());
        }
        self.inner.db.put(EXPORTER_POSITION_KEY, position.to_string().as_bytes())
    }

    /// The lowest exported position recorded in `db`.
    ///
    /// A database without exporter state does not constrain snapshots:
    /// nothing was ever handed to an exporter, so nothing can be lost.
    pub fn read_position(db: &Db) -> Position {
        let raw = match db.get(EXPORTER_POSITION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Position::MAX,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read exporter position");
                return Position::MAX;
            }
        };
        match std::str::from_utf8(&raw).ok().and_then(|s| s.parse().ok()) {
            Some(position) => position,
            None => {
                tracing::warn!("exporter position record is malformed");
                Position::MAX
            }
        }
    }

    pub fn position(&self) -> Position {
        Self::read_position(&self.inner.db)
    }

    pub fn pause(&self) {
        let mut paused = self.inner.paused.lock();
        if !*paused {
            *paused = true;
            tracing::info!(partition_id = %self.inner.partition_id, "exporting paused");
        }
    }

    pub fn resume(&self) {
        let mut paused = self.inner.paused.lock();
        if *paused {
            *paused = false;
            tracing::info!(partition_id = %self.inner.partition_id, "exporting resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.lock()
    }
}

#[cfg(test)]
#[path = "exporter_tests.rs"]
mod tests;

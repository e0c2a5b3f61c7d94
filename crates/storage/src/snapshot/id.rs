// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot identity.
//!
//! A snapshot is identified by the positions and consensus coordinates
//! it was taken at, plus a store-assigned ordinal. The directory name is
//! the identity with every field zero-padded to 19 digits, which makes
//! lexicographic name order equal to tuple order: "latest" is simply the
//! largest name in the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const FIELD_WIDTH: usize = 19;

/// Identity of a snapshot: `processed-exported-index-term-ordinal`.
///
/// Field order is comparison order; the derived `Ord` must match the
/// sort order of [`SnapshotId::to_string`] names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SnapshotId {
    /// Lowest position whose effects are in the database.
    pub processed_position: u64,
    /// Lowest position the exporter pipeline has externalized.
    pub exported_position: u64,
    /// Consensus log index the snapshot corresponds to.
    pub index: u64,
    /// Term of that log entry.
    pub term: u64,
    /// Store-assigned tie breaker, strictly increasing per store.
    pub ordinal: u64,
}

impl SnapshotId {
    pub fn new(
        processed_position: u64,
        exported_position: u64,
        index: u64,
        term: u64,
        ordinal: u64,
    ) -> Self {
        Self { processed_position, exported_position, index, term, ordinal }
    }

    /// Lowest log position that must be retained; the log may be
    /// truncated below this.
    pub fn compaction_bound(&self) -> u64 {
        self.processed_position.min(self.exported_position)
    }

    /// The identity without the ordinal. Two snapshots with the same
    /// prefix describe the same state-machine state.
    pub fn prefix(&self) -> (u64, u64, u64, u64) {
        (self.processed_position, self.exported_position, self.index, self.term)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0width$}-{:0width$}-{:0width$}-{:0width$}-{:0width$}",
            self.processed_position,
            self.exported_position,
            self.index,
            self.term,
            self.ordinal,
            width = FIELD_WIDTH,
        )
    }
}

/// Errors parsing a snapshot directory name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotIdParseError {
    #[error("expected 5 dash-separated fields, got {0}")]
    FieldCount(usize),
    #[error("field '{0}' is not an unsigned integer")]
    Field(String),
}

impl FromStr for SnapshotId {
    type Err = SnapshotIdParseError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = name.split('-').collect();
        if fields.len() != 5 {
            return Err(SnapshotIdParseError::FieldCount(fields.len()));
        }
        let mut values = [0u64; 5];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|_| SnapshotIdParseError::Field(field.to_string()))?;
        }
        Ok(Self::new(values[0], values[1], values[2], values[3], values[4]))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log positions and indexed entries.

use serde::{Deserialize, Serialize};

/// Leadership epoch. Monotonically non-decreasing per partition.
pub type Term = u64;

/// Position on the partition's log stream.
///
/// Positions are assigned by the log appender and only ever grow. A
/// component that has not yet consumed anything reports [`NO_POSITION`].
pub type Position = i64;

/// Sentinel for "nothing consumed yet".
pub const NO_POSITION: Position = -1;

/// A log entry located in the consensus log.
///
/// The snapshot subsystem only needs the consensus coordinates of an
/// entry; the payload stays with the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Index in the consensus log.
    pub index: u64,
    /// Term under which the entry was appended.
    pub term: Term,
}

impl IndexedEntry {
    pub fn new(index: u64, term: Term) -> Self {
        Self { index, term }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tug-storage: Per-partition state storage.
//!
//! The runtime database a partition's state machine writes to, the
//! snapshot store that turns that database into immutable on-disk
//! snapshots, and the state controller that coordinates the two.

pub mod checksum;
pub mod controller;
pub mod db;
pub mod snapshot;

pub use controller::{EntrySupplier, ExporterPositionFn, StateController, StateControllerError};
pub use db::{DbError, DbFactory, JsonDb, JsonDbFactory, StateDb};
pub use snapshot::{
    PersistedSnapshot, SnapshotId, SnapshotStore, SnapshotStoreError, TransientSnapshot,
};

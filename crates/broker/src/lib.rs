// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tug-broker: Partition lifecycle.
//!
//! A broker node hosts a set of partitions. Each partition follows its
//! Raft replica's role: transitions install and remove the stream
//! processor, exporter director, snapshot director, and log deletion
//! service; the partition actor serializes every transition, admin
//! request, and external signal onto one logical thread.

pub mod health;
pub mod partition;
pub mod raft;
pub mod services;
pub mod startup;
pub mod transition;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use health::HealthMonitor;
pub use partition::{Partition, PartitionError, PartitionOptions};
pub use raft::{RaftPartition, SnapshotReplicationEvent};
pub use services::{
    ExporterDirector, ExporterMode, LogCompactor, LogDeletionService, SnapshotDirector,
    SnapshotDirectorMode, SnapshotOutcome, StreamProcessor, StreamProcessorMode,
};
pub use startup::{StartupError, StartupProcess, StartupStep};
pub use transition::{PartitionTransition, TransitionContext, TransitionError, TransitionStep};

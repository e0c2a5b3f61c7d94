// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role-dependent partition services.
//!
//! These are the components a role transition installs and removes: the
//! stream processor, the exporter director, the snapshot director, and
//! the log deletion service. The record appliers and exporter sinks
//! themselves live outside this crate; the services here own their
//! lifecycle, positions, and pause state.

mod exporter;
mod log_deletion;
mod snapshot_director;
mod stream_processor;

pub use exporter::{ExporterDirector, ExporterMode, EXPORTER_POSITION_KEY};
pub use log_deletion::{LogCompactor, LogDeletionService};
pub use snapshot_director::{SnapshotDirector, SnapshotDirectorMode, SnapshotOutcome};
pub use stream_processor::{StreamProcessor, StreamProcessorMode};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream processor lifecycle.
//!
//! On a leader the processor consumes commands and produces follow-up
//! records; on a follower it replays committed records to keep the state
//! machine warm. The appliers themselves are plugged in by the engine;
//! this type owns the mode, the pause switch, and the last processed
//! position, which is the lower bound the snapshot director asks for.

use std::sync::Arc;

use parking_lot::Mutex;
use tug_core::{PartitionId, Position, NO_POSITION};

/// How the processor consumes the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProcessorMode {
    /// Leader: process commands, emit follow-up records.
    Processing,
    /// Follower: replay committed records only.
    Replay,
}

struct ProcessorState {
    last_processed_position: Position,
    paused: bool,
    closed: bool,
}

struct ProcessorInner {
    partition_id: PartitionId,
    mode: StreamProcessorMode,
    state: Mutex<ProcessorState>,
}

/// Handle to one partition's stream processor.
#[derive(Clone)]
pub struct StreamProcessor {
    inner: Arc<ProcessorInner>,
}

impl StreamProcessor {
    pub fn new(partition_id: PartitionId, mode: StreamProcessorMode) -> Self {
        tracing::debug!(partition_id = %partition_id, ?mode, "starting stream processor");
        Self {
            inner: Arc::new(ProcessorInner {
                partition_id,
                mode,
                state: Mutex::new(ProcessorState {
                    last_processed_position: NO_POSITION,
                    paused: false,
                    closed: false,
                }),
            }),
        }
    }

    pub fn mode(&self) -> StreamProcessorMode {
        self.inner.mode
    }

    /// Record that every effect of `position` is now in the database.
    /// Positions only move forward; stale reports are ignored.
    pub fn record_processed(&self, position: Position) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        if position > state.last_processed_position {
            state.last_processed_position = position;
        }
    }

    /// Lowest position whose effects are fully applied, [`NO_POSITION`]
    /// before anything was processed.
    pub fn last_processed_position(&self) -> Position {
        self.inner.state.lock().last_processed_position
    }

    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        if !state.paused {
            state.paused = true;
            tracing::info!(partition_id = %self.inner.partition_id, "stream processor paused");
        }
    }

    pub fn resume(&self) {
        let mut state = self.inner.state.lock();
        if state.paused {
            state.paused = false;
            tracing::info!(partition_id = %self.inner.partition_id, "stream processor resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Stop consuming permanently. Position reports after close are
    /// dropped.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        tracing::debug!(partition_id = %self.inner.partition_id, "stream processor closed");
    }
}

#[cfg(test)]
#[path = "stream_processor_tests.rs"]
mod tests;

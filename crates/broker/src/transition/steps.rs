// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The default transition step pipeline.
//!
//! Order matters: the state step opens the database before anything that
//! needs it, the stream processor exists before the snapshot director
//! asks it for positions.

use async_trait::async_trait;
use std::sync::Arc;
use tug_core::{RaftRole, Term};
use tug_storage::DbFactory;

use crate::services::{
    ExporterDirector, ExporterMode, LogDeletionService, SnapshotDirector, SnapshotDirectorMode,
    StreamProcessor, StreamProcessorMode,
};
use crate::transition::{TransitionContext, TransitionError, TransitionStep};

const STREAM_PROCESSOR: &str = "stream-processor";
const EXPORTER: &str = "exporter";
const SNAPSHOT_DIRECTOR: &str = "snapshot-director";

/// The pipeline every partition runs: state, stream processor, exporter,
/// snapshot director, log deletion.
pub fn default_steps<F: DbFactory>() -> Vec<Box<dyn TransitionStep<F>>> {
    vec![
        Box::new(StateStep),
        Box::new(StreamProcessorStep),
        Box::new(ExporterStep),
        Box::new(SnapshotDirectorStep),
        Box::new(LogDeletionStep),
    ]
}

/// Opens the runtime database for active roles, closes and deletes it on
/// the way to inactive. The database survives leader/follower changes.
struct StateStep;

#[async_trait]
impl<F: DbFactory> TransitionStep<F> for StateStep {
    fn name(&self) -> &'static str {
        "state"
    }

    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() {
            ctx.db = None;
            ctx.controller.close_db().await?;
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() {
            return Ok(());
        }
        if !ctx.controller.is_db_opened() {
            ctx.controller.recover().await?;
        }
        ctx.db = Some(ctx.controller.open_db().await?);
        Ok(())
    }
}

/// Installs the stream processor in processing mode on a leader, replay
/// mode otherwise.
struct StreamProcessorStep;

#[async_trait]
impl<F: DbFactory> TransitionStep<F> for StreamProcessorStep {
    fn name(&self) -> &'static str {
        STREAM_PROCESSOR
    }

    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if ctx.role_changed(target) || target.is_inactive() {
            if let Some(processor) = ctx.stream_processor.take() {
                ctx.health.remove(STREAM_PROCESSOR);
                processor.close();
            }
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() || ctx.stream_processor.is_some() {
            return Ok(());
        }
        let mode = if target.is_leader() {
            StreamProcessorMode::Processing
        } else {
            StreamProcessorMode::Replay
        };
        ctx.stream_processor = Some(StreamProcessor::new(ctx.partition_id, mode));
        ctx.health.report(STREAM_PROCESSOR, tug_core::HealthStatus::Healthy);
        Ok(())
    }
}

/// Installs the exporter director, actively exporting only on a leader.
struct ExporterStep;

#[async_trait]
impl<F: DbFactory> TransitionStep<F> for ExporterStep {
    fn name(&self) -> &'static str {
        EXPORTER
    }

    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if ctx.role_changed(target) || target.is_inactive() {
            if ctx.exporter.take().is_some() {
                ctx.health.remove(EXPORTER);
            }
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() || ctx.exporter.is_some() {
            return Ok(());
        }
        let Some(db) = ctx.db.clone() else {
            return Err(TransitionError::Step {
                step: EXPORTER,
                message: "exporter requires an open database".to_string(),
            });
        };
        let mode = if target.is_leader() { ExporterMode::Active } else { ExporterMode::Passive };
        ctx.exporter = Some(ExporterDirector::new(ctx.partition_id, mode, db));
        ctx.health.report(EXPORTER, tug_core::HealthStatus::Healthy);
        Ok(())
    }
}

/// Installs the snapshot director: processing mode with a committed-entry
/// subscription on a leader, replay mode on a follower.
struct SnapshotDirectorStep;

#[async_trait]
impl<F: DbFactory> TransitionStep<F> for SnapshotDirectorStep {
    fn name(&self) -> &'static str {
        SNAPSHOT_DIRECTOR
    }

    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if ctx.role_changed(target) || target.is_inactive() {
            if let Some(director) = ctx.snapshot_director.take() {
                ctx.health.remove(SNAPSHOT_DIRECTOR);
                ctx.raft.remove_committed_entry_listener(SNAPSHOT_DIRECTOR);
                director.close().await;
            }
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() || ctx.snapshot_director.is_some() {
            return Ok(());
        }
        let Some(processor) = ctx.stream_processor.clone() else {
            return Err(TransitionError::Step {
                step: SNAPSHOT_DIRECTOR,
                message: "snapshot director requires a stream processor".to_string(),
            });
        };

        let mode = if target.is_leader() {
            SnapshotDirectorMode::Processing
        } else {
            SnapshotDirectorMode::Replay
        };
        let director = SnapshotDirector::install(
            &ctx.actor,
            ctx.partition_id,
            mode,
            Arc::clone(&ctx.controller),
            move || processor.last_processed_position(),
            ctx.snapshot_period,
        );

        if target.is_leader() {
            let on_commit = director.clone();
            ctx.raft.add_committed_entry_listener(
                SNAPSHOT_DIRECTOR,
                Box::new(move |entry| on_commit.on_committed_entry(entry)),
            );
        }
        ctx.health.report(SNAPSHOT_DIRECTOR, tug_core::HealthStatus::Healthy);
        ctx.snapshot_director = Some(director);
        Ok(())
    }
}

/// Keeps the log compacted to the snapshot store's bound while the
/// partition is active.
struct LogDeletionStep;

#[async_trait]
impl<F: DbFactory> TransitionStep<F> for LogDeletionStep {
    fn name(&self) -> &'static str {
        "log-deletion"
    }

    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        // Compaction is role-independent; it only stops when the
        // partition does.
        if target.is_inactive() {
            ctx.log_deletion = None;
        }
        Ok(())
    }

    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        _term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        if target.is_inactive() || ctx.log_deletion.is_some() {
            return Ok(());
        }
        let service = LogDeletionService::new(ctx.partition_id, Arc::clone(&ctx.compactor));
        service.attach(ctx.controller.snapshot_store());
        ctx.log_deletion = Some(service);
        Ok(())
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;

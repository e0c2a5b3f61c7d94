// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The partition actor.
//!
//! One logical thread owns everything a partition is: its transition
//! context, its installed services, its health. External inputs — Raft
//! role changes, disk-space signals, snapshot replication, admin
//! requests — arrive as messages on an unbounded channel and are
//! processed strictly in order. A transition runs to completion before
//! the next message is handled, which is what serializes transitions.

mod bootstrap;

pub use bootstrap::PartitionOptions;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tug_actor::{completable, ActorError, ActorFuture, Completer};
use tug_core::{HealthStatus, PartitionId, Position, RaftRole, Term};
use tug_storage::{DbFactory, StateControllerError};

use crate::health::HealthMonitor;
use crate::raft::SnapshotReplicationEvent;
use crate::services::SnapshotOutcome;
use crate::startup::{StartupError, StartupProcess};
use crate::transition::{PartitionTransition, TransitionContext, TransitionError};

use bootstrap::BootstrapContext;

/// Listener registration key for the partition's own subscriptions.
const LISTENER_KEY: &str = "partition";

/// Errors surfaced by the partition's public interface.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("partition is closed")]
    Closed,

    #[error(transparent)]
    Bootstrap(#[from] StartupError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    State(#[from] StateControllerError),
}

impl From<ActorError> for PartitionError {
    fn from(_: ActorError) -> Self {
        PartitionError::Closed
    }
}

enum PartitionMessage {
    RoleChanged { role: RaftRole, term: Term },
    DiskSpace { available: bool },
    SnapshotReplication(SnapshotReplicationEvent),
    RecordProcessed(Position),
    ExporterAcknowledged(Position),
    PauseProcessing(Completer<()>),
    ResumeProcessing(Completer<()>),
    PauseExporting(Completer<()>),
    ResumeExporting(Completer<()>),
    TakeSnapshot(Completer<Result<SnapshotOutcome, PartitionError>>),
    CurrentRole(Completer<Option<RaftRole>>),
    Close(Completer<()>),
}

/// Handle to a running partition. Cheap to clone.
#[derive(Clone)]
pub struct Partition {
    id: PartitionId,
    tx: mpsc::UnboundedSender<PartitionMessage>,
    health: HealthMonitor,
}

impl Partition {
    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    fn request<T, B>(&self, build: B) -> ActorFuture<T>
    where
        T: Send + 'static,
        B: FnOnce(Completer<T>) -> PartitionMessage,
    {
        let (completer, future) = completable();
        // A send failure drops the completer and the future resolves
        // with Closed.
        let _ = self.tx.send(build(completer));
        future
    }

    pub fn pause_processing(&self) -> ActorFuture<()> {
        self.request(PartitionMessage::PauseProcessing)
    }

    pub fn resume_processing(&self) -> ActorFuture<()> {
        self.request(PartitionMessage::ResumeProcessing)
    }

    pub fn pause_exporting(&self) -> ActorFuture<()> {
        self.request(PartitionMessage::PauseExporting)
    }

    pub fn resume_exporting(&self) -> ActorFuture<()> {
        self.request(PartitionMessage::ResumeExporting)
    }

    /// Ask the snapshot director for an immediate snapshot.
    pub fn take_snapshot(&self) -> ActorFuture<Result<SnapshotOutcome, PartitionError>> {
        self.request(PartitionMessage::TakeSnapshot)
    }

    /// Role of the most recently completed transition.
    pub fn get_current_role(&self) -> ActorFuture<Option<RaftRole>> {
        self.request(PartitionMessage::CurrentRole)
    }

    /// Disk-space signal from the disk monitor.
    pub fn disk_space_available(&self, available: bool) {
        let _ = self.tx.send(PartitionMessage::DiskSpace { available });
    }

    /// Progress report from the engine's record appliers: everything up
    /// to `position` is applied to the database.
    pub fn record_processed(&self, position: Position) {
        let _ = self.tx.send(PartitionMessage::RecordProcessed(position));
    }

    /// Progress report from the exporter pipeline: everything up to
    /// `position` has been externalized.
    pub fn exporter_acknowledged(&self, position: Position) {
        let _ = self.tx.send(PartitionMessage::ExporterAcknowledged(position));
    }

    /// Stop the partition: waits for the in-flight transition, moves the
    /// services to inactive, unregisters listeners, and unwinds the
    /// bootstrap steps.
    pub async fn close(&self) {
        let (completer, future) = completable();
        if self.tx.send(PartitionMessage::Close(completer)).is_err() {
            return;
        }
        let _ = future.await;
    }
}

/// State owned by the partition's message loop.
struct PartitionLoop<F: DbFactory> {
    id: PartitionId,
    ctx: TransitionContext<F>,
    transition: PartitionTransition<F>,
    bootstrap_process: StartupProcess<BootstrapContext<F>>,
    bootstrap_ctx: BootstrapContext<F>,
    health: HealthMonitor,
    disk_available: bool,
    paused_processing: bool,
    paused_exporting: bool,
    /// Set between snapshot-replication started and completed.
    replicating: bool,
}

impl<F: DbFactory> PartitionLoop<F> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PartitionMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                PartitionMessage::RoleChanged { role, term } => {
                    self.on_role_change(role, term).await;
                }
                PartitionMessage::DiskSpace { available } => {
                    self.on_disk_space(available);
                }
                PartitionMessage::SnapshotReplication(event) => {
                    self.on_snapshot_replication(event).await;
                }
                PartitionMessage::RecordProcessed(position) => {
                    if let Some(processor) = &self.ctx.stream_processor {
                        processor.record_processed(position);
                    }
                }
                PartitionMessage::ExporterAcknowledged(position) => {
                    if let Some(exporter) = &self.ctx.exporter {
                        if let Err(e) = exporter.acknowledge(position) {
                            tracing::warn!(error = %e, "failed to record exporter position");
                        }
                    }
                }
                PartitionMessage::PauseProcessing(done) => {
                    self.paused_processing = true;
                    if let Some(processor) = &self.ctx.stream_processor {
                        processor.pause();
                    }
                    let _ = done.complete(());
                }
                PartitionMessage::ResumeProcessing(done) => {
                    self.paused_processing = false;
                    if self.disk_available {
                        if let Some(processor) = &self.ctx.stream_processor {
                            processor.resume();
                        }
                    }
                    let _ = done.complete(());
                }
                PartitionMessage::PauseExporting(done) => {
                    self.paused_exporting = true;
                    if let Some(exporter) = &self.ctx.exporter {
                        exporter.pause();
                    }
                    let _ = done.complete(());
                }
                PartitionMessage::ResumeExporting(done) => {
                    self.paused_exporting = false;
                    if let Some(exporter) = &self.ctx.exporter {
                        exporter.resume();
                    }
                    let _ = done.complete(());
                }
                PartitionMessage::TakeSnapshot(done) => {
                    let result = match &self.ctx.snapshot_director {
                        Some(director) => {
                            director.take_snapshot().await.map_err(PartitionError::from)
                        }
                        None => Ok(SnapshotOutcome::Skipped),
                    };
                    let _ = done.complete(result);
                }
                PartitionMessage::CurrentRole(done) => {
                    let _ = done.complete(self.ctx.current_role);
                }
                PartitionMessage::Close(done) => {
                    self.on_close().await;
                    let _ = done.complete(());
                    break;
                }
            }
        }
        tracing::debug!(partition_id = %self.id, "partition actor stopped");
    }

    /// The role-change decision table.
    async fn on_role_change(&mut self, role: RaftRole, term: Term) {
        let current = self.ctx.current_role;
        let result = if role.is_leader() && current != Some(RaftRole::Leader) {
            Some(self.transition.to_leader(&mut self.ctx, term).await)
        } else if role.is_inactive() {
            Some(self.transition.to_inactive(&mut self.ctx).await)
        } else if role.serves_as_follower()
            && (current.is_none() || current == Some(RaftRole::Leader))
        {
            Some(self.transition.to_follower(&mut self.ctx, term, role).await)
        } else {
            tracing::debug!(
                partition_id = %self.id,
                ?current,
                new_role = %role,
                "role change needs no transition"
            );
            None
        };

        match result {
            Some(Ok(())) => {
                self.apply_admin_state();
                if role.is_inactive() {
                    self.health.remove("services");
                } else {
                    self.health.report("services", HealthStatus::Healthy);
                }
            }
            Some(Err(e)) => self.on_transition_failure(e, role, term).await,
            None => {}
        }
    }

    /// Failure policy: unrecoverable failures poison the partition,
    /// recoverable ones hand the role back to consensus, stale ones are
    /// superseded by a newer transition already queued.
    async fn on_transition_failure(&mut self, error: TransitionError, role: RaftRole, term: Term) {
        if error.is_unrecoverable() {
            tracing::error!(
                partition_id = %self.id,
                error = %error,
                "unrecoverable transition failure; going inactive"
            );
            self.health.report("partition", HealthStatus::Dead);
            if let Err(e) = self.transition.to_inactive(&mut self.ctx).await {
                tracing::warn!(error = %e, "inactive transition failed during poisoning");
            }
            self.ctx.raft.go_inactive();
            return;
        }

        if term < self.ctx.raft.term() {
            tracing::debug!(
                partition_id = %self.id,
                term,
                current_term = self.ctx.raft.term(),
                "stale transition failure superseded by a newer term"
            );
            return;
        }

        self.health.report("services", HealthStatus::Unhealthy);
        if role.is_leader() {
            tracing::warn!(
                partition_id = %self.id,
                error = %error,
                "leader transition failed; stepping down"
            );
            self.ctx.raft.step_down();
        } else {
            tracing::warn!(
                partition_id = %self.id,
                error = %error,
                "follower transition failed; going inactive"
            );
            self.ctx.raft.go_inactive();
        }
    }

    fn on_disk_space(&mut self, available: bool) {
        if self.disk_available == available {
            return;
        }
        self.disk_available = available;
        if available {
            tracing::info!(partition_id = %self.id, "disk space available again");
            self.health.report("disk-space", HealthStatus::Healthy);
            if !self.paused_processing {
                if let Some(processor) = &self.ctx.stream_processor {
                    processor.resume();
                }
            }
        } else {
            tracing::warn!(partition_id = %self.id, "out of disk space; pausing processing");
            self.health.report("disk-space", HealthStatus::Unhealthy);
            if let Some(processor) = &self.ctx.stream_processor {
                processor.pause();
            }
        }
    }

    /// A replicated snapshot replaces local state wholesale: services
    /// step aside while it installs, then follower services come back.
    async fn on_snapshot_replication(&mut self, event: SnapshotReplicationEvent) {
        match event {
            SnapshotReplicationEvent::Started => {
                if self.ctx.current_role.is_some_and(|r| r.serves_as_follower()) {
                    tracing::info!(
                        partition_id = %self.id,
                        "snapshot replication started; suspending services"
                    );
                    if let Err(e) = self.transition.to_inactive(&mut self.ctx).await {
                        tracing::error!(error = %e, "failed to suspend services for replication");
                        return;
                    }
                    self.replicating = true;
                }
            }
            SnapshotReplicationEvent::Completed(term) => {
                if !self.replicating {
                    return;
                }
                self.replicating = false;
                tracing::info!(
                    partition_id = %self.id,
                    term,
                    "snapshot replication completed; reinstalling follower services"
                );
                match self
                    .transition
                    .to_follower(&mut self.ctx, term, RaftRole::Follower)
                    .await
                {
                    Ok(()) => {
                        self.apply_admin_state();
                        self.health.report("services", HealthStatus::Healthy);
                    }
                    Err(e) => self.on_transition_failure(e, RaftRole::Follower, term).await,
                }
            }
        }
    }

    /// Re-impose admin and disk pause intent on freshly installed
    /// services.
    fn apply_admin_state(&self) {
        if let Some(processor) = &self.ctx.stream_processor {
            if self.paused_processing || !self.disk_available {
                processor.pause();
            }
        }
        if let Some(exporter) = &self.ctx.exporter {
            if self.paused_exporting {
                exporter.pause();
            }
        }
    }

    async fn on_close(&mut self) {
        tracing::info!(partition_id = %self.id, "closing partition");
        if let Err(e) = self.transition.to_inactive(&mut self.ctx).await {
            tracing::warn!(error = %e, "inactive transition failed during close");
        }
        self.ctx.raft.remove_role_change_listener(LISTENER_KEY);
        self.ctx.raft.remove_snapshot_replication_listener(LISTENER_KEY);
        if let Err(e) = self.bootstrap_process.shutdown(&mut self.bootstrap_ctx).await {
            tracing::warn!(error = %e, "bootstrap teardown reported an error");
        }
        self.ctx.db = None;
        self.ctx.stream_processor = None;
        self.ctx.exporter = None;
        self.ctx.snapshot_director = None;
        self.ctx.log_deletion = None;
    }
}

/// Wire the partition loop to its Raft replica and spawn it.
pub(crate) fn spawn_partition<F: DbFactory>(
    id: PartitionId,
    ctx: TransitionContext<F>,
    transition: PartitionTransition<F>,
    bootstrap_process: StartupProcess<BootstrapContext<F>>,
    bootstrap_ctx: BootstrapContext<F>,
    health: HealthMonitor,
) -> Partition {
    let (tx, rx) = mpsc::unbounded_channel();
    let raft = Arc::clone(&ctx.raft);

    let role_tx = tx.clone();
    raft.add_role_change_listener(
        LISTENER_KEY,
        Box::new(move |role, term| {
            let _ = role_tx.send(PartitionMessage::RoleChanged { role, term });
        }),
    );
    let replication_tx = tx.clone();
    raft.add_snapshot_replication_listener(
        LISTENER_KEY,
        Box::new(move |event| {
            let _ = replication_tx.send(PartitionMessage::SnapshotReplication(event));
        }),
    );

    let state = PartitionLoop {
        id,
        ctx,
        transition,
        bootstrap_process,
        bootstrap_ctx,
        health: health.clone(),
        disk_available: true,
        paused_processing: false,
        paused_exporting: false,
        replicating: false,
    };
    tokio::spawn(state.run(rx));

    Partition { id, tx, health }
}

pub(crate) use spawn_partition as spawn;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

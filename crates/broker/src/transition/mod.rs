// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role transitions.
//!
//! A transition is an ordered batch of steps, each able to tear down
//! (`prepare`) and install (`transition_to`) one service for the target
//! role. Prepare runs for every step in order, then transition runs in
//! the same order; the first failure aborts the remaining steps and
//! propagates. Steps decide from `(current_role, target_role)` whether
//! they have anything to do, so a same-role transition (a leader picking
//! up a new term) keeps its services.

mod steps;

pub use steps::default_steps;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tug_actor::Actor;
use tug_core::{PartitionId, RaftRole, Term};
use tug_storage::{DbError, DbFactory, StateController, StateControllerError};

use crate::health::HealthMonitor;
use crate::raft::RaftPartition;
use crate::services::{
    ExporterDirector, LogCompactor, LogDeletionService, SnapshotDirector, StreamProcessor,
};

/// Errors raised while switching roles.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    State(#[from] StateControllerError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("transition step {step}: {message}")]
    Step { step: &'static str, message: String },
}

impl TransitionError {
    /// Whether this failure poisons the partition. An unrecoverable
    /// failure forces the replica inactive; anything else is answered
    /// with a step-down or go-inactive and a later retry.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            TransitionError::State(StateControllerError::PositionNotInLog { .. })
                | TransitionError::State(StateControllerError::Db(DbError::Corrupt { .. }))
                | TransitionError::Db(DbError::Corrupt { .. })
        )
    }
}

/// Everything a transition step may read or install.
///
/// Owned by the partition's single logical thread; steps get exclusive
/// access for the duration of a transition.
pub struct TransitionContext<F: DbFactory> {
    pub partition_id: PartitionId,
    /// Actor carrying the partition's periodic work (snapshot timer).
    pub actor: Actor,
    pub raft: Arc<dyn RaftPartition>,
    pub controller: Arc<StateController<F>>,
    pub health: HealthMonitor,
    pub compactor: Arc<dyn LogCompactor>,
    pub snapshot_period: Duration,

    /// Role of the most recently completed transition.
    pub current_role: Option<RaftRole>,

    pub db: Option<F::Db>,
    pub stream_processor: Option<StreamProcessor>,
    pub exporter: Option<ExporterDirector<F::Db>>,
    pub snapshot_director: Option<SnapshotDirector<F>>,
    pub log_deletion: Option<LogDeletionService>,
}

impl<F: DbFactory> TransitionContext<F> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partition_id: PartitionId,
        actor: Actor,
        raft: Arc<dyn RaftPartition>,
        controller: Arc<StateController<F>>,
        health: HealthMonitor,
        compactor: Arc<dyn LogCompactor>,
        snapshot_period: Duration,
    ) -> Self {
        Self {
            partition_id,
            actor,
            raft,
            controller,
            health,
            compactor,
            snapshot_period,
            current_role: None,
            db: None,
            stream_processor: None,
            exporter: None,
            snapshot_director: None,
            log_deletion: None,
        }
    }

    /// Whether moving to `target` changes the installed service set's
    /// role.
    fn role_changed(&self, target: RaftRole) -> bool {
        self.current_role != Some(target)
    }
}

/// One installable/removable service in the role-transition pipeline.
#[async_trait]
pub trait TransitionStep<F: DbFactory>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tear down whatever must not survive the move to `target`.
    async fn prepare(
        &self,
        ctx: &mut TransitionContext<F>,
        term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError>;

    /// Install this step's service for `target`.
    async fn transition_to(
        &self,
        ctx: &mut TransitionContext<F>,
        term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError>;
}

/// Role-parameterized composition of transition steps.
pub struct PartitionTransition<F: DbFactory> {
    steps: Vec<Box<dyn TransitionStep<F>>>,
}

impl<F: DbFactory> PartitionTransition<F> {
    pub fn new(steps: Vec<Box<dyn TransitionStep<F>>>) -> Self {
        Self { steps }
    }

    pub fn with_default_steps() -> Self {
        Self::new(default_steps())
    }

    pub async fn to_leader(
        &self,
        ctx: &mut TransitionContext<F>,
        term: Term,
    ) -> Result<(), TransitionError> {
        self.transition(ctx, term, RaftRole::Leader).await
    }

    pub async fn to_follower(
        &self,
        ctx: &mut TransitionContext<F>,
        term: Term,
        role: RaftRole,
    ) -> Result<(), TransitionError> {
        debug_assert!(role.serves_as_follower());
        self.transition(ctx, term, role).await
    }

    pub async fn to_inactive(&self, ctx: &mut TransitionContext<F>) -> Result<(), TransitionError> {
        let term = ctx.raft.term();
        self.transition(ctx, term, RaftRole::Inactive).await
    }

    async fn transition(
        &self,
        ctx: &mut TransitionContext<F>,
        term: Term,
        target: RaftRole,
    ) -> Result<(), TransitionError> {
        tracing::info!(
            partition_id = %ctx.partition_id,
            from = ?ctx.current_role,
            to = %target,
            term,
            "transitioning"
        );
        let start = Instant::now();

        for step in &self.steps {
            step.prepare(ctx, term, target).await.map_err(|e| {
                tracing::error!(step = step.name(), error = %e, "prepare failed");
                e
            })?;
        }
        for step in &self.steps {
            let step_start = Instant::now();
            step.transition_to(ctx, term, target).await.map_err(|e| {
                tracing::error!(step = step.name(), error = %e, "transition step failed");
                e
            })?;
            tracing::debug!(
                step = step.name(),
                elapsed_ms = step_start.elapsed().as_millis() as u64,
                "transition step done"
            );
        }

        ctx.current_role = Some(target);
        tracing::info!(
            partition_id = %ctx.partition_id,
            role = %target,
            term,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "transition complete"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

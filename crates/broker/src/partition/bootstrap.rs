// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition bring-up.
//!
//! Bootstrap is an ordered, reversible startup process: the snapshot
//! store opens first, then the state controller on top of it. A failure
//! mid-bootstrap unwinds what already started; `Partition::close` runs
//! the same steps' inverses at the end of the partition's life.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tug_actor::ActorScheduler;
use tug_core::{BrokerConfig, ConfigError, NodeId, PartitionId};
use tug_storage::{DbFactory, EntrySupplier, SnapshotStore, StateController};

use crate::health::HealthMonitor;
use crate::raft::RaftPartition;
use crate::services::{ExporterDirector, LogCompactor};
use crate::startup::{StartupError, StartupProcess, StartupStep};
use crate::transition::{PartitionTransition, TransitionContext};

use super::{Partition, PartitionError};

/// Static identity and tuning of one partition.
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    pub partition_id: PartitionId,
    pub node_id: NodeId,
    /// Root of this partition's on-disk state; the snapshot store and
    /// the runtime database live underneath it.
    pub data_dir: PathBuf,
    pub snapshot_period: Duration,
}

impl PartitionOptions {
    pub fn from_config(
        partition_id: PartitionId,
        node_id: NodeId,
        data_dir: PathBuf,
        config: &BrokerConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self { partition_id, node_id, data_dir, snapshot_period: config.snapshot_period()? })
    }
}

/// Accumulating context threaded through the bootstrap steps.
pub(crate) struct BootstrapContext<F: DbFactory> {
    options: PartitionOptions,
    scheduler: ActorScheduler,
    factory: Option<F>,
    entry_supplier: Option<EntrySupplier>,
    store: Option<SnapshotStore>,
    controller: Option<Arc<StateController<F>>>,
}

struct SnapshotStoreStep;

#[async_trait]
impl<F: DbFactory> StartupStep<BootstrapContext<F>> for SnapshotStoreStep {
    fn name(&self) -> &'static str {
        "snapshot-store"
    }

    async fn startup(&self, ctx: &mut BootstrapContext<F>) -> Result<(), StartupError> {
        let root = ctx.options.data_dir.join("snapshots");
        ctx.store = Some(SnapshotStore::open(&root)?);
        Ok(())
    }

    async fn shutdown(&self, ctx: &mut BootstrapContext<F>) -> Result<(), StartupError> {
        // Dropping the store releases its directory lock.
        ctx.store = None;
        Ok(())
    }
}

struct StateControllerStep;

#[async_trait]
impl<F: DbFactory> StartupStep<BootstrapContext<F>> for StateControllerStep {
    fn name(&self) -> &'static str {
        "state-controller"
    }

    async fn startup(&self, ctx: &mut BootstrapContext<F>) -> Result<(), StartupError> {
        let store = ctx
            .store
            .clone()
            .ok_or_else(|| StartupError::other("snapshot store not started"))?;
        let factory = ctx
            .factory
            .take()
            .ok_or_else(|| StartupError::other("database factory already consumed"))?;
        let entry_supplier = ctx
            .entry_supplier
            .take()
            .ok_or_else(|| StartupError::other("entry supplier already consumed"))?;

        let actor = ctx
            .scheduler
            .actor(&format!("partition-{}-state", ctx.options.partition_id));
        ctx.controller = Some(Arc::new(StateController::new(
            actor,
            ctx.options.data_dir.join("runtime"),
            store,
            factory,
            entry_supplier,
            Arc::new(ExporterDirector::<F::Db>::read_position),
        )));
        Ok(())
    }

    async fn shutdown(&self, ctx: &mut BootstrapContext<F>) -> Result<(), StartupError> {
        if let Some(controller) = ctx.controller.take() {
            controller.close_db().await?;
        }
        Ok(())
    }
}

impl Partition {
    /// Bring up a partition and return its handle.
    ///
    /// `entry_supplier` resolves log-stream positions against the
    /// consensus log; `compactor` receives compaction bounds as
    /// snapshots persist.
    pub async fn bootstrap<F: DbFactory>(
        scheduler: &ActorScheduler,
        options: PartitionOptions,
        factory: F,
        raft: Arc<dyn RaftPartition>,
        compactor: Arc<dyn LogCompactor>,
        entry_supplier: EntrySupplier,
    ) -> Result<Partition, PartitionError> {
        let id = options.partition_id;
        tracing::info!(
            partition_id = %id,
            node_id = %options.node_id,
            data_dir = %options.data_dir.display(),
            "bootstrapping partition"
        );

        let mut process = StartupProcess::new(
            "partition-bootstrap",
            vec![
                Box::new(SnapshotStoreStep) as Box<dyn StartupStep<BootstrapContext<F>>>,
                Box::new(StateControllerStep),
            ],
        );
        let mut ctx = BootstrapContext {
            options,
            scheduler: scheduler.clone(),
            factory: Some(factory),
            entry_supplier: Some(entry_supplier),
            store: None,
            controller: None,
        };
        process.startup(&mut ctx).await.map_err(PartitionError::Bootstrap)?;

        let controller = ctx
            .controller
            .clone()
            .ok_or_else(|| PartitionError::Bootstrap(StartupError::other("no state controller")))?;
        let health = HealthMonitor::new(format!("partition-{id}"));
        let transition_ctx = TransitionContext::new(
            id,
            scheduler.actor(&format!("partition-{id}")),
            raft,
            controller,
            health.clone(),
            compactor,
            ctx.options.snapshot_period,
        );

        Ok(super::spawn(
            id,
            transition_ctx,
            PartitionTransition::with_default_steps(),
            process,
            ctx,
            health,
        ))
    }
}

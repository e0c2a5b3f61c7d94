// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumed interface of the consensus layer.
//!
//! The broker never drives replication itself; it observes role changes,
//! committed entries, and snapshot replication, and can ask the server
//! to step down or go inactive. Listeners are keyed by component name so
//! the component that registered one can remove exactly its own.
//!
//! Listener callbacks arrive on consensus threads; receivers must post
//! onto their own actor before touching state.

use tug_core::{IndexedEntry, RaftRole, Term};

/// Role-change notification: the new role and the term it applies to.
pub type RoleChangeListener = Box<dyn Fn(RaftRole, Term) + Send + Sync>;

/// A newly committed consensus log entry.
pub type CommittedEntryListener = Box<dyn Fn(IndexedEntry) + Send + Sync>;

/// Progress of a snapshot being replicated onto this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotReplicationEvent {
    /// A newer snapshot is being installed; local services must get out
    /// of the way.
    Started,
    /// Installation finished under the given term.
    Completed(Term),
}

pub type SnapshotReplicationListener = Box<dyn Fn(SnapshotReplicationEvent) + Send + Sync>;

/// Handle to one partition's Raft replica.
pub trait RaftPartition: Send + Sync + 'static {
    fn role(&self) -> RaftRole;
    fn term(&self) -> Term;

    fn add_role_change_listener(&self, key: &str, listener: RoleChangeListener);
    fn remove_role_change_listener(&self, key: &str);

    fn add_committed_entry_listener(&self, key: &str, listener: CommittedEntryListener);
    fn remove_committed_entry_listener(&self, key: &str);

    fn add_snapshot_replication_listener(&self, key: &str, listener: SnapshotReplicationListener);
    fn remove_snapshot_replication_listener(&self, key: &str);

    /// Ask the leader to relinquish leadership for the current term.
    fn step_down(&self);

    /// Force this replica out of replication entirely.
    fn go_inactive(&self);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles for the broker's collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tug_core::{IndexedEntry, RaftRole, Term};

use crate::raft::{
    CommittedEntryListener, RaftPartition, RoleChangeListener, SnapshotReplicationEvent,
    SnapshotReplicationListener,
};
use crate::services::LogCompactor;

struct FakeRaftInner {
    role: Mutex<RaftRole>,
    term: Mutex<Term>,
    role_listeners: Mutex<HashMap<String, RoleChangeListener>>,
    committed_listeners: Mutex<HashMap<String, CommittedEntryListener>>,
    replication_listeners: Mutex<HashMap<String, SnapshotReplicationListener>>,
    step_down_calls: AtomicUsize,
    go_inactive_calls: AtomicUsize,
}

/// Scriptable Raft replica: tests drive role changes, commits, and
/// snapshot replication; listeners fire synchronously on the calling
/// thread, like the real consensus callbacks do.
#[derive(Clone)]
pub struct FakeRaft {
    inner: Arc<FakeRaftInner>,
}

impl FakeRaft {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FakeRaftInner {
                role: Mutex::new(RaftRole::Inactive),
                term: Mutex::new(0),
                role_listeners: Mutex::new(HashMap::new()),
                committed_listeners: Mutex::new(HashMap::new()),
                replication_listeners: Mutex::new(HashMap::new()),
                step_down_calls: AtomicUsize::new(0),
                go_inactive_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Change role and fire every role-change listener.
    pub fn set_role(&self, role: RaftRole, term: Term) {
        *self.inner.role.lock() = role;
        *self.inner.term.lock() = term;
        for listener in self.inner.role_listeners.lock().values() {
            listener(role, term);
        }
    }

    /// Advance the term without a role change (election in progress).
    pub fn set_term(&self, term: Term) {
        *self.inner.term.lock() = term;
    }

    /// Fire the committed-entry listeners.
    pub fn commit(&self, entry: IndexedEntry) {
        for listener in self.inner.committed_listeners.lock().values() {
            listener(entry);
        }
    }

    /// Fire the snapshot-replication listeners.
    pub fn notify_snapshot_replication(&self, event: SnapshotReplicationEvent) {
        for listener in self.inner.replication_listeners.lock().values() {
            listener(event);
        }
    }

    pub fn step_down_calls(&self) -> usize {
        self.inner.step_down_calls.load(Ordering::SeqCst)
    }

    pub fn go_inactive_calls(&self) -> usize {
        self.inner.go_inactive_calls.load(Ordering::SeqCst)
    }

    pub fn has_committed_entry_listener(&self, key: &str) -> bool {
        self.inner.committed_listeners.lock().contains_key(key)
    }

    pub fn has_role_change_listener(&self, key: &str) -> bool {
        self.inner.role_listeners.lock().contains_key(key)
    }

    pub fn has_snapshot_replication_listener(&self, key: &str) -> bool {
        self.inner.replication_listeners.lock().contains_key(key)
    }
}

impl Default for FakeRaft {
    fn default() -> Self {
        Self::new()
    }
}

impl RaftPartition for FakeRaft {
    fn role(&self) -> RaftRole {
        *self.inner.role.lock()
    }

    fn term(&self) -> Term {
        *self.inner.term.lock()
    }

    fn add_role_change_listener(&self, key: &str, listener: RoleChangeListener) {
        self.inner.role_listeners.lock().insert(key.to_string(), listener);
    }

    fn remove_role_change_listener(&self, key: &str) {
        self.inner.role_listeners.lock().remove(key);
    }

    fn add_committed_entry_listener(&self, key: &str, listener: CommittedEntryListener) {
        self.inner.committed_listeners.lock().insert(key.to_string(), listener);
    }

    fn remove_committed_entry_listener(&self, key: &str) {
        self.inner.committed_listeners.lock().remove(key);
    }

    fn add_snapshot_replication_listener(&self, key: &str, listener: SnapshotReplicationListener) {
        self.inner.replication_listeners.lock().insert(key.to_string(), listener);
    }

    fn remove_snapshot_replication_listener(&self, key: &str) {
        self.inner.replication_listeners.lock().remove(key);
    }

    fn step_down(&self) {
        self.inner.step_down_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn go_inactive(&self) {
        self.inner.go_inactive_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.role.lock() = RaftRole::Inactive;
    }
}

/// Compactor that remembers every requested bound.
#[derive(Default)]
pub struct RecordingCompactor {
    bounds: Mutex<Vec<u64>>,
}

impl RecordingCompactor {
    pub fn bounds(&self) -> Vec<u64> {
        self.bounds.lock().clone()
    }
}

impl LogCompactor for RecordingCompactor {
    fn compact(&self, bound: u64) {
        self.bounds.lock().push(bound);
    }
}

/// Compactor that ignores every request.
#[derive(Default)]
pub struct NoopCompactor;

impl LogCompactor for NoopCompactor {
    fn compact(&self, _bound: u64) {}
}

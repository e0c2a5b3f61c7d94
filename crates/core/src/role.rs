// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raft replication roles.
//!
//! The consensus layer reports one of six roles per partition. Only
//! Leader, Follower, and Inactive carry service semantics in the broker;
//! the remaining roles install follower services while the election or
//! join protocol runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Replication role of a node for a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaftRole {
    /// Not participating in replication; no services installed.
    Inactive,
    /// Receives log entries but cannot vote or be promoted.
    Passive,
    /// Catching up; will become a voting member once caught up.
    Promotable,
    /// Running an election.
    Candidate,
    /// Voting member replicating from the leader.
    Follower,
    /// Accepts commands and drives replication.
    Leader,
}

impl RaftRole {
    pub fn is_leader(&self) -> bool {
        matches!(self, RaftRole::Leader)
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, RaftRole::Inactive)
    }

    /// Whether this role runs the follower service set.
    ///
    /// Candidate and the join-protocol roles serve as followers until the
    /// consensus layer settles on Leader or Inactive.
    pub fn serves_as_follower(&self) -> bool {
        matches!(
            self,
            RaftRole::Follower | RaftRole::Candidate | RaftRole::Passive | RaftRole::Promotable
        )
    }
}

impl fmt::Display for RaftRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaftRole::Inactive => "inactive",
            RaftRole::Passive => "passive",
            RaftRole::Promotable => "promotable",
            RaftRole::Candidate => "candidate",
            RaftRole::Follower => "follower",
            RaftRole::Leader => "leader",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;

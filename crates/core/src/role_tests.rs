// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    inactive = { RaftRole::Inactive, false },
    passive = { RaftRole::Passive, true },
    promotable = { RaftRole::Promotable, true },
    candidate = { RaftRole::Candidate, true },
    follower = { RaftRole::Follower, true },
    leader = { RaftRole::Leader, false },
)]
fn serves_as_follower(role: RaftRole, expected: bool) {
    assert_eq!(role.serves_as_follower(), expected);
}

#[test]
fn leader_and_inactive_predicates() {
    assert!(RaftRole::Leader.is_leader());
    assert!(!RaftRole::Candidate.is_leader());
    assert!(RaftRole::Inactive.is_inactive());
    assert!(!RaftRole::Follower.is_inactive());
}

#[test]
fn display_is_lowercase() {
    assert_eq!(RaftRole::Promotable.to_string(), "promotable");
    assert_eq!(RaftRole::Leader.to_string(), "leader");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health states for partition components.
//!
//! Components report one of three states; an aggregate is the worst
//! state of any component. `Dead` is terminal — a dead component never
//! reports again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a component or of a whole partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Dead,
}

impl HealthStatus {
    /// Combine two states into the worse of the two.
    pub fn combine(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, HealthStatus::Dead)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Dead => "dead",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate health monitoring.
//!
//! Components report their state by name; the monitor keeps no handle to
//! the component itself, so a dropped component cannot be kept alive by
//! its health record. The aggregate is the worst reported state, and
//! `Dead` is sticky: once anything dies the partition stays dead until
//! it is rebuilt.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tug_core::HealthStatus;

type FailureListener = Box<dyn Fn(HealthStatus) + Send + Sync>;

struct MonitorInner {
    name: String,
    components: Mutex<HashMap<String, HealthStatus>>,
    dead: Mutex<bool>,
    listeners: Mutex<Vec<FailureListener>>,
}

/// Aggregates the health of a partition's installed components.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

impl HealthMonitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                name: name.into(),
                components: Mutex::new(HashMap::new()),
                dead: Mutex::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Record a component's state. Degradations notify the failure
    /// listeners.
    pub fn report(&self, component: &str, status: HealthStatus) {
        let previous = self
            .inner
            .components
            .lock()
            .insert(component.to_string(), status);
        if status.is_dead() {
            *self.inner.dead.lock() = true;
        }

        let degraded = previous.map_or(!status.is_healthy(), |p| status > p);
        if degraded {
            tracing::warn!(
                monitor = %self.inner.name,
                component,
                status = %status,
                "component health degraded"
            );
            for listener in self.inner.listeners.lock().iter() {
                listener(status);
            }
        }
    }

    /// Forget a component that was uninstalled. Does not clear a sticky
    /// `Dead`.
    pub fn remove(&self, component: &str) {
        self.inner.components.lock().remove(component);
    }

    /// Worst state over all reporting components; `Healthy` when nothing
    /// reports.
    pub fn status(&self) -> HealthStatus {
        if *self.inner.dead.lock() {
            return HealthStatus::Dead;
        }
        self.inner
            .components
            .lock()
            .values()
            .copied()
            .fold(HealthStatus::Healthy, HealthStatus::combine)
    }

    /// Register a callback fired on every degradation.
    pub fn add_failure_listener<F>(&self, listener: F)
    where
        F: Fn(HealthStatus) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().push(Box::new(listener));
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;

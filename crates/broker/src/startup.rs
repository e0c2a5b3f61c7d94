// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, reversible startup steps.
//!
//! A [`StartupProcess`] runs its steps forward on startup and the
//! completed steps' inverses in reverse on shutdown. A failure while
//! starting unwinds exactly the steps that already started, newest
//! first, and then fails with the original error; a failure while
//! shutting down is logged and the unwind continues.

use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;

/// Errors raised by startup and shutdown steps.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] tug_storage::SnapshotStoreError),

    #[error(transparent)]
    State(#[from] tug_storage::StateControllerError),

    #[error("{0}")]
    Other(String),
}

impl StartupError {
    pub fn other(message: impl Into<String>) -> Self {
        StartupError::Other(message.into())
    }
}

/// One reversible piece of bring-up. `shutdown` must tolerate being
/// called when `startup` only partially completed its own work.
#[async_trait]
pub trait StartupStep<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;
    async fn startup(&self, ctx: &mut C) -> Result<(), StartupError>;
    async fn shutdown(&self, ctx: &mut C) -> Result<(), StartupError>;
}

/// Ordered list of startup steps with reverse-unwind semantics.
pub struct StartupProcess<C: Send> {
    name: &'static str,
    steps: Vec<Box<dyn StartupStep<C>>>,
    /// How many steps completed startup; these are the ones shutdown
    /// unwinds.
    started: usize,
}

impl<C: Send> StartupProcess<C> {
    pub fn new(name: &'static str, steps: Vec<Box<dyn StartupStep<C>>>) -> Self {
        Self { name, steps, started: 0 }
    }

    /// Run every step in order. On the first failure, shut down the
    /// already-started steps in reverse and fail with the original
    /// error.
    pub async fn startup(&mut self, ctx: &mut C) -> Result<(), StartupError> {
        for index in 0..self.steps.len() {
            let step = &self.steps[index];
            let start = Instant::now();
            match step.startup(ctx).await {
                Ok(()) => {
                    tracing::debug!(
                        process = self.name,
                        step = step.name(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "step started"
                    );
                    self.started = index + 1;
                }
                Err(e) => {
                    tracing::error!(
                        process = self.name,
                        step = step.name(),
                        error = %e,
                        "startup failed; unwinding started steps"
                    );
                    self.unwind(ctx).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Shut down every started step in reverse order. Errors never stop
    /// the unwind; the first one is returned after everything ran.
    pub async fn shutdown(&mut self, ctx: &mut C) -> Result<(), StartupError> {
        let mut first_error = None;
        while self.started > 0 {
            self.started -= 1;
            let step = &self.steps[self.started];
            let start = Instant::now();
            match step.shutdown(ctx).await {
                Ok(()) => tracing::debug!(
                    process = self.name,
                    step = step.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "step stopped"
                ),
                Err(e) => {
                    tracing::warn!(
                        process = self.name,
                        step = step.name(),
                        error = %e,
                        "shutdown step failed; continuing teardown"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Best-effort reverse unwind after a startup failure.
    async fn unwind(&mut self, ctx: &mut C) {
        let _ = self.shutdown(ctx).await;
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;

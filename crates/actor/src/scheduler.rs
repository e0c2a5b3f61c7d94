// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actor scheduling on top of the tokio runtime.
//!
//! [`ActorScheduler`] hands out [`Actor`]s. Every spawned actor drains
//! its own unbounded FIFO on a dedicated tokio task: tasks submitted to
//! the same actor run in submission order and never concurrently, tasks
//! of different actors interleave freely on the runtime's worker
//! threads.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::future::{completable, ActorError, ActorFuture};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Spawns actors and owns their shutdown signal.
#[derive(Clone)]
pub struct ActorScheduler {
    cancel: CancellationToken,
}

impl ActorScheduler {
    pub fn new() -> Self {
        Self { cancel: CancellationToken::new() }
    }

    /// Spawn a named actor with its own task queue.
    pub fn actor(&self, name: &str) -> Actor {
        Actor::spawn(name, self.cancel.child_token())
    }

    /// Stop every actor spawned from this scheduler. Each actor finishes
    /// its current task; queued tasks are dropped and their futures
    /// resolve with [`ActorError::Closed`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Default for ActorScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
enum Mode {
    Spawned { tx: mpsc::UnboundedSender<Task> },
    Inline,
}

/// A single logical thread of execution.
///
/// Cheap to clone; all clones feed the same FIFO.
#[derive(Clone)]
pub struct Actor {
    name: Arc<str>,
    mode: Mode,
    cancel: CancellationToken,
}

impl Actor {
    fn spawn(name: &str, cancel: CancellationToken) -> Self {
        let name: Arc<str> = Arc::from(name);
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let drain_name = Arc::clone(&name);
        let drain_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = drain_cancel.cancelled() => break,
                    task = rx.recv() => match task {
                        Some(task) => task(),
                        None => break,
                    },
                }
            }
            tracing::trace!(actor = %drain_name, "actor stopped");
        });
        Self { name, mode: Mode::Spawned { tx }, cancel }
    }

    /// An actor that executes every submitted task synchronously on the
    /// caller's thread. Unit-test use only: it trades the serialization
    /// guarantee of a spawned actor for determinism.
    pub fn inline() -> Self {
        Self {
            name: Arc::from("inline"),
            mode: Mode::Inline,
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a task; the returned future resolves with the task's
    /// output, or with [`ActorError::Closed`] if the actor shuts down
    /// before running it.
    pub fn submit<T, F>(&self, task: F) -> ActorFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (completer, future) = completable();
        let job: Task = Box::new(move || {
            let _ = completer.complete(task());
        });
        match &self.mode {
            Mode::Spawned { tx } => {
                if tx.send(job).is_err() {
                    // Queue gone; the dropped completer resolves the
                    // future with Closed.
                    tracing::trace!(actor = %self.name, "submit to stopped actor");
                }
            }
            Mode::Inline => job(),
        }
        future
    }

    /// Run `callback` on this actor once `future` resolves.
    ///
    /// The callback is serialized with the actor's other tasks, so a
    /// completion from another actor cannot race with this actor's
    /// state.
    pub fn run_on_completion<T, F>(&self, future: ActorFuture<T>, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, ActorError>) + Send + 'static,
    {
        match &self.mode {
            Mode::Spawned { .. } => {
                let actor = self.clone();
                tokio::spawn(async move {
                    let result = future.await;
                    let _ = actor.submit(move || callback(result));
                });
            }
            Mode::Inline => {
                let mut future = future;
                let waker = futures_util::task::noop_waker();
                let poll = Pin::new(&mut future).poll(&mut Context::from_waker(&waker));
                match poll {
                    Poll::Ready(result) => callback(result),
                    Poll::Pending => match tokio::runtime::Handle::try_current() {
                        Ok(handle) => {
                            let actor = self.clone();
                            handle.spawn(async move {
                                let result = future.await;
                                let _ = actor.submit(move || callback(result));
                            });
                        }
                        Err(_) => tracing::warn!(
                            actor = %self.name,
                            "dropping completion callback: future pending and no runtime"
                        ),
                    },
                }
            }
        }
    }

    /// Schedule `task` on this actor every `period` until cancelled via
    /// the returned handle. The first run happens one period from now.
    ///
    /// The inline test actor ignores fixed-rate scheduling; tests drive
    /// periodic work by invoking it directly.
    pub fn run_at_fixed_rate<F>(&self, period: Duration, task: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let handle = TimerHandle { cancel: self.cancel.child_token() };
        match &self.mode {
            Mode::Spawned { .. } => {
                let actor = self.clone();
                let token = handle.cancel.clone();
                let task = Arc::new(Mutex::new(task));
                tokio::spawn(async move {
                    let start = tokio::time::Instant::now() + period;
                    let mut interval = tokio::time::interval_at(start, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            _ = interval.tick() => {
                                let task = Arc::clone(&task);
                                let _ = actor.submit(move || {
                                    let mut task = task.lock();
                                    (*task)();
                                });
                            }
                        }
                    }
                });
            }
            Mode::Inline => {
                tracing::debug!(actor = %self.name, "inline actor ignores fixed-rate scheduling");
            }
        }
        handle
    }

    /// Stop this actor after the task currently running, dropping queued
    /// tasks.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Cancellation handle for a fixed-rate schedule.
pub struct TimerHandle {
    cancel: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

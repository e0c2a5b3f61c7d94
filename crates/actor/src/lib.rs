// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tug-actor: Cooperative actor runtime.
//!
//! Each actor is a single logical thread: an unbounded FIFO of task
//! closures drained by one dedicated tokio task, so everything an actor
//! owns is accessed from exactly one task at a time. Blocking I/O does
//! not belong in actor tasks; hand it to a worker and route the result
//! back with [`Actor::run_on_completion`].

pub mod future;
pub mod scheduler;

pub use future::{completable, ActorError, ActorFuture, Completer};
pub use scheduler::{Actor, ActorScheduler, TimerHandle};

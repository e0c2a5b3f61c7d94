// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completable futures shared between actors.
//!
//! A [`Completer`]/[`ActorFuture`] pair is the handshake primitive of the
//! runtime: one side resolves exactly once, the other awaits. Dropping
//! the completer without resolving fails the future with
//! [`ActorError::Closed`], which is how futures of never-run tasks
//! settle when an actor shuts down.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

/// Errors surfaced by the actor runtime itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActorError {
    /// The owning actor shut down before the task produced a value.
    #[error("actor closed before completing the task")]
    Closed,
}

/// Create a completable future usable across actors.
pub fn completable<T: Send + 'static>() -> (Completer<T>, ActorFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, ActorFuture { rx })
}

/// The resolving half of a completable future. Consumed on completion.
pub struct Completer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completer<T> {
    /// Resolve the paired future. Returns the value if nobody is
    /// listening anymore.
    pub fn complete(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }
}

/// The awaiting half of a completable future.
///
/// Resolves with `Err(ActorError::Closed)` when the completer is dropped
/// unresolved.
pub struct ActorFuture<T> {
    rx: oneshot::Receiver<T>,
}

impl<T: Send + 'static> ActorFuture<T> {
    /// An already-resolved future.
    pub fn ready(value: T) -> Self {
        let (completer, future) = completable();
        // The receiver is alive, the send cannot fail.
        let _ = completer.complete(value);
        future
    }
}

impl<T> Future for ActorFuture<T> {
    type Output = Result<T, ActorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ActorError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[path = "future_tests.rs"]
mod tests;

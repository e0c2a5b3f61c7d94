// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn completing_resolves_the_future() {
    let (completer, future) = completable::<u32>();
    completer.complete(7).unwrap();
    assert_eq!(future.await, Ok(7));
}

#[tokio::test]
async fn dropping_the_completer_fails_with_closed() {
    let (completer, future) = completable::<u32>();
    drop(completer);
    assert_eq!(future.await, Err(ActorError::Closed));
}

#[tokio::test]
async fn ready_resolves_immediately() {
    assert_eq!(ActorFuture::ready("done").await, Ok("done"));
}

#[test]
fn complete_reports_a_dropped_listener() {
    let (completer, future) = completable::<u32>();
    drop(future);
    assert_eq!(completer.complete(1), Err(1));
}

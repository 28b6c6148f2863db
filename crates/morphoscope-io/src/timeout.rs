//! Bounded waits on browser timers.

use std::future::Future;

use futures::future::{self, Either};
use gloo_timers::future::TimeoutFuture;

/// Race `fut` against a timer of `millis` milliseconds.
///
/// Returns `None` if the timer fires first. The losing future is
/// dropped; an in-flight `fetch` keeps running in the browser and its
/// result is simply never observed.
#[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
pub async fn with_timeout<F: Future>(millis: u32, fut: F) -> Option<F::Output> {
    let fut = std::pin::pin!(fut);
    match future::select(fut, TimeoutFuture::new(millis)).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}

/// Resolve after `millis` milliseconds.
pub async fn sleep(millis: u32) {
    TimeoutFuture::new(millis).await;
}

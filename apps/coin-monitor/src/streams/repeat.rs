//! Re-running finite producers.

use std::time::Duration;

use futures::{future, stream};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Run `factory`, drain its stream, wait `every`, and start over.
///
/// Stops as soon as `cancel` fires, including in the middle of a run or a
/// pause. Producers report failures as items, so a failed run is just a run
/// that yields an error value.
pub fn repeatable<F, S>(
    mut factory: F,
    every: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = S::Item>
where
    F: FnMut() -> S,
    S: Stream,
{
    stream::repeat_with(move || factory().chain(pause(every)))
        .flatten()
        .take_until(cancel.cancelled_owned())
}

/// Empty stream that ends after `duration`.
fn pause<T>(duration: Duration) -> impl Stream<Item = T> {
    stream::once(tokio::time::sleep(duration)).filter_map(|()| future::ready(None))
}

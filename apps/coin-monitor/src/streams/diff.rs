//! Previous/current pairing.

use futures::future;
use futures_util::{Stream, StreamExt};

/// Pair every item with the one before it.
///
/// The first item is paired with `initial`.
pub fn diff<S, T>(stream: S, initial: T) -> impl Stream<Item = (T, T)>
where
    S: Stream<Item = T>,
    T: Clone,
{
    stream.scan(initial, |previous, current: T| {
        let previous = std::mem::replace(previous, current.clone());
        future::ready(Some((previous, current)))
    })
}

/// Like [`diff`], but only items that differ from the last emitted value.
///
/// The baseline advances only when a pair is emitted.
pub fn changes<S, T>(stream: S, initial: T) -> impl Stream<Item = (T, T)>
where
    S: Stream<Item = T>,
    T: Clone + PartialEq,
{
    stream
        .scan(initial, |baseline, current: T| {
            let pair = if *baseline == current {
                None
            } else {
                Some((std::mem::replace(baseline, current.clone()), current))
            };
            future::ready(Some(pair))
        })
        .filter_map(future::ready)
}

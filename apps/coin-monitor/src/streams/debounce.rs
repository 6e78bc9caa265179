//! Quiet-period filtering.

use std::time::Duration;

use futures::stream;
use futures_util::stream::Fuse;
use futures_util::{Stream, StreamExt};

struct Debouncer<S: Stream> {
    source: Fuse<S>,
    pending: Option<S::Item>,
}

/// Emit an item only after `period` passes with no newer item.
///
/// A pending item is emitted immediately when the source ends.
pub fn debounce<S>(source: S, period: Duration) -> impl Stream<Item = S::Item>
where
    S: Stream + Unpin,
{
    let state = Debouncer {
        source: source.fuse(),
        pending: None,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            let Some(item) = state.pending.take() else {
                state.pending = Some(state.source.next().await?);
                continue;
            };

            tokio::select! {
                next = state.source.next() => match next {
                    Some(newer) => state.pending = Some(newer),
                    None => return Some((item, state)),
                },
                () = tokio::time::sleep(period) => return Some((item, state)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_latest_after_quiet_period() {
        let (tx, rx) = mpsc::unbounded();
        let mut out = Box::pin(debounce(rx, Duration::from_secs(300)));

        tx.unbounded_send(1).unwrap();
        tx.unbounded_send(2).unwrap();
        tx.unbounded_send(3).unwrap();

        let started = Instant::now();
        assert_eq!(out.next().await, Some(3));
        assert!(started.elapsed() >= Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn new_item_restarts_period() {
        let (tx, rx) = mpsc::unbounded();
        let mut out = Box::pin(debounce(rx, Duration::from_secs(10)));

        tokio::spawn(async move {
            tx.unbounded_send(1).unwrap();
            tokio::time::sleep(Duration::from_secs(6)).await;
            tx.unbounded_send(2).unwrap();
            tokio::time::sleep(Duration::from_secs(20)).await;
            tx.unbounded_send(3).unwrap();
        });

        let started = Instant::now();
        assert_eq!(out.next().await, Some(2));
        assert!(started.elapsed() >= Duration::from_secs(16));
        assert_eq!(out.next().await, Some(3));
        assert_eq!(out.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_pending_on_source_end() {
        let out: Vec<_> = debounce(stream::iter([1, 2]), Duration::from_secs(3600))
            .collect()
            .await;
        assert_eq!(out, vec![2]);
    }

    #[tokio::test]
    async fn empty_source() {
        let out: Vec<u8> = debounce(stream::iter(Vec::<u8>::new()), Duration::from_secs(1))
            .collect()
            .await;
        assert!(out.is_empty());
    }
}

//! Latest-value cells fed by streams.

use std::pin::pin;

use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Drive `stream` on a background task and keep its latest item in a cell.
///
/// The cell starts empty. The task stops when the stream ends or `cancel`
/// fires; the last value stays readable.
pub fn state_in<S, T>(stream: S, cancel: CancellationToken) -> watch::Receiver<Option<T>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let mut stream = pin!(stream);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                item = stream.next() => match item {
                    Some(value) => {
                        tx.send_replace(Some(value));
                    }
                    None => break,
                },
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn holds_latest_value() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded();
        let mut cell = state_in(rx, cancel.clone());
        assert!(cell.borrow().is_none());

        tx.unbounded_send(1).unwrap();
        tx.unbounded_send(2).unwrap();
        let value = *cell.wait_for(|v| *v == Some(2)).await.unwrap();
        assert_eq!(value, Some(2));

        cancel.cancel();
    }

    #[tokio::test]
    async fn keeps_last_value_after_stream_ends() {
        let mut cell = state_in(stream::iter(["a", "b"]), CancellationToken::new());

        // Sender is dropped once the stream is drained.
        while cell.changed().await.is_ok() {}
        assert_eq!(*cell.borrow(), Some("b"));
    }
}

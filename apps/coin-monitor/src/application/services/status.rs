//! Periodic main coin status.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use crate::application::ports::Notification;
use crate::domain::CoinResult;

/// Default time between status updates.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(15);

/// Default bound on a single status delivery.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Publish the main coin's latest result every `every` until cancelled.
///
/// Nothing is sent until the coin has a first result. The dispatcher should
/// carry a timeout so a stuck notifier cannot stall later updates.
pub async fn publish_status(
    main_coin: watch::Receiver<Option<CoinResult>>,
    dispatcher: Dispatcher,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let latest = main_coin.borrow().clone();
                if let Some(coin) = latest {
                    dispatcher.dispatch(&Notification::Status(coin)).await;
                }
            }
        }
    }

    tracing::info!("Status publisher stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::application::ports::MockNotifier;
    use crate::domain::Price;

    #[tokio::test(start_paused = true)]
    async fn publishes_on_every_tick_once_coin_is_known() {
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let mut notifier = MockNotifier::new();
        notifier.expect_name().return_const("mock");
        notifier
            .expect_notify()
            .withf(|n| matches!(n, Notification::Status(CoinResult::Ok { .. })))
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        let (cell, main_coin) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(publish_status(
            main_coin,
            Dispatcher::new(vec![Arc::new(notifier)]).with_timeout(DEFAULT_STATUS_TIMEOUT),
            DEFAULT_STATUS_INTERVAL,
            cancel.clone(),
        ));

        // First tick fires with no result yet.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        cell.send_replace(Some(CoinResult::Ok {
            name: "BTC/USD".to_string(),
            price: Price::usd(1.0),
        }));
        tokio::time::sleep(Duration::from_secs(30)).await;

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }
}

//! Banner composition.

use std::time::Duration;

use futures::stream;
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use crate::application::ports::Notification;
use crate::domain::{Banner, CoinResult, DailyStats};

/// Default time between banner samples.
pub const DEFAULT_BANNER_INTERVAL: Duration = Duration::from_secs(5);

/// Inputs sampled into a banner.
#[derive(Debug, Clone)]
pub struct BannerSources {
    /// Banner title.
    pub name: String,
    /// Latest result cell per coin, in display order.
    pub coins: Vec<watch::Receiver<Option<CoinResult>>>,
    /// Latest statistics cell.
    pub stats: watch::Receiver<Option<DailyStats>>,
}

impl BannerSources {
    /// Current snapshot of every cell.
    #[must_use]
    pub fn snapshot(&self) -> Banner {
        Banner {
            name: self.name.clone(),
            coins: self
                .coins
                .iter()
                .filter_map(|coin| coin.borrow().clone())
                .collect(),
            stats: *self.stats.borrow(),
        }
    }
}

/// Sample the cells every `every`, emitting a banner whenever it differs
/// from the previous one. The first sample is taken immediately.
pub fn banners(
    sources: BannerSources,
    every: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Banner> + Send + 'static {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold(
        (ticker, sources, None::<Banner>),
        |(mut ticker, sources, mut last)| async move {
            loop {
                ticker.tick().await;
                let banner = sources.snapshot();
                if banner.is_empty() || last.as_ref() == Some(&banner) {
                    continue;
                }
                last = Some(banner.clone());
                return Some((banner, (ticker, sources, last)));
            }
        },
    )
    .take_until(cancel.cancelled_owned())
}

/// Deliver every banner from `banners` until it ends.
pub async fn publish_banners<S>(banners: S, dispatcher: Dispatcher)
where
    S: Stream<Item = Banner>,
{
    let mut banners = std::pin::pin!(banners);
    while let Some(banner) = banners.next().await {
        tracing::debug!(coins = banner.coins.len(), "Publishing banner");
        dispatcher.dispatch(&Notification::Banner(banner)).await;
    }
    tracing::info!("Banner publisher stopped");
}

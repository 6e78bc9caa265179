//! All-time high monitoring.
//!
//! ```text
//! main coin cell ─► prices ─► track_ath ─► debounce ─► PersistentDiff ─► notifiers
//! ```
//!
//! The debounce keeps a rally from producing one notification per tick: only
//! the ATH standing after a quiet period is announced.

use std::path::PathBuf;
use std::time::Duration;

use futures::future;
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use crate::application::ports::Notification;
use crate::domain::{Ath, AthTracker, AthUpdate, CoinResult, Currency, Price};
use crate::streams::{PersistError, PersistentDiff, debounce};

/// Default quiet period before a new ATH is announced.
pub const DEFAULT_ATH_DEBOUNCE: Duration = Duration::from_secs(5 * 60);

/// File name of the persisted main coin ATH.
pub const ATH_FILE_NAME: &str = "main_coin.ath";

/// Emit a new [`Ath`] each time a price beats the running maximum.
pub fn track_ath<S>(prices: S, initial: Ath) -> impl Stream<Item = Ath>
where
    S: Stream<Item = Price>,
{
    prices
        .scan(AthTracker::new(initial), |tracker, price| {
            future::ready(Some(tracker.observe(price)))
        })
        .filter_map(future::ready)
}

/// ATH monitor settings.
#[derive(Debug, Clone)]
pub struct AthMonitorConfig {
    /// File holding the persisted ATH.
    pub path: PathBuf,
    /// Quiet period before announcing.
    pub debounce: Duration,
    /// Persisted state flush interval.
    pub sample_interval: Duration,
    /// Currency of the main coin.
    pub currency: Currency,
}

impl Default for AthMonitorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(ATH_FILE_NAME),
            debounce: DEFAULT_ATH_DEBOUNCE,
            sample_interval: crate::streams::DEFAULT_SAMPLE_INTERVAL,
            currency: Currency::Usd,
        }
    }
}

/// Watch the main coin and announce new all-time highs.
///
/// Runs until the main coin cell closes or `cancel` fires.
///
/// # Errors
///
/// Returns [`PersistError::PathInUse`] if another monitor owns the ATH file.
pub async fn monitor_ath(
    main_coin: watch::Receiver<Option<CoinResult>>,
    dispatcher: Dispatcher,
    config: AthMonitorConfig,
    cancel: CancellationToken,
) -> Result<(), PersistError> {
    let currency = config.currency;
    let persistent = PersistentDiff::open(&config.path, |text| Ath::parse(text, currency))
        .await?
        .with_sample_interval(config.sample_interval);
    let initial = *persistent.baseline();

    tracing::info!(
        path = %config.path.display(),
        ath = %initial.price,
        "ATH monitor started"
    );

    let prices = WatchStream::new(main_coin)
        .filter_map(|coin| future::ready(coin.as_ref().and_then(CoinResult::price)))
        .take_until(cancel.cancelled_owned());
    let highs = debounce(Box::pin(track_ath(prices, initial)), config.debounce);

    let mut updates = persistent.diff(highs, Ath::to_persisted);
    while let Some((previous, current)) = updates.next().await {
        tracing::info!(previous = %previous.price, current = %current.price, "New ATH");
        dispatcher
            .dispatch(&Notification::Ath(AthUpdate { previous, current }))
            .await;
    }
    updates.close().await;

    tracing::info!("ATH monitor stopped");
    Ok(())
}

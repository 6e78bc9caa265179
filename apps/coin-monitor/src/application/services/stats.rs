//! Daily statistics feed and change informer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{future, stream};
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use crate::application::ports::{Notification, StatsSource};
use crate::domain::DailyStats;
use crate::streams::{PersistError, PersistentDiff, repeatable};

/// Default time between statistics fetches.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// File name of the persisted statistics.
pub const STATS_FILE_NAME: &str = "idofcowstats.txt";

/// Successful fetches from `source`, one per `every`. Failures are logged
/// and skipped.
pub fn stats_feed(
    source: Arc<dyn StatsSource>,
    every: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = DailyStats> + Send + 'static {
    repeatable(
        move || {
            let source = Arc::clone(&source);
            stream::once(async move { source.fetch().await })
        },
        every,
        cancel,
    )
    .filter_map(|result| {
        future::ready(match result {
            Ok(stats) => {
                tracing::debug!(daily_infections = stats.daily_infections, "Statistics fetched");
                Some(stats)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch statistics");
                None
            }
        })
    })
}

/// Announce statistics changes against the persisted value.
///
/// Runs until the statistics cell closes or `cancel` fires.
///
/// # Errors
///
/// Returns [`PersistError::PathInUse`] if another informer owns the file.
pub async fn inform_stats(
    stats: watch::Receiver<Option<DailyStats>>,
    dispatcher: Dispatcher,
    path: PathBuf,
    sample_interval: Duration,
    cancel: CancellationToken,
) -> Result<(), PersistError> {
    let persistent = PersistentDiff::open(&path, DailyStats::parse)
        .await?
        .with_sample_interval(sample_interval);

    tracing::info!(
        path = %path.display(),
        daily_infections = persistent.baseline().daily_infections,
        "Statistics informer started"
    );

    let values = WatchStream::new(stats)
        .filter_map(future::ready)
        .take_until(cancel.cancelled_owned());

    let mut changes = persistent.diff(values, DailyStats::to_persisted);
    while let Some((previous, current)) = changes.next().await {
        tracing::info!(
            previous = previous.daily_infections,
            current = current.daily_infections,
            "Statistics changed"
        );
        dispatcher
            .dispatch(&Notification::Stats { previous, current })
            .await;
    }
    changes.close().await;

    tracing::info!("Statistics informer stopped");
    Ok(())
}

//! Coin price feeds.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::PriceProvider;
use crate::domain::CoinResult;
use crate::streams::repeatable;

/// Default pause before a finished provider run is restarted.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// A coin that has not been connected to its source yet.
#[derive(Clone)]
pub struct OfflineCoin {
    name: String,
    provider: Arc<dyn PriceProvider>,
}

impl std::fmt::Debug for OfflineCoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCoin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl OfflineCoin {
    /// Create a coin backed by `provider`.
    pub fn new(name: impl Into<String>, provider: Arc<dyn PriceProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    /// Results for this coin until `cancel` fires.
    ///
    /// The provider is restarted `every` after each run ends.
    #[must_use]
    pub fn online(&self, every: Duration, cancel: CancellationToken) -> BoxStream<'static, CoinResult> {
        let provider = Arc::clone(&self.provider);
        let name = self.name.clone();

        repeatable(move || provider.prices(), every, cancel)
            .map(move |result| {
                let coin = CoinResult::from_result(name.as_str(), result);
                log_result(&coin);
                coin
            })
            .boxed()
    }
}

fn log_result(coin: &CoinResult) {
    match coin {
        CoinResult::Ok { name, price } => {
            tracing::debug!(coin = %name, price = %price, "Coin price updated");
        }
        CoinResult::Error { name, error } => {
            tracing::error!(coin = %name, error = %error, "Failed to fetch coin price");
        }
    }
}

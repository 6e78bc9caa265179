//! TradingView price provider.

use futures::stream;
use futures_util::StreamExt;

use crate::application::ports::{PriceProvider, PriceResultStream, SourceError};
use crate::domain::{Currency, Price};
use crate::infrastructure::tradingview::QuoteFeed;

/// Price provider over the shared TradingView quote feed.
///
/// One run is one subscription on the connection that is live when the run
/// starts; it ends with that connection.
#[derive(Debug, Clone)]
pub struct TradingViewProvider {
    feed: QuoteFeed,
    symbol: String,
    currency: Currency,
}

impl TradingViewProvider {
    /// Create a provider for `symbol`, quoted in `currency`.
    #[must_use]
    pub fn new(feed: QuoteFeed, symbol: impl Into<String>, currency: Currency) -> Self {
        Self {
            feed,
            symbol: symbol.into(),
            currency,
        }
    }
}

impl PriceProvider for TradingViewProvider {
    fn prices(&self) -> PriceResultStream {
        let feed = self.feed.clone();
        let symbol = self.symbol.clone();
        let currency = self.currency;

        stream::once(async move { feed.get_price(&symbol).await })
            .map(move |subscription| match subscription {
                Ok(prices) => prices
                    .map(move |value| Ok(Price::new(value, currency)))
                    .boxed(),
                Err(e) => stream::iter([Err(SourceError::FeedUnavailable {
                    message: e.to_string(),
                })])
                .boxed(),
            })
            .flatten()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::infrastructure::tradingview::codec::wrap_frame;
    use crate::infrastructure::tradingview::connection::ConnectionConfig;
    use crate::infrastructure::tradingview::connection::test_support::mock_connection;
    use crate::infrastructure::tradingview::LiveConnection;

    #[tokio::test]
    async fn prices_carry_configured_currency() {
        let cancel = CancellationToken::new();
        let (cell, rx) = watch::channel(None);
        let feed = QuoteFeed::new(LiveConnection::new(rx));
        let (connection, handle, mut remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(connection.run());
        cell.send_replace(Some(handle));

        let provider = TradingViewProvider::new(feed, "FX_IDC:USDPLN", Currency::Pln);
        let mut prices = provider.prices();
        let next = tokio::spawn(async move { prices.next().await });

        let create = remote.next_text().await;
        let _add = remote.next_text().await;
        let create: serde_json::Value =
            serde_json::from_str(create.split("~m~").nth(2).unwrap()).unwrap();
        let session = create["p"][0].as_str().unwrap();
        let payload = serde_json::json!({
            "m": "qsd",
            "p": [session, { "n": "FX_IDC:USDPLN", "s": "ok", "v": { "lp": 4.0512 } }],
        });
        remote.push_text(&wrap_frame(&payload.to_string()));

        let price = next.await.unwrap().unwrap().unwrap();
        assert_eq!(price, Price::new(4.0512, Currency::Pln));
        cancel.cancel();
    }

    #[tokio::test]
    async fn stopped_feed_yields_one_error() {
        let (cell, rx) = watch::channel(None);
        let feed = QuoteFeed::new(LiveConnection::new(rx));
        drop(cell);

        let provider = TradingViewProvider::new(feed, "BITSTAMP:BTCUSD", Currency::Usd);
        let results: Vec<_> = provider.prices().collect().await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SourceError::FeedUnavailable { .. })));
    }
}

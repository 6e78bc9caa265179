//! Quote Subscriptions
//!
//! Many logical price subscriptions share one connection. Each subscription
//! creates its own quote session whose id doubles as the listener id, and
//! filters the connection's packet broadcast by that id.

use futures::future;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use super::connection::{ConnectionError, ConnectionHandle};
use super::packet::{JsonPacket, OutgoingPacket, PacketContent};
use super::supervisor::LiveConnection;
use crate::infrastructure::metrics;

/// Stream of last prices for one symbol.
pub type PriceStream = BoxStream<'static, f64>;

/// Subscribe to `symbol` on a specific connection.
///
/// The receiver is registered before the session packets are queued, so no
/// update addressed to the new session can be missed. Updates without a last
/// price are skipped. The stream ends when the connection closes.
///
/// # Errors
///
/// Returns [`ConnectionError::ConnectionClosed`] if the session packets could
/// not be queued.
pub async fn get_price(
    handle: &ConnectionHandle,
    symbol: &str,
) -> Result<PriceStream, ConnectionError> {
    let listener_id = Uuid::new_v4().to_string();
    let packets = handle.subscribe();

    handle
        .send(&OutgoingPacket::CreateSession {
            session_id: listener_id.clone(),
        })
        .await?;
    handle
        .send(&OutgoingPacket::AddSymbols {
            session_id: listener_id.clone(),
            symbols: vec![symbol.to_string()],
        })
        .await?;

    tracing::debug!(
        connection = handle.id(),
        listener_id = %listener_id,
        symbol,
        "Subscribed to symbol"
    );
    metrics::record_subscription();

    let symbol = symbol.to_string();
    Ok(BroadcastStream::new(packets)
        .take_until(handle.closed())
        .filter_map(move |item| future::ready(price_for(&listener_id, &symbol, item)))
        .boxed())
}

fn price_for(
    listener_id: &str,
    symbol: &str,
    item: Result<JsonPacket, BroadcastStreamRecvError>,
) -> Option<f64> {
    match item {
        Ok(JsonPacket {
            listener_id: Some(id),
            content: PacketContent::CoinUpdate(update),
        }) if id == listener_id => update.price,
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(symbol, skipped, "Price subscriber lagged, updates dropped");
            None
        }
    }
}

/// Price subscriptions over whatever connection is currently live.
#[derive(Debug, Clone)]
pub struct QuoteFeed {
    live: LiveConnection,
}

impl QuoteFeed {
    /// Create a feed over the supervisor's connection cell.
    #[must_use]
    pub const fn new(live: LiveConnection) -> Self {
        Self { live }
    }

    /// Subscribe on the current connection, waiting for one to open.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ConnectionClosed`] if the supervisor has
    /// stopped or the connection closed while subscribing.
    pub async fn get_price(&self, symbol: &str) -> Result<PriceStream, ConnectionError> {
        let handle = self
            .live
            .clone()
            .wait_alive()
            .await
            .ok_or(ConnectionError::ConnectionClosed)?;
        get_price(&handle, symbol).await
    }

    /// Prices for `symbol` across reconnects.
    ///
    /// Re-subscribes on every new connection. Ends when the supervisor stops.
    #[must_use]
    pub fn prices(&self, symbol: impl Into<String>) -> PriceStream {
        let symbol = symbol.into();
        self.live
            .changes()
            .filter_map(|handle| future::ready(handle.filter(ConnectionHandle::is_alive)))
            .then(move |handle| {
                let symbol = symbol.clone();
                async move {
                    match get_price(&handle, &symbol).await {
                        Ok(prices) => Some(prices),
                        Err(e) => {
                            tracing::warn!(symbol, error = %e, "Failed to subscribe to symbol");
                            None
                        }
                    }
                }
            })
            .filter_map(future::ready)
            .flatten()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::infrastructure::tradingview::codec::wrap_frame;
    use crate::infrastructure::tradingview::connection::ConnectionConfig;
    use crate::infrastructure::tradingview::connection::test_support::{
        RemoteEnd, mock_connection,
    };

    fn qsd(listener_id: &str, symbol: &str, price: Option<f64>) -> String {
        let values = price.map_or_else(
            || serde_json::json!({ "bid": 1.0 }),
            |lp| serde_json::json!({ "lp": lp }),
        );
        let payload = serde_json::json!({
            "m": "qsd",
            "p": [listener_id, { "n": symbol, "s": "ok", "v": values }],
        });
        wrap_frame(&payload.to_string())
    }

    /// Read the two session frames and return the session id.
    async fn session_id(remote: &mut RemoteEnd, symbol: &str) -> String {
        let create = remote.next_text().await;
        let add = remote.next_text().await;
        let create: serde_json::Value =
            serde_json::from_str(create.split("~m~").nth(2).unwrap()).unwrap();
        let add: serde_json::Value =
            serde_json::from_str(add.split("~m~").nth(2).unwrap()).unwrap();
        assert_eq!(create["m"], "quote_create_session");
        assert_eq!(add["m"], "quote_add_symbols");
        assert_eq!(add["p"][0], create["p"][0]);
        assert_eq!(add["p"][1], symbol);
        create["p"][0].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn filters_updates_by_listener_id() {
        let cancel = CancellationToken::new();
        let (connection, handle, mut remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(connection.run());

        let mut prices = get_price(&handle, "BITSTAMP:BTCUSD").await.unwrap();
        let id = session_id(&mut remote, "BITSTAMP:BTCUSD").await;

        remote.push_text(&qsd("someone_else", "BITSTAMP:BTCUSD", Some(1.0)));
        remote.push_text(&qsd(&id, "BITSTAMP:BTCUSD", None));
        remote.push_text(&qsd(&id, "BITSTAMP:BTCUSD", Some(64_000.5)));

        assert_eq!(prices.next().await, Some(64_000.5));
        cancel.cancel();
    }

    #[tokio::test]
    async fn same_symbol_gets_independent_sessions() {
        let cancel = CancellationToken::new();
        let (connection, handle, mut remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(connection.run());

        let mut first = get_price(&handle, "TVC:GOLD").await.unwrap();
        let first_id = session_id(&mut remote, "TVC:GOLD").await;
        let mut second = get_price(&handle, "TVC:GOLD").await.unwrap();
        let second_id = session_id(&mut remote, "TVC:GOLD").await;
        assert_ne!(first_id, second_id);

        remote.push_text(&qsd(&second_id, "TVC:GOLD", Some(2.0)));
        remote.push_text(&qsd(&first_id, "TVC:GOLD", Some(1.0)));

        assert_eq!(first.next().await, Some(1.0));
        assert_eq!(second.next().await, Some(2.0));
        cancel.cancel();
    }

    #[tokio::test]
    async fn stream_ends_when_connection_closes() {
        let cancel = CancellationToken::new();
        let (connection, handle, mut remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(connection.run());

        let mut prices = get_price(&handle, "TVC:GOLD").await.unwrap();
        let _ = session_id(&mut remote, "TVC:GOLD").await;
        drop(remote);

        assert_eq!(prices.next().await, None);
    }

    #[tokio::test]
    async fn closed_connection_rejects_subscription() {
        let cancel = CancellationToken::new();
        let (connection, handle, remote) = mock_connection(&ConnectionConfig::default(), &cancel);
        let driver = tokio::spawn(connection.run());
        drop(remote);
        let _ = driver.await;

        let result = get_price(&handle, "TVC:GOLD").await;
        assert!(matches!(result, Err(ConnectionError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn durable_prices_follow_new_connections() {
        let cancel = CancellationToken::new();
        let (cell, rx) = watch::channel(None);
        let feed = QuoteFeed::new(LiveConnection::new(rx));

        let (first_conn, first, mut first_remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(first_conn.run());
        cell.send_replace(Some(first));

        let mut prices = feed.prices("BITSTAMP:ETHUSD");
        let prices_task = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(price) = prices.next().await {
                seen.push(price);
            }
            seen
        });

        let id = session_id(&mut first_remote, "BITSTAMP:ETHUSD").await;
        first_remote.push_text(&qsd(&id, "BITSTAMP:ETHUSD", Some(1.0)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first_remote);

        let (second_conn, second, mut second_remote) =
            mock_connection(&ConnectionConfig::default(), &cancel);
        tokio::spawn(second_conn.run());
        cell.send_replace(Some(second));

        let id = session_id(&mut second_remote, "BITSTAMP:ETHUSD").await;
        second_remote.push_text(&qsd(&id, "BITSTAMP:ETHUSD", Some(2.0)));
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(cell);
        cancel.cancel();

        assert_eq!(prices_task.await.unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn feed_get_price_fails_after_supervisor_stops() {
        let (cell, rx) = watch::channel(None);
        let feed = QuoteFeed::new(LiveConnection::new(rx));
        drop(cell);

        let result = feed.get_price("TVC:GOLD").await;
        assert!(matches!(result, Err(ConnectionError::ConnectionClosed)));
    }
}

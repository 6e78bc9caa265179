//! Connection Supervisor
//!
//! Keeps exactly one TradingView connection open for the lifetime of the
//! process. Connections are created one at a time, published through a
//! `watch` cell, awaited until they close and replaced after a fixed delay.
//!
//! Subscribers never hold on to a connection directly. They observe the
//! [`LiveConnection`] cell and re-subscribe whenever a new handle appears.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures_util::{Sink, Stream};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::connection::{self, Connection, ConnectionConfig, ConnectionError, ConnectionHandle};
use crate::infrastructure::metrics;

/// Default pause between a connection closing and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// Connector Port
// =============================================================================

/// An opened connection whose driver has not started yet.
pub struct Established {
    /// Handle published to subscribers.
    pub handle: ConnectionHandle,
    /// Driver future; completes when the connection closes.
    pub driver: BoxFuture<'static, Result<(), ConnectionError>>,
}

impl Established {
    /// Box a connection's driver.
    pub fn new<R, W>(connection: Connection<R, W>, handle: ConnectionHandle) -> Self
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
        W: Sink<Message> + Unpin + Send + 'static,
        W::Error: std::fmt::Display,
    {
        Self {
            handle,
            driver: Box::pin(connection.run()),
        }
    }
}

/// Opens connections for the supervisor.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection bound to `cancel`.
    async fn connect(&self, cancel: &CancellationToken) -> Result<Established, ConnectionError>;
}

/// Connector for the real TradingView socket.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: ConnectionConfig,
}

impl WebSocketConnector {
    /// Create a connector with the given connection settings.
    #[must_use]
    pub const fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, cancel: &CancellationToken) -> Result<Established, ConnectionError> {
        let (connection, handle) = connection::connect(&self.config, cancel).await?;
        Ok(Established::new(connection, handle))
    }
}

// =============================================================================
// Live Connection Cell
// =============================================================================

/// Read side of the current-connection cell.
///
/// Holds the latest handle only. A closed handle stays in the cell until the
/// next connection replaces it.
#[derive(Debug, Clone)]
pub struct LiveConnection {
    rx: watch::Receiver<Option<ConnectionHandle>>,
}

impl LiveConnection {
    /// Wrap a watch receiver.
    #[must_use]
    pub const fn new(rx: watch::Receiver<Option<ConnectionHandle>>) -> Self {
        Self { rx }
    }

    /// Wait until an open connection is published.
    ///
    /// Returns `None` once the supervisor has stopped.
    pub async fn wait_alive(&mut self) -> Option<ConnectionHandle> {
        match self
            .rx
            .wait_for(|handle| handle.as_ref().is_some_and(ConnectionHandle::is_alive))
            .await
        {
            Ok(handle) => handle.clone(),
            Err(_) => None,
        }
    }

    /// Stream of published handles, starting with the current one.
    #[must_use]
    pub fn changes(&self) -> WatchStream<Option<ConnectionHandle>> {
        WatchStream::new(self.rx.clone())
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Reconnect loop around a [`Connector`].
pub struct Supervisor<C> {
    connector: C,
    reconnect_delay: Duration,
    current: watch::Sender<Option<ConnectionHandle>>,
    cancel: CancellationToken,
}

impl<C: Connector> Supervisor<C> {
    /// Create a supervisor. Nothing connects until [`Self::run`] is awaited.
    pub fn new(connector: C, reconnect_delay: Duration, cancel: CancellationToken) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            connector,
            reconnect_delay,
            current,
            cancel,
        }
    }

    /// Observer for the current connection.
    #[must_use]
    pub fn live(&self) -> LiveConnection {
        LiveConnection::new(self.current.subscribe())
    }

    /// Run until cancelled.
    ///
    /// Attempts never overlap: the next one starts only after the previous
    /// connection has fully closed and the reconnect delay has elapsed.
    pub async fn run(self) {
        let mut attempt: u64 = 0;

        while !self.cancel.is_cancelled() {
            attempt += 1;
            tracing::info!(attempt, "Creating TradingView connection");

            let outcome = tokio::select! {
                () = self.cancel.cancelled() => break,
                outcome = self.connector.connect(&self.cancel) => outcome,
            };

            match outcome {
                Ok(Established { handle, driver }) => {
                    let id = handle.id();
                    tracing::info!(connection = id, "TradingView connection open");
                    metrics::set_connection_alive(true);
                    self.current.send_replace(Some(handle));

                    let result = driver.await;
                    metrics::set_connection_alive(false);
                    match result {
                        Ok(()) => tracing::info!(connection = id, "TradingView connection closed"),
                        Err(e) => tracing::warn!(
                            connection = id,
                            error = %e,
                            "TradingView connection lost"
                        ),
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to connect to TradingView");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            tracing::info!(
                delay_secs = self.reconnect_delay.as_secs(),
                "Reconnecting to TradingView after delay"
            );
            metrics::record_reconnect();

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        tracing::info!("TradingView supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::infrastructure::tradingview::connection::test_support::{
        RemoteEnd, mock_connection,
    };

    struct MockConnector {
        attempts: Arc<AtomicUsize>,
        failures: usize,
        remotes: mpsc::UnboundedSender<RemoteEnd>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(
            &self,
            cancel: &CancellationToken,
        ) -> Result<Established, ConnectionError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(ConnectionError::ConnectionFailed("refused".to_string()));
            }
            let (connection, handle, remote) =
                mock_connection(&ConnectionConfig::default(), cancel);
            let _ = self.remotes.send(remote);
            Ok(Established::new(connection, handle))
        }
    }

    fn supervisor(
        failures: usize,
    ) -> (
        Supervisor<MockConnector>,
        Arc<AtomicUsize>,
        mpsc::UnboundedReceiver<RemoteEnd>,
        CancellationToken,
    ) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (remotes, remotes_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let connector = MockConnector {
            attempts: Arc::clone(&attempts),
            failures,
            remotes,
        };
        let supervisor = Supervisor::new(connector, DEFAULT_RECONNECT_DELAY, cancel.clone());
        (supervisor, attempts, remotes_rx, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn replaces_closed_connection_after_delay() {
        let (supervisor, _attempts, mut remotes, cancel) = supervisor(0);
        let mut live = supervisor.live();
        let task = tokio::spawn(supervisor.run());

        let first_remote = remotes.recv().await.unwrap();
        let first = live.wait_alive().await.unwrap();

        let closed_at = Instant::now();
        drop(first_remote);

        let _second_remote = remotes.recv().await.unwrap();
        assert!(closed_at.elapsed() >= DEFAULT_RECONNECT_DELAY);

        let second = live.wait_alive().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(!first.is_alive());

        cancel.cancel();
        task.await.unwrap();
        assert!(!second.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_failed_connect() {
        let (supervisor, attempts, mut remotes, cancel) = supervisor(2);
        let mut live = supervisor.live();
        let started = Instant::now();
        let task = tokio::spawn(supervisor.run());

        let _remote = remotes.recv().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= DEFAULT_RECONNECT_DELAY * 2);
        assert!(live.wait_alive().await.is_some());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_loop() {
        let (supervisor, attempts, _remotes, cancel) = supervisor(usize::MAX);
        let mut live = supervisor.live();
        let task = tokio::spawn(supervisor.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(live.wait_alive().await.is_none());
    }
}

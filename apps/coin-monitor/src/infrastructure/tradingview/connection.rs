//! TradingView Connection
//!
//! One WebSocket session to `data.tradingview.com`. The connection is
//! single-shot: it opens, runs until the transport closes, errors or the
//! owning scope is cancelled, and is then discarded. Reconnection belongs to
//! the [`Supervisor`](super::supervisor::Supervisor).
//!
//! # Tasks and channels
//!
//! ```text
//!                       ┌────────────────────┐
//!  handle.send() ──────►│ outgoing (mpsc)    │──┐
//!                       └────────────────────┘  │   ┌───────────┐
//!                                               ├──►│  writer   │──► socket
//!  ~h~<id> ping ──► pong ───────────────────────┘   └───────────┘
//!
//!  socket ──► reader ──► PacketCodec ──► packets (broadcast) ──► subscribers
//! ```
//!
//! The driver task is the only writer, so control frames never interleave.
//! Subscribers read from a `broadcast` channel; a slow subscriber lags and
//! drops items instead of stalling the driver.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::codec::PacketCodec;
use super::packet::{IncomingPacket, JsonPacket, OutgoingPacket};
use crate::infrastructure::metrics;

/// TradingView quote socket.
pub const DEFAULT_URL: &str = "wss://data.tradingview.com/socket.io/websocket";

/// Origin the socket expects; connections without it are rejected.
pub const DEFAULT_ORIGIN: &str = "https://www.tradingview.com";

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// WebSocket connection could not be established.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Writing to the transport failed.
    #[error("failed to send frame: {0}")]
    Send(String),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Nothing arrived within an idle timeout after a ping.
    #[error("no frames received for {0:?} after pinging the transport")]
    HeartbeatTimeout(Duration),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Value of the `Origin` request header.
    pub origin: String,
    /// How long to wait for a frame before probing the transport.
    pub idle_timeout: Duration,
    /// Capacity of the decoded packet broadcast channel.
    pub packet_capacity: usize,
    /// Capacity of the outgoing frame queue.
    pub outgoing_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            idle_timeout: Duration::from_secs(30),
            packet_capacity: 1_024,
            outgoing_capacity: 64,
        }
    }
}

// =============================================================================
// Connection Handle
// =============================================================================

/// Cheap, cloneable view of a live connection.
///
/// Used by subscribers to queue control packets and to read decoded packets.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    codec: PacketCodec,
    outgoing: mpsc::Sender<String>,
    packets: broadcast::Sender<JsonPacket>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Process-unique connection id, for logs.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Queue a control packet on the connection's writer.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ConnectionClosed`] if the connection is gone.
    pub async fn send(&self, packet: &OutgoingPacket) -> Result<(), ConnectionError> {
        let frame = self.codec.encode_frame(packet);
        tracing::debug!(connection = self.id, frame = %frame, "Queueing outgoing packet");
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ConnectionError::ConnectionClosed)
    }

    /// New receiver for decoded JSON packets.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JsonPacket> {
        self.packets.subscribe()
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Future that resolves once the connection has closed.
    #[must_use]
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.closed.clone().cancelled_owned()
    }
}

// =============================================================================
// Connection Driver
// =============================================================================

/// Driver owning both halves of the transport.
pub struct Connection<R, W> {
    reader: R,
    writer: W,
    outgoing: mpsc::Receiver<String>,
    handle: ConnectionHandle,
    idle_timeout: Duration,
}

/// TradingView socket over TCP/TLS.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection over a real WebSocket.
pub type WsConnection = Connection<SplitStream<WsStream>, SplitSink<WsStream, Message>>;

/// Open the socket and send the handshake.
///
/// The connection closes when `cancel` is cancelled.
///
/// # Errors
///
/// Returns an error if the socket cannot be opened or the handshake cannot
/// be written.
pub async fn connect(
    config: &ConnectionConfig,
    cancel: &CancellationToken,
) -> Result<(WsConnection, ConnectionHandle), ConnectionError> {
    tracing::info!(url = %config.url, "Connecting to TradingView");

    let mut request = config.url.as_str().into_client_request()?;
    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| ConnectionError::ConnectionFailed(format!("invalid origin: {e}")))?;
    request.headers_mut().insert(ORIGIN, origin);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
    let (mut writer, reader) = ws_stream.split();

    writer
        .send(Message::Text(PacketCodec::new().handshake_frame().into()))
        .await?;

    Ok(Connection::new(reader, writer, config, cancel))
}

impl<R, W> Connection<R, W>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    /// Wrap an already-open transport.
    pub fn new(
        reader: R,
        writer: W,
        config: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> (Self, ConnectionHandle) {
        let (outgoing_tx, outgoing) = mpsc::channel(config.outgoing_capacity);
        let (packets, _) = broadcast::channel(config.packet_capacity);

        let handle = ConnectionHandle {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            codec: PacketCodec::new(),
            outgoing: outgoing_tx,
            packets,
            closed: cancel.child_token(),
        };

        let connection = Self {
            reader,
            writer,
            outgoing,
            handle: handle.clone(),
            idle_timeout: config.idle_timeout,
        };

        (connection, handle)
    }

    /// Process frames until the connection closes.
    ///
    /// Returns `Ok(())` when the owning scope was cancelled and an error when
    /// the transport closed or failed. Either way the handle reports the
    /// connection as closed afterwards.
    ///
    /// # Errors
    ///
    /// Returns the transport failure that ended the connection.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let Self {
            mut reader,
            mut writer,
            mut outgoing,
            handle,
            idle_timeout,
        } = self;

        let _closed = handle.closed.clone().drop_guard();
        let id = handle.id;
        let mut deadline = Instant::now() + idle_timeout;
        let mut awaiting_reply = false;

        loop {
            tokio::select! {
                () = handle.closed.cancelled() => {
                    tracing::info!(connection = id, "Closing TradingView connection");
                    let _ = writer.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(frame) = outgoing.recv() => {
                    send_text(&mut writer, frame).await?;
                }
                () = tokio::time::sleep_until(deadline) => {
                    if awaiting_reply {
                        tracing::warn!(
                            connection = id,
                            idle_secs = idle_timeout.as_secs(),
                            "Transport did not answer ping"
                        );
                        return Err(ConnectionError::HeartbeatTimeout(idle_timeout));
                    }
                    tracing::debug!(
                        connection = id,
                        idle_secs = idle_timeout.as_secs(),
                        "No frames received, probing transport"
                    );
                    send_message(&mut writer, Message::Ping(Vec::new().into())).await?;
                    awaiting_reply = true;
                    deadline = Instant::now() + idle_timeout;
                }
                msg = reader.next() => {
                    awaiting_reply = false;
                    deadline = Instant::now() + idle_timeout;
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_text(&text, &handle, &mut writer).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            send_message(&mut writer, Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(connection = id, ?frame, "Server sent close frame");
                            return Err(ConnectionError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!(connection = id, "WebSocket stream ended");
                            return Err(ConnectionError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }
}

/// Decode one text message: answer pings, broadcast JSON packets, log failures.
async fn handle_text<W>(
    text: &str,
    handle: &ConnectionHandle,
    writer: &mut W,
) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    tracing::trace!(connection = handle.id, text, "Text frame received");
    metrics::record_frame_received();

    for decoded in handle.codec.decode_all(text) {
        match decoded {
            Ok(Some(IncomingPacket::Ping { id })) => {
                tracing::debug!(connection = handle.id, id, "Sending pong");
                send_text(writer, handle.codec.pong_frame(id)).await?;
                metrics::record_packet_decoded(metrics::PacketKind::Ping);
            }
            Ok(Some(IncomingPacket::Json(packet))) => {
                metrics::record_packet_decoded(metrics::PacketKind::Json);
                // No receivers is fine: nobody has subscribed yet.
                let _ = handle.packets.send(packet);
            }
            Ok(None) => {}
            Err(failure) => {
                metrics::record_decode_failure();
                tracing::error!(
                    connection = handle.id,
                    error = %failure.cause,
                    raw = %failure.raw,
                    "Failed to decode packet"
                );
            }
        }
    }

    Ok(())
}

async fn send_text<W>(writer: &mut W, frame: String) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    send_message(writer, Message::Text(frame.into())).await
}

async fn send_message<W>(writer: &mut W, message: Message) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    writer
        .send(message)
        .await
        .map_err(|e| ConnectionError::Send(e.to_string()))
}

// =============================================================================
// Test Support
// =============================================================================

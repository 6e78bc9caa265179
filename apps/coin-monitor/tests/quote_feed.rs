//! Quote Feed Integration Tests
//!
//! Runs the supervisor against a local WebSocket server speaking the
//! TradingView framing.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use coin_monitor::infrastructure::tradingview::codec::wrap_frame;
use coin_monitor::{ConnectionConfig, QuoteFeed, Supervisor, WebSocketConnector};

const WAIT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

async fn start_feed(
    reconnect_delay: Duration,
) -> (TcpListener, QuoteFeed, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ConnectionConfig {
        url: format!("ws://{addr}"),
        ..ConnectionConfig::default()
    };
    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(
        WebSocketConnector::new(config),
        reconnect_delay,
        cancel.clone(),
    );
    let feed = QuoteFeed::new(supervisor.live());
    tokio::spawn(supervisor.run());

    (listener, feed, cancel)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

    let handshake = next_text(&mut socket).await;
    assert!(handshake.starts_with("~m~"));
    assert!(handshake.contains(r#""m":"set_auth_token""#));
    assert!(handshake.contains("unauthorized_user_token"));
    socket
}

async fn next_text(socket: &mut ServerSocket) -> String {
    loop {
        let message = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = message {
            return text.as_str().to_owned();
        }
    }
}

fn payload(frame: &str) -> serde_json::Value {
    serde_json::from_str(frame.split("~m~").nth(2).unwrap()).unwrap()
}

/// Read the session frames for `symbol` and return the session id.
async fn accept_session(socket: &mut ServerSocket, symbol: &str) -> String {
    let create = payload(&next_text(socket).await);
    let add = payload(&next_text(socket).await);
    assert_eq!(create["m"], "quote_create_session");
    assert_eq!(add["m"], "quote_add_symbols");
    assert_eq!(add["p"][0], create["p"][0]);
    assert_eq!(add["p"][1], symbol);
    create["p"][0].as_str().unwrap().to_string()
}

async fn send_price(socket: &mut ServerSocket, session: &str, symbol: &str, price: f64) {
    let payload = serde_json::json!({
        "m": "qsd",
        "p": [session, { "n": symbol, "s": "ok", "v": { "lp": price, "ch": 1.5 } }],
    });
    socket
        .send(Message::text(wrap_frame(&payload.to_string())))
        .await
        .unwrap();
}

#[tokio::test]
async fn subscribes_and_answers_keepalive() {
    let (listener, feed, cancel) = start_feed(Duration::from_millis(50)).await;

    let mut prices = feed.prices("BITSTAMP:BTCUSD");
    let first = tokio::spawn(async move { prices.next().await });

    let mut socket = accept(&listener).await;
    let session = accept_session(&mut socket, "BITSTAMP:BTCUSD").await;

    socket.send(Message::text("~m~4~m~~h~7")).await.unwrap();
    assert_eq!(next_text(&mut socket).await, "~m~4~m~~h~7");

    send_price(&mut socket, &session, "BITSTAMP:BTCUSD", 64_000.5).await;
    let price = timeout(WAIT, first).await.unwrap().unwrap();
    assert_eq!(price, Some(64_000.5));

    cancel.cancel();
}

#[tokio::test]
async fn prices_resume_after_reconnect() {
    let (listener, feed, cancel) = start_feed(Duration::from_millis(50)).await;

    let mut prices = feed.prices("COINBASE:LTCUSD");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(price) = prices.next().await {
            if tx.send(price).is_err() {
                break;
            }
        }
    });

    let mut first = accept(&listener).await;
    let session = accept_session(&mut first, "COINBASE:LTCUSD").await;
    send_price(&mut first, &session, "COINBASE:LTCUSD", 180.25).await;
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(180.25));

    first.close(None).await.unwrap();
    drop(first);

    let mut second = accept(&listener).await;
    let resumed = accept_session(&mut second, "COINBASE:LTCUSD").await;
    assert_ne!(resumed, session);
    send_price(&mut second, &resumed, "COINBASE:LTCUSD", 181.0).await;
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(181.0));

    cancel.cancel();
}

#[tokio::test]
async fn prices_end_after_shutdown() {
    let (listener, feed, cancel) = start_feed(Duration::from_millis(50)).await;

    let mut prices = feed.prices("FX_IDC:USDPLN");
    let collected = tokio::spawn(async move { prices.next().await });

    let mut socket = accept(&listener).await;
    let _ = accept_session(&mut socket, "FX_IDC:USDPLN").await;

    cancel.cancel();
    assert_eq!(timeout(WAIT, collected).await.unwrap().unwrap(), None);
}

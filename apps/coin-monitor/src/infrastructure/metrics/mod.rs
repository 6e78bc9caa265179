//! Prometheus Metrics Module
//!
//! Exposes monitor metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Feed**: frames and packets received from TradingView, decode failures
//! - **Connections**: live connection gauge, reconnects, quote subscriptions
//! - **State**: persisted-state flushes
//! - **Notifications**: deliveries per notifier and outcome
//!
//! # Integration
//!
//! When a port is configured the exporter serves `/metrics` on it. Without a
//! recorder installed every recording function is a no-op.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

static INSTALLED: OnceLock<()> = OnceLock::new();

// =============================================================================
// Initialization
// =============================================================================

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// A port of `0` leaves metrics disabled. Repeated calls are ignored.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 || INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    let _ = INSTALLED.set(());
    register_metrics();
    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Feed counters
    describe_counter!(
        "coin_monitor_frames_received_total",
        "Total WebSocket text messages received from TradingView"
    );
    describe_counter!(
        "coin_monitor_packets_decoded_total",
        "Total framed packets decoded by kind"
    );
    describe_counter!(
        "coin_monitor_decode_failures_total",
        "Total framed packets that failed to decode"
    );

    // Connection state
    describe_gauge!(
        "coin_monitor_connection_alive",
        "Whether a TradingView connection is currently open"
    );
    describe_counter!(
        "coin_monitor_reconnects_total",
        "Total TradingView reconnection attempts"
    );
    describe_counter!(
        "coin_monitor_subscriptions_total",
        "Total quote sessions created"
    );

    // State
    describe_counter!(
        "coin_monitor_state_flushes_total",
        "Total persisted state flushes by outcome"
    );

    // Notifications
    describe_counter!(
        "coin_monitor_notifications_total",
        "Total notifications delivered by notifier and outcome"
    );
    describe_histogram!(
        "coin_monitor_notification_seconds",
        "Time spent delivering a notification"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for decoded packet kinds.
#[derive(Debug, Clone, Copy)]
pub enum PacketKind {
    /// `~h~` keepalive.
    Ping,
    /// JSON packet.
    Json,
}

impl PacketKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Json => "json",
        }
    }
}

/// Metric labels for operation outcomes.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl<T, E> From<&Result<T, E>> for Outcome {
    fn from(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Record a WebSocket text message.
pub fn record_frame_received() {
    counter!("coin_monitor_frames_received_total").increment(1);
}

/// Record a decoded packet.
pub fn record_packet_decoded(kind: PacketKind) {
    counter!(
        "coin_monitor_packets_decoded_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a packet that failed to decode.
pub fn record_decode_failure() {
    counter!("coin_monitor_decode_failures_total").increment(1);
}

/// Update the live connection gauge.
pub fn set_connection_alive(alive: bool) {
    gauge!("coin_monitor_connection_alive").set(if alive { 1.0 } else { 0.0 });
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("coin_monitor_reconnects_total").increment(1);
}

/// Record a new quote session.
pub fn record_subscription() {
    counter!("coin_monitor_subscriptions_total").increment(1);
}

/// Record a persisted state flush.
pub fn record_state_flush(outcome: Outcome) {
    counter!(
        "coin_monitor_state_flushes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a notification delivery.
pub fn record_notification(notifier: &'static str, outcome: Outcome, duration: Duration) {
    counter!(
        "coin_monitor_notifications_total",
        "notifier" => notifier,
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(
        "coin_monitor_notification_seconds",
        "notifier" => notifier
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

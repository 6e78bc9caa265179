#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Coin Monitor - TradingView price watcher
//!
//! Keeps one connection to TradingView's quote WebSocket, multiplexes
//! per-coin price subscriptions over it, and turns the resulting streams into
//! chat notifications: new all-time highs, daily statistics changes, a live
//! price banner, and a periodic status line.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Prices, coins, ATH, statistics, banner snapshots
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for price sources, statistics, notifiers
//!   - `services`: Coin feeds, ATH monitor, statistics informer, banner, status
//!
//! - **Streams**: Combinators the services are built from
//!   (`diff`, `changes`, `debounce`, `repeatable`, `state_in`, `PersistentDiff`)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `tradingview`: framing codec, connection driver, supervisor, quote feed
//!   - `sources`: TradingView, PancakeSwap, and ArcGIS adapters
//!   - `notify`: log, Discord, and Telegram notifiers
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! TradingView WS ──► Connection ──► broadcast ──► get_price(symbol) ──┐
//!                        ▲                                            │
//!                   Supervisor                        OfflineCoin::online
//!                                                                     │
//! PancakeSwap ───────────────────────────────────────────────────────►├──► state cells
//! ArcGIS ──────────────────────────────────────► stats_feed ─────────►┘        │
//!                                                                              ▼
//!                                ATH monitor / stats informer / banner / status
//!                                                                              │
//!                                                       Dispatcher ──► notifiers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Prices and derived values with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Stream combinators.
pub mod streams;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{
    Ath, AthUpdate, Banner, CoinDefinition, CoinResult, CoinSource, Currency, DailyStats, Price,
};

// Ports
pub use application::ports::{
    Notification, Notifier, NotifyError, PriceProvider, SourceError, StatsSource,
};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError};

// TradingView client
pub use infrastructure::tradingview::{
    ConnectionConfig, ConnectionError, ConnectionHandle, LiveConnection, PacketCodec, QuoteFeed,
    Supervisor, WebSocketConnector,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

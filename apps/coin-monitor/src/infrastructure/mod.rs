//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// TradingView quote WebSocket client.
pub mod tradingview;

/// Price and statistics source adapters.
pub mod sources;

/// Chat notifier adapters.
pub mod notify;

/// Shared HTTP client setup.
pub mod http;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;

//! Data Source Ports (Driven Ports)
//!
//! Interfaces for fetching prices and statistics.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{DailyStats, Price};

/// Data source error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Request could not be sent or the body could not be read.
    #[error("Source request failed: {message}")]
    RequestFailed {
        /// Error details.
        message: String,
    },

    /// Response had an unexpected shape.
    #[error("Source response invalid: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },

    /// Streaming feed is not available.
    #[error("Price feed unavailable: {message}")]
    FeedUnavailable {
        /// Error details.
        message: String,
    },
}

/// Stream of price fetch outcomes.
pub type PriceResultStream = BoxStream<'static, Result<Price, SourceError>>;

/// Port for a coin's price source.
///
/// Each call starts one finite run of the source: a single poll for HTTP
/// sources, a subscription for streaming feeds. Callers re-invoke it to keep
/// prices flowing.
#[cfg_attr(test, mockall::automock)]
pub trait PriceProvider: Send + Sync {
    /// Start one run of the source.
    fn prices(&self) -> PriceResultStream;
}

/// Port for the daily statistics source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch the latest statistics.
    async fn fetch(&self) -> Result<DailyStats, SourceError>;
}

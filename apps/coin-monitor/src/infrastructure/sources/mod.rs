//! Price and Statistics Sources
//!
//! Adapters implementing the source ports.
//!
//! - [`tradingview`]: streaming prices over the shared quote feed
//! - [`pancakeswap`]: polled token prices
//! - [`arcgis`]: daily statistics

pub mod arcgis;
pub mod pancakeswap;
pub mod tradingview;

use std::sync::Arc;

pub use arcgis::ArcgisStatsSource;
pub use pancakeswap::PancakeSwapProvider;
pub use tradingview::TradingViewProvider;

use crate::application::ports::PriceProvider;
use crate::domain::{CoinDefinition, CoinSource};
use crate::infrastructure::tradingview::QuoteFeed;

/// Build the provider for a configured coin.
#[must_use]
pub fn provider_for(
    coin: &CoinDefinition,
    feed: &QuoteFeed,
    client: &reqwest::Client,
    pancakeswap_url: &str,
) -> Arc<dyn PriceProvider> {
    match &coin.source {
        CoinSource::TradingView { symbol } => Arc::new(TradingViewProvider::new(
            feed.clone(),
            symbol.clone(),
            coin.currency,
        )),
        CoinSource::PancakeSwap { address } => Arc::new(PancakeSwapProvider::new(
            client.clone(),
            pancakeswap_url,
            address,
        )),
    }
}

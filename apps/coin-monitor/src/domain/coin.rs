//! Monitored coins and their latest results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::price::{Currency, Price, UnknownCurrency};

/// Latest outcome of fetching a coin's price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CoinResult {
    /// Price fetched.
    Ok {
        /// Display name, e.g. `BTC/USD`.
        name: String,
        /// Latest price.
        price: Price,
    },
    /// Fetch failed.
    Error {
        /// Display name.
        name: String,
        /// Failure description.
        error: String,
    },
}

impl CoinResult {
    /// Build a result from a provider outcome.
    pub fn from_result<E: fmt::Display>(name: impl Into<String>, result: Result<Price, E>) -> Self {
        let name = name.into();
        match result {
            Ok(price) => Self::Ok { name, price },
            Err(e) => Self::Error {
                name,
                error: e.to_string(),
            },
        }
    }

    /// Display name of the coin.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Ok { name, .. } | Self::Error { name, .. } => name,
        }
    }

    /// Price, if the fetch succeeded.
    #[must_use]
    pub const fn price(&self) -> Option<Price> {
        match self {
            Self::Ok { price, .. } => Some(*price),
            Self::Error { .. } => None,
        }
    }
}

/// Where a coin's price comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CoinSource {
    /// TradingView symbol in `EXCHANGE:TICKER` form.
    TradingView {
        /// Symbol, e.g. `BITSTAMP:BTCUSD`.
        symbol: String,
    },
    /// PancakeSwap token, polled over HTTP.
    PancakeSwap {
        /// Token contract address.
        address: String,
    },
}

const PANCAKESWAP_PREFIX: &str = "pancakeswap:";

impl fmt::Display for CoinSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TradingView { symbol } => f.write_str(symbol),
            Self::PancakeSwap { address } => write!(f, "{PANCAKESWAP_PREFIX}{address}"),
        }
    }
}

/// Errors parsing a coin definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinParseError {
    /// Definition does not have `NAME|SOURCE|CURRENCY` shape.
    #[error("expected NAME|SOURCE|CURRENCY, got {0:?}")]
    Malformed(String),

    /// Source is neither `EXCHANGE:TICKER` nor `pancakeswap:<address>`.
    #[error("invalid price source: {0:?}")]
    InvalidSource(String),

    /// Currency code not supported.
    #[error(transparent)]
    Currency(#[from] UnknownCurrency),
}

impl FromStr for CoinSource {
    type Err = CoinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(address) = s.strip_prefix(PANCAKESWAP_PREFIX) {
            if address.is_empty() {
                return Err(CoinParseError::InvalidSource(s.to_string()));
            }
            return Ok(Self::PancakeSwap {
                address: address.to_string(),
            });
        }

        match s.split_once(':') {
            Some((exchange, ticker)) if !exchange.is_empty() && !ticker.is_empty() => {
                Ok(Self::TradingView {
                    symbol: s.to_string(),
                })
            }
            _ => Err(CoinParseError::InvalidSource(s.to_string())),
        }
    }
}

/// A coin to monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinDefinition {
    /// Display name.
    pub name: String,
    /// Price source.
    pub source: CoinSource,
    /// Currency the source quotes in.
    pub currency: Currency,
}

impl CoinDefinition {
    /// TradingView coin.
    #[must_use]
    pub fn trading_view(name: &str, symbol: &str, currency: Currency) -> Self {
        Self {
            name: name.to_string(),
            source: CoinSource::TradingView {
                symbol: symbol.to_string(),
            },
            currency,
        }
    }

    /// Coins monitored when nothing is configured.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::trading_view("BTC/USD", "BITSTAMP:BTCUSD", Currency::Usd),
            Self::trading_view("ETH/USD", "BITSTAMP:ETHUSD", Currency::Usd),
            Self::trading_view("LTC/USD", "COINBASE:LTCUSD", Currency::Usd),
            Self::trading_view("USD/PLN", "FX_IDC:USDPLN", Currency::Pln),
        ]
    }

    /// Parse a `;`-separated list of `NAME|SOURCE|CURRENCY` entries.
    ///
    /// # Errors
    ///
    /// Returns the first entry that fails to parse.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, CoinParseError> {
        list.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for CoinDefinition {
    type Err = CoinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').map(str::trim).collect();
        let [name, source, currency] = parts.as_slice() else {
            return Err(CoinParseError::Malformed(s.to_string()));
        };
        if name.is_empty() {
            return Err(CoinParseError::Malformed(s.to_string()));
        }

        Ok(Self {
            name: (*name).to_string(),
            source: source.parse()?,
            currency: currency.parse()?,
        })
    }
}

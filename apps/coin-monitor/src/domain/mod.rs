//! Domain Layer - Prices, coins, and the values derived from them.
//!
//! Pure types with no I/O. Everything here is plain data plus the rules
//! for comparing, formatting, and persisting it.

/// All-time high tracking.
pub mod ath;

/// Banner snapshot.
pub mod banner;

/// Coin definitions and fetch results.
pub mod coin;

/// Prices and currencies.
pub mod price;

/// Daily statistics.
pub mod stats;

pub use ath::{Ath, AthTracker, AthUpdate};
pub use banner::Banner;
pub use coin::{CoinDefinition, CoinParseError, CoinResult, CoinSource};
pub use price::{Currency, Price, UnknownCurrency};
pub use stats::DailyStats;

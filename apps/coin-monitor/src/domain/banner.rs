//! Summary banner.

use serde::{Deserialize, Serialize};

use super::coin::CoinResult;
use super::stats::DailyStats;

/// Snapshot of every monitored coin plus the latest statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    /// Banner title.
    pub name: String,
    /// Latest result per coin, in configuration order. Coins without a
    /// result yet are left out.
    pub coins: Vec<CoinResult>,
    /// Latest statistics, if any have been fetched.
    pub stats: Option<DailyStats>,
}

impl Banner {
    /// Whether there is anything to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty() && self.stats.is_none()
    }
}

//! Daily statistics.

use serde::{Deserialize, Serialize};

/// Daily statistics published by the statistics source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    /// Infections reported for the day (`ZAKAZENIA_DZIENNE`).
    pub daily_infections: u32,
}

impl DailyStats {
    /// Create stats.
    #[must_use]
    pub const fn new(daily_infections: u32) -> Self {
        Self { daily_infections }
    }

    /// Read persisted stats. Empty or malformed text yields zero.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::new(text.trim().parse().unwrap_or(0))
    }

    /// Text written to the statistics file.
    #[must_use]
    pub fn to_persisted(&self) -> String {
        self.daily_infections.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_format() {
        let stats = DailyStats::new(12_965);
        assert_eq!(stats.to_persisted(), "12965");
        assert_eq!(DailyStats::parse("12965\n"), stats);
    }

    #[test]
    fn invalid_text_is_zero() {
        assert_eq!(DailyStats::parse(""), DailyStats::default());
        assert_eq!(DailyStats::parse("-3"), DailyStats::default());
    }
}

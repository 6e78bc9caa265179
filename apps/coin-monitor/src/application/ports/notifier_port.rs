//! Notifier Port (Driven Port)
//!
//! Interface for delivering monitor events to chat services.

use async_trait::async_trait;

use crate::domain::{AthUpdate, Banner, CoinResult, DailyStats};

/// Something worth telling people about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The main coin set a new all-time high.
    Ath(AthUpdate),
    /// Daily statistics changed.
    Stats {
        /// Previously published value.
        previous: DailyStats,
        /// New value.
        current: DailyStats,
    },
    /// Refreshed banner.
    Banner(Banner),
    /// Periodic main coin status.
    Status(CoinResult),
}

impl Notification {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ath(_) => "ath",
            Self::Stats { .. } => "stats",
            Self::Banner(_) => "banner",
            Self::Status(_) => "status",
        }
    }
}

/// Notification delivery error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// Request could not be sent.
    #[error("Notification request failed: {message}")]
    RequestFailed {
        /// Error details.
        message: String,
    },

    /// Service answered with a non-success status.
    #[error("Notification rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Delivery did not finish in time.
    #[error("Notification timed out")]
    Timeout,
}

/// Port for delivering notifications.
///
/// Implementations ignore notification kinds they have no use for.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Deliver a notification to every configured destination.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ath, Price};

    #[test]
    fn notification_kinds() {
        let ath = Notification::Ath(AthUpdate {
            previous: Ath::new(Price::usd(1.0)),
            current: Ath::new(Price::usd(2.0)),
        });
        let stats = Notification::Stats {
            previous: DailyStats::new(1),
            current: DailyStats::new(2),
        };
        assert_eq!(ath.kind(), "ath");
        assert_eq!(stats.kind(), "stats");
        assert_eq!(
            Notification::Status(CoinResult::from_result("BTC", Ok::<_, String>(Price::usd(1.0))))
                .kind(),
            "status"
        );
    }

    #[tokio::test]
    async fn mock_notifier_records_calls() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.kind() == "stats")
            .times(1)
            .returning(|_| Ok(()));

        let result = notifier
            .notify(&Notification::Stats {
                previous: DailyStats::new(1),
                current: DailyStats::new(2),
            })
            .await;
        assert!(result.is_ok());
    }
}

//! Notifier that writes to the log.

use async_trait::async_trait;

use crate::application::ports::{Notification, Notifier, NotifyError};
use crate::domain::CoinResult;

/// Logs every notification. Always configured, so events stay visible when
/// no chat service is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a log notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Ath(update) => tracing::info!(
                previous = %update.previous.price,
                current = %update.current.price,
                "New ATH"
            ),
            Notification::Stats { previous, current } => tracing::info!(
                previous = previous.daily_infections,
                current = current.daily_infections,
                "Daily statistics updated"
            ),
            Notification::Banner(banner) => {
                tracing::debug!(name = %banner.name, coins = banner.coins.len(), "Banner refreshed");
            }
            Notification::Status(CoinResult::Ok { name, price }) => {
                tracing::debug!(coin = %name, price = %price, "Status");
            }
            Notification::Status(CoinResult::Error { name, error }) => {
                tracing::debug!(coin = %name, error = %error, "Status unavailable");
            }
        }
        Ok(())
    }
}

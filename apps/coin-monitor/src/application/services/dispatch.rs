//! Notification fan-out.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use crate::application::ports::{Notification, Notifier, NotifyError};
use crate::infrastructure::metrics::{self, Outcome};

/// Delivers each notification to every configured notifier.
#[derive(Clone, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher without a delivery timeout.
    #[must_use]
    pub const fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            notifiers,
            timeout: None,
        }
    }

    /// Bound every delivery by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Whether there are no notifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver to all notifiers concurrently.
    ///
    /// Failures are logged; one notifier failing never affects the others.
    /// Returns the number of successful deliveries.
    pub async fn dispatch(&self, notification: &Notification) -> usize {
        let deliveries = self
            .notifiers
            .iter()
            .map(|notifier| self.deliver(notifier.as_ref(), notification));

        join_all(deliveries)
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }

    async fn deliver(&self, notifier: &dyn Notifier, notification: &Notification) -> bool {
        let started = Instant::now();
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, notifier.notify(notification))
                .await
                .unwrap_or(Err(NotifyError::Timeout)),
            None => notifier.notify(notification).await,
        };
        metrics::record_notification(notifier.name(), Outcome::from(&result), started.elapsed());

        match result {
            Ok(()) => {
                tracing::debug!(
                    notifier = notifier.name(),
                    kind = notification.kind(),
                    "Notification delivered"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    notifier = notifier.name(),
                    kind = notification.kind(),
                    error = %e,
                    "Failed to deliver notification"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockNotifier;
    use crate::domain::DailyStats;

    fn stats() -> Notification {
        Notification::Stats {
            previous: DailyStats::new(1),
            current: DailyStats::new(2),
        }
    }

    fn notifier(result: Result<(), NotifyError>) -> Arc<dyn Notifier> {
        let mut mock = MockNotifier::new();
        mock.expect_name().return_const("mock");
        mock.expect_notify()
            .times(1)
            .returning(move |_| result.clone());
        Arc::new(mock)
    }

    #[tokio::test]
    async fn failure_does_not_stop_other_notifiers() {
        let dispatcher = Dispatcher::new(vec![
            notifier(Err(NotifyError::RequestFailed {
                message: "down".to_string(),
            })),
            notifier(Ok(())),
        ]);

        assert_eq!(dispatcher.dispatch(&stats()).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_notifier_times_out() {
        struct Slow;

        #[async_trait::async_trait]
        impl Notifier for Slow {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let dispatcher =
            Dispatcher::new(vec![Arc::new(Slow)]).with_timeout(Duration::from_secs(10));
        let started = Instant::now();

        assert_eq!(dispatcher.dispatch(&stats()).await, 0);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn empty_dispatcher_delivers_nothing() {
        let dispatcher = Dispatcher::default();
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&stats()).await, 0);
    }
}

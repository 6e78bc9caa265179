//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `PriceProvider`: Interface for coin price sources
//! - `StatsSource`: Interface for the daily statistics source
//! - `Notifier`: Interface for chat notifications

mod notifier_port;
mod source_port;

#[cfg(test)]
pub use notifier_port::MockNotifier;
pub use notifier_port::{Notification, Notifier, NotifyError};
#[cfg(test)]
pub use source_port::{MockPriceProvider, MockStatsSource};
pub use source_port::{PriceProvider, PriceResultStream, SourceError, StatsSource};

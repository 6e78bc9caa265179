//! Application Services
//!
//! Services that turn price and statistics streams into notifications.
//!
//! - `coins`: Per-coin result streams over price providers
//! - `ath`: All-time high tracking and announcements
//! - `stats`: Daily statistics feed and change announcements
//! - `banner`: Periodic summary banner
//! - `status`: Periodic main coin status
//! - `dispatch`: Fan-out to notifiers

pub mod ath;
pub mod banner;
pub mod coins;
pub mod dispatch;
pub mod stats;
pub mod status;

pub use ath::{AthMonitorConfig, monitor_ath, track_ath};
pub use banner::{BannerSources, banners, publish_banners};
pub use coins::OfflineCoin;
pub use dispatch::Dispatcher;
pub use stats::{inform_stats, stats_feed};
pub use status::publish_status;

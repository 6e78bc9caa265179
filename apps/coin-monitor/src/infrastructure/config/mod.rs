//! Configuration Module
//!
//! Configuration loading for the monitor.

mod settings;

pub use settings::{
    ApiSettings, AppConfig, ChannelSettings, ConfigError, FeedSettings, IntervalSettings, Secret,
    Tokens,
};

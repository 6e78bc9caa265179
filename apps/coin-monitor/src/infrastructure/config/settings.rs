//! Monitor Configuration Settings
//!
//! Configuration types for the coin monitor, loaded from environment
//! variables. Every interval has a default; only a notifier token is required.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{CoinDefinition, CoinParseError};

/// Default ArcGIS feature query for the daily statistics.
pub const DEFAULT_STATS_URL: &str = "https://services-eu1.arcgis.com/zk7YlClTgerl62BY/arcgis/rest/services/global_corona_actual_widok3/FeatureServer/0/query?f=json&cacheHint=true&resultOffset=0&resultRecordCount=1&where=1%3D1&outFields=*&resultType=standard&returnGeometry=false&spatialRel=esriSpatialRelIntersects";

/// Default PancakeSwap token API base.
pub const DEFAULT_PANCAKESWAP_URL: &str = "https://api.pancakeswap.info/api/v2/tokens/";

/// Default Discord REST API base.
pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Default Telegram Bot API base.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Bot token, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a token.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Chat service tokens.
#[derive(Debug, Clone, Default)]
pub struct Tokens {
    /// Discord bot token.
    pub discord: Option<Secret>,
    /// Telegram bot token.
    pub telegram: Option<Secret>,
}

/// Notification destinations.
#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    /// Discord channels receiving ATH and statistics notifications.
    pub discord_notify: Vec<String>,
    /// Discord channels holding the live banner.
    pub discord_banner: Vec<String>,
    /// Telegram chats receiving ATH and statistics notifications.
    pub telegram_chats: Vec<String>,
}

/// TradingView feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket URL.
    pub url: String,
    /// `Origin` header value.
    pub origin: String,
    /// Receive timeout before the transport is probed.
    pub idle_timeout: Duration,
    /// Pause between a connection closing and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: crate::infrastructure::tradingview::connection::DEFAULT_URL.to_string(),
            origin: crate::infrastructure::tradingview::connection::DEFAULT_ORIGIN.to_string(),
            idle_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Timing settings for the monitoring services.
#[derive(Debug, Clone)]
pub struct IntervalSettings {
    /// Pause before a finished coin provider run restarts.
    pub coin_refresh: Duration,
    /// Time between statistics fetches.
    pub stats_refresh: Duration,
    /// Time between banner samples.
    pub banner_sample: Duration,
    /// Time between status updates.
    pub status_sample: Duration,
    /// Bound on a single status or banner delivery.
    pub delivery_timeout: Duration,
    /// Persisted state flush interval.
    pub state_sample: Duration,
    /// Quiet period before a new ATH is announced.
    pub ath_debounce: Duration,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            coin_refresh: Duration::from_secs(15),
            stats_refresh: Duration::from_secs(60),
            banner_sample: Duration::from_secs(5),
            status_sample: Duration::from_secs(15),
            delivery_timeout: Duration::from_secs(10),
            state_sample: Duration::from_secs(10),
            ath_debounce: Duration::from_secs(5 * 60),
        }
    }
}

/// HTTP endpoints of external services.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Statistics query URL.
    pub stats_url: String,
    /// PancakeSwap token API base.
    pub pancakeswap_url: String,
    /// Discord REST API base.
    pub discord_url: String,
    /// Telegram Bot API base.
    pub telegram_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            stats_url: DEFAULT_STATS_URL.to_string(),
            pancakeswap_url: DEFAULT_PANCAKESWAP_URL.to_string(),
            discord_url: DEFAULT_DISCORD_API_URL.to_string(),
            telegram_url: DEFAULT_TELEGRAM_API_URL.to_string(),
        }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Chat service tokens. At least one is set.
    pub tokens: Tokens,
    /// Notification destinations.
    pub channels: ChannelSettings,
    /// TradingView feed settings.
    pub feed: FeedSettings,
    /// Service timings.
    pub intervals: IntervalSettings,
    /// External HTTP endpoints.
    pub api: ApiSettings,
    /// Coins to monitor; the first one is the main coin.
    pub coins: Vec<CoinDefinition>,
    /// Directory holding persisted state files.
    pub state_dir: PathBuf,
    /// Banner title.
    pub banner_name: String,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no notifier token is set or the coin list is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let tokens = Tokens {
            discord: env.non_empty("DISCORD_TOKEN").map(Secret::new),
            telegram: env.non_empty("TELEGRAM_TOKEN").map(Secret::new),
        };
        if tokens.discord.is_none() && tokens.telegram.is_none() {
            return Err(ConfigError::MissingNotifierToken);
        }

        let channels = ChannelSettings {
            discord_notify: env.list("DISCORD_NOTIFY_CHANNELS"),
            discord_banner: env.list("DISCORD_BANNER_CHANNELS"),
            telegram_chats: env.list("TELEGRAM_CHATS"),
        };

        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            url: env.non_empty("TRADINGVIEW_URL").unwrap_or(feed_defaults.url),
            origin: env
                .non_empty("TRADINGVIEW_ORIGIN")
                .unwrap_or(feed_defaults.origin),
            idle_timeout: env.secs("TRADINGVIEW_IDLE_TIMEOUT_SECS", feed_defaults.idle_timeout)?,
            reconnect_delay: env.secs("RECONNECT_DELAY_SECS", feed_defaults.reconnect_delay)?,
        };

        let interval_defaults = IntervalSettings::default();
        let intervals = IntervalSettings {
            coin_refresh: env.secs("COIN_REFRESH_SECS", interval_defaults.coin_refresh)?,
            stats_refresh: env.secs("STATS_REFRESH_SECS", interval_defaults.stats_refresh)?,
            banner_sample: env.secs("BANNER_INTERVAL_SECS", interval_defaults.banner_sample)?,
            status_sample: env.secs("STATUS_INTERVAL_SECS", interval_defaults.status_sample)?,
            delivery_timeout: env
                .secs("DELIVERY_TIMEOUT_SECS", interval_defaults.delivery_timeout)?,
            state_sample: env.secs("STATE_SAMPLE_SECS", interval_defaults.state_sample)?,
            ath_debounce: env.secs("ATH_DEBOUNCE_SECS", interval_defaults.ath_debounce)?,
        };

        let api_defaults = ApiSettings::default();
        let api = ApiSettings {
            stats_url: env.non_empty("STATS_URL").unwrap_or(api_defaults.stats_url),
            pancakeswap_url: env
                .non_empty("PANCAKESWAP_API_URL")
                .unwrap_or(api_defaults.pancakeswap_url),
            discord_url: env
                .non_empty("DISCORD_API_URL")
                .unwrap_or(api_defaults.discord_url),
            telegram_url: env
                .non_empty("TELEGRAM_API_URL")
                .unwrap_or(api_defaults.telegram_url),
        };

        let coins = match env.non_empty("MONITOR_COINS") {
            Some(list) => CoinDefinition::parse_list(&list)?,
            None => CoinDefinition::defaults(),
        };
        if coins.is_empty() {
            return Err(ConfigError::EmptyValue("MONITOR_COINS".to_string()));
        }

        Ok(Self {
            tokens,
            channels,
            feed,
            intervals,
            api,
            coins,
            state_dir: env
                .non_empty("STATE_DIR")
                .map_or_else(|| PathBuf::from("."), PathBuf::from),
            banner_name: env
                .non_empty("BANNER_NAME")
                .unwrap_or_else(|| "coin prices".to_string()),
            metrics_port: env.parse("METRICS_PORT", 0),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither notifier token is set.
    #[error("DISCORD_TOKEN or TELEGRAM_TOKEN environment variable not found")]
    MissingNotifierToken,
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Coin list could not be parsed.
    #[error("invalid MONITOR_COINS: {0}")]
    InvalidCoins(#[from] CoinParseError),
    /// Interval is zero or not a whole number of seconds.
    #[error("environment variable {key} must be a positive number of seconds, got {value:?}")]
    InvalidInterval {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.non_empty(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.non_empty(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let Some(value) = self.non_empty(key) else {
            return Ok(default);
        };
        match value.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidInterval {
                key: key.to_string(),
                value,
            }),
        }
    }
}

//! Coin Monitor Binary
//!
//! Starts the price monitor and its notifiers.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin coin-monitor
//! ```
//!
//! # Environment Variables
//!
//! ## Required (at least one)
//! - `DISCORD_TOKEN`: Discord bot token
//! - `TELEGRAM_TOKEN`: Telegram bot token
//!
//! ## Optional
//! - `DISCORD_NOTIFY_CHANNELS`, `DISCORD_BANNER_CHANNELS`, `TELEGRAM_CHATS`:
//!   comma-separated destinations
//! - `MONITOR_COINS`: `NAME|SOURCE|CURRENCY;...` (first entry is the main coin)
//! - `STATE_DIR`: directory for `main_coin.ath` and `idofcowstats.txt` (default: .)
//! - `BANNER_NAME`: banner title
//! - `TRADINGVIEW_URL`, `TRADINGVIEW_ORIGIN`: quote feed endpoint
//! - `*_SECS`: interval overrides (see `AppConfig`)
//! - `METRICS_PORT`: Prometheus exporter port (default: 0, disabled)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: coin_monitor=info)

use std::sync::Arc;
use std::time::Duration;

use coin_monitor::application::ports::{Notifier, StatsSource};
use coin_monitor::application::services::ath::ATH_FILE_NAME;
use coin_monitor::application::services::stats::STATS_FILE_NAME;
use coin_monitor::application::services::{
    AthMonitorConfig, BannerSources, Dispatcher, OfflineCoin, banners, inform_stats, monitor_ath,
    publish_banners, publish_status, stats_feed,
};
use coin_monitor::infrastructure::http::{DEFAULT_REQUEST_TIMEOUT, build_client};
use coin_monitor::infrastructure::notify::{DiscordNotifier, LogNotifier, TelegramNotifier};
use coin_monitor::infrastructure::sources::{ArcgisStatsSource, provider_for};
use coin_monitor::infrastructure::telemetry;
use coin_monitor::streams::state_in;
use coin_monitor::{
    AppConfig, ConnectionConfig, QuoteFeed, Supervisor, WebSocketConnector, init_metrics,
};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How long persisted state gets to flush after shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    load_dotenv();

    // Initialize telemetry (logging + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting coin monitor");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    log_config(&config);

    init_metrics(config.metrics_port)?;

    let shutdown_token = CancellationToken::new();
    let client = build_client(DEFAULT_REQUEST_TIMEOUT)?;

    // TradingView connection supervisor
    let connection_config = ConnectionConfig {
        url: config.feed.url.clone(),
        origin: config.feed.origin.clone(),
        idle_timeout: config.feed.idle_timeout,
        ..ConnectionConfig::default()
    };
    let supervisor = Supervisor::new(
        WebSocketConnector::new(connection_config),
        config.feed.reconnect_delay,
        shutdown_token.child_token(),
    );
    let feed = QuoteFeed::new(supervisor.live());
    tokio::spawn(supervisor.run());

    // Coin cells
    let coin_cells: Vec<_> = config
        .coins
        .iter()
        .map(|coin| {
            let provider = provider_for(coin, &feed, &client, &config.api.pancakeswap_url);
            let online = OfflineCoin::new(coin.name.clone(), provider)
                .online(config.intervals.coin_refresh, shutdown_token.clone());
            state_in(online, shutdown_token.clone())
        })
        .collect();
    let (Some(main_coin), Some(main_definition)) = (coin_cells.first(), config.coins.first())
    else {
        return Err("no coins configured".into());
    };

    // Statistics cell
    let stats_source: Arc<dyn StatsSource> = Arc::new(ArcgisStatsSource::new(
        client.clone(),
        config.api.stats_url.clone(),
    ));
    let stats_cell = state_in(
        stats_feed(
            stats_source,
            config.intervals.stats_refresh,
            shutdown_token.clone(),
        ),
        shutdown_token.clone(),
    );

    // Notifiers
    let dispatcher = Dispatcher::new(build_notifiers(&config, &client));
    let bounded = dispatcher
        .clone()
        .with_timeout(config.intervals.delivery_timeout);
    tracing::info!(notifiers = dispatcher.len(), "Notifiers configured");

    let mut stateful = JoinSet::new();

    let ath_config = AthMonitorConfig {
        path: config.state_dir.join(ATH_FILE_NAME),
        debounce: config.intervals.ath_debounce,
        sample_interval: config.intervals.state_sample,
        currency: main_definition.currency,
    };
    stateful.spawn(monitor_ath(
        main_coin.clone(),
        dispatcher.clone(),
        ath_config,
        shutdown_token.clone(),
    ));
    stateful.spawn(inform_stats(
        stats_cell.clone(),
        dispatcher,
        config.state_dir.join(STATS_FILE_NAME),
        config.intervals.state_sample,
        shutdown_token.clone(),
    ));

    let banner_sources = BannerSources {
        name: config.banner_name.clone(),
        coins: coin_cells.clone(),
        stats: stats_cell,
    };
    tokio::spawn(publish_banners(
        banners(
            banner_sources,
            config.intervals.banner_sample,
            shutdown_token.clone(),
        ),
        bounded.clone(),
    ));
    tokio::spawn(publish_status(
        main_coin.clone(),
        bounded,
        config.intervals.status_sample,
        shutdown_token.clone(),
    ));

    tracing::info!("Coin monitor ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while let Some(joined) = stateful.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "State monitor failed"),
                Err(e) => tracing::error!(error = %e, "State monitor panicked"),
            }
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Timed out waiting for state to flush");
    }

    tracing::info!("Coin monitor stopped");
    Ok(())
}

/// Log notifier plus whichever chat services have a token.
fn build_notifiers(config: &AppConfig, client: &reqwest::Client) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier::new())];

    if let Some(token) = &config.tokens.discord {
        notifiers.push(Arc::new(DiscordNotifier::new(
            client.clone(),
            &config.api.discord_url,
            token.clone(),
            config.channels.discord_notify.clone(),
            config.channels.discord_banner.clone(),
        )));
    }
    if let Some(token) = &config.tokens.telegram {
        notifiers.push(Arc::new(TelegramNotifier::new(
            client.clone(),
            &config.api.telegram_url,
            token.clone(),
            config.channels.telegram_chats.clone(),
        )));
    }

    notifiers
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        coins = config.coins.len(),
        main_coin = config.coins.first().map_or("", |coin| coin.name.as_str()),
        discord = config.tokens.discord.is_some(),
        telegram = config.tokens.telegram.is_some(),
        state_dir = %config.state_dir.display(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        url = %config.feed.url,
        origin = %config.feed.origin,
        idle_timeout_secs = config.feed.idle_timeout.as_secs(),
        reconnect_delay_secs = config.feed.reconnect_delay.as_secs(),
        "TradingView endpoint"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

//! Discord notifier over the REST API.
//!
//! ATH and statistics updates are posted as new embed messages to the notify
//! channels. The banner lives in one message per banner channel that is
//! edited in place; once that message is older than the banner lifetime a
//! fresh one is created so it stays near the bottom of the channel.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::application::ports::{Notification, Notifier, NotifyError};
use crate::domain::{AthUpdate, Banner, CoinResult, DailyStats};
use crate::infrastructure::config::Secret;
use crate::infrastructure::http::failure_parts;

/// Minutes a banner message is edited before a new one is created.
pub const DEFAULT_BANNER_LIFETIME_MINUTES: i64 = 30;

const BANNER_THUMBNAIL: &str = "https://cryptologos.cc/logos/loopring-lrc-logo.png";

#[derive(Debug, Clone, PartialEq, Serialize)]
struct MessageRequest {
    embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Embed {
    title: String,
    fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Thumbnail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl EmbedField {
    fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    id: String,
}

#[derive(Debug, Clone)]
struct BannerMessage {
    id: String,
    created_at: DateTime<Utc>,
}

fn ath_embed(update: &AthUpdate) -> Embed {
    Embed {
        title: "ath".to_string(),
        fields: vec![
            EmbedField::new("previous", update.previous.price.to_string(), true),
            EmbedField::new("next", update.current.price.to_string(), true),
        ],
        thumbnail: None,
        timestamp: None,
    }
}

fn stats_embed(previous: DailyStats, current: DailyStats) -> Embed {
    Embed {
        title: "id krowy update".to_string(),
        fields: vec![
            EmbedField::new("previous", previous.daily_infections.to_string(), false),
            EmbedField::new("current", current.daily_infections.to_string(), false),
        ],
        thumbnail: None,
        timestamp: None,
    }
}

fn banner_embed(banner: &Banner, now: DateTime<Utc>) -> Embed {
    let mut fields: Vec<EmbedField> = banner
        .coins
        .iter()
        .map(|coin| match coin {
            CoinResult::Ok { name, price } => EmbedField::new(name, price.to_string(), true),
            CoinResult::Error { name, .. } => EmbedField::new(name, "price fetch error", true),
        })
        .collect();
    if let Some(stats) = banner.stats {
        fields.push(EmbedField::new(
            "id of cow POLSKA",
            format!("DAILY: {}", stats.daily_infections),
            false,
        ));
    }

    Embed {
        title: banner.name.clone(),
        fields,
        thumbnail: Some(Thumbnail {
            url: BANNER_THUMBNAIL.to_string(),
        }),
        timestamp: Some(now),
    }
}

/// Discord notifier.
pub struct DiscordNotifier {
    client: reqwest::Client,
    base_url: String,
    token: Secret,
    notify_channels: Vec<String>,
    banner_channels: Vec<String>,
    banner_lifetime: TimeDelta,
    banners: Mutex<HashMap<String, BannerMessage>>,
}

impl std::fmt::Debug for DiscordNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordNotifier")
            .field("base_url", &self.base_url)
            .field("notify_channels", &self.notify_channels)
            .field("banner_channels", &self.banner_channels)
            .finish_non_exhaustive()
    }
}

impl DiscordNotifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: Secret,
        notify_channels: Vec<String>,
        banner_channels: Vec<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            notify_channels,
            banner_channels,
            banner_lifetime: TimeDelta::minutes(DEFAULT_BANNER_LIFETIME_MINUTES),
            banners: Mutex::new(HashMap::new()),
        }
    }

    /// Override how long a banner message is reused.
    #[must_use]
    pub fn with_banner_lifetime(mut self, lifetime: TimeDelta) -> Self {
        self.banner_lifetime = lifetime;
        self
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token.expose())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        body: &MessageRequest,
    ) -> Result<reqwest::Response, NotifyError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed {
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let (status, body) = failure_parts(response).await;
            Err(NotifyError::Rejected { status, body })
        }
    }

    async fn create_message(
        &self,
        channel: &str,
        body: &MessageRequest,
    ) -> Result<MessageCreated, NotifyError> {
        let url = format!("{}/channels/{channel}/messages", self.base_url);
        let response = self.send(self.client.post(url), body).await?;
        response
            .json()
            .await
            .map_err(|e| NotifyError::RequestFailed {
                message: e.to_string(),
            })
    }

    async fn edit_message(
        &self,
        channel: &str,
        message_id: &str,
        body: &MessageRequest,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{channel}/messages/{message_id}", self.base_url);
        self.send(self.client.patch(url), body).await.map(|_| ())
    }

    async fn post_to_notify_channels(&self, embed: Embed) -> Result<(), NotifyError> {
        let body = MessageRequest {
            embeds: vec![embed],
        };
        let results = join_all(
            self.notify_channels
                .iter()
                .map(|channel| self.create_message(channel, &body)),
        )
        .await;
        first_error(results)
    }

    async fn update_banner(&self, channel: &str, body: &MessageRequest) -> Result<(), NotifyError> {
        let now = Utc::now();
        let current = self
            .banners
            .lock()
            .get(channel)
            .filter(|message| now - message.created_at < self.banner_lifetime)
            .cloned();

        if let Some(message) = current {
            let result = self.edit_message(channel, &message.id, body).await;
            if result.is_err() {
                // Message may have been deleted; start over next time.
                self.banners.lock().remove(channel);
            }
            return result;
        }

        let created = self.create_message(channel, body).await?;
        tracing::info!(channel, message_id = %created.id, "Created banner message");
        self.banners.lock().insert(
            channel.to_string(),
            BannerMessage {
                id: created.id,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn publish_banner(&self, banner: &Banner) -> Result<(), NotifyError> {
        let body = MessageRequest {
            embeds: vec![banner_embed(banner, Utc::now())],
        };
        let results = join_all(
            self.banner_channels
                .iter()
                .map(|channel| self.update_banner(channel, &body)),
        )
        .await;
        first_error(results)
    }
}

fn first_error<T>(results: Vec<Result<T, NotifyError>>) -> Result<(), NotifyError> {
    results
        .into_iter()
        .find_map(Result::err)
        .map_or(Ok(()), Err)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Ath(update) => self.post_to_notify_channels(ath_embed(update)).await,
            Notification::Stats { previous, current } => {
                self.post_to_notify_channels(stats_embed(*previous, *current))
                    .await
            }
            Notification::Banner(banner) => self.publish_banner(banner).await,
            // Presence updates need a gateway session.
            Notification::Status(_) => Ok(()),
        }
    }
}

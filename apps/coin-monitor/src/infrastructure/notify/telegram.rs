//! Telegram notifier over the Bot API.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::application::ports::{Notification, Notifier, NotifyError};
use crate::domain::{AthUpdate, DailyStats};
use crate::infrastructure::config::Secret;
use crate::infrastructure::http::failure_parts;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

fn ath_text(update: &AthUpdate) -> String {
    format!(
        "*ATH* ;)\n\n*previous*: {}\n*current*: {}",
        update.previous.price, update.current.price
    )
}

fn stats_text(previous: DailyStats, current: DailyStats) -> String {
    format!(
        "*ID OF COW UPDATED*: {}\n*previous*: {}",
        current.daily_infections, previous.daily_infections
    )
}

/// Telegram notifier. Sends ATH and statistics updates to every chat.
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    token: Secret,
    chats: Vec<String>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("base_url", &self.base_url)
            .field("chats", &self.chats)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Create a notifier.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, token: Secret, chats: Vec<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            chats,
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token.expose());
        let response = self
            .client
            .post(url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed {
                // reqwest errors carry the URL, which carries the token.
                message: e.without_url().to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            let (status, body) = failure_parts(response).await;
            Err(NotifyError::Rejected { status, body })
        }
    }

    async fn broadcast(&self, text: &str) -> Result<(), NotifyError> {
        let results = join_all(self.chats.iter().map(|chat| self.send_message(chat, text))).await;
        results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Ath(update) => self.broadcast(&ath_text(update)).await,
            Notification::Stats { previous, current } => {
                self.broadcast(&stats_text(*previous, *current)).await
            }
            Notification::Banner(_) | Notification::Status(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::{Ath, Banner, Price};

    fn notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::new(
            reqwest::Client::new(),
            &server.uri(),
            Secret::new("123:abc".to_string()),
            vec!["-1001".to_string(), "-1002".to_string()],
        )
    }

    #[test]
    fn message_texts() {
        let update = AthUpdate {
            previous: Ath::new(Price::usd(1.5)),
            current: Ath::new(Price::usd(1_830.514)),
        };
        assert_eq!(
            ath_text(&update),
            "*ATH* ;)\n\n*previous*: $1.50\n*current*: $1,830.514"
        );
        assert_eq!(
            stats_text(DailyStats::new(10_000), DailyStats::new(12_965)),
            "*ID OF COW UPDATED*: 12965\n*previous*: 10000"
        );
    }

    #[tokio::test]
    async fn stats_sent_to_every_chat() {
        let server = MockServer::start().await;
        for chat in ["-1001", "-1002"] {
            Mock::given(method("POST"))
                .and(path("/bot123:abc/sendMessage"))
                .and(body_json(json!({
                    "chat_id": chat,
                    "text": "*ID OF COW UPDATED*: 2\n*previous*: 1",
                    "parse_mode": "Markdown"
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
                .expect(1)
                .mount(&server)
                .await;
        }

        let stats = Notification::Stats {
            previous: DailyStats::new(1),
            current: DailyStats::new(2),
        };
        notifier(&server).notify(&stats).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_send_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("chat not found"))
            .mount(&server)
            .await;

        let update = Notification::Ath(AthUpdate {
            previous: Ath::new(Price::usd(1.0)),
            current: Ath::new(Price::usd(2.0)),
        });
        assert!(matches!(
            notifier(&server).notify(&update).await,
            Err(NotifyError::Rejected { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn banner_is_ignored() {
        let server = MockServer::start().await;
        let banner = Notification::Banner(Banner {
            name: "coin prices".to_string(),
            coins: Vec::new(),
            stats: None,
        });
        notifier(&server).notify(&banner).await.unwrap();
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

//! Telegram Bot API client
//!
//! Uses three methods of the HTTP API:
//! - `getMe` to confirm the token at startup
//! - `getUpdates` as a long-poll for inbound messages
//! - `sendMessage` for replies and alerts
//!
//! The token is part of every request URL, so transport errors are stripped
//! of their URL before they reach a log line.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{async_trait, IncomingMessage, Messenger, UpdateSource};
use crate::error::MessagingError;

/// Public Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra time allowed on top of the long-poll timeout before giving up
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Envelope shared by every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Bot or sender account
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramClient {
    client: Client,
    base_url: Url,
    token: String,
    poll_timeout: Duration,
    /// Next update id to request; everything below it is acknowledged
    offset: AtomicI64,
}

impl TelegramClient {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        poll_timeout: Duration,
    ) -> Result<Self, MessagingError> {
        let client = Client::builder()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            token: token.into(),
            poll_timeout,
            offset: AtomicI64::new(0),
        })
    }

    /// Confirm the token and fetch the bot account
    pub async fn get_me(&self) -> Result<User, MessagingError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Offset that the next `getUpdates` call will send
    pub fn next_offset(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }

    fn method_url(&self, method: &str) -> Result<Url, MessagingError> {
        // The leading "./" keeps "bot<id>:<secret>" from parsing as a scheme.
        Ok(self.base_url.join(&format!("./bot{}/{}", self.token, method))?)
    }

    async fn call<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, MessagingError> {
        let url = self.method_url(method)?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.without_url()))?;

        let status = response.status();
        let parsed: ApiResponse<T> = match response.json().await {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(MessagingError::Api {
                    code: status.as_u16(),
                    description: status.to_string(),
                })
            }
            Err(e) => return Err(MessagingError::Transport(e.without_url())),
        };

        if !parsed.ok {
            return Err(MessagingError::Api {
                code: parsed.error_code.unwrap_or(status.as_u16()),
                description: parsed.description.unwrap_or_default(),
            });
        }

        parsed.result.ok_or_else(|| MessagingError::Api {
            code: status.as_u16(),
            description: format!("{} returned no result", method),
        })
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll(&self) -> Result<Vec<IncomingMessage>, MessagingError> {
        let request = GetUpdatesRequest {
            offset: self.next_offset(),
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };

        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.fetch_max(last + 1, Ordering::AcqRel);
        }

        let messages: Vec<IncomingMessage> = updates
            .into_iter()
            .filter_map(|update| {
                let message = update.message?;
                Some(IncomingMessage {
                    update_id: update.update_id,
                    chat_id: message.chat.id,
                    sender_id: message.from.map(|user| user.id),
                    text: message.text?,
                })
            })
            .collect();

        debug!(count = messages.len(), offset = self.next_offset(), "Polled updates");
        Ok(messages)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessagingError> {
        let request = SendMessageRequest { chat_id, text };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }
}

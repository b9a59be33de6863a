//! Minimal Telegram Bot API client over `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Messenger;
use crate::config::TelegramConfig;
use crate::{AppError, Result};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// New incoming message, if this update carries one.
    pub message: Option<Message>,
}

/// Chat message.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Message identifier within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Sender, absent for channel posts.
    pub from: Option<Sender>,
    /// Text body, absent for media messages.
    pub text: Option<String>,
}

/// Chat reference.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Chat {
    /// Chat identifier.
    pub id: i64,
}

/// Message sender.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Sender {
    /// Telegram user identifier.
    pub id: i64,
    /// Public `@username`, when set.
    pub username: Option<String>,
}

/// Telegram Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl TelegramClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigurationMissing` if no bot token is loaded,
    /// or `AppError::Provider` if the HTTP client cannot be built.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| AppError::ConfigurationMissing("TELEGRAM_BOT_TOKEN".into()))?;
        Self::new(
            &config.api_base_url,
            token,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// Build a client for `base_url` (for example `https://api.telegram.org`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Provider` if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: String, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| AppError::Provider(format!("failed to build http client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
            request_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                // reqwest errors embed the URL, which contains the bot token.
                AppError::Provider(format!("{method} request failed: {}", err.without_url()))
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|err| {
            AppError::Provider(format!(
                "{method} returned unreadable response (http {status}): {}",
                err.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(AppError::Provider(format!(
                "{method} rejected (code {}): {}",
                envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                envelope.description.unwrap_or_else(|| "no description".into())
            )));
        }

        envelope
            .result
            .ok_or_else(|| AppError::Provider(format!("{method} returned no result")))
    }

    /// Send a plain-text message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Provider` on transport failure, timeout, or an
    /// `ok: false` response.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let body = SendMessageRequest {
            chat_id,
            text,
            disable_web_page_preview: true,
        };
        let _: serde_json::Value = self
            .call("sendMessage", &body, self.request_timeout)
            .await?;
        info!(chat_id, "telegram message sent");
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    ///
    /// The HTTP timeout is extended by the poll timeout so an idle long
    /// poll is not reported as a failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Provider` on transport failure or an `ok: false`
    /// response.
    pub async fn get_updates(&self, offset: Option<i64>, poll_timeout: Duration) -> Result<Vec<Update>> {
        let body = GetUpdatesRequest {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        let updates: Vec<Update> = self
            .call("getUpdates", &body, self.request_timeout + poll_timeout)
            .await?;
        debug!(count = updates.len(), ?offset, "telegram updates received");
        Ok(updates)
    }
}

impl Messenger for TelegramClient {
    fn send_message(
        &self,
        chat_id: &str,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let chat_id = chat_id.to_owned();
        let text = text.to_owned();
        Box::pin(async move { self.send_text(&chat_id, &text).await })
    }
}

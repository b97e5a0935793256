//! Delivering messages to users

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use lw_core::item::Candidate;

use crate::error::{Result, SchedulerError};

/// Delivers a text message to a user endpoint. Failures are transient and
/// never retried by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, endpoint: &str, message: &str) -> Result<()>;
}

/// Message announcing one new listing
pub fn format_listing(candidate: &Candidate) -> String {
    let mut message = format!("🏠 {}\n", candidate.title);
    if !candidate.price.is_empty() {
        message.push_str(&format!("💰 Price: {}\n", candidate.price));
    }
    message.push_str(&format!("\n🔗 {}", candidate.url));
    message
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier backed by the Telegram Bot API; the endpoint is the chat id
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SchedulerError::Config("Bot token cannot be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, endpoint: &str, message: &str) -> Result<()> {
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id: endpoint,
                text: message,
                disable_web_page_preview: false,
            })
            .send()
            .await
            // without_url keeps the bot token out of logs
            .map_err(|e| SchedulerError::notify_with_source("Failed to reach bot API", e.without_url()))?;

        let status = res.status();
        let body: Option<BotApiResponse> = res.json().await.ok();
        match body {
            Some(body) if status.is_success() && body.ok => Ok(()),
            Some(body) => Err(SchedulerError::notify(format!(
                "Bot API returned {}: {}",
                status,
                body.description.unwrap_or_default()
            ))),
            None => Err(SchedulerError::notify(format!("Bot API returned {}", status))),
        }
    }
}

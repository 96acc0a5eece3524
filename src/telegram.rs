//! Telegram Bot API client: outbound messages to one fixed chat, plus a
//! long-poll listener for the /refresh command from that same chat.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Seconds the getUpdates long poll blocks server-side.
const LONG_POLL_TIMEOUT_S: u64 = 50;

/// Anything that can deliver a text message to the operator channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

pub struct TelegramBot {
    client: Client,
    base_url: String,
    chat_id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramBot {
    pub fn new(token: &str, api_base: &str, chat_id: i64) -> Self {
        let client = Client::builder()
            // Must exceed the getUpdates long-poll timeout.
            .timeout(Duration::from_secs(LONG_POLL_TIMEOUT_S + 10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            chat_id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Send one Markdown-formatted message to the configured chat.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("sendMessage request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("sendMessage failed ({}): {}", status, body);
        }
        Ok(())
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{}/getUpdates", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "offset": offset,
                "timeout": LONG_POLL_TIMEOUT_S,
                "allowed_updates": ["message"],
            }))
            .send()
            .await
            .context("getUpdates request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("getUpdates failed ({}): {}", status, body);
        }

        let parsed: ApiResponse<Vec<Update>> = resp
            .json()
            .await
            .context("failed to parse getUpdates response")?;
        if !parsed.ok {
            anyhow::bail!(
                "getUpdates rejected: {}",
                parsed.description.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(parsed.result.unwrap_or_default())
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send(&self, text: &str) -> Result<()> {
        self.send_message(text).await
    }
}

/// Case-insensitive exact match, mirroring the `(?i)^/refresh$` command
/// pattern the bot answers to.
pub fn is_refresh_command(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("/refresh")
}

/// A queued request for an out-of-schedule scrape cycle.
pub struct RefreshRequest;

fn wants_refresh(update: &Update, chat_id: i64) -> bool {
    update.message.as_ref().is_some_and(|m| {
        m.chat.id == chat_id && m.text.as_deref().is_some_and(is_refresh_command)
    })
}

/// Long-poll getUpdates forever, forwarding /refresh commands from the
/// configured chat to the scheduler. Poll errors are logged and retried;
/// the listener only exits when the scheduler side of the channel is gone.
pub async fn run_update_listener(bot: Arc<TelegramBot>, tx: mpsc::Sender<RefreshRequest>) {
    let mut offset: i64 = 0;
    loop {
        match bot.get_updates(offset).await {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if !wants_refresh(&update, bot.chat_id()) {
                        continue;
                    }
                    tracing::info!("force refresh triggered by user");
                    if let Err(e) = bot.send_message("Force refreshing...").await {
                        tracing::warn!(error = %e, "failed to acknowledge refresh");
                    }
                    if tx.send(RefreshRequest).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates poll failed");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

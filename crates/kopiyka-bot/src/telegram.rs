//! Minimal Telegram Bot API client.
//!
//! Raw HTTP + serde_json over reqwest rather than a bot framework — the bot
//! only needs long-polled updates and plain-text sends.

use serde::Deserialize;
use tracing::warn;

use kopiyka_core::KopiykaError;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self, KopiykaError> {
        Self::with_base_url(bot_token, API_BASE)
    }

    pub fn with_base_url(bot_token: &str, base: &str) -> Result<Self, KopiykaError> {
        let http = reqwest::Client::builder()
            // must exceed the long-poll timeout
            .timeout(std::time::Duration::from_secs(50))
            .build()
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{bot_token}", base.trim_end_matches('/')),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, KopiykaError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let reply: ApiReply<T> = response
            .json()
            .await
            .map_err(|e| KopiykaError::Transport(e.to_string()))?;

        if !reply.ok {
            return Err(KopiykaError::Upstream {
                status,
                reason: "telegram".to_string(),
                body: reply.description.unwrap_or_default(),
            });
        }
        reply.result.ok_or_else(|| KopiykaError::Transport(
            "telegram reply missing result".to_string(),
        ))
    }

    /// Long-poll for updates past `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, KopiykaError> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), KopiykaError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &serde_json::json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    /// Send that only logs on failure — scheduler sweeps must not abort
    /// because one chat is unreachable.
    pub async fn send_quiet(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.send_message(chat_id, text).await {
            warn!(chat_id, error = %e, "failed to send message");
        }
    }
}

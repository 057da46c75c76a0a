//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` and posts `sendMessage`, `editMessageText` and
//! `sendPhoto` as plain JSON over `reqwest`.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;

use conch_core::transport::channel::ChatTransport;
use conch_types::config::TelegramConfig;
use conch_types::error::TransportError;
use conch_types::transport::{ChatId, MessageHandle, UpdateBatch};

use self::types::{ApiResponse, TgMessage, Update, into_batch};

/// Slack added to the HTTP timeout on top of the long-poll timeout.
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Telegram's reply to an edit whose text did not change.
const NOT_MODIFIED: &str = "message is not modified";

/// Telegram transport.
///
/// Does NOT derive Debug: request URLs embed the bot token.
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    token: SecretString,
    poll_timeout_secs: u32,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(u64::from(config.poll_timeout_secs) + HTTP_TIMEOUT_MARGIN_SECS);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: SecretString::from(config.api_key.expose_secret().to_string()),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    /// POST `body` to `method` and unwrap the Bot API envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        // `without_url` keeps the token out of error messages.
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.without_url().to_string()))?;

        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))?;

        envelope.into_result()
    }
}

impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, TransportError> {
        let message: TgMessage = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        tracing::debug!(chat_id, message_id = message.message_id, "Message sent");
        Ok(MessageHandle(message.message_id))
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, TransportError> {
        let body = json!({ "chat_id": chat_id, "message_id": handle.0, "text": text });
        match self.call::<TgMessage>("editMessageText", body).await {
            Ok(message) => Ok(MessageHandle(message.message_id)),
            Err(TransportError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                tracing::debug!(chat_id, message_id = handle.0, "Edit was a no-op");
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        url: &str,
    ) -> Result<MessageHandle, TransportError> {
        let message: TgMessage = self
            .call("sendPhoto", json!({ "chat_id": chat_id, "photo": url }))
            .await?;
        tracing::debug!(chat_id, message_id = message.message_id, "Photo sent");
        Ok(MessageHandle(message.message_id))
    }

    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let updates: Vec<Update> = self.call("getUpdates", body).await?;
        let total = updates.len();
        let batch = into_batch(updates);
        if batch.updates.len() < total {
            tracing::debug!(
                skipped = total - batch.updates.len(),
                last_update_id = ?batch.last_update_id,
                "Updates without a message skipped"
            );
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(api_base: &str) -> TelegramTransport {
        let config: TelegramConfig = toml::from_str(&format!(
            r#"
            api_key = "123:ABC"
            api_base = "{api_base}"
            "#
        ))
        .unwrap();
        TelegramTransport::new(&config).unwrap()
    }

    #[test]
    fn test_api_url() {
        let t = transport("https://api.telegram.org");
        assert_eq!(
            t.api_url("editMessageText"),
            "https://api.telegram.org/bot123:ABC/editMessageText"
        );
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let t = transport("http://localhost:8081/");
        assert_eq!(t.api_url("getUpdates"), "http://localhost:8081/bot123:ABC/getUpdates");
    }

    #[test]
    fn test_name() {
        assert_eq!(ChatTransport::name(&transport("https://api.telegram.org")), "telegram");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_photo_and_poll() {
        let t = transport("http://127.0.0.1:9");
        assert!(matches!(
            t.send_photo(1, "https://images.example/1.png").await,
            Err(TransportError::Http(_))
        ));
        assert!(matches!(t.poll_updates(Some(7)).await, Err(TransportError::Http(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error_without_token() {
        // Port 9 (discard) on localhost refuses connections.
        let t = transport("http://127.0.0.1:9");
        let err = t.send(1, "hi").await.unwrap_err();
        match err {
            TransportError::Http(message) => assert!(!message.contains("123:ABC")),
            other => panic!("expected http error, got {other:?}"),
        }
    }
}

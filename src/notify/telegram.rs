//! Telegram Bot API notifier

use super::Notifier;
use crate::market::http::build_client;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Sends messages with `sendMessage`
pub struct TelegramNotifier {
    base_url: String,
    token: String,
    chat_id: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: TELEGRAM_API_URL.to_string(),
            token,
            chat_id,
            client: build_client(timeout)?,
        })
    }

    /// Point at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn emit(&self, text: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(text))
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Telegram API error: {} - {}", status, e))?;
        if !body.ok {
            anyhow::bail!(
                "Telegram API error: {} - {}",
                status,
                body.description.unwrap_or_default()
            );
        }

        tracing::debug!(chat_id = %self.chat_id, "Telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> TelegramNotifier {
        TelegramNotifier::new("123:abc".to_string(), "-100".to_string(), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_endpoint() {
        let n = notifier().with_base_url("http://localhost:9000");
        assert_eq!(n.endpoint(), "http://localhost:9000/bot123:abc/sendMessage");
    }

    #[test]
    fn test_payload_disables_previews() {
        let n = notifier();
        let json = serde_json::to_value(n.payload("<b>hi</b>")).unwrap();
        assert_eq!(json["chat_id"], "-100");
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
        assert_eq!(json["text"], "<b>hi</b>");
    }

    #[test]
    fn test_api_response_parse() {
        let failed: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!failed.ok);
        assert_eq!(failed.description.as_deref(), Some("chat not found"));
    }
}

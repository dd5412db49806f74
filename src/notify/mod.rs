//! Notification module
//!
//! Delivers formatted alert text to a chat channel, or to stdout when no
//! channel is configured.

mod console;
mod format;
mod telegram;

pub use console::ConsoleNotifier;
pub use format::{
    escape_html, format_alert, format_status, format_universe, format_warning, thousands,
};
pub use telegram::{TelegramNotifier, TELEGRAM_API_URL};

use crate::config::NotifyConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for alert transports
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message; `text` may contain Telegram HTML markup
    async fn emit(&self, text: &str) -> anyhow::Result<()>;
}

/// Where alerts are delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyChannel {
    Telegram { token: String, chat_id: String },
    Console,
}

impl NotifyChannel {
    /// Telegram when both token and chat id are set, console otherwise
    pub fn from_config(config: &NotifyConfig) -> Self {
        match (&config.telegram_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => NotifyChannel::Telegram {
                token: token.clone(),
                chat_id: chat_id.clone(),
            },
            _ => NotifyChannel::Console,
        }
    }
}

/// Build the notifier for the configured channel
pub fn from_config(config: &NotifyConfig, timeout: Duration) -> anyhow::Result<Arc<dyn Notifier>> {
    match NotifyChannel::from_config(config) {
        NotifyChannel::Telegram { token, chat_id } => {
            tracing::info!(chat_id = %chat_id, "Alerts go to Telegram");
            Ok(Arc::new(TelegramNotifier::new(token, chat_id, timeout)?))
        }
        NotifyChannel::Console => {
            tracing::warn!("Telegram token or chat id not set, alerts are printed to stdout");
            Ok(Arc::new(ConsoleNotifier))
        }
    }
}

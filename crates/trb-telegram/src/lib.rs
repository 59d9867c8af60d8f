//! Telegram adapter (teloxide) and HTTP surface (axum).
//!
//! This crate implements the `trb-core` MessagingPort over the Telegram Bot
//! API and exposes the webhook / tick endpoints.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::prelude::*;

pub mod handlers;
pub mod router;

use trb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    /// Build a messenger whose every API call is bounded by `timeout`.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build telegram http client: {e}")))?;
        Ok(Self::from_bot(Bot::with_client(token, client)))
    }

    pub fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    // No retry: a failed send is dropped until the next tick.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), text.to_string())
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}

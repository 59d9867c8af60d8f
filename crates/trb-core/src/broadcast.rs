use std::sync::Arc;

use crate::{domain::ChatId, errors::Error, messaging::port::MessagingPort};

/// A single recipient could not be reached.
#[derive(Debug, thiserror::Error)]
#[error("delivery to chat {chat_id} failed: {source}")]
pub struct DeliveryError {
    pub chat_id: ChatId,
    pub source: Error,
}

/// Outcome of one broadcast. `attempted == delivered + failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends a message to many chats, one at a time, isolating failures.
pub struct Broadcaster {
    messenger: Arc<dyn MessagingPort>,
}

impl Broadcaster {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    pub async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), DeliveryError> {
        match self.messenger.send_text(chat_id, text).await {
            Ok(_) => {
                tracing::info!(%chat_id, "sent message");
                Ok(())
            }
            Err(source) => {
                tracing::error!(%chat_id, error = %source, "failed to send message");
                Err(DeliveryError { chat_id, source })
            }
        }
    }

    /// Send `text` to every id in order. A failed recipient never stops the
    /// remaining sends.
    pub async fn broadcast(&self, ids: &[ChatId], text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for &chat_id in ids {
            report.attempted += 1;
            match self.send(chat_id, text).await {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }
        report
    }
}

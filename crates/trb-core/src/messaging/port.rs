use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Outbound messaging port.
///
/// Telegram is the only implementation today; tests substitute in-memory
/// fakes that record deliveries.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send a plain-text message. Implementations must bound the call with a
    /// timeout and map every failure (network, timeout, API status) to `Err`.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
}

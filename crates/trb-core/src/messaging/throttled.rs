use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec, under the 30/sec bot limit
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

/// Next free send slot for one key, spaced `interval` apart.
#[derive(Debug)]
struct SendSlot {
    interval: Duration,
    next: Instant,
}

impl SendSlot {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// Claim the next slot and return how long to wait for it.
    fn claim(&mut self, now: Instant) -> Duration {
        let start = self.next.max(now);
        self.next = start + self.interval;
        start - now
    }

    /// A slot that is already free behaves exactly like a fresh one.
    fn is_free(&self, now: Instant) -> bool {
        self.next <= now
    }
}

/// MessagingPort decorator that rate-limits outbound sends.
///
/// Broadcasts hit many chats back to back; spacing them out keeps the bot
/// below Telegram's flood limits so individual sends are not rejected with 429.
/// Only chats with a pending slot are tracked, so the per-chat table stays
/// as small as the current burst rather than the whole subscriber list.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<Slots>,
}

#[derive(Debug)]
struct Slots {
    global: SendSlot,
    per_chat: HashMap<ChatId, SendSlot>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(Slots {
                global: SendSlot::new(cfg.global_min_interval, Instant::now()),
                per_chat: HashMap::new(),
            }),
        }
    }

    async fn wait_for_slot(&self, chat_id: ChatId) {
        let wait = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            slots.per_chat.retain(|_, slot| !slot.is_free(now));

            let global_wait = slots.global.claim(now);
            let chat_wait = slots
                .per_chat
                .entry(chat_id)
                .or_insert_with(|| SendSlot::new(self.cfg.per_chat_min_interval, now))
                .claim(now);
            global_wait.max(chat_wait)
        };

        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn tracked_chats(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.slots.lock().await.per_chat.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.wait_for_slot(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: StdMutex<Vec<(ChatId, Instant)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_text(&self, chat_id: ChatId, _text: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id, Instant::now()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slot_spaces_consecutive_claims() {
        let now = Instant::now();
        let mut slot = SendSlot::new(Duration::from_millis(100), now);
        assert_eq!(slot.claim(now), Duration::ZERO);
        assert_eq!(slot.claim(now), Duration::from_millis(100));
        assert_eq!(slot.claim(now), Duration::from_millis(200));
        assert!(!slot.is_free(now));
        assert!(slot.is_free(now + Duration::from_millis(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_sends_to_the_same_chat() {
        let inner = Arc::new(RecordingMessenger::default());
        let throttled = ThrottledMessenger::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(10),
                per_chat_min_interval: Duration::from_millis(500),
            },
        );

        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(2), "b").await.unwrap();
        throttled.send_text(ChatId(1), "c").await.unwrap();

        let sent = inner.sent.lock().unwrap().clone();
        assert_eq!(
            sent.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![ChatId(1), ChatId(2), ChatId(1)]
        );
        // Different chats only wait for the global slot.
        assert!(sent[1].1 - sent[0].1 >= Duration::from_millis(10));
        assert!(sent[1].1 - sent[0].1 < Duration::from_millis(500));
        // Same chat waits for its own slot.
        assert!(sent[2].1 - sent[0].1 >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chats_are_dropped_from_the_table() {
        let inner = Arc::new(RecordingMessenger::default());
        let throttled = ThrottledMessenger::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(10),
                per_chat_min_interval: Duration::from_millis(500),
            },
        );

        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(2), "b").await.unwrap();
        assert_eq!(throttled.tracked_chats().await, vec![ChatId(1), ChatId(2)]);

        tokio::time::advance(Duration::from_secs(2)).await;
        throttled.send_text(ChatId(3), "c").await.unwrap();
        assert_eq!(throttled.tracked_chats().await, vec![ChatId(3)]);

        // A pruned chat starts over without waiting.
        let before = Instant::now();
        throttled.send_text(ChatId(1), "d").await.unwrap();
        let sent = inner.sent.lock().unwrap().clone();
        assert_eq!(sent.last().unwrap().0, ChatId(1));
        assert!(sent.last().unwrap().1 - before < Duration::from_millis(500));
    }
}

use serde_json::Value;

use trb_core::{
    domain::ChatId,
    messaging::types::{Command, TextMessage},
};

use crate::router::AppState;

const SUBSCRIBED_REPLY: &str = "Вы успешно подписались на напоминания.";
const UNSUBSCRIBED_REPLY: &str = "Вы успешно отписались от напоминаний.";
const SUBSCRIBE_FAILED_REPLY: &str = "Не удалось оформить подписку, попробуйте позже.";
const UNSUBSCRIBE_FAILED_REPLY: &str = "Не удалось отменить подписку, попробуйте позже.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    Count,
    WhoAmI,
}

impl CommandKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "count" => Some(Self::Count),
            "whoami" => Some(Self::WhoAmI),
            _ => None,
        }
    }
}

/// Dispatch one webhook update. Returns the command that was handled, or
/// `None` when the update was ignored.
///
/// Store and delivery failures are logged here and never propagated; the
/// caller acknowledges the update regardless. A failed store write is
/// reported to the chat instead of the usual confirmation.
pub async fn handle_update(state: &AppState, update: &Value) -> Option<CommandKind> {
    let msg = TextMessage::from_update(update)?;
    let cmd = Command::parse(&msg)?;
    let kind = CommandKind::from_name(&cmd.name)?;
    let chat_id = cmd.chat_id;

    tracing::info!(%chat_id, command = %cmd.name, edited = msg.edited, "handling command");

    let reply = match kind {
        CommandKind::Start => match state.store.add(chat_id).await {
            Ok(_) => SUBSCRIBED_REPLY.to_string(),
            Err(e) => {
                tracing::error!(%chat_id, error = %e, "subscribe failed");
                SUBSCRIBE_FAILED_REPLY.to_string()
            }
        },
        CommandKind::Stop => match state.store.remove(chat_id).await {
            Ok(_) => UNSUBSCRIBED_REPLY.to_string(),
            Err(e) => {
                tracing::error!(%chat_id, error = %e, "unsubscribe failed");
                UNSUBSCRIBE_FAILED_REPLY.to_string()
            }
        },
        CommandKind::Count => format!("Подписчиков: {}", state.store.count().await),
        CommandKind::WhoAmI => format!("Ваш chat id: {chat_id}"),
    };

    reply_to(state, chat_id, &reply).await;
    Some(kind)
}

async fn reply_to(state: &AppState, chat_id: ChatId, text: &str) {
    // Failure is already logged by the broadcaster.
    let _ = state.broadcaster.send(chat_id, text).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use trb_core::{
        config::Config,
        domain::{MessageId, MessageRef},
        errors::Error,
        messaging::port::MessagingPort,
        Result,
    };

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<(ChatId, String)>>,
        fail: bool,
    }

    impl FakeMessenger {
        fn sent(&self) -> Vec<(ChatId, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            if self.fail {
                return Err(Error::External("telegram error: 403 blocked".to_string()));
            }
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    fn test_state(name: &str, messenger: Arc<FakeMessenger>) -> AppState {
        let dir = std::env::temp_dir().join(format!("trb-cmd-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let cfg = Arc::new(Config {
            bot_token: "x".to_string(),
            send_timeout: std::time::Duration::from_secs(1),
            throttle_enabled: false,
            message_text: "reminder".to_string(),
            admin_chat_id: None,
            subscribers_path: dir.join("subscribers.json"),
            host: "127.0.0.1".to_string(),
            port: 0,
        });
        AppState::new(cfg, messenger)
    }

    fn text_update(chat_id: i64, text: &str) -> Value {
        json!({"update_id": 1, "message": {"chat": {"id": chat_id}, "text": text}})
    }

    #[tokio::test]
    async fn start_subscribes_and_confirms() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state("start", messenger.clone());

        let kind = handle_update(&state, &text_update(555, "/start")).await;

        assert_eq!(kind, Some(CommandKind::Start));
        assert_eq!(state.store.load().await, vec![ChatId(555)]);
        assert_eq!(
            messenger.sent(),
            vec![(ChatId(555), SUBSCRIBED_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn stop_unsubscribes_and_confirms() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state("stop", messenger.clone());
        state.store.save(&[ChatId(1), ChatId(2)]).await.unwrap();

        let kind = handle_update(&state, &text_update(1, "/stop")).await;

        assert_eq!(kind, Some(CommandKind::Stop));
        assert_eq!(state.store.load().await, vec![ChatId(2)]);
        assert_eq!(
            messenger.sent(),
            vec![(ChatId(1), UNSUBSCRIBED_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn count_and_whoami_reply_without_mutating() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state("count", messenger.clone());
        state.store.save(&[ChatId(7), ChatId(8)]).await.unwrap();

        handle_update(&state, &text_update(-99, "/count")).await;
        handle_update(&state, &text_update(-99, "/whoami@reminder_bot")).await;

        assert_eq!(state.store.load().await, vec![ChatId(7), ChatId(8)]);
        assert_eq!(
            messenger.sent(),
            vec![
                (ChatId(-99), "Подписчиков: 2".to_string()),
                (ChatId(-99), "Ваш chat id: -99".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn edited_message_is_dispatched() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state("edited", messenger.clone());

        let update = json!({"edited_message": {"chat": {"id": 3}, "text": "/start"}});
        assert_eq!(handle_update(&state, &update).await, Some(CommandKind::Start));
        assert_eq!(state.store.load().await, vec![ChatId(3)]);
    }

    #[tokio::test]
    async fn unknown_text_and_non_text_updates_are_ignored() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state("ignored", messenger.clone());

        for update in [
            text_update(1, "hello"),
            text_update(1, "/help"),
            text_update(1, "/startnow"),
            json!({"message": {"chat": {"id": 1}, "sticker": {}}}),
            json!({"my_chat_member": {"chat": {"id": 1}}}),
        ] {
            assert_eq!(handle_update(&state, &update).await, None);
        }

        assert!(state.store.load().await.is_empty());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn store_failure_replies_with_failure_notice() {
        let messenger = Arc::new(FakeMessenger::default());
        let mut state = test_state("store-fail", messenger.clone());
        let dir = state.cfg.subscribers_path.parent().unwrap().to_path_buf();
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, "file, not a dir").unwrap();
        state.store = Arc::new(trb_core::store::SubscriberStore::new(
            blocker.join("subscribers.json"),
        ));

        let kind = handle_update(&state, &text_update(1, "/start")).await;

        assert_eq!(kind, Some(CommandKind::Start));
        assert!(state.store.load().await.is_empty());
        assert_eq!(
            messenger.sent(),
            vec![(ChatId(1), SUBSCRIBE_FAILED_REPLY.to_string())]
        );
    }

    #[tokio::test]
    async fn delivery_failure_still_subscribes() {
        let messenger = Arc::new(FakeMessenger {
            fail: true,
            ..FakeMessenger::default()
        });
        let state = test_state("fail", messenger.clone());

        let kind = handle_update(&state, &text_update(42, "/start")).await;

        assert_eq!(kind, Some(CommandKind::Start));
        assert_eq!(state.store.load().await, vec![ChatId(42)]);
        assert_eq!(messenger.sent().len(), 1);
    }
}

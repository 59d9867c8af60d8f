use serde_json::Value;

use crate::domain::ChatId;

/// Text message extracted from a Telegram webhook update.
///
/// Only the fields the relay acts on are read; the rest of the update is
/// ignored so payload shape changes on Telegram's side never break parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub edited: bool,
}

impl TextMessage {
    /// Returns `None` when the update carries no message, no chat id, or no
    /// non-empty text.
    pub fn from_update(update: &Value) -> Option<Self> {
        let (message, edited) = match non_null(update.get("message")) {
            Some(m) => (m, false),
            None => (non_null(update.get("edited_message"))?, true),
        };

        let chat_id = message
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(ChatId::from_json)?;

        let text = message.get("text").and_then(Value::as_str)?;
        if text.is_empty() {
            return None;
        }

        Some(Self {
            chat_id,
            text: text.to_string(),
            edited,
        })
    }
}

fn non_null(v: Option<&Value>) -> Option<&Value> {
    v.filter(|v| !v.is_null())
}

/// A bot command, e.g. `/start` or `/start@reminder_bot payload`. Anything
/// after the first token is ignored; none of the relay's commands take
/// arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub chat_id: ChatId,
    /// Lowercased command name without the leading `/` or `@botname` suffix.
    pub name: String,
}

impl Command {
    pub fn parse(msg: &TextMessage) -> Option<Self> {
        let text = msg.text.trim();
        if !text.starts_with('/') {
            return None;
        }

        // Telegram may send `/cmd@botname arg1 ...`
        let first = text.split(char::is_whitespace).next().unwrap_or("");

        let name = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            chat_id: msg.chat_id,
            name,
        })
    }
}

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

pub const DEFAULT_MESSAGE_TEXT: &str = "Отметь атт https://lms.astanait.edu.kz/";

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub send_timeout: Duration,
    pub throttle_enabled: bool,

    // Reminder
    pub message_text: String,
    pub admin_chat_id: Option<ChatId>,

    // Storage
    pub subscribers_path: PathBuf,

    // HTTP
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build the config from an arbitrary key lookup (the process env in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN").unwrap_or_default().trim().to_string();
        if bot_token.is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable must be set to your Telegram bot token"
                    .to_string(),
            ));
        }

        let message_text = lookup("MESSAGE_TEXT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_MESSAGE_TEXT.to_string());

        let admin_chat_id = match lookup("ADMIN_CHAT_ID").and_then(non_empty) {
            None => None,
            Some(raw) => {
                let parsed = ChatId::parse_str(raw.trim());
                if parsed.is_none() {
                    tracing::warn!(value = %raw, "ignoring invalid ADMIN_CHAT_ID");
                }
                parsed
            }
        };

        let subscribers_path = lookup("SUBSCRIBERS_PATH")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("subscribers.json"));

        let host = lookup("HOST")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT").and_then(non_empty) {
            None => 8080,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("invalid PORT {raw:?}: {e}")))?,
        };

        let send_timeout = Duration::from_secs(
            lookup("SEND_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|&s| s > 0)
                .unwrap_or(10),
        );
        let throttle_enabled = lookup("THROTTLE_ENABLED")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        Ok(Self {
            bot_token,
            send_timeout,
            throttle_enabled,
            message_text,
            admin_chat_id,
            subscribers_path,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

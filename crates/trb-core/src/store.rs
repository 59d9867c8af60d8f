//! Durable subscriber registry.
//!
//! The set lives in a single JSON array on disk. Every operation re-reads the
//! file, so state survives restarts without an in-memory cache, and the
//! read-modify-write cycle runs under one lock so concurrent webhook requests
//! cannot lose updates.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{domain::ChatId, errors::Error, Result};

pub struct SubscriberStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current subscribers in insertion order.
    ///
    /// A missing file is an empty set. An unreadable or malformed file is
    /// logged and also treated as empty.
    pub async fn load(&self) -> Vec<ChatId> {
        let _guard = self.lock.lock().await;
        self.load_lenient()
    }

    /// Like [`load`](Self::load), but surfaces read and shape errors.
    pub async fn try_load(&self) -> Result<Vec<ChatId>> {
        let _guard = self.lock.lock().await;
        read_subscribers(&self.path)
    }

    /// Overwrite the persisted set.
    pub async fn save(&self, ids: &[ChatId]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save_logged(ids)
    }

    /// Add `id` if absent. Returns `true` when the set changed.
    ///
    /// Nothing is written when the id is already subscribed.
    pub async fn add(&self, id: ChatId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut ids = self.load_lenient();
        if ids.contains(&id) {
            return Ok(false);
        }
        ids.push(id);
        self.save_logged(&ids)?;
        tracing::info!(chat_id = %id, total = ids.len(), "added subscriber");
        Ok(true)
    }

    /// Remove `id` if present. Returns `true` when the set changed.
    pub async fn remove(&self, id: ChatId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut ids = self.load_lenient();
        let Some(pos) = ids.iter().position(|x| *x == id) else {
            return Ok(false);
        };
        ids.remove(pos);
        self.save_logged(&ids)?;
        tracing::info!(chat_id = %id, total = ids.len(), "removed subscriber");
        Ok(true)
    }

    pub async fn count(&self) -> usize {
        self.load().await.len()
    }

    fn load_lenient(&self) -> Vec<ChatId> {
        read_subscribers(&self.path).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to load subscribers");
            Vec::new()
        })
    }

    fn save_logged(&self, ids: &[ChatId]) -> Result<()> {
        write_subscribers(&self.path, ids).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to save subscribers");
            e
        })
    }
}

fn read_subscribers(path: &Path) -> Result<Vec<ChatId>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries = match serde_json::from_str::<Value>(&txt)? {
        Value::Array(entries) => entries,
        other => {
            return Err(Error::Storage {
                path: path.to_path_buf(),
                reason: format!("expected a JSON array, found {}", json_kind(&other)),
            })
        }
    };

    Ok(dedup_in_order(entries.iter().filter_map(ChatId::from_json)))
}

fn write_subscribers(path: &Path, ids: &[ChatId]) -> Result<()> {
    let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
    let txt = serde_json::to_string(&raw)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    // The temp file is synced before the rename, so the live file is either
    // the old set or the complete new one.
    let tmp = tmp_path(path);
    let written = File::create(&tmp).and_then(|mut f| {
        f.write_all(txt.as_bytes())?;
        f.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn dedup_in_order(ids: impl IntoIterator<Item = ChatId>) -> Vec<ChatId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

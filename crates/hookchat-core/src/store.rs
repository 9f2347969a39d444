use crate::error::{ChatError, Result};
use crate::model::Conversation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Keys used in the durable store.
pub mod keys {
    pub const CONVERSATIONS: &str = "conversations";
    pub const THEME: &str = "theme";
    pub const PINNED_MESSAGE: &str = "pinned-message";
    pub const PINNED_VISIBLE: &str = "pinned-visible";
}

/// Generic durable string-keyed storage. Implementations must be safe to
/// share across the session and any background exchange completions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store: one file per key under a base directory.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open a store in the default data directory (`<data_dir>/hookchat`).
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| ChatError::Store("could not determine data directory".to_string()))?
            .join("hookchat");
        Self::with_dir(base_dir)
    }

    /// Open a store in a custom directory (useful for testing).
    pub fn with_dir(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            ChatError::Store(format!("failed to create store directory: {}", e))
        })?;
        Ok(Self { base_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .map_err(|e| ChatError::Store(format!("failed to read key {}: {}", key, e)))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        // Write via a temp file so a crash mid-write cannot truncate the key.
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, value)
            .map_err(|e| ChatError::Store(format!("failed to write key {}: {}", key, e)))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| ChatError::Store(format!("failed to commit key {}: {}", key, e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| ChatError::Store(format!("failed to remove key {}: {}", key, e)))?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the raw stored bytes, for equivalence assertions in tests.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub text: String,
    pub visible: bool,
}

/// Typed adapter over the raw key-value store: the conversation collection
/// plus the small set of preference flags.
#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn load_conversations(&self) -> Result<Vec<Conversation>> {
        match self.kv.get(keys::CONVERSATIONS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        let raw = serde_json::to_string(conversations)?;
        self.kv.set(keys::CONVERSATIONS, &raw)
    }

    pub fn clear_conversations(&self) -> Result<()> {
        self.kv.remove(keys::CONVERSATIONS)
    }

    pub fn theme(&self) -> Result<Theme> {
        Ok(match self.kv.get(keys::THEME)?.as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        })
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        match theme {
            Theme::Dark => self.kv.set(keys::THEME, "dark"),
            Theme::Light => self.kv.remove(keys::THEME),
        }
    }

    pub fn pinned_message(&self) -> Result<Option<PinnedMessage>> {
        let text = match self.kv.get(keys::PINNED_MESSAGE)? {
            Some(text) => text,
            None => return Ok(None),
        };
        let visible = matches!(self.kv.get(keys::PINNED_VISIBLE)?.as_deref(), Some("true"));
        Ok(Some(PinnedMessage { text, visible }))
    }

    pub fn set_pinned_message(&self, text: &str, visible: bool) -> Result<()> {
        self.kv.set(keys::PINNED_MESSAGE, text)?;
        self.kv
            .set(keys::PINNED_VISIBLE, if visible { "true" } else { "false" })
    }

    pub fn set_pinned_visible(&self, visible: bool) -> Result<()> {
        self.kv
            .set(keys::PINNED_VISIBLE, if visible { "true" } else { "false" })
    }

    pub fn clear_pinned_message(&self) -> Result<()> {
        self.kv.remove(keys::PINNED_MESSAGE)?;
        self.kv.remove(keys::PINNED_VISIBLE)
    }
}

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Roster of all bots.
pub const KEY_BOTS: &str = "team-bots";
/// Persisted `TeamConfig`.
pub const KEY_CONFIG: &str = "team-config";
/// Last 200 discussion messages.
pub const KEY_MESSAGES: &str = "team-discussion-messages";
/// Last 50 discussion threads.
pub const KEY_THREADS: &str = "team-discussion-threads";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Durable key/value persistence of JSON documents.
///
/// Writes are synchronous so that a successful `put` is visible to any
/// subsequent `get`, including one from a fresh store over the same backing.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn put(&self, key: &str, value: serde_json::Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Read `key` and decode it as `T`. Missing keys yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode `value` and write it under `key`.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn StateStore, key: &str, value: &T) -> Result<()> {
    store.put(key, serde_json::to_value(value)?)
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// File-system-backed store: one pretty-printed JSON file per key
/// (defaults to `~/.botteam/state/`).
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store with the default directory (`~/.botteam/state/`).
    pub fn default_path() -> Self {
        let base = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".botteam")
            .join("state");
        Self { base_dir: base }
    }

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    /// Keys map to file names; anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn key_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{sanitized}.json"))
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.ensure_dir()?;
        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&value)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        tracing::trace!(key, path = %path.display(), "state written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

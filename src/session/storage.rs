//! Durable key-value profile storage shared by every open tab.
//!
//! A [`SharedStorage`] is one browser-profile equivalent: all tabs hold a
//! clone of it, read the stored credential from it, and use its event bus to
//! tell each other that a key changed. Writers replace whole keys in a single
//! [`KeyValueStore::apply`] call, so a reader never sees half of a login or
//! logout.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

/// Identifies one open tab (one `SessionManager`)
pub type TabId = Uuid;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set(String, String),
    Remove(String),
}

impl StorageOp {
    pub fn set(key: &str, value: impl Into<String>) -> Self {
        StorageOp::Set(key.to_string(), value.into())
    }

    pub fn remove(key: &str) -> Self {
        StorageOp::Remove(key.to_string())
    }
}

/// Change notification delivered to every subscribed tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    /// Tab that made the change; it ignores its own events
    pub origin: TabId,
}

pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;

    /// Apply all ops atomically
    fn apply(&self, ops: &[StorageOp]) -> Result<(), ClientError>;
}

fn apply_ops(entries: &mut BTreeMap<String, String>, ops: &[StorageOp]) {
    for op in ops {
        match op {
            StorageOp::Set(key, value) => {
                entries.insert(key.clone(), value.clone());
            }
            StorageOp::Remove(key) => {
                entries.remove(key);
            }
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn apply(&self, ops: &[StorageOp]) -> Result<(), ClientError> {
        apply_ops(&mut self.entries.write(), ops);
        Ok(())
    }
}

/// JSON file store; every apply rewrites the file through a temp file + rename
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                ClientError::Storage(format!("failed to read {}: {}", path.display(), e))
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    ClientError::Storage(format!("failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened profile storage");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| ClientError::Storage(format!("failed to create {}: {}", dir.display(), e)))?;

        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| ClientError::Storage(format!("failed to create temp file: {}", e)))?;
        file.write_all(&body)
            .map_err(|e| ClientError::Storage(format!("failed to write profile: {}", e)))?;
        file.persist(&self.path).map_err(|e| {
            ClientError::Storage(format!("failed to replace {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn apply(&self, ops: &[StorageOp]) -> Result<(), ClientError> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        apply_ops(&mut next, ops);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

/// A storage profile plus its change bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StorageEvent>,
}

impl SharedStorage {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store: Arc::new(store),
            events,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Ok(Self::new(FileStore::open(path)?))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn apply(&self, ops: &[StorageOp]) -> Result<(), ClientError> {
        self.store.apply(ops)
    }

    /// Tell every subscribed tab that `key` changed
    pub fn notify(&self, origin: TabId, key: &str) {
        let event = StorageEvent {
            key: key.to_string(),
            new_value: self.get(key),
            origin,
        };
        // No subscribers is fine: a single tab has nobody to tell.
        if self.events.send(event).is_err() {
            debug!(key, "No tabs listening for storage changes");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.events.receiver_count()
    }
}

//! Cache store implementations.

use crate::utils::unix_now;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    /// Unix seconds, `None` for entries that never expire.
    expires_at: Option<f64>,
}

impl StoredEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(unix_now() + ttl.as_secs_f64())
        };
        Self {
            value: value.to_string(),
            expires_at,
        }
    }
    fn is_expired(&self, now: f64) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

fn poisoned(source: &'static str) -> Error {
    Error::cache_with_context(
        "cache store lock poisoned",
        ErrorContext::new().with_source(source),
    )
}

/// Key-value store backing the persisted control snapshots.
///
/// Writes can be buffered with [`CacheStore::save_deferred`] and flushed together by
/// [`CacheStore::commit`], so one call costs at most one round trip to the store.
/// A zero ttl means the entry never expires.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    fn save_deferred(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    /// Flush deferred writes; returns whether the flush succeeded.
    fn commit(&self) -> Result<bool>;
    fn clear(&self) -> Result<bool>;
    fn name(&self) -> &'static str;
}

/// Process-local store.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    pending: Mutex<Vec<(String, StoredEntry)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        let now = unix_now();
        self.entries
            .read()
            .map(|e| e.values().filter(|v| !v.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().map_err(|_| poisoned("memory_store"))?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(unix_now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| poisoned("memory_store"))?
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    fn save_deferred(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.pending
            .lock()
            .map_err(|_| poisoned("memory_store"))?
            .push((key.to_string(), StoredEntry::new(value, ttl)));
        Ok(())
    }

    fn commit(&self) -> Result<bool> {
        let pending: Vec<_> =
            std::mem::take(&mut *self.pending.lock().map_err(|_| poisoned("memory_store"))?);
        let mut entries = self.entries.write().map_err(|_| poisoned("memory_store"))?;
        entries.extend(pending);
        Ok(true)
    }

    fn clear(&self) -> Result<bool> {
        self.entries
            .write()
            .map_err(|_| poisoned("memory_store"))?
            .clear();
        self.pending
            .lock()
            .map_err(|_| poisoned("memory_store"))?
            .clear();
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Durable store: one JSON document per namespace under a directory.
///
/// Commits re-read the document before writing so keys written by other processes in the
/// same namespace survive; for a key written by both, the last committer wins.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, StoredEntry>>,
    pending: Mutex<Vec<(String, StoredEntry)>>,
}

impl FileStore {
    pub fn open(directory: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let directory = directory.as_ref();
        if namespace.is_empty() || namespace.contains(['/', '\\']) {
            return Err(Error::configuration_with_context(
                format!("Invalid cache namespace '{}'", namespace),
                ErrorContext::new()
                    .with_field_path("cache_store.namespace")
                    .with_source("file_store"),
            ));
        }
        std::fs::create_dir_all(directory)?;
        let path = directory.join(format!("{}.json", namespace));
        let entries = Self::read_document(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            pending: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(path: &Path) -> Result<HashMap<String, StoredEntry>> {
        match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache document");
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn flush(&self, pending: Vec<(String, StoredEntry)>) -> Result<()> {
        let now = unix_now();
        let mut merged = Self::read_document(&self.path)?;
        merged.extend(pending);
        merged.retain(|_, e| !e.is_expired(now));
        self.write_document(&merged)?;
        *self.entries.write().map_err(|_| poisoned("file_store"))? = merged;
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned("file_store"))?;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(unix_now()))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.flush(vec![(key.to_string(), StoredEntry::new(value, ttl))])
    }

    fn save_deferred(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.pending
            .lock()
            .map_err(|_| poisoned("file_store"))?
            .push((key.to_string(), StoredEntry::new(value, ttl)));
        Ok(())
    }

    fn commit(&self) -> Result<bool> {
        let pending: Vec<_> =
            std::mem::take(&mut *self.pending.lock().map_err(|_| poisoned("file_store"))?);
        if pending.is_empty() {
            return Ok(true);
        }
        self.flush(pending)?;
        Ok(true)
    }

    fn clear(&self) -> Result<bool> {
        self.pending
            .lock()
            .map_err(|_| poisoned("file_store"))?
            .clear();
        self.write_document(&HashMap::new())?;
        self.entries
            .write()
            .map_err(|_| poisoned("file_store"))?
            .clear();
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Store that keeps nothing; every read misses.
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for NullStore {
    fn get(&self, _: &str) -> Result<Option<String>> {
        Ok(None)
    }
    fn set(&self, _: &str, _: &str, _: Duration) -> Result<()> {
        Ok(())
    }
    fn save_deferred(&self, _: &str, _: &str, _: Duration) -> Result<()> {
        Ok(())
    }
    fn commit(&self) -> Result<bool> {
        Ok(true)
    }
    fn clear(&self) -> Result<bool> {
        Ok(true)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

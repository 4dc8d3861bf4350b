use crate::utils::unix_now;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedCall {
    body: String,
    expires_at: f64,
}

/// Raw response bodies keyed by request fingerprint.
///
/// At most one entry per fingerprint. Entries past their expiry read as absent and are
/// removed the next time they are loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallCacheControl {
    entries: HashMap<String, CachedCall>,
}

impl CallCacheControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_call_cached(&self, fingerprint: &str) -> bool {
        self.is_call_cached_at(fingerprint, unix_now())
    }

    pub(crate) fn is_call_cached_at(&self, fingerprint: &str, now: f64) -> bool {
        self.entries
            .get(fingerprint)
            .map(|e| now < e.expires_at)
            .unwrap_or(false)
    }

    /// Store `body` for `ttl_secs` seconds; a zero ttl stores nothing and returns `false`.
    pub fn save_call_data(&mut self, fingerprint: &str, body: &str, ttl_secs: u64) -> bool {
        self.save_call_data_at(fingerprint, body, ttl_secs, unix_now())
    }

    pub(crate) fn save_call_data_at(
        &mut self,
        fingerprint: &str,
        body: &str,
        ttl_secs: u64,
        now: f64,
    ) -> bool {
        if ttl_secs == 0 {
            return false;
        }
        self.entries.insert(
            fingerprint.to_string(),
            CachedCall {
                body: body.to_string(),
                expires_at: now + ttl_secs as f64,
            },
        );
        true
    }

    pub fn load_call_data(&mut self, fingerprint: &str) -> Option<String> {
        self.load_call_data_at(fingerprint, unix_now())
    }

    pub(crate) fn load_call_data_at(&mut self, fingerprint: &str, now: f64) -> Option<String> {
        match self.entries.get(fingerprint) {
            Some(entry) if now < entry.expires_at => Some(entry.body.clone()),
            Some(_) => {
                self.entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = unix_now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.expires_at);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! 缓存模块：持久化限流状态与响应体缓存。
//!
//! # Caching Module
//!
//! Two pieces of call-pipeline state survive between calls (and, with a durable store,
//! between processes):
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CallCacheControl`] | Raw response bodies keyed by request fingerprint, with per-entry expiry |
//! | [`CacheManager`] | Loads and saves the control snapshots through a store |
//! | [`CacheStore`] | Trait for key-value stores with deferred writes and one commit |
//! | [`MemoryStore`] | Process-local store |
//! | [`FileStore`] | JSON document per namespace, survives restarts |
//! | [`NullStore`] | Stores nothing |
//!
//! ## Example
//!
//! ```rust
//! use callgate::cache::{CacheConfig, CacheManager, MemoryStore};
//! use std::sync::Arc;
//!
//! let manager = CacheManager::new(CacheConfig::new(), Arc::new(MemoryStore::new()));
//! let mut calls = manager.load_call_cache().unwrap();
//! calls.save_call_data("fingerprint", "{}", 60);
//! manager.save(None, Some(&calls)).unwrap();
//! ```
//!
//! Several processes may share one namespace; there is no cross-process locking and the
//! last committer wins.

mod backend;
mod call_cache;
mod key;
mod manager;

pub use backend::{CacheStore, FileStore, MemoryStore, NullStore};
pub use call_cache::CallCacheControl;
pub use key::{fingerprint, CALL_CACHE_KEY, RATE_LIMIT_KEY};
pub use manager::{CacheConfig, CacheManager, CacheStats};

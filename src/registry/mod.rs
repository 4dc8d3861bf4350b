//! 注册表：按稳定标签解析缓存存储与扩展工厂。
//!
//! Tag-keyed registries resolved once at build time instead of per call.
//!
//! - [`StoreRegistry`] maps a cache-store kind (`"memory"`, `"file"`, `"null"`, custom tags)
//!   to a factory
//! - [`ExtensionRegistry`] maps an object tag to an [`ExtensionFactory`]

mod extensions;

pub use extensions::{Extension, ExtensionFactory, ExtensionRegistry, FnExtensionFactory};

use crate::cache::{CacheStore, FileStore, MemoryStore, NullStore};
use crate::settings::CacheStoreSettings;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub type StoreFactory =
    Arc<dyn Fn(&CacheStoreSettings) -> Result<Arc<dyn CacheStore>> + Send + Sync>;

pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `memory`, `file` and `null` stores.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            "memory".to_string(),
            Arc::new(|_: &CacheStoreSettings| Ok(Arc::new(MemoryStore::new()) as Arc<dyn CacheStore>)),
        );
        registry.factories.insert(
            "file".to_string(),
            Arc::new(|s: &CacheStoreSettings| {
                Ok(Arc::new(FileStore::open(&s.directory, &s.namespace)?) as Arc<dyn CacheStore>)
            }),
        );
        registry.factories.insert(
            "null".to_string(),
            Arc::new(|_: &CacheStoreSettings| Ok(Arc::new(NullStore::new()) as Arc<dyn CacheStore>)),
        );
        registry
    }

    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&CacheStoreSettings) -> Result<Arc<dyn CacheStore>> + Send + Sync + 'static,
    {
        let tag = tag.into();
        validate_tag(&tag, self.factories.contains_key(&tag), "cache_store.kind")?;
        self.factories.insert(tag, Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.factories.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn create(&self, settings: &CacheStoreSettings) -> Result<Arc<dyn CacheStore>> {
        let factory = self.factories.get(&settings.kind).ok_or_else(|| {
            Error::configuration_with_context(
                format!("Unknown cache store kind '{}'", settings.kind),
                ErrorContext::new()
                    .with_field_path("cache_store.kind")
                    .with_source("store_registry"),
            )
        })?;
        factory(settings)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

pub(crate) fn validate_tag(tag: &str, duplicate: bool, field: &str) -> Result<()> {
    if tag.trim().is_empty() {
        return Err(Error::configuration_with_context(
            "Registry tag must not be empty",
            ErrorContext::new().with_field_path(field).with_source("registry"),
        ));
    }
    if duplicate {
        return Err(Error::configuration_with_context(
            format!("Tag '{}' is already registered", tag),
            ErrorContext::new().with_field_path(field).with_source("registry"),
        ));
    }
    Ok(())
}

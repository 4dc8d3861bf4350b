use super::hooks::{AfterHook, BeforeHook};
use super::{CallPipeline, Controls};
use crate::cache::{CacheConfig, CacheManager};
use crate::fixtures::{FileFixtureStore, FixtureStore};
use crate::region::{PlatformTable, RegionResolver};
use crate::registry::{ExtensionFactory, ExtensionRegistry, StoreRegistry};
use crate::settings::Settings;
use crate::transport::{HttpTransportFactory, TransportFactory};
use crate::Result;
use std::sync::{Arc, Mutex};

/// Builder for [`CallPipeline`].
///
/// Settings are validated and the cache store is resolved once, in [`build`](Self::build).
pub struct CallPipelineBuilder {
    settings: Settings,
    regions: Option<Arc<dyn RegionResolver>>,
    transports: Option<Arc<dyn TransportFactory>>,
    stores: StoreRegistry,
    fixtures: Option<Arc<dyn FixtureStore>>,
    before_hooks: Vec<Arc<dyn BeforeHook>>,
    after_hooks: Vec<Arc<dyn AfterHook>>,
    extensions: ExtensionRegistry,
    /// Override scheme and host (primarily for testing with mock servers)
    base_url_override: Option<String>,
}

impl CallPipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            regions: None,
            transports: None,
            stores: StoreRegistry::with_defaults(),
            fixtures: None,
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
            extensions: ExtensionRegistry::new(),
            base_url_override: None,
        }
    }

    /// Replace the default region table.
    pub fn region_resolver(mut self, regions: Arc<dyn RegionResolver>) -> Self {
        self.regions = Some(regions);
        self
    }

    /// Replace the reqwest transport. The factory is also used for every async group.
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(factory);
        self
    }

    pub fn store_registry(mut self, stores: StoreRegistry) -> Self {
        self.stores = stores;
        self
    }

    pub fn fixture_store(mut self, fixtures: Arc<dyn FixtureStore>) -> Self {
        self.fixtures = Some(fixtures);
        self
    }

    pub fn before_hook(mut self, hook: Arc<dyn BeforeHook>) -> Self {
        self.before_hooks.push(hook);
        self
    }

    pub fn after_hook(mut self, hook: Arc<dyn AfterHook>) -> Self {
        self.after_hooks.push(hook);
        self
    }

    pub fn extension(mut self, tag: &str, factory: Arc<dyn ExtensionFactory>) -> Result<Self> {
        self.extensions.register(tag, factory)?;
        Ok(self)
    }

    /// Send every call to `base_url` instead of `https://{platform}{settings.base_url}`.
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<CallPipeline> {
        let settings = self.settings;
        let regions = self
            .regions
            .unwrap_or_else(|| Arc::new(PlatformTable::new()));
        settings.validate(regions.as_ref(), &self.stores)?;
        let base_region = regions.region_name(&settings.region)?;

        let transports = self.transports.unwrap_or_else(|| {
            Arc::new(HttpTransportFactory::new(settings.transport_options()))
        });
        let transport = transports.create()?;

        let mut controls = Controls::default();
        let cache = if settings.uses_cache_store() {
            let store = self.stores.create(&settings.cache_store)?;
            let longest = settings
                .cache_calls_ttl
                .as_ref()
                .map(|ttl| ttl.longest())
                .unwrap_or(0);
            let manager = CacheManager::new(CacheConfig::new().with_longest_call_ttl(longest), store);
            if settings.cache_rate_limits {
                controls.limits = manager.load_rate_limits()?;
            }
            if settings.cache_calls {
                controls.calls = manager.load_call_cache()?;
            }
            tracing::debug!(store = manager.store_name(), "cache store ready");
            Some(manager)
        } else {
            None
        };

        let fixtures = self.fixtures.unwrap_or_else(|| {
            Arc::new(FileFixtureStore::new(settings.fixtures.directory.clone()))
        });

        Ok(CallPipeline {
            base_region,
            regions,
            transport,
            transports,
            cache,
            fixtures,
            before_hooks: self.before_hooks,
            after_hooks: self.after_hooks,
            extensions: self.extensions,
            base_url_override: self.base_url_override,
            controls: Mutex::new(controls),
            region_stack: Mutex::new(Vec::new()),
            settings,
        })
    }
}

//! Pipeline settings, loadable from YAML with environment overrides.
//!
//! ```yaml
//! key: RGAPI-00000000-0000-0000-0000-000000000000
//! region: eune
//! cache_rate_limits: true
//! cache_calls: true
//! cache_calls_ttl:
//!   "1:summoner": 120
//!   "2:match": null
//! cache_store:
//!   kind: file
//!   directory: /tmp/callgate
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `CALLGATE_API_KEY` | `key` |
//! | `CALLGATE_REGION` | `region` |
//! | `CALLGATE_HTTP_TIMEOUT_SECS` | `timeout_secs` |
//! | `CALLGATE_FIXTURE_DIR` | `fixtures.directory` |
//! | `CALLGATE_CACHE_DIR` | `cache_store.directory` |
//! | `CALLGATE_CACHE_RATE_LIMITS` | `cache_rate_limits` (`1`/`true`/`0`/`false`) |
//! | `CALLGATE_CACHE_CALLS_TTL` | `cache_calls` on with a uniform TTL in seconds |

use crate::region::RegionResolver;
use crate::registry::StoreRegistry;
use crate::transport::TransportOptions;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = ".api.riotgames.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPlacement {
    #[default]
    Header,
    Query,
}

/// How long successful call bodies stay cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallTtl {
    /// Same number of seconds for every resource.
    Uniform(u64),
    /// Seconds per resource label; `None` or a missing label disables caching for it.
    PerResource(HashMap<String, Option<u64>>),
}

impl CallTtl {
    pub fn ttl_for(&self, resource: &str) -> Option<u64> {
        match self {
            CallTtl::Uniform(secs) => Some(*secs),
            CallTtl::PerResource(map) => map.get(resource).copied().flatten(),
        }
    }

    pub fn longest(&self) -> u64 {
        match self {
            CallTtl::Uniform(secs) => *secs,
            CallTtl::PerResource(map) => map.values().flatten().copied().max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSettings {
    /// Answer calls from recorded fixtures.
    pub replay: bool,
    /// Record network responses that have no fixture yet.
    pub record: bool,
    pub directory: PathBuf,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            replay: false,
            record: false,
            directory: PathBuf::from("fixtures"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStoreSettings {
    /// Tag resolved through the store registry (`memory`, `file`, `null`, or a custom tag).
    pub kind: String,
    pub namespace: String,
    pub directory: PathBuf,
}

impl Default for CacheStoreSettings {
    fn default() -> Self {
        Self {
            kind: "file".to_string(),
            namespace: "callgate-default".to_string(),
            directory: env::temp_dir().join("callgate"),
        }
    }
}

/// Names of the request and response headers the pipeline uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    pub api_key: String,
    pub app_limit: String,
    pub app_count: String,
    pub method_limit: String,
    pub method_count: String,
    pub deprecation: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            api_key: "X-Riot-Token".to_string(),
            app_limit: "X-App-Rate-Limit".to_string(),
            app_count: "X-App-Rate-Limit-Count".to_string(),
            method_limit: "X-Method-Rate-Limit".to_string(),
            method_count: "X-Method-Rate-Limit-Count".to_string(),
            deprecation: "X-Riot-Deprecated".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub key: String,
    /// Named alternative credentials selectable per call.
    pub keys: HashMap<String, String>,
    pub region: String,
    pub key_placement: KeyPlacement,
    pub base_url: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    pub cache_rate_limits: bool,
    pub cache_calls: bool,
    pub cache_calls_ttl: Option<CallTtl>,
    pub fixtures: FixtureSettings,
    pub cache_store: CacheStoreSettings,
    pub headers: HeaderNames,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: String::new(),
            keys: HashMap::new(),
            region: String::new(),
            key_placement: KeyPlacement::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            verify_tls: true,
            timeout_secs: 30,
            cache_rate_limits: false,
            cache_calls: false,
            cache_calls_ttl: None,
            fixtures: FixtureSettings::default(),
            cache_store: CacheStoreSettings::default(),
            headers: HeaderNames::default(),
        }
    }
}

/// Keys never reach log output; named keys show their names only.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut key_names: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        key_names.sort_unstable();
        f.debug_struct("Settings")
            .field("key", &"<redacted>")
            .field("keys", &key_names)
            .field("region", &self.region)
            .field("key_placement", &self.key_placement)
            .field("base_url", &self.base_url)
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("cache_rate_limits", &self.cache_rate_limits)
            .field("cache_calls", &self.cache_calls)
            .field("cache_calls_ttl", &self.cache_calls_ttl)
            .field("fixtures", &self.fixtures)
            .field("cache_store", &self.cache_store)
            .field("headers", &self.headers)
            .finish()
    }
}

impl Settings {
    pub fn new(key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read settings file: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("settings"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply `CALLGATE_*` overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("CALLGATE_API_KEY") {
            self.key = key;
        }
        if let Some(region) = lookup("CALLGATE_REGION") {
            self.region = region;
        }
        if let Some(secs) = lookup("CALLGATE_HTTP_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.timeout_secs = secs;
        }
        if let Some(dir) = lookup("CALLGATE_FIXTURE_DIR") {
            self.fixtures.directory = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CALLGATE_CACHE_DIR") {
            self.cache_store.directory = PathBuf::from(dir);
        }
        if let Some(enabled) = lookup("CALLGATE_CACHE_RATE_LIMITS").and_then(|s| parse_flag(&s)) {
            self.cache_rate_limits = enabled;
        }
        if let Some(secs) = lookup("CALLGATE_CACHE_CALLS_TTL").and_then(|s| s.trim().parse::<u64>().ok()) {
            self = self.with_cache_calls(CallTtl::Uniform(secs));
        }
        self
    }

    pub fn with_cache_rate_limits(mut self, enabled: bool) -> Self {
        self.cache_rate_limits = enabled;
        self
    }

    pub fn with_cache_calls(mut self, ttl: CallTtl) -> Self {
        self.cache_calls = true;
        self.cache_calls_ttl = Some(ttl);
        self
    }

    pub fn with_key_placement(mut self, placement: KeyPlacement) -> Self {
        self.key_placement = placement;
        self
    }

    pub fn with_named_key(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(name.into(), key.into());
        self
    }

    pub fn with_store_kind(mut self, kind: impl Into<String>) -> Self {
        self.cache_store.kind = kind.into();
        self
    }

    pub fn with_fixtures(mut self, replay: bool, record: bool) -> Self {
        self.fixtures.replay = replay;
        self.fixtures.record = record;
        self
    }

    /// Any persisted state at all?
    pub fn uses_cache_store(&self) -> bool {
        self.cache_rate_limits || self.cache_calls
    }

    /// Credential for a named key; unknown or absent names use the default key.
    pub fn credential(&self, name: Option<&str>) -> &str {
        name.and_then(|n| self.keys.get(n))
            .map(String::as_str)
            .unwrap_or(&self.key)
    }

    pub fn call_ttl(&self, resource: &str) -> Option<u64> {
        self.cache_calls_ttl
            .as_ref()
            .and_then(|ttl| ttl.ttl_for(resource))
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            verify_tls: self.verify_tls,
        }
    }

    pub fn validate(&self, regions: &dyn RegionResolver, stores: &StoreRegistry) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(invalid("key", "Required settings parameter 'key' is missing!"));
        }
        if self.region.trim().is_empty() {
            return Err(invalid(
                "region",
                "Required settings parameter 'region' is missing!",
            ));
        }
        regions.region_name(&self.region)?;

        if let Some(CallTtl::PerResource(map)) = &self.cache_calls_ttl {
            if let Some(bad) = map.keys().find(|k| k.find(':').map_or(true, |i| i == 0)) {
                return Err(Error::configuration_with_context(
                    "Value of settings parameter 'cache_calls_ttl' is not valid.",
                    ErrorContext::new()
                        .with_field_path("cache_calls_ttl")
                        .with_details(format!("resource label '{}' lacks a ':' group prefix", bad))
                        .with_source("settings"),
                ));
            }
        }

        if self.uses_cache_store() && !stores.contains(&self.cache_store.kind) {
            return Err(Error::configuration_with_context(
                format!("Unknown cache store kind '{}'", self.cache_store.kind),
                ErrorContext::new()
                    .with_field_path("cache_store.kind")
                    .with_details(format!("registered: {}", stores.tags().join(", ")))
                    .with_source("settings"),
            ));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(field: &str, message: &str) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("settings"),
    )
}

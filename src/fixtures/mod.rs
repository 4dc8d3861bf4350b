//! Recorded responses used to replay calls without touching the network.

use crate::transport::{Method, RawResponse};
use crate::utils::sha256_hex;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// One recorded `(headers, body, code)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub code: u16,
}

impl From<&RawResponse> for Fixture {
    fn from(response: &RawResponse) -> Self {
        Self {
            headers: response.headers.clone(),
            body: response.body.clone(),
            code: response.status,
        }
    }
}

/// Header names are lowercased on the way out; hand-written fixtures often use canonical case.
impl From<Fixture> for RawResponse {
    fn from(fixture: Fixture) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in fixture.headers {
            headers
                .entry(name.to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        RawResponse {
            status: fixture.code,
            headers,
            body: fixture.body,
        }
    }
}

/// Deterministic name of a call: method, endpoint, query and a short body digest.
///
/// `GET /lol/status/v4/shard-data` with `?locale=en_US` becomes
/// `GET_lol-status-v4-shard-data_locale-en_US`.
pub fn signature(
    method: Method,
    endpoint: &str,
    query: &[(String, String)],
    body: Option<&serde_json::Value>,
) -> String {
    let endpoint = endpoint
        .strip_prefix('/')
        .unwrap_or(endpoint)
        .replace('/', "-")
        .replace('.', "");
    let mut signature = format!("{}_{}", method.as_str(), endpoint);

    if !query.is_empty() {
        let pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| {
                let value: String = url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
                format!("{}-{}", k, value)
            })
            .collect();
        signature.push('_');
        signature.push_str(&pairs.join("_"));
    }
    if let Some(body) = body {
        let digest = sha256_hex(body.to_string().as_bytes());
        signature.push('_');
        signature.push_str(&digest[..16]);
    }
    signature
}

pub trait FixtureStore: Send + Sync {
    fn load(&self, signature: &str) -> Result<Option<Fixture>>;
    fn save(&self, signature: &str, fixture: &Fixture) -> Result<()>;

    fn exists(&self, signature: &str) -> Result<bool> {
        Ok(self.load(signature)?.is_some())
    }
}

/// One JSON file per signature under a directory.
pub struct FileFixtureStore {
    directory: PathBuf,
}

impl FileFixtureStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, signature: &str) -> PathBuf {
        let file: String = signature
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '%' | '+' => c,
                _ => '_',
            })
            .collect();
        self.directory.join(format!("{}.json", file))
    }
}

impl FixtureStore for FileFixtureStore {
    fn load(&self, signature: &str) -> Result<Option<Fixture>> {
        let path = self.path_for(signature);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            Error::cache_with_context(
                format!("Fixture for '{}' failed to be parsed", signature),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("fixtures"),
            )
        })
    }

    fn save(&self, signature: &str, fixture: &Fixture) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        std::fs::write(
            self.path_for(signature),
            serde_json::to_vec_pretty(fixture)?,
        )?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFixtureStore {
    fixtures: RwLock<HashMap<String, Fixture>>,
}

impl MemoryFixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(self, signature: impl Into<String>, fixture: Fixture) -> Self {
        if let Ok(mut fixtures) = self.fixtures.write() {
            fixtures.insert(signature.into(), fixture);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fixtures.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FixtureStore for MemoryFixtureStore {
    fn load(&self, signature: &str) -> Result<Option<Fixture>> {
        let fixtures = self.fixtures.read().map_err(|_| {
            Error::cache_with_context(
                "fixture store lock poisoned",
                ErrorContext::new().with_source("fixtures"),
            )
        })?;
        Ok(fixtures.get(signature).cloned())
    }

    fn save(&self, signature: &str, fixture: &Fixture) -> Result<()> {
        self.fixtures
            .write()
            .map_err(|_| {
                Error::cache_with_context(
                    "fixture store lock poisoned",
                    ErrorContext::new().with_source("fixtures"),
                )
            })?
            .insert(signature.to_string(), fixture.clone());
        Ok(())
    }
}

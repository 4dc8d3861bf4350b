use crate::cache::fingerprint;
use crate::fixtures::signature;
use crate::region::RegionResolver;
use crate::settings::{KeyPlacement, Settings};
use crate::transport::{HttpRequest, Method};
use crate::Result;
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// One logical API call as the caller describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub method: Method,
    pub endpoint: String,
    /// Coarse endpoint group (e.g. `"1:summoner"`) scoping method limits and cache ttl.
    pub resource: String,
    /// Ordered pairs; a repeated name is a multi-valued parameter.
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Region for this call only.
    pub region: Option<String>,
    /// Route this call to the continent of its region.
    pub continent: bool,
    /// Name of an alternative credential from `Settings::keys`.
    pub key_name: Option<String>,
}

impl CallRequest {
    pub fn new(method: Method, endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            resource: resource.into(),
            query: Vec::new(),
            body: None,
            region: None,
            continent: false,
            key_name: None,
        }
    }

    pub fn get(endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint, resource)
    }

    pub fn post(endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint, resource)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn with_query_values<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.query
            .extend(values.into_iter().map(|v| (name.to_string(), v.to_string())));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn on_continent(mut self) -> Self {
        self.continent = true;
        self
    }

    pub fn using_key(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }
}

/// Per-call state resolved from a [`CallRequest`] before any hook runs.
#[derive(Clone)]
pub struct CallContext {
    pub call_id: Uuid,
    pub method: Method,
    pub endpoint: String,
    pub resource: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub region: String,
    pub routing_target: String,
    pub url: String,
    pub fingerprint: String,
    pub signature: String,
    pub(crate) credential: String,
    pub(crate) request_headers: Vec<(String, String)>,
    pub(crate) started: Instant,
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("call_id", &self.call_id)
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("resource", &self.resource)
            .field("region", &self.region)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl CallContext {
    /// Resolve region, credential, URL and keys for one call.
    ///
    /// `active_region` is the client-wide region (including any pushed override);
    /// `request.region` wins over it for this call only.
    pub(crate) fn resolve(
        request: &CallRequest,
        settings: &Settings,
        regions: &dyn RegionResolver,
        active_region: &str,
        base_url_override: Option<&str>,
    ) -> Result<Self> {
        let mut region = regions.region_name(request.region.as_deref().unwrap_or(active_region))?;
        if request.continent {
            region = regions.continent_of(&region)?;
        }
        let routing_target = regions.routing_target(&region)?;
        let credential = settings.credential(request.key_name.as_deref()).to_string();

        let mut request_headers = Vec::new();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        match settings.key_placement {
            KeyPlacement::Query => {
                serializer.append_pair("api_key", &credential);
            }
            KeyPlacement::Header => {
                request_headers.push((settings.headers.api_key.clone(), credential.clone()));
            }
        }
        for (name, value) in &request.query {
            serializer.append_pair(name, value);
        }
        let query_string = serializer.finish();

        let mut url = match base_url_override {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), request.endpoint),
            None => format!(
                "https://{}{}{}",
                routing_target, settings.base_url, request.endpoint
            ),
        };
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        Ok(Self {
            call_id: Uuid::new_v4(),
            method: request.method,
            endpoint: request.endpoint.clone(),
            resource: request.resource.clone(),
            query: request.query.clone(),
            body: request.body.clone(),
            fingerprint: fingerprint(&url),
            signature: signature(
                request.method,
                &request.endpoint,
                &request.query,
                request.body.as_ref(),
            ),
            region,
            routing_target,
            url,
            credential,
            request_headers,
            started: Instant::now(),
        })
    }

    pub(crate) fn http_request(&self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.request_headers.clone(),
            body: self.body.clone(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

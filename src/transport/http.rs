use super::{HttpRequest, Method, RawResponse, Transport, TransportFactory};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Client knobs shared by every transport a factory creates.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            verify_tls: true,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> crate::Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .pool_max_idle_per_host(
                env::var("CALLGATE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .danger_accept_invalid_certs(!options.verify_tls);

        let client = builder
            .build()
            .map_err(|e| crate::Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                tracing::debug!(header = %name, "skipping non-ascii response header");
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Creates one independent reqwest client per call to [`TransportFactory::create`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransportFactory {
    options: TransportOptions,
}

impl HttpTransportFactory {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self) -> crate::Result<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::new(&self.options)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

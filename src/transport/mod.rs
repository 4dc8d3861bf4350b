//! 传输层：向 API 发送单个 HTTP 请求。
//!
//! # Transport
//!
//! The pipeline never talks to the network directly; it hands a fully resolved
//! [`HttpRequest`] to a [`Transport`] and gets back a [`RawResponse`].
//!
//! - Every HTTP status, including 4xx/5xx, is returned as `Ok(RawResponse)`
//! - `Err(TransportError)` means no response was obtained at all
//!
//! [`TransportFactory`] creates clients, so async groups can each own an isolated one.

mod http;

pub use http::{HttpTransport, HttpTransportFactory, TransportError, TransportOptions};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// Status, headers and raw body of one response.
///
/// Header names are lowercased; repeated headers are joined with `", "`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

pub trait TransportFactory: Send + Sync {
    fn create(&self) -> crate::Result<Arc<dyn Transport>>;
}

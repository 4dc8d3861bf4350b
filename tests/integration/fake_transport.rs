//! In-process transport that answers by URL path and counts clients and sends

use async_trait::async_trait;
use callgate::transport::{HttpRequest, RawResponse, Transport, TransportError, TransportFactory};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Route {
    response: Option<RawResponse>,
    delay: Duration,
}

#[derive(Default)]
struct Shared {
    routes: Mutex<HashMap<String, Route>>,
    sent: Mutex<Vec<(usize, HttpRequest)>>,
    clients: AtomicUsize,
}

/// Factory handing out clients that share one routing table.
#[derive(Clone, Default)]
pub struct FakeTransportFactory {
    shared: Arc<Shared>,
}

impl FakeTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose path is `path` with `response` after `delay`.
    pub fn route(&self, path: &str, response: RawResponse, delay: Duration) -> &Self {
        self.shared.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                response: Some(response),
                delay,
            },
        );
        self
    }

    /// Fail requests to `path` without producing a response.
    pub fn route_unreachable(&self, path: &str) -> &Self {
        self.shared.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                response: None,
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn clients_created(&self) -> usize {
        self.shared.clients.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> usize {
        self.shared.sent.lock().unwrap().len()
    }

    /// Client ids that served each request, in send order.
    pub fn clients_used(&self) -> Vec<usize> {
        self.shared
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.shared
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self) -> callgate::Result<Arc<dyn Transport>> {
        let id = self.shared.clients.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeTransport {
            id,
            shared: self.shared.clone(),
        }))
    }
}

struct FakeTransport {
    id: usize,
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self.shared
            .sent
            .lock()
            .unwrap()
            .push((self.id, request.clone()));
        let path = url::Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let route = self.shared.routes.lock().unwrap().get(&path).cloned();
        let Some(route) = route else {
            return Ok(RawResponse::new(
                404,
                r#"{"status":{"message":"Data not found","status_code":404}}"#,
            ));
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        route
            .response
            .ok_or_else(|| TransportError::Other("connection reset".to_string()))
    }
}

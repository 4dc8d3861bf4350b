//! Mock HTTP server setup for integration tests

use callgate::pipeline::CallPipeline;
use callgate::settings::Settings;
use mockito::{Matcher, Mock, Server, ServerGuard};

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Pipeline using the reqwest transport, pointed at the mock server
    pub fn create_pipeline(&self, settings: Settings) -> callgate::Result<CallPipeline> {
        CallPipeline::builder(settings)
            .base_url_override(&self.base_url)
            .build()
    }

    /// Mock a GET answering with a JSON body and extra headers
    pub async fn mock_json(
        &mut self,
        path: &str,
        status: usize,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Mock {
        let mut mock = self
            .server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json");
        for (name, value) in headers {
            mock = mock.with_header(*name, *value);
        }
        mock.with_body(body).create_async().await
    }
}

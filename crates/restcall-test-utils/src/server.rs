//! HTTP mocking utilities using wiremock.

use std::time::Duration;

use serde::Serialize;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock server wrapper with convenience methods.
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Server base URL, usable as a client's base address.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Access the underlying MockServer.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Register an endpoint answering `verb` with JSON.
    pub async fn json<T: Serialize>(&self, verb: &str, endpoint: &str, response: &T) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint echoing the request body back.
    pub async fn echo(&self, verb: &str, endpoint: &str) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(|request: &Request| {
                ResponseTemplate::new(200)
                    .set_body_raw(request.body.clone(), "application/json; charset=utf-8")
            })
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint that always answers with `status`.
    pub async fn status(&self, endpoint: &str, status: u16, body: &str) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint that answers slower than `latency`.
    pub async fn with_latency(&self, endpoint: &str, body: &str, latency: Duration) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .set_delay(latency),
            )
            .mount(&self.server)
            .await;
    }

    /// Register a sequence of responses, one per request, in order.
    pub async fn sequence(&self, endpoint: &str, responses: Vec<ResponseTemplate>) {
        for (i, response) in responses.into_iter().enumerate() {
            Mock::given(path(endpoint))
                .respond_with(response)
                .up_to_n_times(1)
                .with_priority(1 + i as u8)
                .mount(&self.server)
                .await;
        }
    }

    /// All received requests.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Assert how many requests reached `endpoint`.
    pub async fn verify_received(&self, endpoint: &str, times: usize) {
        let count = self
            .received_requests()
            .await
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count();
        assert_eq!(
            count, times,
            "Expected {} requests to {}, got {}",
            times, endpoint, count
        );
    }
}

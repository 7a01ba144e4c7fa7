//! mockito wrapper standing in for the external HTTP targets nodes ask the gateway to call.

use mockito::{Matcher, Mock, Server, ServerGuard};

pub struct TargetMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl TargetMockBuilder {
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Mocks `method path` answering `status` with a JSON `body`.
    pub fn mock_json(&mut self, method: &str, path: &str, status: usize, body: &str) -> &mut Self {
        let mock = self
            .server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks `POST path` matching an exact request body.
    pub fn mock_post_with_body(&mut self, path: &str, expected: &str, reply: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", path)
            .match_body(Matcher::Exact(expected.to_string()))
            .with_status(200)
            .with_body(reply)
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks a redirect, which the gateway client must not follow.
    pub fn mock_redirect(&mut self, path: &str, location: &str) -> &mut Self {
        let mock = self
            .server
            .mock("GET", path)
            .with_status(302)
            .with_header("location", location)
            .create();
        self.mocks.push(mock);
        self
    }

    /// Asserts every registered mock was hit as expected.
    pub fn assert_all(&self) {
        for mock in &self.mocks {
            mock.assert();
        }
    }
}

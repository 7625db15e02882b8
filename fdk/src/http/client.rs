//! HttpClient trait definition

use std::sync::Arc;

use async_trait::async_trait;

use super::{HttpError, HttpRequest, HttpResponse};

/// Sends one request and returns the response with its body read
///
/// Non-2xx responses are returned as `Ok`; callers decide what a failure
/// status means via [`HttpResponse::error_for_status`]. `Err` is reserved for
/// transport failures (connection, timeout, unreadable body).
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Shared handle used by every service
pub type SharedHttpClient = Arc<dyn HttpClient>;

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use reqwest::Method;
    use tracing::debug;

    type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync>;

    /// Mock transport for unit tests: routes by method + path, records every request
    #[derive(Default)]
    pub struct MockHttpClient {
        routes: Vec<(Method, String, Responder)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a responder; unmatched requests get a 404
        pub fn on<F>(mut self, method: Method, path: &str, responder: F) -> Self
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
        {
            self.routes.push((method, path.to_string(), Box::new(responder)));
            self
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }

        /// Number of requests sent to the given path
        pub fn call_count(&self, path: &str) -> usize {
            self.requests.lock().iter().filter(|r| r.path == path).count()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            debug!(method = %request.method, path = %request.path, "MockHttpClient::send: called");
            self.requests.lock().push(request.clone());
            match self
                .routes
                .iter()
                .find(|(method, path, _)| *method == request.method && *path == request.path)
            {
                Some((_, _, responder)) => responder(&request),
                None => Ok(HttpResponse::new(404, "Not Found")),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_routes_and_records() {
            let client = MockHttpClient::new().on(Method::GET, "/ping", |_| Ok(HttpResponse::new(200, "pong")));

            let resp = client.send(HttpRequest::get("/ping")).await.unwrap();
            assert_eq!(resp.body, "pong");

            let missing = client.send(HttpRequest::get("/nope")).await.unwrap();
            assert_eq!(missing.status, 404);

            assert_eq!(client.requests().len(), 2);
            assert_eq!(client.call_count("/ping"), 1);
        }
    }
}

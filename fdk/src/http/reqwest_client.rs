//! Live transport backed by reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::config::HttpConfig;

/// HTTP client that resolves request paths against a base URL
pub struct ReqwestClient {
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Create a new client from configuration
    pub fn from_config(config: &HttpConfig) -> Result<Self, HttpError> {
        debug!(?config, "ReqwestClient::from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            http,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; everything else is joined to the base URL
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = self.resolve_url(&request.path);
        debug!(method = %request.method, %url, "ReqwestClient::send: called");

        let mut builder = self.http.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(%url, "ReqwestClient::send: request timed out");
                HttpError::Timeout(self.timeout)
            } else {
                HttpError::Network(e)
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%status, body_len = body.len(), "ReqwestClient::send: response received");

        Ok(HttpResponse { status, body })
    }
}

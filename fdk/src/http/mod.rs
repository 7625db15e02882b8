//! HTTP transport for the endpoint and auth managers
//!
//! Services talk to the backend through the [`HttpClient`] trait so the
//! transport can be swapped: [`ReqwestClient`] for a live backend,
//! [`StaticDirClient`] to serve a directory of JSON files, and a scripted mock
//! in tests.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod client;
mod reqwest_client;
mod static_dir;

pub use client::{HttpClient, SharedHttpClient};
pub use reqwest::Method;
pub use reqwest_client::ReqwestClient;
pub use static_dir::StaticDirClient;

/// Longest error body echoed back in an error message
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// 401 or 403: credentials were rejected, retrying will not help
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// 401 only: the session token is no longer accepted
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// An outgoing request; `path` is resolved by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a header; repeated names are sent as separate header lines
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// First header value with the given name (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response with its body fully read
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response carrying a JSON body
    pub fn ok_json(body: &Value) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-2xx response into [`HttpError::Status`]
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = error_message(&self.body).unwrap_or_else(|| status_reason(self.status).to_string());
        debug!(status = self.status, %message, "HttpResponse::error_for_status: non-success");
        Err(HttpError::Status {
            status: self.status,
            message,
        })
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                return Some(msg.to_string());
            }
        }
    }
    Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

fn status_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unexpected status")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = HttpRequest::post("/api/auth/login")
            .bearer("t1")
            .header("x-api-key", "k")
            .json(serde_json::json!({"email": "a@b.com"}));

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header_value("authorization"), Some("Bearer t1"));
        assert_eq!(req.header_value("X-API-KEY"), Some("k"));
        assert!(req.body.is_some());
    }

    #[test]
    fn test_error_for_status_uses_json_message() {
        let resp = HttpResponse::new(400, r#"{"message":"Email already registered"}"#);
        let err = resp.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("Email already registered"));
    }

    #[test]
    fn test_error_for_status_falls_back_to_reason() {
        let err = HttpResponse::new(503, "").error_for_status().unwrap_err();
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_success_passes_through() {
        let resp = HttpResponse::new(204, "");
        assert!(resp.error_for_status().is_ok());
    }

    #[test]
    fn test_auth_failure_classification() {
        let unauthorized = HttpError::Status {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        let forbidden = HttpError::Status {
            status: 403,
            message: "Forbidden".to_string(),
        };
        let server = HttpError::Status {
            status: 500,
            message: "boom".to_string(),
        };

        assert!(unauthorized.is_auth_failure());
        assert!(unauthorized.is_unauthorized());
        assert!(forbidden.is_auth_failure());
        assert!(!forbidden.is_unauthorized());
        assert!(!server.is_auth_failure());
        assert!(!HttpError::InvalidResponse("x".to_string()).is_auth_failure());
    }
}

//! Transport that serves GET requests from a local directory
//!
//! Lets the static tier of the endpoint loader run without a server:
//! `GET data/endpoints.json` reads `<root>/data/endpoints.json`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

pub struct StaticDirClient {
    root: PathBuf,
}

impl StaticDirClient {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Map a request path to a file under the root, rejecting `..` escapes
    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl HttpClient for StaticDirClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        debug!(method = %request.method, path = %request.path, "StaticDirClient::send: called");
        if request.method != Method::GET {
            return Ok(HttpResponse::new(405, "Method Not Allowed"));
        }

        let Some(file) = self.file_for(&request.path) else {
            return Ok(HttpResponse::new(404, "Not Found"));
        };

        match tokio::fs::read_to_string(&file).await {
            Ok(body) => Ok(HttpResponse::new(200, body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HttpResponse::new(404, "Not Found")),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_serves_files_under_root() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(temp.path().join("data/endpoints.json"), "[]").unwrap();

        let client = StaticDirClient::new(temp.path());
        let resp = client.send(HttpRequest::get("/data/endpoints.json?v=2")).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "[]");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let temp = tempdir().unwrap();
        let client = StaticDirClient::new(temp.path());
        let resp = client.send(HttpRequest::get("data/endpoints.json")).await.unwrap();
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_rejects_escape_and_non_get() {
        let temp = tempdir().unwrap();
        let client = StaticDirClient::new(temp.path());

        let escape = client.send(HttpRequest::get("../etc/passwd")).await.unwrap();
        assert_eq!(escape.status, 404);

        let post = client.send(HttpRequest::post("data/endpoints.json")).await.unwrap();
        assert_eq!(post.status, 405);
    }
}

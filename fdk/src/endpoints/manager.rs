//! EndpointManager - endpoint catalog with tiered loading

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::model::{CUSTOM_CATEGORY, group_by_category, normalize_endpoint, process_endpoints};
use super::search::{SearchOptions, search};
use super::{EndpointDescriptor, EndpointError};
use crate::config::EndpointsConfig;
use crate::events::{EventBus, topics};
use crate::http::{HttpRequest, SharedHttpClient};
use crate::logging::{Level, SharedLogger};
use crate::storage::{SharedStore, read_json, write_json};

/// Where the current catalog came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Dynamic,
    Static,
    Fallback,
}

impl LoadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSource::Dynamic => "dynamic",
            LoadSource::Static => "static",
            LoadSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for LoadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Catalog {
    endpoints: Vec<EndpointDescriptor>,
    custom: Vec<EndpointDescriptor>,
    bundled: Option<Value>,
    source: Option<LoadSource>,
}

/// Loads and serves the endpoint catalog
///
/// Loading walks the source tiers dynamic → static (with retries) → bundled
/// and emits lifecycle events on the bus. There is no cancellation token:
/// dropping a `load_endpoints` future (for example through
/// `tokio::time::timeout`) abandons the load at its next await point,
/// including a pending retry sleep, and leaves the previous catalog intact.
pub struct EndpointManager {
    config: EndpointsConfig,
    http: SharedHttpClient,
    store: SharedStore,
    bus: EventBus,
    logger: SharedLogger,
    catalog: Mutex<Catalog>,
}

impl EndpointManager {
    /// Create a manager, restoring custom endpoints from storage
    pub fn new(config: EndpointsConfig, http: SharedHttpClient, store: SharedStore, bus: EventBus, logger: SharedLogger) -> Self {
        debug!("EndpointManager::new: called");
        let custom = match read_json::<Vec<EndpointDescriptor>>(store.as_ref(), &config.custom_endpoints_key) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                logger.log(
                    Level::Warn,
                    "Ignoring unreadable custom endpoints",
                    Some(&json!({"key": config.custom_endpoints_key, "error": e.to_string()})),
                );
                Vec::new()
            }
        };

        let catalog = Catalog {
            endpoints: custom.clone(),
            custom,
            ..Default::default()
        };

        Self {
            config,
            http,
            store,
            bus,
            logger,
            catalog: Mutex::new(catalog),
        }
    }

    pub fn config(&self) -> &EndpointsConfig {
        debug!("EndpointManager::config: called");
        &self.config
    }

    /// Register the payload used when every other source fails
    pub fn set_bundled_endpoints(&self, payload: Value) {
        debug!("EndpointManager::set_bundled_endpoints: called");
        self.catalog.lock().bundled = Some(payload);
    }

    /// Load the catalog, walking dynamic → static → bundled
    pub async fn load_endpoints(&self) -> Result<LoadSource, EndpointError> {
        debug!("EndpointManager::load_endpoints: called");
        self.emit(topics::ENDPOINTS_LOADING, json!({"dynamic": self.config.dynamic_loading}));

        if self.config.dynamic_loading {
            match self.load_dynamic_endpoints().await {
                Ok(endpoints) => return Ok(self.apply(endpoints, LoadSource::Dynamic)),
                Err(e) if e.is_auth_failure() => {
                    self.logger.log(
                        Level::Warn,
                        "Dynamic endpoints rejected credentials, using static endpoints",
                        Some(&json!({"error": e.to_string()})),
                    );
                }
                Err(e) => {
                    self.logger.log(
                        Level::Warn,
                        "Dynamic endpoints unavailable, using static endpoints",
                        Some(&json!({"error": e.to_string()})),
                    );
                }
            }
        }

        let error = match self.load_static_endpoints().await {
            Ok(endpoints) => return Ok(self.apply(endpoints, LoadSource::Static)),
            Err(e) => e,
        };

        let bundled = self.catalog.lock().bundled.clone();
        let error = match bundled {
            Some(payload) => match process_endpoints(payload, self.config.strict_format) {
                Ok(endpoints) => {
                    self.logger.log(
                        Level::Warn,
                        "Static endpoints unavailable, using bundled endpoints",
                        Some(&json!({"error": error.to_string()})),
                    );
                    return Ok(self.apply(endpoints, LoadSource::Fallback));
                }
                Err(bundled_error) => bundled_error,
            },
            None => error,
        };

        self.logger.log(
            Level::Error,
            "Failed to load endpoints",
            Some(&json!({"error": error.to_string()})),
        );
        self.emit(
            topics::ENDPOINTS_ERROR,
            json!({"error": error.to_string(), "message": "Failed to load endpoints"}),
        );
        Err(error)
    }

    /// Fetch the dynamic source once; it must answer with `{endpoints: [...]}`
    pub async fn load_dynamic_endpoints(&self) -> Result<Vec<EndpointDescriptor>, EndpointError> {
        debug!(path = %self.config.dynamic_endpoints_path, "EndpointManager::load_dynamic_endpoints: called");
        if self.config.dynamic_endpoints_path.trim().is_empty() {
            return Err(EndpointError::MissingConfig("endpoints.dynamic-path"));
        }
        let request = HttpRequest::get(&self.config.dynamic_endpoints_path).headers(self.auth_headers());
        let response = self.http.send(request).await?.error_for_status()?;
        let value: Value = response.json()?;
        process_endpoints(value, true)
    }

    /// Fetch the static file, retrying with a fixed delay
    ///
    /// Makes at most `max_retries` attempts (at least one) and returns the
    /// last error once they are exhausted.
    pub async fn load_static_endpoints(&self) -> Result<Vec<EndpointDescriptor>, EndpointError> {
        debug!(path = %self.config.endpoints_file_path, "EndpointManager::load_static_endpoints: called");
        if self.config.endpoints_file_path.trim().is_empty() {
            return Err(EndpointError::MissingConfig("endpoints.file-path"));
        }

        let attempts = self.config.max_retries.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut attempt = 1;
        loop {
            match self.fetch_static().await {
                Ok(endpoints) => return Ok(endpoints),
                Err(e) if attempt < attempts => {
                    warn!(attempt, attempts, error = %e, "Static endpoint load failed, retrying");
                    self.emit(
                        topics::ENDPOINTS_RETRY,
                        json!({
                            "attempt": attempt + 1,
                            "maxRetries": attempts,
                            "delayMs": self.config.retry_delay_ms,
                            "message": e.to_string(),
                        }),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_static(&self) -> Result<Vec<EndpointDescriptor>, EndpointError> {
        let response = self
            .http
            .send(HttpRequest::get(&self.config.endpoints_file_path))
            .await?
            .error_for_status()?;
        let value: Value = response.json()?;
        process_endpoints(value, self.config.strict_format)
    }

    /// Reload the catalog, bracketed by refresh events
    pub async fn refresh(&self) -> Result<LoadSource, EndpointError> {
        debug!("EndpointManager::refresh: called");
        self.emit(topics::ENDPOINTS_REFRESHING, json!({}));
        match self.load_endpoints().await {
            Ok(source) => {
                let count = self.catalog.lock().endpoints.len();
                self.emit(topics::ENDPOINTS_REFRESHED, json!({"count": count, "source": source}));
                Ok(source)
            }
            Err(e) => {
                self.emit(
                    topics::ENDPOINTS_REFRESH_ERROR,
                    json!({"error": e.to_string(), "message": "Failed to refresh endpoints"}),
                );
                Err(e)
            }
        }
    }

    /// Replace the catalog and announce it
    fn apply(&self, loaded: Vec<EndpointDescriptor>, source: LoadSource) -> LoadSource {
        let (count, categories) = {
            let mut catalog = self.catalog.lock();
            let mut endpoints = loaded;
            for custom in &catalog.custom {
                if endpoints.iter().any(|e| e.id == custom.id) {
                    warn!(id = %custom.id, "Custom endpoint shadowed by loaded endpoint");
                    continue;
                }
                endpoints.push(custom.clone());
            }
            catalog.endpoints = endpoints;
            catalog.source = Some(source);
            let categories: Vec<String> = group_by_category(&catalog.endpoints).into_keys().collect();
            (catalog.endpoints.len(), categories)
        };

        self.logger.log(
            Level::Info,
            &format!("Loaded {} endpoints", count),
            Some(&json!({"source": source})),
        );
        self.emit(
            topics::ENDPOINTS_LOADED,
            json!({"count": count, "source": source, "categories": categories}),
        );
        source
    }

    /// Headers sent to the dynamic source, built from stored credentials
    ///
    /// The API key is sent under every spelling backends commonly expect.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        debug!("EndpointManager::auth_headers: called");
        let mut headers = Vec::new();
        if let Some(token) = self.stored(&self.config.token_key) {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if let Some(key) = self.stored(&self.config.api_key_key) {
            for name in ["x-api-key", "api-key", "X-Api-Key"] {
                headers.push((name.to_string(), key.clone()));
            }
        }
        headers
    }

    fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!(%key, error = %e, "EndpointManager: failed to read credential");
                None
            }
        }
    }

    // === Queries ===

    pub fn endpoints(&self) -> Vec<EndpointDescriptor> {
        debug!("EndpointManager::endpoints: called");
        self.catalog.lock().endpoints.clone()
    }

    pub fn source(&self) -> Option<LoadSource> {
        debug!("EndpointManager::source: called");
        self.catalog.lock().source
    }

    /// Endpoints grouped by category, sorted by name
    pub fn categories(&self) -> BTreeMap<String, Vec<EndpointDescriptor>> {
        debug!("EndpointManager::categories: called");
        group_by_category(&self.catalog.lock().endpoints)
    }

    pub fn category_names(&self) -> Vec<String> {
        debug!("EndpointManager::category_names: called");
        self.categories().into_keys().collect()
    }

    pub fn endpoints_by_category(&self, category: &str) -> Vec<EndpointDescriptor> {
        debug!(%category, "EndpointManager::endpoints_by_category: called");
        self.catalog
            .lock()
            .endpoints
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    pub fn endpoint_by_id(&self, id: &str) -> Option<EndpointDescriptor> {
        debug!(%id, "EndpointManager::endpoint_by_id: called");
        self.catalog.lock().endpoints.iter().find(|e| e.id == id).cloned()
    }

    pub fn search_endpoints(&self, query: &str, options: &SearchOptions) -> Vec<EndpointDescriptor> {
        debug!(%query, "EndpointManager::search_endpoints: called");
        let catalog = self.catalog.lock();
        search(&catalog.endpoints, query, options).into_iter().cloned().collect()
    }

    pub fn custom_endpoints(&self) -> Vec<EndpointDescriptor> {
        debug!("EndpointManager::custom_endpoints: called");
        self.catalog.lock().custom.clone()
    }

    // === Custom endpoints ===

    /// Add a user-defined endpoint and persist it
    ///
    /// A missing id is replaced by a fresh UUID; ids must be unique across
    /// the whole catalog.
    pub fn add_custom_endpoint(&self, raw: Value) -> Result<EndpointDescriptor, EndpointError> {
        debug!("EndpointManager::add_custom_endpoint: called");
        if !raw.is_object() {
            return Err(EndpointError::InvalidFormat("custom endpoint must be an object".into()));
        }
        let has_id = raw
            .get("id")
            .is_some_and(|id| id.as_str().is_some_and(|s| !s.is_empty()) || id.is_number());
        let mut endpoint = normalize_endpoint(&raw, CUSTOM_CATEGORY).ok_or(EndpointError::MissingPath)?;
        if !has_id {
            endpoint.id = uuid::Uuid::now_v7().to_string();
        }
        endpoint.is_custom = true;

        {
            let mut catalog = self.catalog.lock();
            if catalog.endpoints.iter().chain(&catalog.custom).any(|e| e.id == endpoint.id) {
                return Err(EndpointError::DuplicateId { id: endpoint.id });
            }
            let mut custom = catalog.custom.clone();
            custom.push(endpoint.clone());
            write_json(self.store.as_ref(), &self.config.custom_endpoints_key, &custom)?;
            catalog.custom = custom;
            catalog.endpoints.push(endpoint.clone());
        }

        self.logger.log(
            Level::Info,
            &format!("Added custom endpoint {} {}", endpoint.method, endpoint.path),
            Some(&json!({"id": endpoint.id})),
        );
        self.emit(topics::ENDPOINTS_CUSTOM_ADDED, json!({"endpoint": endpoint}));
        Ok(endpoint)
    }

    /// Remove a custom endpoint and persist the change
    pub fn remove_custom_endpoint(&self, id: &str) -> Result<EndpointDescriptor, EndpointError> {
        debug!(%id, "EndpointManager::remove_custom_endpoint: called");
        let removed = {
            let mut catalog = self.catalog.lock();
            let Some(index) = catalog.custom.iter().position(|e| e.id == id) else {
                return Err(if catalog.endpoints.iter().any(|e| e.id == id) {
                    EndpointError::NotCustom { id: id.to_string() }
                } else {
                    EndpointError::NotFound { id: id.to_string() }
                });
            };
            let mut custom = catalog.custom.clone();
            let removed = custom.remove(index);
            write_json(self.store.as_ref(), &self.config.custom_endpoints_key, &custom)?;
            catalog.custom = custom;
            catalog.endpoints.retain(|e| !(e.is_custom && e.id == id));
            removed
        };

        self.logger.log(Level::Info, &format!("Removed custom endpoint {}", id), None);
        self.emit(topics::ENDPOINTS_CUSTOM_REMOVED, json!({"id": id}));
        Ok(removed)
    }

    fn emit(&self, topic: &str, payload: Value) {
        if let Err(e) = self.bus.emit(topic, payload) {
            warn!(%topic, error = %e, "EndpointManager: failed to emit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::mock::MockHttpClient;
    use crate::http::{HttpError, HttpResponse, Method};
    use crate::logging::ConsoleLogger;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    const DYNAMIC: &str = "/api/v1/api-tester/endpoints";
    const STATIC: &str = "data/endpoints.json";

    struct Harness {
        manager: EndpointManager,
        http: Arc<MockHttpClient>,
        store: Arc<MemoryStore>,
        events: Arc<Mutex<Vec<(String, Value)>>>,
    }

    fn config() -> EndpointsConfig {
        EndpointsConfig {
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn harness_with(config: EndpointsConfig, http: MockHttpClient, store: Arc<MemoryStore>) -> Harness {
        let http = Arc::new(http);
        let bus = EventBus::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        for topic in [
            topics::ENDPOINTS_LOADING,
            topics::ENDPOINTS_LOADED,
            topics::ENDPOINTS_ERROR,
            topics::ENDPOINTS_RETRY,
            topics::ENDPOINTS_REFRESHING,
            topics::ENDPOINTS_REFRESHED,
            topics::ENDPOINTS_REFRESH_ERROR,
            topics::ENDPOINTS_CUSTOM_ADDED,
            topics::ENDPOINTS_CUSTOM_REMOVED,
        ] {
            let events = events.clone();
            bus.subscribe(topic, move |payload| {
                events.lock().push((topic.to_string(), payload.clone()));
                Ok(())
            });
        }
        let logger = Arc::new(ConsoleLogger::new("endpoints", Level::Debug));
        let manager = EndpointManager::new(config, http.clone(), store.clone(), bus, logger);
        Harness {
            manager,
            http,
            store,
            events,
        }
    }

    fn harness(http: MockHttpClient) -> Harness {
        harness_with(config(), http, Arc::new(MemoryStore::new()))
    }

    impl Harness {
        fn topics(&self) -> Vec<String> {
            self.events.lock().iter().map(|(t, _)| t.clone()).collect()
        }

        fn payload(&self, topic: &str) -> Option<Value> {
            self.events.lock().iter().rev().find(|(t, _)| t == topic).map(|(_, p)| p.clone())
        }
    }

    fn status(code: u16) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse::new(code, ""))
    }

    #[tokio::test]
    async fn test_dynamic_source_with_auth_headers() {
        let store = Arc::new(MemoryStore::new());
        store.set("auth_token", "t1").unwrap();
        store.set("api_key", "k1").unwrap();
        let http = MockHttpClient::new().on(Method::GET, DYNAMIC, |_| {
            Ok(HttpResponse::ok_json(&json!({"endpoints": [{"path": "/api/users"}]})))
        });
        let h = harness_with(config(), http, store);

        let source = h.manager.load_endpoints().await.unwrap();
        assert_eq!(source, LoadSource::Dynamic);
        assert_eq!(h.manager.endpoints().len(), 1);

        let request = &h.http.requests()[0];
        assert_eq!(request.header_value("Authorization"), Some("Bearer t1"));
        let api_keys: Vec<_> = request.headers.iter().filter(|(_, v)| v == "k1").map(|(k, _)| k.as_str()).collect();
        assert_eq!(api_keys, vec!["x-api-key", "api-key", "X-Api-Key"]);

        assert_eq!(h.topics(), vec![topics::ENDPOINTS_LOADING, topics::ENDPOINTS_LOADED]);
        let loaded = h.payload(topics::ENDPOINTS_LOADED).unwrap();
        assert_eq!(loaded["source"], "dynamic");
        assert_eq!(loaded["count"], 1);
        assert_eq!(loaded["categories"], json!(["Uncategorized"]));
    }

    #[tokio::test]
    async fn test_dynamic_requires_wrapped_shape() {
        let http = MockHttpClient::new()
            .on(Method::GET, DYNAMIC, |_| Ok(HttpResponse::ok_json(&json!([{"path": "/bare"}]))))
            .on(Method::GET, STATIC, |_| Ok(HttpResponse::ok_json(&json!([{"path": "/static"}]))));
        let h = harness(http);

        assert_eq!(h.manager.load_endpoints().await.unwrap(), LoadSource::Static);
        assert_eq!(h.manager.endpoints()[0].path, "/static");
    }

    #[tokio::test]
    async fn test_dynamic_auth_failure_skips_retry_budget() {
        let http = MockHttpClient::new()
            .on(Method::GET, DYNAMIC, |_| status(401))
            .on(Method::GET, STATIC, |_| Ok(HttpResponse::ok_json(&json!({"Users": [{"path": "/u"}]}))));
        let h = harness(http);

        assert_eq!(h.manager.load_endpoints().await.unwrap(), LoadSource::Static);
        assert_eq!(h.http.call_count(DYNAMIC), 1);
        assert_eq!(h.http.call_count(STATIC), 1);
        assert!(!h.topics().contains(&topics::ENDPOINTS_RETRY.to_string()));
        assert_eq!(h.manager.category_names(), vec!["Users"]);
    }

    #[tokio::test]
    async fn test_dynamic_disabled_goes_straight_to_static() {
        let http = MockHttpClient::new().on(Method::GET, STATIC, |_| {
            Ok(HttpResponse::ok_json(&json!([{"path": "/a"}])))
        });
        let config = EndpointsConfig {
            dynamic_loading: false,
            ..config()
        };
        let h = harness_with(config, http, Arc::new(MemoryStore::new()));

        assert_eq!(h.manager.load_endpoints().await.unwrap(), LoadSource::Static);
        assert_eq!(h.http.call_count(DYNAMIC), 0);
        assert_eq!(h.manager.source(), Some(LoadSource::Static));
    }

    #[tokio::test]
    async fn test_static_retries_exactly_max_retries() {
        let http = MockHttpClient::new()
            .on(Method::GET, DYNAMIC, |_| status(500))
            .on(Method::GET, STATIC, |_| status(503));
        let h = harness(http);

        let err = h.manager.load_endpoints().await.unwrap_err();
        assert!(matches!(err, EndpointError::Http(HttpError::Status { status: 503, .. })));
        assert_eq!(h.http.call_count(STATIC), 3);

        let retries: Vec<Value> = h
            .events
            .lock()
            .iter()
            .filter(|(t, _)| t == topics::ENDPOINTS_RETRY)
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(retries.len(), 2);
        assert_eq!(retries[0]["attempt"], 2);
        assert_eq!(retries[1]["attempt"], 3);
        assert_eq!(retries[0]["maxRetries"], 3);
        assert_eq!(retries[0]["delayMs"], 1);

        let error = h.payload(topics::ENDPOINTS_ERROR).unwrap();
        assert_eq!(error["error"], "HTTP 503: Service Unavailable");
        assert!(error["message"].is_string());
    }

    #[tokio::test]
    async fn test_static_recovers_after_transient_failure() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls2 = calls.clone();
        let http = MockHttpClient::new().on(Method::GET, STATIC, move |_| {
            if calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Err(HttpError::Timeout(Duration::from_millis(5)))
            } else {
                Ok(HttpResponse::ok_json(&json!([{"path": "/a"}])))
            }
        });
        let config = EndpointsConfig {
            dynamic_loading: false,
            ..config()
        };
        let h = harness_with(config, http, Arc::new(MemoryStore::new()));

        assert_eq!(h.manager.load_endpoints().await.unwrap(), LoadSource::Static);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_max_retries_still_attempts_once() {
        let http = MockHttpClient::new().on(Method::GET, STATIC, |_| status(500));
        let config = EndpointsConfig {
            dynamic_loading: false,
            max_retries: 0,
            ..config()
        };
        let h = harness_with(config, http, Arc::new(MemoryStore::new()));

        assert!(h.manager.load_static_endpoints().await.is_err());
        assert_eq!(h.http.call_count(STATIC), 1);
    }

    #[tokio::test]
    async fn test_bundled_fallback() {
        let http = MockHttpClient::new().on(Method::GET, STATIC, |_| status(404));
        let h = harness(http);
        h.manager.set_bundled_endpoints(json!({"endpoints": [{"path": "/bundled"}]}));

        assert_eq!(h.manager.load_endpoints().await.unwrap(), LoadSource::Fallback);
        assert_eq!(h.http.call_count(STATIC), 3);
        assert_eq!(h.manager.endpoints()[0].path, "/bundled");
        assert_eq!(h.payload(topics::ENDPOINTS_LOADED).unwrap()["source"], "fallback");
        assert!(h.payload(topics::ENDPOINTS_ERROR).is_none());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_catalog() {
        let http = MockHttpClient::new().on(Method::GET, STATIC, |_| status(500));
        let h = harness(http);
        h.manager.set_bundled_endpoints(json!([{"path": "/bundled"}]));
        h.manager.load_endpoints().await.unwrap();

        // A broken bundled payload now fails the load; the catalog stays
        h.manager.set_bundled_endpoints(json!("broken"));
        assert!(h.manager.load_endpoints().await.is_err());
        assert_eq!(h.manager.endpoints()[0].path, "/bundled");
    }

    #[tokio::test]
    async fn test_dropping_load_future_cancels_retry_sleep() {
        let http = MockHttpClient::new().on(Method::GET, STATIC, |_| status(500));
        let config = EndpointsConfig {
            dynamic_loading: false,
            max_retries: 5,
            retry_delay_ms: 60_000,
            ..config()
        };
        let h = harness_with(config, http, Arc::new(MemoryStore::new()));

        let outcome = tokio::time::timeout(Duration::from_millis(50), h.manager.load_endpoints()).await;
        assert!(outcome.is_err());
        assert_eq!(h.http.call_count(STATIC), 1);
        assert!(h.manager.source().is_none());
    }

    #[tokio::test]
    async fn test_refresh_events() {
        let http = MockHttpClient::new().on(Method::GET, DYNAMIC, |_| {
            Ok(HttpResponse::ok_json(&json!({"endpoints": [{"path": "/a"}, {"path": "/b"}]})))
        });
        let h = harness(http);

        h.manager.refresh().await.unwrap();
        assert_eq!(
            h.topics(),
            vec![
                topics::ENDPOINTS_REFRESHING,
                topics::ENDPOINTS_LOADING,
                topics::ENDPOINTS_LOADED,
                topics::ENDPOINTS_REFRESHED
            ]
        );
        let refreshed = h.payload(topics::ENDPOINTS_REFRESHED).unwrap();
        assert_eq!(refreshed["count"], 2);
        assert_eq!(refreshed["source"], "dynamic");
    }

    #[tokio::test]
    async fn test_refresh_error_event() {
        let h = harness(MockHttpClient::new());
        assert!(h.manager.refresh().await.is_err());
        let topics_seen = h.topics();
        assert_eq!(topics_seen.last().unwrap(), topics::ENDPOINTS_REFRESH_ERROR);
        assert!(topics_seen.contains(&topics::ENDPOINTS_ERROR.to_string()));
    }

    #[tokio::test]
    async fn test_custom_endpoints_persist_and_survive_reload() {
        let store = Arc::new(MemoryStore::new());
        let http = MockHttpClient::new().on(Method::GET, DYNAMIC, |_| {
            Ok(HttpResponse::ok_json(&json!({"endpoints": [{"path": "/api/users"}]})))
        });
        let h = harness_with(config(), http, store.clone());

        let added = h
            .manager
            .add_custom_endpoint(json!({"path": "/debug", "method": "delete", "tags": ["local"]}))
            .unwrap();
        assert!(added.is_custom);
        assert_eq!(added.category, "Custom");
        assert_eq!(added.method, "DELETE");
        assert!(uuid::Uuid::parse_str(&added.id).is_ok());
        assert_eq!(h.payload(topics::ENDPOINTS_CUSTOM_ADDED).unwrap()["endpoint"]["path"], "/debug");

        h.manager.load_endpoints().await.unwrap();
        assert_eq!(h.manager.endpoints().len(), 2);
        assert_eq!(h.manager.endpoint_by_id(&added.id).unwrap().path, "/debug");

        // A second manager over the same storage restores the custom entry
        let restored = harness_with(config(), MockHttpClient::new(), h.store.clone());
        assert_eq!(restored.manager.custom_endpoints(), vec![added.clone()]);

        let removed = h.manager.remove_custom_endpoint(&added.id).unwrap();
        assert_eq!(removed.id, added.id);
        assert_eq!(h.payload(topics::ENDPOINTS_CUSTOM_REMOVED).unwrap()["id"], json!(added.id));
        assert_eq!(h.manager.endpoints().len(), 1);
        assert_eq!(store.get("custom_endpoints").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_custom_endpoint_validation() {
        let h = harness(MockHttpClient::new());

        assert!(matches!(
            h.manager.add_custom_endpoint(json!({"name": "no path"})),
            Err(EndpointError::MissingPath)
        ));
        assert!(matches!(
            h.manager.add_custom_endpoint(json!("/just-a-string")),
            Err(EndpointError::InvalidFormat(_))
        ));

        h.manager.add_custom_endpoint(json!({"id": "mine", "path": "/a"})).unwrap();
        assert!(matches!(
            h.manager.add_custom_endpoint(json!({"id": "mine", "path": "/b"})),
            Err(EndpointError::DuplicateId { .. })
        ));
        assert!(matches!(
            h.manager.remove_custom_endpoint("unknown"),
            Err(EndpointError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_only_custom_endpoints_can_be_removed() {
        let http = MockHttpClient::new().on(Method::GET, DYNAMIC, |_| {
            Ok(HttpResponse::ok_json(&json!({"endpoints": [{"id": "core", "path": "/core"}]})))
        });
        let h = harness(http);
        h.manager.load_endpoints().await.unwrap();

        assert!(matches!(
            h.manager.remove_custom_endpoint("core"),
            Err(EndpointError::NotCustom { .. })
        ));
    }

    #[test]
    fn test_corrupt_custom_storage_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set("custom_endpoints", "{not json").unwrap();
        let h = harness_with(config(), MockHttpClient::new(), store);
        assert!(h.manager.custom_endpoints().is_empty());
    }

    #[tokio::test]
    async fn test_queries() {
        let http = MockHttpClient::new().on(Method::GET, DYNAMIC, |_| {
            Ok(HttpResponse::ok_json(&json!({"endpoints": [
                {"path": "/api/users", "category": "Users", "name": "List users"},
                {"path": "/api/flows", "category": "Flows", "name": "List flows"}
            ]})))
        });
        let h = harness(http);
        h.manager.load_endpoints().await.unwrap();

        assert_eq!(h.manager.category_names(), vec!["Flows", "Users"]);
        assert_eq!(h.manager.endpoints_by_category("Users").len(), 1);
        assert_eq!(h.manager.endpoint_by_id("GET:/api/flows").unwrap().name, "List flows");
        assert_eq!(h.manager.search_endpoints("users", &SearchOptions::default()).len(), 1);
        assert_eq!(h.manager.categories()["Flows"][0].path, "/api/flows");
    }

    #[derive(Clone, Default)]
    struct TraceBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for TraceBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_queries_emit_entry_traces() {
        let h = harness(MockHttpClient::new());
        let buffer = TraceBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            h.manager.endpoints();
            h.manager.categories();
            h.manager.endpoint_by_id("GET:/health");
            h.manager.search_endpoints("users", &SearchOptions::default());
            h.manager.custom_endpoints();
            h.manager.auth_headers();
        });

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        for method in [
            "endpoints",
            "categories",
            "endpoint_by_id",
            "search_endpoints",
            "custom_endpoints",
            "auth_headers",
        ] {
            let line = format!("EndpointManager::{}: called", method);
            assert!(output.contains(&line), "missing trace {line:?} in {output}");
        }
    }
}

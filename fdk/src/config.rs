//! Flowdeck configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::Level;

/// Main flowdeck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Domain logger topology
    pub logging: LoggingConfig,

    /// Backend transport
    pub http: HttpConfig,

    /// Durable key-value storage
    pub storage: StorageConfig,

    /// Event bus limits
    pub events: EventsConfig,

    /// Endpoint catalog loading
    pub endpoints: EndpointsConfig,

    /// Auth endpoints and storage keys
    pub auth: AuthConfig,

    /// Flow view containers
    pub ui: UiConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required paths are set. Call this early in startup to
    /// fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.endpoints_file_path.trim().is_empty() {
            return Err(eyre::eyre!("endpoints.file-path must not be empty"));
        }
        if self.endpoints.dynamic_loading && self.endpoints.dynamic_endpoints_path.trim().is_empty() {
            return Err(eyre::eyre!(
                "endpoints.dynamic-path must be set when dynamic loading is enabled"
            ));
        }
        if self.logging.max_log_size == 0 {
            return Err(eyre::eyre!("logging.max-log-size must be at least 1"));
        }
        if self.events.max_depth == 0 {
            return Err(eyre::eyre!("events.max-depth must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .flowdeck.yml
        let local_config = PathBuf::from(".flowdeck.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/flowdeck/flowdeck.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("flowdeck").join("flowdeck.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Domain logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level for every sink
    pub level: Level,

    /// Root logger context
    pub context: String,

    /// Also persist entries to storage
    pub persist: bool,

    /// Storage key holding persisted entries
    #[serde(rename = "storage-key")]
    pub storage_key: String,

    /// Maximum persisted entries (oldest evicted first)
    #[serde(rename = "max-log-size")]
    pub max_log_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            context: "app".to_string(),
            persist: true,
            storage_key: "app_logs".to_string(),
            max_log_size: 1000,
        }
    }
}

/// Backend transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Base URL request paths are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one file per key
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/flowdeck on Linux)
        let dir = dirs::data_local_dir()
            .map(|d| d.join("flowdeck").join("storage"))
            .unwrap_or_else(|| PathBuf::from(".flowdeck/storage"));
        Self { dir }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Maximum nested emission depth before an emit is refused
    #[serde(rename = "max-depth")]
    pub max_depth: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::events::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Endpoint catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Try the dynamic backend source before the static file
    #[serde(rename = "dynamic-loading")]
    pub dynamic_loading: bool,

    /// Path of the dynamic endpoint listing
    #[serde(rename = "dynamic-path")]
    pub dynamic_endpoints_path: String,

    /// Path of the static endpoint file
    #[serde(rename = "file-path")]
    pub endpoints_file_path: String,

    /// Maximum static load attempts
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Fixed delay between static attempts in milliseconds
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Only accept the `{endpoints: [...]}` shape
    #[serde(rename = "strict-format")]
    pub strict_format: bool,

    /// Storage key for user-added endpoints
    #[serde(rename = "custom-key")]
    pub custom_endpoints_key: String,

    /// Storage key of the bearer token sent to the dynamic source
    #[serde(rename = "token-key")]
    pub token_key: String,

    /// Storage key of the API key sent to the dynamic source
    #[serde(rename = "api-key-key")]
    pub api_key_key: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            dynamic_loading: true,
            dynamic_endpoints_path: "/api/v1/api-tester/endpoints".to_string(),
            endpoints_file_path: "data/endpoints.json".to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
            strict_format: false,
            custom_endpoints_key: "custom_endpoints".to_string(),
            token_key: "auth_token".to_string(),
            api_key_key: "api_key".to_string(),
        }
    }
}

/// Auth endpoint and storage key configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "login-endpoint")]
    pub login_endpoint: String,

    #[serde(rename = "register-endpoint")]
    pub register_endpoint: String,

    #[serde(rename = "logout-endpoint")]
    pub logout_endpoint: String,

    #[serde(rename = "profile-endpoint")]
    pub profile_endpoint: String,

    #[serde(rename = "token-key")]
    pub token_key: String,

    #[serde(rename = "user-key")]
    pub user_key: String,

    #[serde(rename = "last-email-key")]
    pub last_email_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_endpoint: "/api/auth/login".to_string(),
            register_endpoint: "/api/auth/register".to_string(),
            logout_endpoint: "/api/auth/logout".to_string(),
            profile_endpoint: "/api/auth/profile".to_string(),
            token_key: "auth_token".to_string(),
            user_key: "auth_user".to_string(),
            last_email_key: "last_email".to_string(),
        }
    }
}

/// Flow view container ids
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    #[serde(rename = "flow-list-container")]
    pub flow_list_container: String,

    #[serde(rename = "flow-steps-container")]
    pub flow_steps_container: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            flow_list_container: "flow-list".to_string(),
            flow_steps_container: "flow-steps".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.logging.level, Level::Info);
        assert_eq!(config.logging.storage_key, "app_logs");
        assert_eq!(config.endpoints.dynamic_endpoints_path, "/api/v1/api-tester/endpoints");
        assert_eq!(config.endpoints.endpoints_file_path, "data/endpoints.json");
        assert_eq!(config.auth.token_key, "auth_token");
        assert_eq!(config.auth.user_key, "auth_user");
        assert_eq!(config.auth.last_email_key, "last_email");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
logging:
  level: debug
  persist: false
  max-log-size: 50

http:
  base-url: https://api.example.com
  timeout-ms: 5000

endpoints:
  dynamic-loading: false
  file-path: static/endpoints.json
  max-retries: 5
  retry-delay-ms: 250
  strict-format: true

auth:
  login-endpoint: /v2/login
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.logging.level, Level::Debug);
        assert!(!config.logging.persist);
        assert_eq!(config.logging.max_log_size, 50);
        assert_eq!(config.http.base_url, "https://api.example.com");
        assert!(!config.endpoints.dynamic_loading);
        assert_eq!(config.endpoints.endpoints_file_path, "static/endpoints.json");
        assert_eq!(config.endpoints.max_retries, 5);
        assert!(config.endpoints.strict_format);
        assert_eq!(config.auth.login_endpoint, "/v2/login");
        // Unspecified fields keep their defaults
        assert_eq!(config.auth.logout_endpoint, "/api/auth/logout");
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let mut config = Config::default();
        config.endpoints.endpoints_file_path = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.endpoints.dynamic_endpoints_path = String::new();
        assert!(config.validate().is_err());

        config.endpoints.dynamic_loading = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("flowdeck.yml");
        fs::write(&path, "events:\n  max-depth: 8\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.events.max_depth, 8);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let missing = PathBuf::from("/nonexistent/flowdeck.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}

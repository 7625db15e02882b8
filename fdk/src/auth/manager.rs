//! AuthManager - session state synchronized with storage

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AuthError;
use crate::config::AuthConfig;
use crate::events::{EventBus, topics};
use crate::http::{HttpRequest, SharedHttpClient};
use crate::logging::{Level, SharedLogger};
use crate::storage::{SharedStore, read_json, write_json};

const TOKEN_ALIASES: [&str; 3] = ["token", "access_token", "authToken"];
const USER_ALIASES: [&str; 3] = ["user", "userData", "profile"];

/// Session snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSession {
    pub token: Option<String>,
    pub user: Option<Value>,
    pub last_email: Option<String>,
}

impl AuthSession {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Coarse session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Uninitialized,
    Authenticated,
    Anonymous,
}

/// Kind of session change delivered to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTransition {
    Initialized,
    Login,
    Logout,
    SessionExpired,
    ProfileUpdated,
}

/// What listeners receive on every transition
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub transition: AuthTransition,
    pub authenticated: bool,
    pub user: Option<Value>,
}

/// Session listener; failures are logged and never reach the caller
pub type AuthListener = Arc<dyn Fn(&AuthEvent) -> eyre::Result<()> + Send + Sync>;

#[derive(Default)]
struct SessionState {
    session: AuthSession,
    initialized: bool,
}

/// Holds the local session and wraps the auth HTTP calls
pub struct AuthManager {
    config: AuthConfig,
    http: SharedHttpClient,
    store: SharedStore,
    bus: EventBus,
    logger: SharedLogger,
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<(u64, AuthListener)>>,
    on_change: Mutex<Option<AuthListener>>,
    next_listener: AtomicU64,
}

impl AuthManager {
    pub fn new(config: AuthConfig, http: SharedHttpClient, store: SharedStore, bus: EventBus, logger: SharedLogger) -> Self {
        debug!("AuthManager::new: called");
        Self {
            config,
            http,
            store,
            bus,
            logger,
            state: Mutex::new(SessionState::default()),
            listeners: Mutex::new(Vec::new()),
            on_change: Mutex::new(None),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Hydrate the session from storage
    ///
    /// An unreadable user record is logged and removed; it never fails
    /// initialization.
    pub fn init(&self) -> AuthState {
        debug!("AuthManager::init: called");
        let token = self.read_string(&self.config.token_key);
        let last_email = self.read_string(&self.config.last_email_key);
        let user = match read_json::<Value>(self.store.as_ref(), &self.config.user_key) {
            Ok(user) => user.filter(|u| !u.is_null()),
            Err(e) => {
                self.logger.log(
                    Level::Warn,
                    "Discarding corrupt stored user",
                    Some(&json!({"key": self.config.user_key, "error": e.to_string()})),
                );
                if let Err(e) = self.store.remove(&self.config.user_key) {
                    warn!(error = %e, "AuthManager::init: failed to remove corrupt user");
                }
                None
            }
        };

        {
            let mut state = self.state.lock();
            state.session = AuthSession { token, user, last_email };
            state.initialized = true;
        }

        let event = self.event(AuthTransition::Initialized);
        self.emit(
            topics::AUTH_INITIALIZED,
            json!({"authenticated": event.authenticated, "user": event.user}),
        );
        self.notify(&event);
        self.state()
    }

    /// Log in with `{email, password, ...}`
    pub async fn login(&self, credentials: Value) -> Result<AuthSession, AuthError> {
        debug!("AuthManager::login: called");
        let session = self.authenticate(&self.config.login_endpoint, &credentials).await?;
        self.logger.info("Logged in");
        self.emit(topics::AUTH_LOGIN, json!({"user": session.user}));
        self.notify(&self.event(AuthTransition::Login));
        Ok(session)
    }

    /// Create an account; a successful registration also logs in
    pub async fn register(&self, data: Value) -> Result<AuthSession, AuthError> {
        debug!("AuthManager::register: called");
        let session = self.authenticate(&self.config.register_endpoint, &data).await?;
        self.logger.info("Registered and logged in");
        self.emit(topics::AUTH_LOGIN, json!({"user": session.user, "registered": true}));
        self.notify(&self.event(AuthTransition::Login));
        Ok(session)
    }

    async fn authenticate(&self, endpoint: &str, body: &Value) -> Result<AuthSession, AuthError> {
        let response = self
            .http
            .send(HttpRequest::post(endpoint).json(body.clone()))
            .await?
            .error_for_status()?;
        let payload: Value = response.json()?;

        let token = extract(&payload, &TOKEN_ALIASES)
            .and_then(|t| match t {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or(AuthError::NoToken)?;
        let user = extract(&payload, &USER_ALIASES).cloned();
        let email = body
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.last_email());

        // The token goes last: a stored token alone restores a session
        match &user {
            Some(user) => write_json(self.store.as_ref(), &self.config.user_key, user)?,
            None => self.store.remove(&self.config.user_key)?,
        }
        if let Some(email) = &email {
            self.store.set(&self.config.last_email_key, email)?;
        }
        self.store.set(&self.config.token_key, &token)?;

        let mut state = self.state.lock();
        state.session = AuthSession {
            token: Some(token),
            user,
            last_email: email,
        };
        state.initialized = true;
        Ok(state.session.clone())
    }

    /// End the session
    ///
    /// The remote call is best effort; the local session is always cleared.
    pub async fn logout(&self) {
        debug!("AuthManager::logout: called");
        if let Some(token) = self.token() {
            let request = HttpRequest::post(&self.config.logout_endpoint).bearer(&token);
            let result = match self.http.send(request).await {
                Ok(response) => response.error_for_status().map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                self.logger.log(
                    Level::Warn,
                    "Remote logout failed, clearing local session anyway",
                    Some(&json!({"error": e.to_string()})),
                );
            }
        }

        self.clear_session();
        self.logger.info("Logged out");
        self.emit(topics::AUTH_LOGOUT, json!({}));
        self.notify(&self.event(AuthTransition::Logout));
    }

    /// Fetch the current user from the backend
    ///
    /// A 401 clears the session and emits `auth:session-expired`.
    pub async fn get_profile(&self) -> Result<Value, AuthError> {
        debug!("AuthManager::get_profile: called");
        let token = self.token().ok_or(AuthError::NotAuthenticated)?;
        let request = HttpRequest::get(&self.config.profile_endpoint).bearer(&token);

        let result = match self.http.send(request).await {
            Ok(response) => response.error_for_status().map_err(AuthError::from),
            Err(e) => Err(AuthError::from(e)),
        };
        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_unauthorized() => {
                self.logger.log(Level::Warn, "Session expired", Some(&json!({"error": e.to_string()})));
                self.clear_session();
                self.emit(topics::AUTH_SESSION_EXPIRED, json!({"error": e.to_string()}));
                self.notify(&self.event(AuthTransition::SessionExpired));
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let payload: Value = response.json()?;
        let user = if payload.get("user").is_some_and(Value::is_object) {
            payload["user"].clone()
        } else {
            payload
        };

        write_json(self.store.as_ref(), &self.config.user_key, &user)?;
        self.state.lock().session.user = Some(user.clone());

        self.emit(topics::AUTH_PROFILE_UPDATED, json!({"user": user}));
        self.notify(&self.event(AuthTransition::ProfileUpdated));
        Ok(user)
    }

    fn clear_session(&self) {
        for key in [&self.config.token_key, &self.config.user_key] {
            if let Err(e) = self.store.remove(key) {
                warn!(%key, error = %e, "AuthManager: failed to clear stored session");
            }
        }
        let mut state = self.state.lock();
        state.session.token = None;
        state.session.user = None;
    }

    // === Listeners ===

    /// Register a listener for every transition; returns its id
    pub fn add_listener<F>(&self, listener: F) -> u64
    where
        F: Fn(&AuthEvent) -> eyre::Result<()> + Send + Sync + 'static,
    {
        debug!("AuthManager::add_listener: called");
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: u64) -> bool {
        debug!(id, "AuthManager::remove_listener: called");
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Set the single state-change hook, replacing any previous one
    pub fn set_on_auth_state_change<F>(&self, hook: F)
    where
        F: Fn(&AuthEvent) -> eyre::Result<()> + Send + Sync + 'static,
    {
        debug!("AuthManager::set_on_auth_state_change: called");
        *self.on_change.lock() = Some(Arc::new(hook));
    }

    pub fn clear_on_auth_state_change(&self) {
        debug!("AuthManager::clear_on_auth_state_change: called");
        *self.on_change.lock() = None;
    }

    fn notify(&self, event: &AuthEvent) {
        let mut targets: Vec<AuthListener> = self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        if let Some(hook) = self.on_change.lock().clone() {
            targets.push(hook);
        }

        for listener in targets {
            let failure = match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(_) => "listener panicked".to_string(),
            };
            self.logger.log(
                Level::Error,
                "Auth listener failed",
                Some(&json!({"transition": format!("{:?}", event.transition), "error": failure})),
            );
        }
    }

    fn event(&self, transition: AuthTransition) -> AuthEvent {
        let state = self.state.lock();
        AuthEvent {
            transition,
            authenticated: state.session.is_authenticated(),
            user: state.session.user.clone(),
        }
    }

    fn emit(&self, topic: &str, payload: Value) {
        if let Err(e) = self.bus.emit(topic, payload) {
            warn!(%topic, error = %e, "AuthManager: failed to emit event");
        }
    }

    fn read_string(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(%key, error = %e, "AuthManager: failed to read storage");
                None
            }
        }
    }

    // === Accessors ===

    pub fn is_authenticated(&self) -> bool {
        debug!("AuthManager::is_authenticated: called");
        self.state.lock().session.is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        debug!("AuthManager::token: called");
        self.state.lock().session.token.clone()
    }

    pub fn current_user(&self) -> Option<Value> {
        debug!("AuthManager::current_user: called");
        self.state.lock().session.user.clone()
    }

    pub fn last_email(&self) -> Option<String> {
        debug!("AuthManager::last_email: called");
        self.state.lock().session.last_email.clone()
    }

    pub fn session(&self) -> AuthSession {
        debug!("AuthManager::session: called");
        self.state.lock().session.clone()
    }

    pub fn state(&self) -> AuthState {
        debug!("AuthManager::state: called");
        let state = self.state.lock();
        match (state.initialized, state.session.is_authenticated()) {
            (false, _) => AuthState::Uninitialized,
            (true, true) => AuthState::Authenticated,
            (true, false) => AuthState::Anonymous,
        }
    }

    /// `Authorization` header for the current session, if any
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        debug!("AuthManager::auth_headers: called");
        self.token()
            .map(|t| vec![("Authorization".to_string(), format!("Bearer {}", t))])
            .unwrap_or_default()
    }
}

/// Look a value up under any alias, then under a `data` envelope
fn extract<'a>(payload: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let find = |obj: &'a Value| aliases.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()));
    find(payload).or_else(|| payload.get("data").and_then(find))
}

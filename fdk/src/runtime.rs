//! Composition root
//!
//! [`Runtime`] owns a [`Container`] populated with one factory per service.
//! Nothing is built until first access; every service is a singleton for the
//! lifetime of the runtime, so two runtimes never share state.
//!
//! ```text
//! config ─┬─► storage ──┬─► logger ─► event_bus ─┬─► endpoints
//!         └─► http ─────┘                        ├─► flow_ui
//!                                                └─► auth
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::container::{Container, ContainerError, FactoryError};
use crate::endpoints::EndpointManager;
use crate::events::EventBus;
use crate::flow::{ConfirmFn, FlowUiService};
use crate::http::{ReqwestClient, SharedHttpClient};
use crate::logging::{self, SharedLogger};
use crate::storage::{FileStore, SharedStore};

/// Registration names
pub mod names {
    pub const CONFIG: &str = "config";
    pub const STORAGE: &str = "storage";
    pub const HTTP: &str = "http";
    pub const LOGGER: &str = "logger";
    pub const EVENT_BUS: &str = "event_bus";
    pub const ENDPOINTS: &str = "endpoints";
    pub const FLOW_UI: &str = "flow_ui";
    pub const AUTH: &str = "auth";
}

/// Builder for a [`Runtime`]
///
/// Storage, transport and the confirmation prompt can be injected; anything
/// left unset falls back to the configured default.
pub struct RuntimeBuilder {
    config: Config,
    store: Option<SharedStore>,
    http: Option<SharedHttpClient>,
    confirm: Option<ConfirmFn>,
}

impl RuntimeBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            http: None,
            confirm: None,
        }
    }

    /// Use this store instead of a `FileStore` at `storage.dir`
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this transport instead of a `ReqwestClient` for `http.base-url`
    pub fn http(mut self, http: SharedHttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Prompt used before destructive flow actions (default: decline)
    pub fn confirm(mut self, confirm: ConfirmFn) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn build(self) -> Runtime {
        debug!("RuntimeBuilder::build: called");
        let container = Container::new();
        container.register_instance(names::CONFIG, Arc::new(self.config));

        match self.store {
            Some(store) => container.register_instance(names::STORAGE, store),
            None => container.register(names::STORAGE, |c: &Container| -> Result<SharedStore, FactoryError> {
                let config: Arc<Config> = c.get(names::CONFIG)?;
                let store = FileStore::open(&config.storage.dir)?;
                Ok(Arc::new(store))
            }),
        }

        match self.http {
            Some(http) => container.register_instance(names::HTTP, http),
            None => container.register(names::HTTP, |c: &Container| -> Result<SharedHttpClient, FactoryError> {
                let config: Arc<Config> = c.get(names::CONFIG)?;
                Ok(Arc::new(ReqwestClient::from_config(&config.http)?))
            }),
        }

        container.register(names::LOGGER, |c: &Container| -> Result<SharedLogger, FactoryError> {
            let config: Arc<Config> = c.get(names::CONFIG)?;
            let store: SharedStore = c.get(names::STORAGE)?;
            Ok(logging::from_config(&config.logging, Some(store)))
        });

        container.register(names::EVENT_BUS, |c: &Container| -> Result<EventBus, FactoryError> {
            let config: Arc<Config> = c.get(names::CONFIG)?;
            let logger: SharedLogger = c.get(names::LOGGER)?;
            let bus = EventBus::new(config.events.max_depth);
            bus.set_logger(logger.child("events"));
            Ok(bus)
        });

        container.register(names::ENDPOINTS, |c: &Container| -> Result<Arc<EndpointManager>, FactoryError> {
            let config: Arc<Config> = c.get(names::CONFIG)?;
            let logger: SharedLogger = c.get(names::LOGGER)?;
            Ok(Arc::new(EndpointManager::new(
                config.endpoints.clone(),
                c.get(names::HTTP)?,
                c.get(names::STORAGE)?,
                c.get(names::EVENT_BUS)?,
                logger.child("endpoints"),
            )))
        });

        let confirm: ConfirmFn = match self.confirm {
            Some(confirm) => confirm,
            None => Arc::new(|_: &str| false),
        };
        container.register(names::FLOW_UI, move |c: &Container| -> Result<Arc<FlowUiService>, FactoryError> {
            let config: Arc<Config> = c.get(names::CONFIG)?;
            let logger: SharedLogger = c.get(names::LOGGER)?;
            let service = FlowUiService::new(
                config.ui.clone(),
                c.get(names::EVENT_BUS)?,
                logger.child("flow-ui"),
                confirm.clone(),
            );
            service.attach();
            Ok(service)
        });

        container.register(names::AUTH, |c: &Container| -> Result<Arc<AuthManager>, FactoryError> {
            let config: Arc<Config> = c.get(names::CONFIG)?;
            let logger: SharedLogger = c.get(names::LOGGER)?;
            Ok(Arc::new(AuthManager::new(
                config.auth.clone(),
                c.get(names::HTTP)?,
                c.get(names::STORAGE)?,
                c.get(names::EVENT_BUS)?,
                logger.child("auth"),
            )))
        });

        Runtime { container }
    }
}

/// Lazily-built service graph
pub struct Runtime {
    container: Container,
}

impl Runtime {
    pub fn builder(config: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Runtime with file storage and an HTTP transport, both from `config`
    pub fn build(config: Config) -> Self {
        RuntimeBuilder::new(config).build()
    }

    /// The underlying container, for registering extra services
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn config(&self) -> Result<Arc<Config>, ContainerError> {
        self.container.get(names::CONFIG)
    }

    pub fn storage(&self) -> Result<SharedStore, ContainerError> {
        self.container.get(names::STORAGE)
    }

    pub fn http(&self) -> Result<SharedHttpClient, ContainerError> {
        self.container.get(names::HTTP)
    }

    pub fn logger(&self) -> Result<SharedLogger, ContainerError> {
        self.container.get(names::LOGGER)
    }

    pub fn event_bus(&self) -> Result<EventBus, ContainerError> {
        self.container.get(names::EVENT_BUS)
    }

    pub fn endpoints(&self) -> Result<Arc<EndpointManager>, ContainerError> {
        self.container.get(names::ENDPOINTS)
    }

    pub fn flow_ui(&self) -> Result<Arc<FlowUiService>, ContainerError> {
        self.container.get(names::FLOW_UI)
    }

    pub fn auth(&self) -> Result<Arc<AuthManager>, ContainerError> {
        self.container.get(names::AUTH)
    }
}

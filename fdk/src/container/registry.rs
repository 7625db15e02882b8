//! Container - lazy singleton registry

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use super::{ContainerError, FactoryError};

type Instance = Box<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Result<Instance, FactoryError> + Send + Sync>;

/// A registered factory
#[derive(Clone)]
pub struct ServiceRegistration {
    name: String,
    factory: Factory,
    singleton: bool,
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceRegistration {
    fn new<T, F>(name: &str, factory: F, singleton: bool) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            factory: Arc::new(move |c: &Container| factory(c).map(|v| Box::new(v) as Instance)),
            singleton,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Rust type name of the registered value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("name", &self.name)
            .field("singleton", &self.singleton)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Pops the resolution path when a factory returns or unwinds
struct Frame<'a>(&'a RefCell<Vec<String>>);

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().pop();
    }
}

/// Lazy singleton service container
///
/// Values are handed out by clone, so services are usually registered as
/// `Arc<T>` and every `get` returns a handle to the same instance.
pub struct Container {
    registrations: Mutex<HashMap<String, ServiceRegistration>>,
    instances: Mutex<HashMap<String, Instance>>,
    /// Names whose factories are running on the lock-holding thread
    resolving: ReentrantMutex<RefCell<Vec<String>>>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            resolving: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Register a singleton factory
    ///
    /// Replaces any earlier registration of `name`, dropping its cached value.
    pub fn register<T, F>(&self, name: &str, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        self.insert(ServiceRegistration::new(name, factory, true));
    }

    /// Register a factory that runs on every `get`
    pub fn register_transient<T, F>(&self, name: &str, factory: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        self.insert(ServiceRegistration::new(name, factory, false));
    }

    /// Register an already-built value
    pub fn register_instance<T>(&self, name: &str, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let cached = value.clone();
        self.insert(ServiceRegistration::new(name, move |_| Ok(value.clone()), true));
        self.instances.lock().insert(name.to_string(), Box::new(cached));
    }

    fn insert(&self, registration: ServiceRegistration) {
        debug!(name = %registration.name, singleton = registration.singleton, "Container::register: called");
        let name = registration.name.clone();
        self.instances.lock().remove(&name);
        self.registrations.lock().insert(name, registration);
    }

    /// Resolve a service, constructing it on first use
    pub fn get<T>(&self, name: &str) -> Result<T, ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let path = self.resolving.lock();

        if let Some(instance) = self.instances.lock().get(name) {
            return Self::downcast_ref::<T>(name, instance);
        }

        let registration = self
            .registrations
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NotRegistered { name: name.to_string() })?;

        if registration.type_id != TypeId::of::<T>() {
            return Err(ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                found: registration.type_name,
            });
        }

        if path.borrow().iter().any(|n| n == name) {
            let mut chain = path.borrow().clone();
            chain.push(name.to_string());
            debug!(%name, chain = ?chain, "Container::get: circular dependency");
            return Err(ContainerError::CircularDependency {
                name: name.to_string(),
                chain,
            });
        }

        debug!(%name, "Container::get: constructing");
        path.borrow_mut().push(name.to_string());
        let built = {
            let _frame = Frame(&*path);
            (registration.factory)(self)
        };

        let instance = built.map_err(|e| match e.downcast::<ContainerError>() {
            Ok(inner) => *inner,
            Err(source) => ContainerError::Construction {
                name: name.to_string(),
                source,
            },
        })?;

        let value = instance
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                found: registration.type_name,
            })?;

        if registration.singleton {
            self.instances.lock().insert(name.to_string(), Box::new(value.clone()));
        }
        Ok(value)
    }

    fn downcast_ref<T: Clone + 'static>(name: &str, instance: &Instance) -> Result<T, ContainerError> {
        instance
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                found: "another type",
            })
    }

    pub fn has(&self, name: &str) -> bool {
        self.registrations.lock().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registrations.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a singleton has already been constructed
    pub fn is_resolved(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    pub fn registration(&self, name: &str) -> Option<ServiceRegistration> {
        self.registrations.lock().get(name).cloned()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("services", &self.names()).finish()
    }
}

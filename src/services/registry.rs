//! Service lookup by name

use crate::services::{JsonWriterService, Service, ShellService, WaitService};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Services available to a run, keyed by name
///
/// Built once at startup and handed to the engine.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the services shipped in this crate
    pub fn with_builtin_services() -> Self {
        let mut registry = Self::new();
        registry.register(ShellService);
        registry.register(WaitService);
        registry.register(JsonWriterService);
        registry
    }

    /// Register a service under its own name, replacing any previous one
    pub fn register<S: Service + 'static>(&mut self, service: S) -> &mut Self {
        self.register_arc(Arc::new(service))
    }

    pub fn register_arc(&mut self, service: Arc<dyn Service>) -> &mut Self {
        self.services.insert(service.name().to_string(), service);
        self
    }

    /// Look up a service by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Sorted names of all registered services
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

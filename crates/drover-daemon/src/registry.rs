//! Consumer handle registry.
//!
//! The surrounding framework refers to consumer implementations by
//! dotted name (`app.consumers.Indexer`). The hosting application
//! registers a handle for each name during startup; the framework
//! resolves names when it builds its worker set. Unresolvable names
//! surface as errors with the same posture as the rest of the startup
//! path: report and abort, no retry.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::RegistryError;

/// Thread-safe map from dotted names to handles.
///
/// Registration is last-writer-wins, like the lifecycle callback slots.
#[derive(Default)]
pub struct HandleRegistry<T> {
    handles: RwLock<BTreeMap<String, T>>,
}

impl<T: Clone> HandleRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers `handle` under `name`, replacing any previous handle.
    pub fn register(&self, name: &str, handle: T) {
        self.handles.write().insert(name.to_string(), handle);
        debug!("Registered handle for {}", name);
    }

    /// Removes the handle registered under `name`, if any.
    pub fn deregister(&self, name: &str) -> Option<T> {
        self.handles.write().remove(name)
    }

    /// Looks up the handle registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<T, RegistryError> {
        self.handles
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// The registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.handles.read().keys().cloned().collect()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

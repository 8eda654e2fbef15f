//! Run context - per-run store of task outputs

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Output fields recorded by one task
pub type EventValues = HashMap<String, String>;

/// Shared store of every task's recorded output fields for one run
///
/// Workers write to it concurrently, so all access goes through an
/// internal lock. Values are cloned out; no guard ever escapes.
#[derive(Debug, Default)]
pub struct RunContext {
    events: RwLock<HashMap<String, EventValues>>,
}

impl RunContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full value map recorded under `key`
    pub fn set_event_values(&self, key: impl Into<String>, values: EventValues) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.insert(key.into(), values);
    }

    /// Get the value map recorded under `key`
    pub fn event_values(&self, key: &str) -> Option<EventValues> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.get(key).cloned()
    }

    /// Get one field recorded by a task
    pub fn event_value(&self, key: &str, field: &str) -> Option<String> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.get(key).and_then(|values| values.get(field)).cloned()
    }

    /// Whether anything was recorded under `key`
    pub fn contains(&self, key: &str) -> bool {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.contains_key(key)
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> HashMap<String, EventValues> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Build an [`EventValues`] map from string pairs
pub fn event_values<I, K, V>(pairs: I) -> EventValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

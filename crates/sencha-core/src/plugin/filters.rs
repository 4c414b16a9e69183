//! Flattened filter map of all active plugins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::plugin::traits::Plugin;

/// A named value transform: `(input, arguments) -> output`.
pub type Filter = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

/// Filters of every plugin, keyed by name.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Filter>,
}

impl FilterRegistry {
    /// Collect filters in plugin order; a later plugin wins a name collision.
    pub fn from_plugins(plugins: &[Arc<dyn Plugin>]) -> Self {
        let mut filters = HashMap::new();

        for plugin in plugins {
            for (name, filter) in plugin.filters() {
                if filters.insert(name.clone(), filter).is_some() {
                    tracing::debug!(filter = %name, plugin = plugin.name(), "filter overridden");
                }
            }
        }

        Self { filters }
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    /// Run a filter by name.
    pub fn apply(&self, name: &str, input: &Value, args: &[Value]) -> Option<Value> {
        self.filters.get(name).map(|filter| filter(input, args))
    }

    /// Sorted filter names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

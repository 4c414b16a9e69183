//! Shared state handed to plugins during a build.

use std::sync::Arc;

use sencha_fetch::{FetchCache, Store};

use crate::assets::AssetPipeline;
use crate::config::SenchaConfig;
use crate::plugin::FilterRegistry;

/// Everything a plugin may read or call while a build runs.
///
/// Cloning is cheap; all members are shared handles.
#[derive(Clone)]
pub struct BuildContext {
    pub config: Arc<SenchaConfig>,
    pub filters: Arc<FilterRegistry>,
    pub assets: Arc<AssetPipeline>,
    pub fetch: FetchCache,
}

impl BuildContext {
    /// Create a context with an empty asset registry for `config`.
    pub fn new(config: Arc<SenchaConfig>, filters: Arc<FilterRegistry>, fetch: FetchCache) -> Self {
        Self {
            assets: Arc::new(AssetPipeline::from_config(&config)),
            config,
            filters,
            fetch,
        }
    }

    /// The key/value store fed by fetch defaults.
    pub fn store(&self) -> &Store {
        self.fetch.store()
    }
}

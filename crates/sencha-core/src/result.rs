//! Build options and build results.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sencha_routes::Route;

use crate::assets::AssetFile;

/// Predicate selecting the routes a build renders.
pub type RouteFilter = Arc<dyn Fn(&Route) -> bool + Send + Sync>;

/// Per-build options, editable by `buildInit` plugins.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Overrides the configured asset cache flag
    pub cache: Option<bool>,

    /// Render only matching routes; tidy still sees every route
    pub filter: Option<RouteFilter>,

    /// Reprocess only these assets, uncached
    pub assets: Option<Vec<AssetFile>>,

    /// Keep the asset registry and fetch cache of the previous build
    pub incremental: bool,
}

impl BuildOptions {
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&Route) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("cache", &self.cache)
            .field("filter", &self.filter.is_some())
            .field("assets", &self.assets.as_ref().map(Vec::len))
            .field("incremental", &self.incremental)
            .finish()
    }
}

/// Outcome of one build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildResult {
    /// Whether asset caching was enabled
    pub cache: bool,

    /// Total build time in milliseconds
    pub elapsed_ms: u64,

    /// Routes rendered by this build
    pub routes: Vec<Route>,

    /// Every resolved route
    pub all_routes: Vec<Route>,

    /// Processed assets, children included
    pub assets: Vec<AssetFile>,

    /// Output files removed by tidy
    #[serde(default)]
    pub removed: Vec<PathBuf>,

    pub errors: Vec<String>,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

//! Project configuration, as read from `sencha.toml`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use sencha_fetch::EndpointConfig;
use sencha_routes::{RouteOptions, RouteParams, DEFAULT_PATTERN};

use crate::builder::DEFAULT_CONCURRENCY;

/// Top-level configuration of a sencha project.
///
/// Directories are relative to `root` unless absolute.
#[derive(Debug, Clone, Deserialize)]
pub struct SenchaConfig {
    /// Project root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Views directory
    #[serde(default = "default_views_dir")]
    pub views_dir: PathBuf,

    /// Asset sources directory
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Output directory
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Directory holding persisted build state
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Skip assets whose output already exists
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Routes rendered concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub routes: RoutesConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub actions: ActionsConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_views_dir() -> PathBuf {
    PathBuf::from("views")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".sencha")
}

fn default_cache() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl Default for SenchaConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            views_dir: default_views_dir(),
            assets_dir: default_assets_dir(),
            out_dir: default_out_dir(),
            state_dir: default_state_dir(),
            cache: default_cache(),
            concurrency: default_concurrency(),
            routes: RoutesConfig::default(),
            fetch: FetchConfig::default(),
            actions: ActionsConfig::default(),
            plugins: PluginsConfig::default(),
        }
    }
}

impl SenchaConfig {
    /// Configuration rooted at `root` with every other setting defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn views_path(&self) -> PathBuf {
        self.root.join(&self.views_dir)
    }

    pub fn assets_path(&self) -> PathBuf {
        self.root.join(&self.assets_dir)
    }

    pub fn out_path(&self) -> PathBuf {
        self.root.join(&self.out_dir)
    }

    /// Output directory for processed assets, `<out>/<assets_dir>`.
    pub fn out_assets_path(&self) -> PathBuf {
        self.out_path().join(self.assets_url_segment())
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(&self.state_dir)
    }

    /// Public url prefix of processed assets.
    pub fn assets_url(&self) -> String {
        format!("/{}", self.assets_url_segment())
    }

    fn assets_url_segment(&self) -> String {
        let segment = self
            .assets_dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("assets");
        segment.trim_matches('/').to_string()
    }

    /// Route expansion options derived from this configuration.
    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            views_dir: self.views_path(),
            out_dir: self.out_path(),
            pattern: self.routes.pattern.clone(),
            locales: self.routes.locales.clone(),
            pretty_urls: self.routes.pretty_urls,
        }
    }
}

/// Route expansion settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// Pattern with `:locale` and `:slug` tokens
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Locales, the first one is the default
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,

    #[serde(default = "default_pretty_urls")]
    pub pretty_urls: bool,

    /// Static parameter records per view id
    #[serde(default)]
    pub params: HashMap<String, Vec<RouteParams>>,

    /// Static route data per view id, `__` applies to every route
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_pretty_urls() -> bool {
    true
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            locales: default_locales(),
            pretty_urls: default_pretty_urls(),
            params: HashMap::new(),
            data: HashMap::new(),
        }
    }
}

/// External data endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
}

/// Shell commands run around the CLI run and around every build.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsConfig {
    #[serde(default)]
    pub before_run: Vec<String>,

    #[serde(default)]
    pub after_run: Vec<String>,

    #[serde(default)]
    pub before_build: Vec<String>,

    #[serde(default)]
    pub after_build: Vec<String>,
}

/// Built-in plugin switches.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginsConfig {
    /// Compile `.md` views to HTML
    #[serde(default = "default_markdown")]
    pub markdown: bool,

    /// Minify `.css` assets
    #[serde(default)]
    pub css_minify: bool,
}

fn default_markdown() -> bool {
    true
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            markdown: default_markdown(),
            css_minify: false,
        }
    }
}

//! Expansion of view files × locales × parameter records into routes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use sencha_fetch::FetchCache;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::params::{
    collapse_route_params, fill_route_params, find_route_params, has_route_params, ParamsTable,
    RouteParams,
};
use crate::route::{format_url, output_path, Route};
use crate::slug::{transform_path_to_slug, view_id, SlugOptions, DEFAULT_PATTERN};

/// Data loader scope applied to every route.
pub const GLOBAL_SCOPE: &str = "__";

/// Errors that can occur while resolving routes.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Views directory not found: {0}")]
    ViewsNotFound(String),

    #[error("Failed to scan views: {0}")]
    Scan(String),

    #[error("Route params for {view} failed: {message}")]
    Params { view: String, message: String },

    #[error("Route data for {scope} failed: {message}")]
    Data { scope: String, message: String },

    #[error("Route data for {scope} must be an object, got {kind}")]
    InvalidData { scope: String, kind: &'static str },
}

/// Source of parameter records for a parameterized view.
#[async_trait]
pub trait RouteParamsProvider: Send + Sync {
    /// Produce every parameter record the view should be rendered with.
    async fn params(&self) -> Result<Vec<RouteParams>, RouteError>;
}

#[async_trait]
impl RouteParamsProvider for Vec<RouteParams> {
    async fn params(&self) -> Result<Vec<RouteParams>, RouteError> {
        Ok(self.clone())
    }
}

/// Loader of extra data for a finalized route.
///
/// Loaders run after expansion and linking, so `route.siblings`,
/// `route.localized` and `route.url` are already set. Remote data goes
/// through `fetch`, the build's shared client, so identical requests from
/// many routes hit the network once.
#[async_trait]
pub trait RouteDataLoader: Send + Sync {
    /// Load data for one route. Objects are shallow-merged into `route.data`.
    async fn load(&self, route: &Route, fetch: &FetchCache) -> Result<Value, RouteError>;
}

#[async_trait]
impl RouteDataLoader for Value {
    async fn load(&self, _route: &Route, _fetch: &FetchCache) -> Result<Value, RouteError> {
        Ok(self.clone())
    }
}

/// Options controlling route expansion.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Views root
    pub views_dir: PathBuf,

    /// Output root that route `out` paths are joined under
    pub out_dir: PathBuf,

    /// Route pattern with `:locale` and `:slug` tokens
    pub pattern: String,

    /// Locales, first is the default and gets no locale segment
    pub locales: Vec<String>,

    /// Emit `/about` instead of `/about.html`
    pub pretty_urls: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            views_dir: PathBuf::from("views"),
            out_dir: PathBuf::from("dist"),
            pattern: DEFAULT_PATTERN.to_string(),
            locales: vec!["en".to_string()],
            pretty_urls: true,
        }
    }
}

/// Resolves the full route list for a views tree.
#[derive(Clone, Default)]
pub struct RouteResolver {
    options: RouteOptions,
    params: HashMap<String, Arc<dyn RouteParamsProvider>>,
    data: Vec<(String, Arc<dyn RouteDataLoader>)>,
}

impl RouteResolver {
    /// Create a resolver without parameter providers or data loaders.
    pub fn new(options: RouteOptions) -> Self {
        Self {
            options,
            params: HashMap::new(),
            data: Vec::new(),
        }
    }

    /// Register the parameter provider for a view id.
    pub fn with_params(mut self, view: &str, provider: Arc<dyn RouteParamsProvider>) -> Self {
        self.params.insert(view_id(view), provider);
        self
    }

    /// Register a data loader for a view id, or for every route with [`GLOBAL_SCOPE`].
    ///
    /// Loaders run in registration order; later keys overwrite earlier ones.
    pub fn with_data(mut self, scope: &str, loader: Arc<dyn RouteDataLoader>) -> Self {
        self.data.push((scope.to_string(), loader));
        self
    }

    /// Expansion options.
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Replace the expansion options, keeping providers and loaders.
    pub fn set_options(&mut self, options: RouteOptions) {
        self.options = options;
    }

    /// Scan the views tree and resolve every route, loading data through `fetch`.
    pub async fn resolve(&self, fetch: &FetchCache) -> Result<Vec<Route>, RouteError> {
        let files = self.discover_views()?;
        let table = self.resolve_params().await?;
        let mut routes = expand_routes(&self.options, &files, &table);

        let payloads = try_join_all(routes.iter().map(|route| self.load_data(route, fetch))).await?;
        for (route, data) in routes.iter_mut().zip(payloads) {
            route.data = data;
        }

        tracing::debug!(count = routes.len(), "resolved routes");
        Ok(routes)
    }

    /// List view files relative to the views root, sorted.
    fn discover_views(&self) -> Result<Vec<PathBuf>, RouteError> {
        let root = &self.options.views_dir;

        if !root.exists() {
            return Err(RouteError::ViewsNotFound(root.display().to_string()));
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| RouteError::Scan(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if is_ignored(relative) {
                continue;
            }

            files.push(relative.to_path_buf());
        }

        Ok(files)
    }

    /// Evaluate every parameter provider once.
    async fn resolve_params(&self) -> Result<ParamsTable, RouteError> {
        let resolved = try_join_all(self.params.iter().map(|(view, provider)| async move {
            provider.params().await.map(|params| (view.clone(), params))
        }))
        .await?;

        Ok(resolved.into_iter().collect())
    }

    /// Merge the output of every matching data loader for one route.
    async fn load_data(&self, route: &Route, fetch: &FetchCache) -> Result<Value, RouteError> {
        let mut data = match &route.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        for (scope, loader) in &self.data {
            if scope != GLOBAL_SCOPE && view_id(scope) != route.view {
                continue;
            }

            match loader.load(route, fetch).await? {
                Value::Object(map) => data.extend(map),
                Value::Null => {}
                other => {
                    return Err(RouteError::InvalidData {
                        scope: scope.clone(),
                        kind: value_kind(&other),
                    })
                }
            }
        }

        Ok(Value::Object(data))
    }
}

/// Expand view files into routes and link siblings and localized variants.
///
/// `files` are relative to the views root. A parameterized view without a
/// matching entry in `table` yields no routes.
pub fn expand_routes(options: &RouteOptions, files: &[PathBuf], table: &ParamsTable) -> Vec<Route> {
    let default_locale = [String::new()];
    let locales: &[String] = if options.locales.is_empty() {
        &default_locale
    } else {
        &options.locales
    };

    let mut routes = Vec::new();
    let mut keys: Vec<(String, String)> = Vec::new();
    let mut outputs: HashSet<PathBuf> = HashSet::new();

    for (index, locale) in locales.iter().enumerate() {
        let slug_options = SlugOptions {
            locale: (index > 0).then_some(locale.as_str()),
        };

        for file in files {
            let relative = file.to_string_lossy().replace('\\', "/");
            let view = view_id(&relative);
            let base_slug =
                transform_path_to_slug(&relative, &SlugOptions::default(), Some(&options.pattern));
            let locale_slug =
                transform_path_to_slug(&relative, &slug_options, Some(&options.pattern));

            let instances: Vec<RouteParams> = if has_route_params(&locale_slug) {
                let found = find_route_params(&view, table);
                if found.is_empty() {
                    tracing::debug!(view = %view, "no route params registered, skipping");
                    continue;
                }
                found.to_vec()
            } else {
                vec![RouteParams::new()]
            };

            let siblings_key = format!("{}\0{}", locale, collapse_route_params(&locale_slug));

            for params in instances {
                let slug = fill_route_params(&locale_slug, &params);
                let url = format_url(&slug, options.pretty_urls);
                let out = output_path(&options.out_dir, &url);

                if !outputs.insert(out.clone()) {
                    tracing::warn!(
                        view = %view,
                        out = %out.display(),
                        "route output already claimed, skipping duplicate"
                    );
                    continue;
                }

                keys.push((fill_route_params(&base_slug, &params), siblings_key.clone()));
                routes.push(Route {
                    url,
                    file: options.views_dir.join(file),
                    slug,
                    out,
                    view: view.clone(),
                    lang: locale.clone(),
                    data: Value::Object(Map::new()),
                    params,
                    pretty_url: options.pretty_urls,
                    siblings: Vec::new(),
                    localized: Vec::new(),
                });
            }
        }
    }

    link_routes(&mut routes, &keys);
    routes
}

/// Fill `localized` and `siblings` from the grouping keys of each route.
fn link_routes(routes: &mut [Route], keys: &[(String, String)]) {
    let mut localized: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut siblings: HashMap<&str, Vec<usize>> = HashMap::new();

    for (index, (localized_key, siblings_key)) in keys.iter().enumerate() {
        localized.entry(localized_key.as_str()).or_default().push(index);
        siblings.entry(siblings_key.as_str()).or_default().push(index);
    }

    let links: Vec<_> = routes.iter().map(Route::link).collect();

    for (index, (localized_key, siblings_key)) in keys.iter().enumerate() {
        let others = |group: &[usize]| {
            group
                .iter()
                .filter(|&&other| other != index)
                .map(|&other| links[other].clone())
                .collect::<Vec<_>>()
        };

        routes[index].localized = others(&localized[localized_key.as_str()]);
        routes[index].siblings = others(&siblings[siblings_key.as_str()]);
    }
}

/// Hidden files and `_partials` are not routes.
fn is_ignored(relative: &Path) -> bool {
    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        name.starts_with('.') || name.starts_with('_')
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! The build orchestrator.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::fs;

use sencha_fetch::{Endpoint, FetchCache, Store};
use sencha_routes::{
    find_route, Route, RouteDataLoader, RouteParamsProvider, RouteResolver, GLOBAL_SCOPE,
};

use crate::actions::{Action, ActionError, ActionPhase, Actions};
use crate::assets::{AssetFile, AssetTransform};
use crate::builder::Builder;
use crate::config::SenchaConfig;
use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::{
    AssetProcess, CssMinifyPlugin, HookName, MarkdownPlugin, Plugin, PluginError, PluginRegistry,
    Stop, ViewRender, WatcherChange,
};
use crate::result::{BuildOptions, BuildResult};
use crate::state::{stale_outputs, BuildState, StateStore};

/// Collects plugins and programmatic sources before initialization.
pub struct SenchaBuilder {
    config: SenchaConfig,
    extensions: Extensions,
}

impl SenchaBuilder {
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.extensions.plugins.push(plugin);
        self
    }

    /// Parameter records for a parameterized view.
    pub fn route_params(mut self, view: &str, provider: Arc<dyn RouteParamsProvider>) -> Self {
        self.extensions.params.push((view.to_string(), provider));
        self
    }

    /// Data for the routes of a view, or of every route with `__`.
    pub fn route_data(mut self, scope: &str, loader: Arc<dyn RouteDataLoader>) -> Self {
        self.extensions.data.push((scope.to_string(), loader));
        self
    }

    /// Register an endpoint, replacing a configured one of the same name.
    pub fn endpoint(mut self, name: &str, endpoint: Endpoint) -> Self {
        self.extensions.endpoints.insert(name.to_string(), endpoint);
        self
    }

    pub fn action(mut self, phase: ActionPhase, action: Arc<dyn Action>) -> Self {
        self.extensions.actions.add(phase, action);
        self
    }

    /// Let plugins edit the configuration, then load the persisted state.
    pub async fn init(self) -> Result<Sencha, BuildError> {
        let SenchaBuilder {
            mut config,
            extensions,
        } = self;

        let mut plugins = PluginRegistry::new(extensions.plugin_list(&config));
        plugins
            .run_hook(
                HookName::ConfigParse,
                &mut config,
                Stop::Never,
                |plugin, config| async move { plugin.config_parse(config).await }.boxed(),
            )
            .await?;
        plugins.configure(extensions.plugin_list(&config));

        let config = Arc::new(config);
        let store = StateStore::new(config.state_path());
        let state = store.load().await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring unreadable build state");
            BuildState::default()
        });

        let sencha = Sencha {
            context: extensions.context(&config, &plugins),
            resolver: extensions.resolver(&config),
            actions: extensions.actions(&config),
            config,
            extensions,
            plugins,
            store,
            state,
            routes: Vec::new(),
        };

        let mut ctx = sencha.context.clone();
        sencha
            .plugins
            .run_hook(
                HookName::SenchaInit,
                &mut ctx,
                Stop::Never,
                |plugin, ctx| async move { plugin.sencha_init(ctx).await }.boxed(),
            )
            .await?;

        tracing::debug!(
            plugins = sencha.plugins.plugins().len(),
            root = %sencha.config.root.display(),
            "sencha initialized"
        );
        Ok(sencha)
    }
}

/// Registrations made through [`SenchaBuilder`], kept across reconfiguration.
struct Extensions {
    plugins: Vec<Arc<dyn Plugin>>,
    params: Vec<(String, Arc<dyn RouteParamsProvider>)>,
    data: Vec<(String, Arc<dyn RouteDataLoader>)>,
    endpoints: HashMap<String, Endpoint>,
    actions: Actions,
    markdown: Arc<dyn Plugin>,
    css_minify: Arc<dyn Plugin>,
}

impl Extensions {
    fn new() -> Self {
        Self {
            plugins: Vec::new(),
            params: Vec::new(),
            data: Vec::new(),
            endpoints: HashMap::new(),
            actions: Actions::default(),
            markdown: Arc::new(MarkdownPlugin),
            css_minify: Arc::new(CssMinifyPlugin),
        }
    }

    /// Enabled built-ins followed by registered plugins.
    fn plugin_list(&self, config: &SenchaConfig) -> Vec<Arc<dyn Plugin>> {
        let mut plugins = Vec::with_capacity(self.plugins.len() + 2);
        if config.plugins.markdown {
            plugins.push(Arc::clone(&self.markdown));
        }
        if config.plugins.css_minify {
            plugins.push(Arc::clone(&self.css_minify));
        }
        plugins.extend(self.plugins.iter().cloned());
        plugins
    }

    fn context(&self, config: &Arc<SenchaConfig>, plugins: &PluginRegistry) -> BuildContext {
        let mut endpoints: HashMap<String, Endpoint> = config
            .fetch
            .endpoints
            .iter()
            .map(|(name, endpoint)| (name.clone(), Endpoint::from(endpoint.clone())))
            .collect();
        endpoints.extend(self.endpoints.clone());

        BuildContext::new(
            Arc::clone(config),
            Arc::clone(plugins.filters()),
            FetchCache::new(endpoints, Store::new()),
        )
    }

    /// Static sources from the configuration first, so programmatic ones win.
    fn resolver(&self, config: &SenchaConfig) -> RouteResolver {
        let mut resolver = RouteResolver::new(config.route_options());

        for (view, params) in &config.routes.params {
            resolver = resolver.with_params(view, Arc::new(params.clone()));
        }
        for (view, provider) in &self.params {
            resolver = resolver.with_params(view, Arc::clone(provider));
        }

        let mut data: Vec<_> = config.routes.data.iter().collect();
        data.sort_by_key(|(scope, _)| (scope.as_str() != GLOBAL_SCOPE, scope.to_string()));
        for (scope, value) in data {
            resolver = resolver.with_data(scope, Arc::new(value.clone()));
        }
        for (scope, loader) in &self.data {
            resolver = resolver.with_data(scope, Arc::clone(loader));
        }

        resolver
    }

    fn actions(&self, config: &SenchaConfig) -> Actions {
        let mut actions = Actions::from_config(&config.actions);
        actions.extend(&self.actions);
        actions
    }
}

/// A configured site, ready to build.
pub struct Sencha {
    config: Arc<SenchaConfig>,
    extensions: Extensions,
    plugins: PluginRegistry,
    context: BuildContext,
    resolver: RouteResolver,
    actions: Actions,
    store: StateStore,
    state: BuildState,
    routes: Vec<Route>,
}

impl Sencha {
    pub fn builder(config: SenchaConfig) -> SenchaBuilder {
        SenchaBuilder {
            config,
            extensions: Extensions::new(),
        }
    }

    pub fn config(&self) -> &Arc<SenchaConfig> {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Routes of the latest build, or the persisted ones before the first build.
    pub fn routes(&self) -> &[Route] {
        if self.routes.is_empty() {
            self.state.last_routes.as_deref().unwrap_or_default()
        } else {
            &self.routes
        }
    }

    /// Run the actions registered for `phase`.
    pub async fn run_actions(&self, phase: ActionPhase) -> Result<(), ActionError> {
        self.actions.run(phase, &self.config).await
    }

    /// Switch to a new configuration.
    ///
    /// Nothing is rebuilt when `config` is the current configuration
    /// instance. Returns whether anything changed.
    pub fn reconfigure(&mut self, config: Arc<SenchaConfig>) -> bool {
        if Arc::ptr_eq(&self.config, &config) {
            return false;
        }

        let plugins_changed = self.plugins.configure(self.extensions.plugin_list(&config));
        self.context = self.extensions.context(&config, &self.plugins);
        self.resolver = self.extensions.resolver(&config);
        self.actions = self.extensions.actions(&config);
        self.store = StateStore::new(config.state_path());
        self.config = config;

        tracing::debug!(plugins_changed, "reconfigured");
        true
    }

    /// Run a build.
    ///
    /// Never fails: the first error of a step is recorded in
    /// [`BuildResult::errors`] and the remaining steps are skipped, while
    /// the completion hooks, state persistence and `afterBuild` actions
    /// still run.
    pub async fn build(&mut self, options: BuildOptions) -> BuildResult {
        let started = Instant::now();
        let mut options = options;
        let mut result = BuildResult::default();

        if !options.incremental {
            self.context.assets.clear();
        }

        if let Err(err) = self
            .plugins
            .run_hook(
                HookName::BuildInit,
                &mut options,
                Stop::Never,
                |plugin, options| async move { plugin.build_init(options).await }.boxed(),
            )
            .await
        {
            result.errors.push(err.to_string());
        }

        result.cache = options.cache.unwrap_or(self.config.cache);
        if !result.cache && !options.incremental {
            self.context.fetch.clear();
        }

        if result.is_success() {
            if let Err(err) = self.run_steps(&options, &mut result).await {
                tracing::error!(error = %err, "build failed");
                result.errors.push(err.to_string());
            }
        }
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = if result.is_success() {
            HookName::BuildSuccess
        } else {
            HookName::BuildFail
        };
        for hook in [outcome, HookName::BuildDone] {
            if let Err(err) = self.notify(hook, &mut result).await {
                result.errors.push(err.to_string());
            }
        }

        self.persist(&result).await;

        if let Err(err) = self.run_actions(ActionPhase::AfterBuild).await {
            result.errors.push(err.to_string());
        }

        if result.is_success() {
            tracing::info!(
                routes = result.routes.len(),
                assets = result.assets.len(),
                removed = result.removed.len(),
                elapsed_ms = result.elapsed_ms,
                "build complete"
            );
        } else {
            tracing::warn!(errors = result.errors.len(), "build finished with errors");
        }

        result
    }

    /// The work steps of a build; the first error ends them.
    async fn run_steps(
        &mut self,
        options: &BuildOptions,
        result: &mut BuildResult,
    ) -> Result<(), BuildError> {
        self.run_actions(ActionPhase::BeforeBuild).await?;

        let mut routes = self.resolver.resolve(&self.context.fetch).await?;
        self.plugins
            .run_hook(
                HookName::RouteMount,
                &mut routes,
                Stop::Never,
                |plugin, routes| async move { plugin.route_mount(routes).await }.boxed(),
            )
            .await?;
        self.routes = routes.clone();
        result.all_routes = routes;

        let mut selected: Vec<Route> = match &options.filter {
            Some(filter) => result
                .all_routes
                .iter()
                .filter(|route| filter(route))
                .cloned()
                .collect(),
            None => result.all_routes.clone(),
        };
        self.plugins
            .run_hook(
                HookName::BuildStart,
                &mut selected,
                Stop::Never,
                |plugin, routes| async move { plugin.build_start(routes).await }.boxed(),
            )
            .await?;

        let builder = Builder::new(&self.plugins, &self.context);
        result.routes = builder.build(&selected).await?;

        let stale = self
            .state
            .last_routes
            .as_deref()
            .map(|previous| stale_outputs(previous, &result.all_routes));
        result.removed = builder.tidy(&result.all_routes, stale.as_deref()).await;
        self.state.last_routes = Some(result.all_routes.clone());

        let transform = HookTransform {
            plugins: &self.plugins,
            ctx: &self.context,
        };
        let cache = result.cache && options.assets.is_none();
        result.assets = self
            .context
            .assets
            .process(&transform, cache, options.assets.clone())
            .await?;

        Ok(())
    }

    /// Dispatch an observation hook over the build result.
    async fn notify(&self, hook: HookName, result: &mut BuildResult) -> Result<(), PluginError> {
        let plugins = &self.plugins;
        match hook {
            HookName::BuildSuccess => {
                plugins
                    .run_hook(hook, result, Stop::Never, |plugin, result| {
                        async move { plugin.build_success(result).await }.boxed()
                    })
                    .await?;
            }
            HookName::BuildFail => {
                plugins
                    .run_hook(hook, result, Stop::Never, |plugin, result| {
                        async move { plugin.build_fail(result).await }.boxed()
                    })
                    .await?;
            }
            HookName::BuildDone => {
                plugins
                    .run_hook(hook, result, Stop::Never, |plugin, result| {
                        async move { plugin.build_done(result).await }.boxed()
                    })
                    .await?;
            }
            HookName::WatcherRebuild => {
                plugins
                    .run_hook(hook, result, Stop::Never, |plugin, result| {
                        async move { plugin.watcher_rebuild(result).await }.boxed()
                    })
                    .await?;
            }
            other => tracing::debug!(hook = %other, "not a build result hook"),
        }
        Ok(())
    }

    async fn persist(&mut self, result: &BuildResult) {
        self.state.last_result = Some(result.clone());

        if let Err(err) = self.store.save(&self.state).await {
            tracing::warn!(error = %err, "failed to persist build state");
        }
    }

    /// Rebuild after files changed.
    ///
    /// Changed views re-render only their routes and changed registered
    /// assets are reprocessed alone; any other file triggers a full build.
    /// A `watcherChange` plugin may edit the change set or claim it.
    pub async fn rebuild(&mut self, changed: Vec<PathBuf>) -> BuildResult {
        let mut change = WatcherChange { paths: changed };

        match self
            .plugins
            .run_hook(
                HookName::WatcherChange,
                &mut change,
                Stop::OnClaim,
                |plugin, change| async move { plugin.watcher_change(change).await }.boxed(),
            )
            .await
        {
            Ok(Some(())) => {
                tracing::debug!("change handled by a plugin");
                return BuildResult {
                    cache: self.config.cache,
                    ..Default::default()
                };
            }
            Ok(None) => {}
            Err(err) => {
                return BuildResult {
                    cache: self.config.cache,
                    errors: vec![err.to_string()],
                    ..Default::default()
                }
            }
        }

        let options = self.rebuild_options(&change.paths);
        let mut result = self.build(options).await;

        if let Err(err) = self.notify(HookName::WatcherRebuild, &mut result).await {
            result.errors.push(err.to_string());
        }
        result
    }

    fn rebuild_options(&self, changed: &[PathBuf]) -> BuildOptions {
        let mut views = HashSet::new();
        let mut assets = Vec::new();

        for path in changed {
            let registered = self.context.assets.find_by_source(path);
            if !registered.is_empty() {
                assets.extend(registered);
            } else if self.routes().iter().any(|route| &route.file == path) {
                views.insert(path.clone());
            } else {
                tracing::debug!(path = %path.display(), "change requires a full build");
                return BuildOptions::default();
            }
        }

        tracing::debug!(views = views.len(), assets = assets.len(), "incremental rebuild");

        BuildOptions {
            cache: None,
            filter: Some(Arc::new(move |route: &Route| views.contains(&route.file))),
            assets: (!assets.is_empty()).then_some(assets),
            incremental: true,
        }
    }

    /// Render the route serving `url` without writing it.
    ///
    /// A `serverRenderRoute` plugin may replace the markup.
    pub async fn render_url(&self, url: &str) -> Result<Option<String>, BuildError> {
        let Some(route) = find_route(self.routes(), url) else {
            return Ok(None);
        };

        let html = Builder::new(&self.plugins, &self.context)
            .render(route)
            .await?;

        let mut view = ViewRender {
            route,
            ctx: &self.context,
            html: &html,
        };
        let served = self
            .plugins
            .run_hook(
                HookName::ServerRenderRoute,
                &mut view,
                Stop::OnClaim,
                |plugin, view| async move { plugin.server_render_route(view).await }.boxed(),
            )
            .await?;

        Ok(Some(served.unwrap_or(html)))
    }
}

/// Asset transform dispatching `assetProcess`.
///
/// Unclaimed registered assets are passed through unchanged, so the
/// pipeline writes them and chains their children like any other output.
struct HookTransform<'a> {
    plugins: &'a PluginRegistry,
    ctx: &'a BuildContext,
}

#[async_trait]
impl<'a> AssetTransform for HookTransform<'a> {
    async fn transform(&self, asset: &mut AssetFile) -> Result<Option<Vec<u8>>, BuildError> {
        let mut process = AssetProcess {
            asset: &mut *asset,
            ctx: self.ctx,
        };
        let claimed = self
            .plugins
            .run_hook(
                HookName::AssetProcess,
                &mut process,
                Stop::OnClaim,
                |plugin, process| async move { plugin.asset_process(process).await }.boxed(),
            )
            .await?;

        match claimed {
            Some(contents) => Ok(Some(contents.into_bytes())),
            None if asset.is_first() && asset.src != asset.dest => fs::read(&asset.src)
                .await
                .map(Some)
                .map_err(|e| BuildError::read(&asset.src, e)),
            None => Ok(None),
        }
    }
}

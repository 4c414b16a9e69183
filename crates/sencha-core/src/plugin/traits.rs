//! The plugin trait and the argument types of its hooks.

use std::path::PathBuf;

use async_trait::async_trait;
use sencha_routes::Route;

use crate::assets::AssetFile;
use crate::config::SenchaConfig;
use crate::context::BuildContext;
use crate::plugin::filters::Filter;
use crate::plugin::hook::{Hook, HookName, HookOutcome};
use crate::result::{BuildOptions, BuildResult};

/// A view about to be compiled to markup.
pub struct ViewCompile<'a> {
    pub route: &'a Route,
    pub ctx: &'a BuildContext,
}

/// Compiled markup, mutable in place.
pub struct ViewParse<'a> {
    pub route: &'a Route,
    pub ctx: &'a BuildContext,
    pub html: String,
}

/// Final markup of a route, about to be written.
pub struct ViewRender<'a> {
    pub route: &'a Route,
    pub ctx: &'a BuildContext,
    pub html: &'a str,
}

/// An asset about to be transformed. Plugins may redirect `asset.dest`.
pub struct AssetProcess<'a> {
    pub asset: &'a mut AssetFile,
    pub ctx: &'a BuildContext,
}

/// Files reported changed by a watcher.
#[derive(Debug, Clone, Default)]
pub struct WatcherChange {
    pub paths: Vec<PathBuf>,
}

/// A build plugin.
///
/// Only the hooks listed by [`Plugin::hooks`] are dispatched; every hook
/// method defaults to [`Hook::Pass`].
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    fn hooks(&self) -> &[HookName];

    /// Named value filters made available to templates.
    fn filters(&self) -> Vec<(String, Filter)> {
        Vec::new()
    }

    async fn sencha_init(&self, _ctx: &BuildContext) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn config_parse(&self, _config: &mut SenchaConfig) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn build_init(&self, _options: &mut BuildOptions) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn build_start(&self, _routes: &[Route]) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn build_success(&self, _result: &BuildResult) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn build_fail(&self, _result: &BuildResult) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn build_done(&self, _result: &BuildResult) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    /// Return the contents to write to `asset.dest`.
    async fn asset_process(&self, _process: &mut AssetProcess<'_>) -> HookOutcome<String> {
        Ok(Hook::Pass)
    }

    async fn route_mount(&self, _routes: &mut Vec<Route>) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    /// Return the markup of a view.
    async fn view_compile(&self, _view: &ViewCompile<'_>) -> HookOutcome<String> {
        Ok(Hook::Pass)
    }

    async fn view_parse(&self, _view: &mut ViewParse<'_>) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    /// Claim to take over writing the route's output.
    async fn view_render(&self, _view: &ViewRender<'_>) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    /// Edit the change set, or claim it handled to skip the rebuild.
    async fn watcher_change(&self, _change: &mut WatcherChange) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    async fn watcher_rebuild(&self, _result: &BuildResult) -> HookOutcome<()> {
        Ok(Hook::Pass)
    }

    /// Override the markup served for a route.
    async fn server_render_route(&self, _view: &ViewRender<'_>) -> HookOutcome<String> {
        Ok(Hook::Pass)
    }
}

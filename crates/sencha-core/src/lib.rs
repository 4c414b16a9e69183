//! Build engine for sencha.
//!
//! Resolves routes, renders them through plugin hooks, runs registered
//! assets through the iterative asset pipeline and removes outputs that
//! no route produces anymore.
//!
//! ```no_run
//! use sencha_core::{BuildOptions, Sencha, SenchaConfig};
//!
//! # async fn run() -> Result<(), sencha_core::BuildError> {
//! let mut sencha = Sencha::builder(SenchaConfig::with_root("site")).init().await?;
//! let result = sencha.build(BuildOptions::default()).await;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod assets;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod plugin;
pub mod result;
pub mod sencha;
pub mod state;

pub use actions::{Action, ActionError, ActionPhase, Actions, CommandAction};
pub use assets::{AssetFile, AssetPipeline, AssetTransform, MAX_ASSET_PASSES};
pub use builder::{Builder, DEFAULT_CONCURRENCY};
pub use config::{ActionsConfig, FetchConfig, PluginsConfig, RoutesConfig, SenchaConfig};
pub use context::BuildContext;
pub use error::BuildError;
pub use plugin::{
    AssetProcess, CssMinifyPlugin, Filter, FilterRegistry, Hook, HookName, HookOutcome,
    MarkdownPlugin, Plugin, PluginError, PluginRegistry, Stop, ViewCompile, ViewParse, ViewRender,
    WatcherChange,
};
pub use result::{BuildOptions, BuildResult, RouteFilter};
pub use sencha::{Sencha, SenchaBuilder};
pub use state::{stale_outputs, BuildState, StateError, StateStore};

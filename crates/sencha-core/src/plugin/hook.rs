//! Hook names, hook results and stop policies.

use std::fmt;

/// Every hook a plugin may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    SenchaInit,
    ConfigParse,
    BuildInit,
    BuildStart,
    BuildSuccess,
    BuildFail,
    BuildDone,
    AssetProcess,
    RouteMount,
    ViewCompile,
    ViewParse,
    ViewRender,
    WatcherChange,
    WatcherRebuild,
    /// Dispatched by the dev server, not by the build
    ServerInit,
    /// Dispatched by the dev server, not by the build
    ServerUpgrade,
    /// Dispatched by the dev server, not by the build
    ServerAddRoute,
    ServerRenderRoute,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SenchaInit => "senchaInit",
            Self::ConfigParse => "configParse",
            Self::BuildInit => "buildInit",
            Self::BuildStart => "buildStart",
            Self::BuildSuccess => "buildSuccess",
            Self::BuildFail => "buildFail",
            Self::BuildDone => "buildDone",
            Self::AssetProcess => "assetProcess",
            Self::RouteMount => "routeMount",
            Self::ViewCompile => "viewCompile",
            Self::ViewParse => "viewParse",
            Self::ViewRender => "viewRender",
            Self::WatcherChange => "watcherChange",
            Self::WatcherRebuild => "watcherRebuild",
            Self::ServerInit => "serverInit",
            Self::ServerUpgrade => "serverUpgrade",
            Self::ServerAddRoute => "serverAddRoute",
            Self::ServerRenderRoute => "serverRenderRoute",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a plugin did with a hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook<T> {
    /// Observed only; the dispatcher moves on
    Pass,

    /// Produced a value; later plugins may still override it
    Claim(T),

    /// Produced a value and stops dispatch regardless of the stop policy
    Halt(T),
}

/// Result type of every plugin hook method.
pub type HookOutcome<T> = Result<Hook<T>, PluginError>;

/// When the dispatcher stops calling further plugins.
pub enum Stop<'s, T> {
    /// Call every plugin exposing the hook
    Never,

    /// Stop at the first claimed value
    OnClaim,

    /// Stop after the first plugin exposing the hook, whatever it returned
    Always,

    /// Stop once the claimed value satisfies the predicate
    When(&'s (dyn Fn(&T) -> bool + Send + Sync)),
}

impl<T> Stop<'_, T> {
    pub(crate) fn should_stop(&self, result: Option<&T>) -> bool {
        match self {
            Self::Never => false,
            Self::OnClaim => result.is_some(),
            Self::Always => true,
            Self::When(predicate) => result.is_some_and(|value| predicate(value)),
        }
    }
}

/// Errors raised by plugins.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin {plugin} failed in {hook}: {message}")]
    Hook {
        plugin: String,
        hook: HookName,
        message: String,
    },

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

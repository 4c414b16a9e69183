//! Plugin contract, hook dispatch and filters.

pub mod builtin;
pub mod filters;
pub mod hook;
pub mod registry;
pub mod traits;

pub use builtin::{CssMinifyPlugin, MarkdownPlugin};
pub use filters::{Filter, FilterRegistry};
pub use hook::{Hook, HookName, HookOutcome, PluginError, Stop};
pub use registry::PluginRegistry;
pub use traits::{AssetProcess, Plugin, ViewCompile, ViewParse, ViewRender, WatcherChange};

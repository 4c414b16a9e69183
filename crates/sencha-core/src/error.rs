//! Build errors.

use sencha_routes::RouteError;

use crate::actions::ActionError;
use crate::plugin::PluginError;
use crate::state::StateError;

/// Errors that abort a build step.
///
/// A build records at most one of these; the remaining steps are skipped.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to resolve routes: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}

impl BuildError {
    pub(crate) fn read(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

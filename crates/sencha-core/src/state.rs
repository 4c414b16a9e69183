//! Build state persisted between runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use sencha_routes::Route;

use crate::result::BuildResult;

const STATE_FILE: &str = "state.json";

/// Errors reading or writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to read state {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid state file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to write state {path}: {message}")]
    Write { path: String, message: String },
}

/// What the previous build left behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildState {
    pub last_result: Option<BuildResult>,

    /// Routes of the last build that resolved them
    pub last_routes: Option<Vec<Route>>,
}

/// Reads and writes `<state_dir>/state.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state; a missing file is an empty state.
    pub async fn load(&self) -> Result<BuildState, StateError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BuildState::default()),
            Err(e) => {
                return Err(StateError::Read {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| StateError::Parse {
            path: self.path.display().to_string(),
            source,
        })
    }

    pub async fn save(&self, state: &BuildState) -> Result<(), StateError> {
        let write_err = |message: String| StateError::Write {
            path: self.path.display().to_string(),
            message,
        };

        let json = serde_json::to_string(state).map_err(|e| write_err(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_err(e.to_string()))?;
        }

        fs::write(&self.path, json)
            .await
            .map_err(|e| write_err(e.to_string()))
    }
}

/// Outputs of `previous` routes that no `current` route produces.
pub fn stale_outputs(previous: &[Route], current: &[Route]) -> Vec<PathBuf> {
    let live: HashSet<&Path> = current.iter().map(|route| route.out.as_path()).collect();

    previous
        .iter()
        .filter(|route| !live.contains(route.out.as_path()))
        .map(|route| route.out.clone())
        .collect()
}

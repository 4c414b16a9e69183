//! Ordered callbacks run around the CLI run and around every build.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{ActionsConfig, SenchaConfig};

/// When an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionPhase {
    BeforeRun,
    AfterRun,
    BeforeBuild,
    AfterBuild,
}

impl ActionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRun => "beforeRun",
            Self::AfterRun => "afterRun",
            Self::BeforeBuild => "beforeBuild",
            Self::AfterBuild => "afterBuild",
        }
    }
}

impl fmt::Display for ActionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action `{name}` could not start: {message}")]
    Spawn { name: String, message: String },

    #[error("Action `{name}` exited with {status}: {stderr}")]
    Exit {
        name: String,
        status: String,
        stderr: String,
    },

    #[error("Action `{name}` failed: {message}")]
    Failed { name: String, message: String },
}

/// A callback bound to an [`ActionPhase`].
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, phase: ActionPhase, config: &SenchaConfig) -> Result<(), ActionError>;
}

/// Runs a shell command in the project root.
///
/// The command sees `SENCHA_ROOT`, `SENCHA_OUT_DIR` and `SENCHA_PHASE`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: String,
}

impl CommandAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

#[async_trait]
impl Action for CommandAction {
    fn name(&self) -> &str {
        &self.command
    }

    async fn run(&self, phase: ActionPhase, config: &SenchaConfig) -> Result<(), ActionError> {
        tracing::info!(phase = %phase, command = %self.command, "running action");

        let output = self
            .shell()
            .current_dir(&config.root)
            .env("SENCHA_ROOT", &config.root)
            .env("SENCHA_OUT_DIR", config.out_path())
            .env("SENCHA_PHASE", phase.as_str())
            .output()
            .await
            .map_err(|e| ActionError::Spawn {
                name: self.command.clone(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(command = %self.command, "{}", stdout.trim());
        }

        if !output.status.success() {
            return Err(ActionError::Exit {
                name: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Actions grouped by phase, in registration order.
#[derive(Clone, Default)]
pub struct Actions {
    actions: HashMap<ActionPhase, Vec<Arc<dyn Action>>>,
}

impl Actions {
    /// Shell command actions from the `[actions]` table.
    pub fn from_config(config: &ActionsConfig) -> Self {
        let mut actions = Self::default();
        let phases = [
            (ActionPhase::BeforeRun, &config.before_run),
            (ActionPhase::AfterRun, &config.after_run),
            (ActionPhase::BeforeBuild, &config.before_build),
            (ActionPhase::AfterBuild, &config.after_build),
        ];

        for (phase, commands) in phases {
            for command in commands {
                actions.add(phase, Arc::new(CommandAction::new(command.as_str())));
            }
        }
        actions
    }

    pub fn add(&mut self, phase: ActionPhase, action: Arc<dyn Action>) {
        self.actions.entry(phase).or_default().push(action);
    }

    /// Append every action of `other` after the existing ones.
    pub fn extend(&mut self, other: &Actions) {
        for (phase, actions) in &other.actions {
            self.actions
                .entry(*phase)
                .or_default()
                .extend(actions.iter().cloned());
        }
    }

    pub fn count(&self, phase: ActionPhase) -> usize {
        self.actions.get(&phase).map_or(0, Vec::len)
    }

    /// Run the actions of `phase` one after another, stopping at the first error.
    pub async fn run(&self, phase: ActionPhase, config: &SenchaConfig) -> Result<(), ActionError> {
        for action in self.actions.get(&phase).into_iter().flatten() {
            action.run(phase, config).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Action for Record {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, phase: ActionPhase, _config: &SenchaConfig) -> Result<(), ActionError> {
            self.log.lock().push(format!("{}:{}", phase, self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_actions_of_one_phase_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut actions = Actions::default();
        for name in ["first", "second"] {
            actions.add(
                ActionPhase::BeforeBuild,
                Arc::new(Record {
                    name,
                    log: Arc::clone(&log),
                }),
            );
        }
        actions.add(
            ActionPhase::AfterBuild,
            Arc::new(Record {
                name: "after",
                log: Arc::clone(&log),
            }),
        );

        actions
            .run(ActionPhase::BeforeBuild, &SenchaConfig::default())
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["beforeBuild:first", "beforeBuild:second"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_actions_see_sencha_variables() {
        let dir = tempdir().unwrap();
        let config = SenchaConfig::with_root(dir.path());
        let actions = Actions::from_config(&ActionsConfig {
            after_build: vec!["echo \"$SENCHA_PHASE $SENCHA_OUT_DIR\" > phase.txt".to_string()],
            ..Default::default()
        });

        actions.run(ActionPhase::AfterBuild, &config).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("phase.txt")).unwrap();
        assert_eq!(
            written.trim(),
            format!("afterBuild {}", config.out_path().display())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_an_error() {
        let dir = tempdir().unwrap();
        let config = SenchaConfig::with_root(dir.path());
        let actions = Actions::from_config(&ActionsConfig {
            before_run: vec!["echo nope >&2; exit 3".to_string()],
            ..Default::default()
        });

        let err = actions.run(ActionPhase::BeforeRun, &config).await.unwrap_err();

        assert!(matches!(err, ActionError::Exit { ref stderr, .. } if stderr == "nope"));
    }
}

//! Site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sencha_core::{ActionPhase, BuildOptions, Sencha};

/// Run the build command.
pub async fn run(config_path: &Path, out: Option<PathBuf>, no_cache: bool) -> Result<()> {
    tracing::info!("Building site...");

    let mut config = super::load_config(config_path)?;
    if let Some(out) = out {
        config.out_dir = out;
    }
    if no_cache {
        config.cache = false;
    }

    let mut sencha = Sencha::builder(config).init().await?;
    sencha.run_actions(ActionPhase::BeforeRun).await?;

    let result = sencha.build(BuildOptions::default()).await;

    for error in &result.errors {
        tracing::error!("{}", error);
    }

    tracing::info!(
        "Built {} of {} routes and {} assets in {}ms",
        result.routes.len(),
        result.all_routes.len(),
        result.assets.len(),
        result.elapsed_ms
    );
    if !result.removed.is_empty() {
        tracing::info!("Removed {} stale files", result.removed.len());
    }
    tracing::info!("Output: {}", sencha.config().out_path().display());

    sencha.run_actions(ActionPhase::AfterRun).await?;

    if !result.is_success() {
        anyhow::bail!("Build failed with {} error(s)", result.errors.len());
    }

    Ok(())
}

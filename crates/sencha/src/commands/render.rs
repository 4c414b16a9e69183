//! Render a single route to stdout.

use std::path::Path;

use anyhow::Result;
use sencha_core::{BuildOptions, Sencha};

/// Run the render command.
///
/// Routes come from the last build; without one, a build runs first.
pub async fn run(config_path: &Path, url: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let mut sencha = Sencha::builder(config).init().await?;

    if sencha.routes().is_empty() {
        tracing::info!("No previous build, building first...");
        let result = sencha.build(BuildOptions::default()).await;
        if !result.is_success() {
            anyhow::bail!("Build failed: {}", result.errors.join("; "));
        }
    }

    match sencha.render_url(url).await? {
        Some(html) => {
            println!("{}", html);
            Ok(())
        }
        None => anyhow::bail!("No route serves {}", url),
    }
}

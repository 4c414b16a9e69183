//! CLI commands.

pub mod build;
pub mod render;

use std::fs;
use std::path::Path;

use anyhow::Result;
use sencha_core::SenchaConfig;

/// Load configuration from `path` if it exists.
///
/// A relative `root` is resolved against the config file's directory.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<SenchaConfig> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(SenchaConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let mut config: SenchaConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if config.root.is_relative() {
            config.root = dir.join(&config.root);
        }
    }

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let config = load_config(Path::new("does-not-exist/sencha.toml")).unwrap();
        assert_eq!(config.root, PathBuf::from("."));
    }

    #[test]
    fn root_is_relative_to_the_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sencha.toml");
        fs::write(&path, "root = \"site\"\ncache = false\n").unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.root, dir.path().join("site"));
        assert!(!config.cache);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sencha.toml");
        fs::write(&path, "cache = \"sometimes\"").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}

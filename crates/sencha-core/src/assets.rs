//! Asset registry and the iterative asset transform pipeline.
//!
//! Templates register source files with [`AssetPipeline::include`] and get
//! the public url back immediately. After routes are rendered,
//! [`AssetPipeline::process`] runs every registered asset through a
//! transform. When a pass writes a new file, that file is fed back as a
//! child asset in the next wave, so chained transforms (compile, then
//! minify) reach a fixed point, at most [`MAX_ASSET_PASSES`] waves deep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::SenchaConfig;
use crate::error::BuildError;

/// Upper bound on transform waves per build.
pub const MAX_ASSET_PASSES: usize = 5;

/// A registered asset, or a file produced from one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFile {
    /// File the transform reads
    pub src: PathBuf,

    /// File the transform output is written to
    pub dest: PathBuf,

    /// Output extension requested at registration
    pub ext: Option<String>,

    /// Public url of the final output
    pub url: String,

    /// Asset whose output this file is
    #[serde(skip)]
    pub parent: Option<Arc<AssetFile>>,
}

impl AssetFile {
    /// Registered directly rather than produced by a transform.
    pub fn is_first(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of ancestors.
    pub fn generation(&self) -> usize {
        std::iter::successors(self.parent.as_deref(), |asset| asset.parent.as_deref()).count()
    }

    /// The registered asset this file descends from.
    pub fn root(&self) -> &AssetFile {
        let mut asset = self;
        while let Some(parent) = asset.parent.as_deref() {
            asset = parent;
        }
        asset
    }

    /// Source extension, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.src.extension().and_then(|e| e.to_str())
    }

    /// A follow-up asset reading this asset's output in place.
    pub fn child(&self) -> AssetFile {
        AssetFile {
            src: self.dest.clone(),
            dest: self.dest.clone(),
            ext: self.ext.clone(),
            url: self.url.clone(),
            parent: Some(Arc::new(self.clone())),
        }
    }
}

/// One transform step over an asset.
///
/// Returned contents are written to `asset.dest` and count as new output;
/// `None` means the transform produced nothing.
#[async_trait]
pub trait AssetTransform: Send + Sync {
    async fn transform(&self, asset: &mut AssetFile) -> Result<Option<Vec<u8>>, BuildError>;
}

type AssetKey = (PathBuf, Option<String>);

/// Registry of the assets included by the current build.
#[derive(Debug)]
pub struct AssetPipeline {
    source_root: PathBuf,
    out_root: PathBuf,
    url_base: String,
    entries: Mutex<BTreeMap<AssetKey, AssetFile>>,
}

impl AssetPipeline {
    /// Create a pipeline mapping `source_root` onto `out_root`, served at `url_base`.
    pub fn new(source_root: impl Into<PathBuf>, out_root: impl Into<PathBuf>, url_base: &str) -> Self {
        Self {
            source_root: source_root.into(),
            out_root: out_root.into(),
            url_base: url_base.trim_end_matches('/').to_string(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn from_config(config: &SenchaConfig) -> Self {
        Self::new(config.assets_path(), config.out_assets_path(), &config.assets_url())
    }

    /// Register a source file and return its descriptor.
    ///
    /// Relative sources are resolved against the assets directory. `ext`
    /// replaces the output extension (`app.ts` with `js` is served as
    /// `app.js`). Including the same file twice returns the same descriptor.
    pub fn include(&self, source: impl AsRef<Path>, ext: Option<&str>) -> AssetFile {
        let source = source.as_ref();
        let src = if source.is_absolute() {
            source.to_path_buf()
        } else {
            self.source_root.join(source)
        };
        let ext = ext.map(|e| e.trim_start_matches('.').to_string());

        let mut entries = self.entries.lock();
        entries
            .entry((src.clone(), ext.clone()))
            .or_insert_with(|| {
                let mut relative = match src.strip_prefix(&self.source_root) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => PathBuf::from(src.file_name().unwrap_or_default()),
                };
                if let Some(ext) = &ext {
                    relative.set_extension(ext);
                }

                let url = format!("{}/{}", self.url_base, url_path(&relative));
                tracing::debug!(src = %src.display(), url = %url, "included asset");

                AssetFile {
                    dest: self.out_root.join(&relative),
                    src: src.clone(),
                    ext: ext.clone(),
                    url,
                    parent: None,
                }
            })
            .clone()
    }

    /// Every registered asset, ordered by source path.
    pub fn assets(&self) -> Vec<AssetFile> {
        self.entries.lock().values().cloned().collect()
    }

    /// Registered assets read from `source`.
    pub fn find_by_source(&self, source: &Path) -> Vec<AssetFile> {
        self.entries
            .lock()
            .values()
            .filter(|asset| asset.src == source)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Run the registered assets, or `explicit` when given, through `transform`.
    ///
    /// With `cache` set, a registered asset whose output already exists is
    /// skipped. Children are never skipped, so a chain is never half cached.
    /// Returns every processed asset, children included. A
    /// transform error aborts the remaining waves.
    pub async fn process(
        &self,
        transform: &dyn AssetTransform,
        cache: bool,
        explicit: Option<Vec<AssetFile>>,
    ) -> Result<Vec<AssetFile>, BuildError> {
        let mut wave = explicit.unwrap_or_else(|| self.assets());
        let mut processed = Vec::new();
        let mut generation = 0;

        while !wave.is_empty() {
            if generation == MAX_ASSET_PASSES {
                tracing::warn!(
                    pending = wave.len(),
                    passes = MAX_ASSET_PASSES,
                    "asset transforms did not settle"
                );
                break;
            }

            tracing::debug!(generation, assets = wave.len(), "processing asset wave");

            let steps = wave
                .into_iter()
                .map(|asset| process_asset(transform, asset, cache));
            let outcomes = try_join_all(steps).await?;

            wave = Vec::new();
            for (asset, child) in outcomes {
                wave.extend(child);
                processed.push(asset);
            }
            generation += 1;
        }

        Ok(processed)
    }
}

/// Transform one asset and derive its child, if any.
async fn process_asset(
    transform: &dyn AssetTransform,
    mut asset: AssetFile,
    cache: bool,
) -> Result<(AssetFile, Option<AssetFile>), BuildError> {
    let existed = exists(&asset.dest).await;

    if cache && asset.is_first() && existed {
        tracing::debug!(dest = %asset.dest.display(), "asset output exists, skipping");
        return Ok((asset, None));
    }

    let written = match transform.transform(&mut asset).await? {
        Some(contents) => {
            if let Some(parent) = asset.dest.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BuildError::write(parent, e))?;
            }
            fs::write(&asset.dest, contents)
                .await
                .map_err(|e| BuildError::write(&asset.dest, e))?;
            true
        }
        None => false,
    };

    // A destination that predates this pass and was not written by it is
    // not new output.
    let produced = written || (!existed && exists(&asset.dest).await);
    let child = (produced && asset.dest != asset.src).then(|| asset.child());

    Ok((asset, child))
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

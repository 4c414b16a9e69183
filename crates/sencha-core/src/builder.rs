//! Route rendering and output reconciliation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use futures::FutureExt;
use tokio::fs;
use walkdir::WalkDir;

use sencha_routes::Route;

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::{HookName, PluginRegistry, Stop, ViewCompile, ViewParse, ViewRender};

/// Routes rendered concurrently per batch.
pub const DEFAULT_CONCURRENCY: usize = 256;

/// Renders routes through the view hooks and writes their output.
pub struct Builder<'a> {
    plugins: &'a PluginRegistry,
    ctx: &'a BuildContext,
    concurrency: usize,
}

impl<'a> Builder<'a> {
    pub fn new(plugins: &'a PluginRegistry, ctx: &'a BuildContext) -> Self {
        Self {
            plugins,
            ctx,
            concurrency: ctx.config.concurrency.max(1),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Render and write `routes` in fixed-size batches.
    ///
    /// Each batch completes before the next one starts. The first failing
    /// route aborts the build; routes of later batches are not touched.
    pub async fn build(&self, routes: &[Route]) -> Result<Vec<Route>, BuildError> {
        let mut rendered = Vec::with_capacity(routes.len());

        for (index, batch) in routes.chunks(self.concurrency).enumerate() {
            tracing::debug!(batch = index, routes = batch.len(), "rendering batch");
            try_join_all(batch.iter().map(|route| self.build_route(route))).await?;
            rendered.extend_from_slice(batch);
        }

        Ok(rendered)
    }

    /// Compile and post-process a route without writing it.
    pub async fn render(&self, route: &Route) -> Result<String, BuildError> {
        let html = self.compile(route).await?;
        self.parse(route, html).await
    }

    async fn build_route(&self, route: &Route) -> Result<(), BuildError> {
        let html = self.render(route).await?;
        self.write(route, &html).await?;
        tracing::debug!(url = %route.url, "rendered route");
        Ok(())
    }

    /// First claiming `viewCompile` plugin wins; otherwise the raw view is used.
    async fn compile(&self, route: &Route) -> Result<String, BuildError> {
        let mut view = ViewCompile {
            route,
            ctx: self.ctx,
        };

        self.plugins
            .run_hook_or(
                HookName::ViewCompile,
                &mut view,
                Stop::OnClaim,
                |plugin, view| async move { plugin.view_compile(view).await }.boxed(),
                |view| async move { read_view(view.route).await }.boxed(),
            )
            .await
    }

    async fn parse(&self, route: &Route, html: String) -> Result<String, BuildError> {
        let mut view = ViewParse {
            route,
            ctx: self.ctx,
            html,
        };

        self.plugins
            .run_hook(
                HookName::ViewParse,
                &mut view,
                Stop::Always,
                |plugin, view| async move { plugin.view_parse(view).await }.boxed(),
            )
            .await?;

        Ok(view.html)
    }

    /// A claiming `viewRender` plugin takes over the write.
    async fn write(&self, route: &Route, html: &str) -> Result<(), BuildError> {
        let mut view = ViewRender {
            route,
            ctx: self.ctx,
            html,
        };

        self.plugins
            .run_hook_or(
                HookName::ViewRender,
                &mut view,
                Stop::OnClaim,
                |plugin, view| async move { plugin.view_render(view).await }.boxed(),
                |view| async move { write_output(&view.route.out, view.html).await }.boxed(),
            )
            .await
    }

    /// Delete outputs that no route in `routes` produces.
    ///
    /// With `stale`, only those paths are candidates; without it, every
    /// `.html` file under the output directory is. Emptied directories are
    /// removed up to, not including, the output directory. Failures are
    /// logged and skipped. Returns the removed files.
    pub async fn tidy(&self, routes: &[Route], stale: Option<&[PathBuf]>) -> Vec<PathBuf> {
        let out_dir = self.ctx.config.out_path();
        let current: HashSet<&Path> = routes.iter().map(|route| route.out.as_path()).collect();

        let candidates = match stale {
            Some(stale) => stale.to_vec(),
            None => scan_html(&out_dir),
        };

        let mut removed = Vec::new();
        for path in candidates {
            if current.contains(path.as_path()) {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed stale output");
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove stale output");
                }
            }
        }

        for path in &removed {
            prune_empty_dirs(path, &out_dir).await;
        }

        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "tidied output directory");
        }
        removed
    }
}

async fn read_view(route: &Route) -> Result<String, BuildError> {
    fs::read_to_string(&route.file)
        .await
        .map_err(|e| BuildError::read(&route.file, e))
}

async fn write_output(path: &Path, html: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| BuildError::write(parent, e))?;
    }

    fs::write(path, html)
        .await
        .map_err(|e| BuildError::write(path, e))
}

/// Every `.html` file under `root`.
fn scan_html(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "html"))
        .map(|entry| entry.into_path())
        .collect()
}

/// Remove empty ancestors of `path` below `root`.
async fn prune_empty_dirs(path: &Path, root: &Path) {
    let mut dir = path.parent();

    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if fs::remove_dir(current).await.is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sencha_fetch::{FetchCache, Store};
    use sencha_routes::RouteResolver;
    use tempfile::{tempdir, TempDir};

    use crate::config::SenchaConfig;
    use crate::plugin::{Hook, HookOutcome, Plugin, PluginError};

    struct Site {
        dir: TempDir,
        ctx: BuildContext,
    }

    impl Site {
        fn new(views: &[(&str, &str)]) -> Self {
            let dir = tempdir().unwrap();
            for (path, contents) in views {
                let path = dir.path().join("views").join(path);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, contents).unwrap();
            }

            let config = Arc::new(SenchaConfig::with_root(dir.path()));
            let ctx = BuildContext::new(
                config,
                Arc::default(),
                FetchCache::new(HashMap::new(), Store::new()),
            );
            Self { dir, ctx }
        }

        async fn routes(&self) -> Vec<Route> {
            RouteResolver::new(self.ctx.config.route_options())
                .resolve(&self.ctx.fetch)
                .await
                .unwrap()
        }

        fn out(&self, path: &str) -> PathBuf {
            self.dir.path().join("dist").join(path)
        }

        fn read(&self, path: &str) -> String {
            std::fs::read_to_string(self.out(path)).unwrap()
        }
    }

    /// Wraps views in a paragraph, stamps parsed markup, fails on `broken`.
    struct Paragraphs;

    #[async_trait]
    impl Plugin for Paragraphs {
        fn name(&self) -> &str {
            "paragraphs"
        }

        fn hooks(&self) -> &[HookName] {
            &[HookName::ViewCompile, HookName::ViewParse]
        }

        async fn view_compile(&self, view: &ViewCompile<'_>) -> HookOutcome<String> {
            if view.route.view == "broken" {
                return Err(PluginError::failed("cannot compile"));
            }
            let source = tokio::fs::read_to_string(&view.route.file).await?;
            Ok(Hook::Claim(format!("<p>{}</p>", source.trim())))
        }

        async fn view_parse(&self, view: &mut ViewParse<'_>) -> HookOutcome<()> {
            view.html.push_str("<!-- parsed -->");
            Ok(Hook::Pass)
        }
    }

    /// Takes over writing for every route.
    struct Discard;

    #[async_trait]
    impl Plugin for Discard {
        fn name(&self) -> &str {
            "discard"
        }

        fn hooks(&self) -> &[HookName] {
            &[HookName::ViewRender]
        }

        async fn view_render(&self, _view: &ViewRender<'_>) -> HookOutcome<()> {
            Ok(Hook::Claim(()))
        }
    }

    #[tokio::test]
    async fn writes_raw_views_without_plugins() {
        let site = Site::new(&[("index.html", "<h1>Home</h1>"), ("about.html", "<h1>About</h1>")]);
        let plugins = PluginRegistry::default();
        let routes = site.routes().await;

        let rendered = Builder::new(&plugins, &site.ctx).build(&routes).await.unwrap();

        assert_eq!(rendered.len(), 2);
        assert_eq!(site.read("index.html"), "<h1>Home</h1>");
        assert_eq!(site.read("about/index.html"), "<h1>About</h1>");
    }

    #[tokio::test]
    async fn compiles_and_parses_through_plugins() {
        let site = Site::new(&[("index.txt", "hello")]);
        let plugins = PluginRegistry::new(vec![Arc::new(Paragraphs)]);
        let routes = site.routes().await;
        let builder = Builder::new(&plugins, &site.ctx);

        builder.build(&routes).await.unwrap();

        assert_eq!(site.read("index.html"), "<p>hello</p><!-- parsed -->");
        assert_eq!(builder.render(&routes[0]).await.unwrap(), "<p>hello</p><!-- parsed -->");
    }

    #[tokio::test]
    async fn claimed_render_skips_the_write() {
        let site = Site::new(&[("index.html", "home")]);
        let plugins = PluginRegistry::new(vec![Arc::new(Discard)]);
        let routes = site.routes().await;

        Builder::new(&plugins, &site.ctx).build(&routes).await.unwrap();

        assert!(!site.out("index.html").exists());
    }

    #[tokio::test]
    async fn failing_route_aborts_later_batches() {
        let site = Site::new(&[("a.txt", "a"), ("broken.txt", "b"), ("c.txt", "c")]);
        let plugins = PluginRegistry::new(vec![Arc::new(Paragraphs)]);
        let routes = site.routes().await;

        let err = Builder::new(&plugins, &site.ctx)
            .with_concurrency(1)
            .build(&routes)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Plugin paragraphs failed in viewCompile: cannot compile"
        );
        assert!(site.out("a/index.html").exists());
        assert!(!site.out("c/index.html").exists());
    }

    #[tokio::test]
    async fn tidy_after_full_build_is_a_no_op() {
        let site = Site::new(&[("index.html", "home"), ("docs/intro.html", "intro")]);
        let plugins = PluginRegistry::default();
        let routes = site.routes().await;
        let builder = Builder::new(&plugins, &site.ctx);
        builder.build(&routes).await.unwrap();

        assert!(builder.tidy(&routes, None).await.is_empty());
        assert!(builder.tidy(&routes, None).await.is_empty());
        assert_eq!(site.read("docs/intro/index.html"), "intro");
    }

    #[tokio::test]
    async fn scan_removes_unreferenced_html_and_empty_dirs() {
        let site = Site::new(&[("index.html", "home")]);
        let plugins = PluginRegistry::default();
        let routes = site.routes().await;
        let builder = Builder::new(&plugins, &site.ctx);
        builder.build(&routes).await.unwrap();

        std::fs::create_dir_all(site.out("old/deep")).unwrap();
        std::fs::write(site.out("old/deep/index.html"), "stale").unwrap();
        std::fs::write(site.out("robots.txt"), "keep").unwrap();

        let removed = builder.tidy(&routes, None).await;

        assert_eq!(removed, vec![site.out("old/deep/index.html")]);
        assert!(!site.out("old").exists());
        assert!(site.out("robots.txt").exists());
        assert!(site.out("index.html").exists());
    }

    #[tokio::test]
    async fn stale_list_is_authoritative() {
        let site = Site::new(&[("index.html", "home"), ("about.html", "about")]);
        let plugins = PluginRegistry::default();
        let routes = site.routes().await;
        let builder = Builder::new(&plugins, &site.ctx);
        builder.build(&routes).await.unwrap();

        std::fs::write(site.out("gone.html"), "old route").unwrap();
        std::fs::write(site.out("stray.html"), "hand made").unwrap();

        let stale = vec![site.out("gone.html"), site.out("about/index.html")];
        let removed = builder.tidy(&routes, Some(&stale)).await;

        assert_eq!(removed, vec![site.out("gone.html")]);
        assert!(site.out("stray.html").exists());
        assert!(site.out("about/index.html").exists());
    }
}

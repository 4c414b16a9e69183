//! Plugins shipped with sencha.

use std::sync::Arc;

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;

use crate::plugin::filters::Filter;
use crate::plugin::hook::{Hook, HookName, HookOutcome, PluginError};
use crate::plugin::traits::{AssetProcess, Plugin, ViewCompile};

/// Compiles `.md` views to HTML and provides the `markdown` filter.
#[derive(Debug, Default)]
pub struct MarkdownPlugin;

impl MarkdownPlugin {
    const HOOKS: &'static [HookName] = &[HookName::ViewCompile];
}

/// Render markdown with tables, footnotes, strikethrough and task lists.
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(source, options));
    out
}

#[async_trait]
impl Plugin for MarkdownPlugin {
    fn name(&self) -> &str {
        "markdown"
    }

    fn hooks(&self) -> &[HookName] {
        Self::HOOKS
    }

    fn filters(&self) -> Vec<(String, Filter)> {
        let markdown: Filter = Arc::new(|input: &Value, _: &[Value]| match input {
            Value::String(source) => Value::String(render_markdown(source)),
            other => other.clone(),
        });
        vec![("markdown".to_string(), markdown)]
    }

    async fn view_compile(&self, view: &ViewCompile<'_>) -> HookOutcome<String> {
        if !matches!(view.route.extension(), Some("md" | "markdown")) {
            return Ok(Hook::Pass);
        }

        let source = tokio::fs::read_to_string(&view.route.file).await?;
        Ok(Hook::Claim(render_markdown(&source)))
    }
}

/// Minifies `.css` assets with lightningcss.
#[derive(Debug, Default)]
pub struct CssMinifyPlugin;

impl CssMinifyPlugin {
    const HOOKS: &'static [HookName] = &[HookName::AssetProcess];
}

/// Minify a stylesheet.
pub fn minify_css(css: &str) -> Result<String, String> {
    use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| format!("CSS minify error: {}", e))?;

    Ok(minified.code)
}

#[async_trait]
impl Plugin for CssMinifyPlugin {
    fn name(&self) -> &str {
        "css-minify"
    }

    /// After format-specific compilers.
    fn priority(&self) -> i32 {
        100
    }

    fn hooks(&self) -> &[HookName] {
        Self::HOOKS
    }

    async fn asset_process(&self, process: &mut AssetProcess<'_>) -> HookOutcome<String> {
        // Compiled stylesheets come back as `.css` children.
        let asset = &process.asset;
        if asset.extension() != Some("css") {
            return Ok(Hook::Pass);
        }

        let source = tokio::fs::read_to_string(&asset.src).await?;
        let minified = minify_css(&source)
            .map_err(|e| PluginError::failed(format!("{}: {}", asset.src.display(), e)))?;

        Ok(Hook::Claim(minified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use sencha_fetch::{FetchCache, Store};
    use sencha_routes::Route;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::assets::AssetPipeline;
    use crate::config::SenchaConfig;
    use crate::context::BuildContext;

    fn context(root: &std::path::Path) -> BuildContext {
        BuildContext::new(
            Arc::new(SenchaConfig::with_root(root)),
            Arc::default(),
            FetchCache::new(HashMap::new(), Store::new()),
        )
    }

    fn route(file: &std::path::Path) -> Route {
        serde_json::from_value(json!({
            "url": "/post", "file": file, "slug": "/post", "out": "dist/post/index.html",
            "view": "post", "lang": "en", "pretty_url": true
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn compiles_markdown_views_only() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let md = dir.path().join("post.md");
        let html = dir.path().join("post.html");
        std::fs::write(&md, "# Title\n\n~~old~~").unwrap();
        std::fs::write(&html, "<p>raw</p>").unwrap();

        let md_route = route(&md);
        let compiled = MarkdownPlugin
            .view_compile(&ViewCompile {
                route: &md_route,
                ctx: &ctx,
            })
            .await
            .unwrap();
        assert_eq!(
            compiled,
            Hook::Claim("<h1>Title</h1>\n<p><del>old</del></p>\n".to_string())
        );

        let html_route = route(&html);
        let passed = MarkdownPlugin
            .view_compile(&ViewCompile {
                route: &html_route,
                ctx: &ctx,
            })
            .await
            .unwrap();
        assert_eq!(passed, Hook::Pass);
    }

    #[test]
    fn markdown_filter_renders_strings() {
        let filters = MarkdownPlugin.filters();
        let (name, filter) = &filters[0];

        assert_eq!(name, "markdown");
        assert_eq!(filter(&json!("*hi*"), &[]), json!("<p><em>hi</em></p>\n"));
        assert_eq!(filter(&json!(3), &[]), json!(3));
    }

    #[tokio::test]
    async fn minifies_css_assets() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let assets = AssetPipeline::new(dir.path(), dir.path().join("out"), "/assets");
        std::fs::write(dir.path().join("site.css"), "body {\n  color: red;\n}\n").unwrap();
        std::fs::write(dir.path().join("app.js"), "let a = 1;").unwrap();

        let mut css = assets.include("site.css", None);
        let outcome = CssMinifyPlugin
            .asset_process(&mut AssetProcess {
                asset: &mut css,
                ctx: &ctx,
            })
            .await
            .unwrap();
        assert_eq!(outcome, Hook::Claim("body{color:red}".to_string()));

        let mut js = assets.include("app.js", None);
        let outcome = CssMinifyPlugin
            .asset_process(&mut AssetProcess {
                asset: &mut js,
                ctx: &ctx,
            })
            .await
            .unwrap();
        assert_eq!(outcome, Hook::Pass);
    }
}

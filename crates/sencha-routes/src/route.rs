//! The route record and its url/output formatting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::params::RouteParams;

/// One concrete (locale, parameters, slug) combination mapped to one output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Public url (`/about` or `/about.html`)
    pub url: String,

    /// Source view file
    pub file: PathBuf,

    /// Slug before pretty-url formatting
    pub slug: String,

    /// Output file
    pub out: PathBuf,

    /// View id: path relative to the views root without extension
    pub view: String,

    /// Language of this route
    pub lang: String,

    /// Data payload merged from route data loaders
    #[serde(default)]
    pub data: Value,

    /// Parameter record used to fill the slug placeholders
    #[serde(default)]
    pub params: RouteParams,

    /// Whether `url` is a pretty url
    pub pretty_url: bool,

    /// Other parameter instances of the same slug pattern
    #[serde(default)]
    pub siblings: Vec<RouteLink>,

    /// Other-locale variants of the same base slug
    #[serde(default)]
    pub localized: Vec<RouteLink>,
}

/// A lightweight reference from one route to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLink {
    pub url: String,
    pub slug: String,
    pub lang: String,
    #[serde(default)]
    pub params: RouteParams,
}

impl Route {
    /// Reference to this route for sibling/localized lists.
    pub fn link(&self) -> RouteLink {
        RouteLink {
            url: self.url.clone(),
            slug: self.slug.clone(),
            lang: self.lang.clone(),
            params: self.params.clone(),
        }
    }

    /// Source file extension, without the dot.
    pub fn extension(&self) -> Option<&str> {
        self.file.extension().and_then(|e| e.to_str())
    }
}

/// Format the public url of a slug.
///
/// Pretty urls are the slug itself; otherwise `.html` is appended and the
/// root slug becomes `/index.html`.
pub fn format_url(slug: &str, pretty: bool) -> String {
    if pretty {
        slug.to_string()
    } else if slug == "/" {
        "/index.html".to_string()
    } else {
        format!("{}.html", slug)
    }
}

/// Compute the output file for a url under the output root.
pub fn output_path(out_dir: &Path, url: &str) -> PathBuf {
    let relative = url.trim_start_matches('/');

    if relative.ends_with(".html") {
        out_dir.join(relative)
    } else if relative.is_empty() {
        out_dir.join("index.html")
    } else {
        out_dir.join(relative).join("index.html")
    }
}

/// Find a route by url.
///
/// Trailing slashes, `.html` suffixes and `/index` are ignored on both sides,
/// so `/about/`, `/about.html` and `/about` all match the same route.
pub fn find_route<'a>(routes: &'a [Route], url: &str) -> Option<&'a Route> {
    let wanted = url_key(url);
    routes.iter().find(|route| url_key(&route.url) == wanted)
}

fn url_key(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.strip_suffix(".html").unwrap_or(path);
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix("/index").unwrap_or(path);
    if path == "index" || path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(url: &str) -> Route {
        Route {
            url: url.to_string(),
            file: PathBuf::from("about.md"),
            slug: url.to_string(),
            out: PathBuf::new(),
            view: "about".to_string(),
            lang: "en".to_string(),
            data: Value::Null,
            params: RouteParams::new(),
            pretty_url: true,
            siblings: Vec::new(),
            localized: Vec::new(),
        }
    }

    #[test]
    fn formats_pretty_and_plain_urls() {
        assert_eq!(format_url("/about", true), "/about");
        assert_eq!(format_url("/about", false), "/about.html");
        assert_eq!(format_url("/", false), "/index.html");
        assert_eq!(format_url("/", true), "/");
    }

    #[test]
    fn computes_output_paths() {
        let out = Path::new("dist");
        assert_eq!(output_path(out, "/"), PathBuf::from("dist/index.html"));
        assert_eq!(output_path(out, "/about"), PathBuf::from("dist/about/index.html"));
        assert_eq!(output_path(out, "/about.html"), PathBuf::from("dist/about.html"));
        assert_eq!(output_path(out, "/index.html"), PathBuf::from("dist/index.html"));
        assert_eq!(
            output_path(out, "/fr/projects/a"),
            PathBuf::from("dist/fr/projects/a/index.html")
        );
    }

    #[test]
    fn finds_routes_by_url_variants() {
        let routes = vec![route("/"), route("/about")];

        assert_eq!(find_route(&routes, "/about/").map(|r| r.url.as_str()), Some("/about"));
        assert_eq!(find_route(&routes, "/about.html").map(|r| r.url.as_str()), Some("/about"));
        assert_eq!(find_route(&routes, "/index.html").map(|r| r.url.as_str()), Some("/"));
        assert!(find_route(&routes, "/missing").is_none());
    }
}

//! Named endpoints and shorthand url resolution.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::request::FetchInit;

/// Hook run before a request to an endpoint is sent.
#[async_trait]
pub trait BeforeFetch: Send + Sync {
    /// Rewrite the url and request parameters.
    async fn before_fetch(&self, url: String, init: FetchInit) -> (String, FetchInit);
}

/// Hook run on a parsed response before it is cached and returned.
#[async_trait]
pub trait AfterFetch: Send + Sync {
    async fn after_fetch(&self, result: Value) -> Value;
}

/// Endpoint as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base url that shorthand paths are appended to
    pub url: String,

    /// Headers sent with every request to this endpoint
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// A named external base url with optional request/response hooks.
#[derive(Clone)]
pub struct Endpoint {
    /// Base url
    pub url: String,

    /// Default headers, explicit request headers win
    pub headers: BTreeMap<String, String>,

    before: Option<Arc<dyn BeforeFetch>>,
    after: Option<Arc<dyn AfterFetch>>,
}

impl Endpoint {
    /// Create an endpoint without hooks.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            before: None,
            after: None,
        }
    }

    /// Add a default header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Install the request rewrite hook.
    pub fn with_before_fetch(mut self, hook: Arc<dyn BeforeFetch>) -> Self {
        self.before = Some(hook);
        self
    }

    /// Install the response transform hook.
    pub fn with_after_fetch(mut self, hook: Arc<dyn AfterFetch>) -> Self {
        self.after = Some(hook);
        self
    }

    pub fn before_fetch(&self) -> Option<&Arc<dyn BeforeFetch>> {
        self.before.as_ref()
    }

    pub fn after_fetch(&self) -> Option<&Arc<dyn AfterFetch>> {
        self.after.as_ref()
    }

    /// Join a shorthand path onto the base url.
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("before_fetch", &self.before.is_some())
            .field("after_fetch", &self.after.is_some())
            .finish()
    }
}

impl From<EndpointConfig> for Endpoint {
    fn from(config: EndpointConfig) -> Self {
        config
            .headers
            .iter()
            .fold(Endpoint::new(config.url.clone()), |endpoint, (name, value)| {
                endpoint.with_header(name, value)
            })
    }
}

/// Outcome of resolving a fetch target.
#[derive(Debug, Clone)]
pub struct ResolvedUrl {
    /// Absolute url, or the literal target when it could not be resolved
    pub url: String,

    /// Endpoint the shorthand resolved against
    pub endpoint: Option<Endpoint>,
}

/// Resolve `endpoint:/path` shorthands and pass absolute urls through.
///
/// Unknown prefixes are kept as a literal path and logged.
pub fn resolve_url(target: &str, endpoints: &HashMap<String, Endpoint>) -> ResolvedUrl {
    if target.starts_with("http://") || target.starts_with("https://") {
        return ResolvedUrl {
            url: target.to_string(),
            endpoint: None,
        };
    }

    if let Some((name, path)) = target.split_once(':') {
        if let Some(endpoint) = endpoints.get(name) {
            return ResolvedUrl {
                url: endpoint.join(path),
                endpoint: Some(endpoint.clone()),
            };
        }
    }

    tracing::warn!(resource = %target, "no endpoint matches fetch target, using it as a path");

    ResolvedUrl {
        url: target.to_string(),
        endpoint: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> HashMap<String, Endpoint> {
        HashMap::from([("api".to_string(), Endpoint::new("https://api.example.com/v1/"))])
    }

    #[test]
    fn resolves_shorthand_against_endpoint() {
        let resolved = resolve_url("api:/posts?limit=2", &endpoints());

        assert_eq!(resolved.url, "https://api.example.com/v1/posts?limit=2");
        assert!(resolved.endpoint.is_some());
    }

    #[test]
    fn passes_absolute_urls_through() {
        let resolved = resolve_url("https://example.com/feed.json", &endpoints());

        assert_eq!(resolved.url, "https://example.com/feed.json");
        assert!(resolved.endpoint.is_none());
    }

    #[test]
    fn keeps_unknown_prefix_as_literal_path() {
        let resolved = resolve_url("cms:/pages", &endpoints());

        assert_eq!(resolved.url, "cms:/pages");
        assert!(resolved.endpoint.is_none());
    }

    #[test]
    fn converts_config_headers() {
        let config = EndpointConfig {
            url: "https://cms.example.com".to_string(),
            headers: BTreeMap::from([("Authorization".to_string(), "Bearer x".to_string())]),
        };
        let endpoint = Endpoint::from(config);

        assert_eq!(endpoint.headers["authorization"], "Bearer x");
        assert_eq!(endpoint.join("pages"), "https://cms.example.com/pages");
    }
}

//! Request parameters and canonical request keys.

use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Parameters of a fetch call.
#[derive(Debug, Clone, Default)]
pub struct FetchInit {
    /// HTTP method, `GET` unless set
    pub method: Method,

    /// Request headers, names lowercased
    pub headers: BTreeMap<String, String>,

    /// Request body
    pub body: Option<String>,

    /// Skip the result cache and in-flight coalescing
    pub no_cache: bool,

    /// Status the response must have; any 2xx when unset
    pub status: Option<u16>,

    /// Value resolved on failure instead of `None`
    pub default: Option<Value>,

    /// Store key that receives the resolved value
    pub store_key: Option<String>,
}

impl FetchInit {
    /// A plain cacheable `GET`.
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Always perform a fresh request.
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Require an exact response status.
    pub fn expect_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Resolve to `value` when the request fails.
    pub fn or_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Write the resolved value into the shared store under `key`.
    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    /// Whether a completed response may be served from the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET && !self.no_cache
    }
}

/// Canonical key of a request: sorted JSON of url, body and headers.
pub fn request_key(url: &str, init: &FetchInit) -> String {
    #[derive(Serialize)]
    struct Key<'a> {
        body: Option<&'a str>,
        headers: &'a BTreeMap<String, String>,
        url: &'a str,
    }

    let key = Key {
        body: init.body.as_deref(),
        headers: &init.headers,
        url,
    };

    serde_json::to_string(&key).unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_header_order_and_case() {
        let a = FetchInit::get().header("Accept", "json").header("x-token", "1");
        let b = FetchInit::get().header("X-Token", "1").header("accept", "json");

        assert_eq!(request_key("https://a.test/", &a), request_key("https://a.test/", &b));
    }

    #[test]
    fn keys_differ_by_body() {
        let a = FetchInit::get().method(Method::POST).body("{\"q\":1}");
        let b = FetchInit::get().method(Method::POST).body("{\"q\":2}");

        assert_ne!(request_key("https://a.test/", &a), request_key("https://a.test/", &b));
    }

    #[test]
    fn only_plain_gets_are_cacheable() {
        assert!(FetchInit::get().is_cacheable());
        assert!(!FetchInit::get().no_cache().is_cacheable());
        assert!(!FetchInit::get().method(Method::POST).is_cacheable());
    }
}

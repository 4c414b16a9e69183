//! Deduplicating, caching fetch client.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::endpoint::{resolve_url, Endpoint};
use crate::request::{request_key, FetchInit};
use crate::store::Store;

type PendingFetch = Shared<BoxFuture<'static, Option<Value>>>;

/// Reasons a request did not produce a value.
#[derive(Debug, thiserror::Error)]
enum FetchFailure {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Fetch client shared by every data loader and plugin of a build.
///
/// Cloning is cheap; clones share the cache, the in-flight map and the store.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    endpoints: HashMap<String, Endpoint>,
    completed: Mutex<HashMap<String, Value>>,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
    store: Store,
}

/// A request after url resolution, owned by the future that sends it.
struct Request {
    key: String,
    url: String,
    init: FetchInit,
    endpoint: Option<Endpoint>,
}

impl FetchCache {
    /// Create a client for the given endpoint table.
    pub fn new(endpoints: HashMap<String, Endpoint>, store: Store) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: reqwest::Client::new(),
                endpoints,
                completed: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                store,
            }),
        }
    }

    /// The shared key/value store.
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Configured endpoints.
    pub fn endpoints(&self) -> &HashMap<String, Endpoint> {
        &self.inner.endpoints
    }

    /// Drop every completed result.
    pub fn clear(&self) {
        self.inner.completed.lock().clear();
    }

    /// Number of completed results held.
    pub fn cached_len(&self) -> usize {
        self.inner.completed.lock().len()
    }

    /// Fetch a url or `endpoint:/path` shorthand.
    ///
    /// Never fails: errors resolve to `init.default` when set, otherwise they
    /// are logged and `None` is returned.
    pub async fn fetch(&self, target: &str, init: FetchInit) -> Option<Value> {
        let resolved = resolve_url(target, &self.inner.endpoints);
        let mut init = init;

        if let Some(endpoint) = &resolved.endpoint {
            for (name, value) in &endpoint.headers {
                init.headers
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        // Joined and cached requests still fill this caller's store key.
        let store_key = init.store_key.clone();
        let request = Request {
            key: request_key(&resolved.url, &init),
            url: resolved.url,
            init,
            endpoint: resolved.endpoint,
        };

        let value = if request.init.no_cache {
            self.inner.settle(request).await
        } else {
            self.pending(request).await
        };

        if let (Some(key), Some(value)) = (store_key, &value) {
            self.inner.store.set(key, value.clone());
        }
        value
    }

    /// Join the in-flight request for this key, or start it.
    fn pending(&self, request: Request) -> PendingFetch {
        // Lock order: in_flight, then completed. The settling future takes
        // them one at a time, so a caller sees either the pending entry or
        // the completed result.
        let mut in_flight = self.inner.in_flight.lock();

        if request.init.is_cacheable() {
            if let Some(hit) = self.inner.completed.lock().get(&request.key) {
                tracing::debug!(url = %request.url, "fetch cache hit");
                let hit = Some(hit.clone());
                return async move { hit }.boxed().shared();
            }
        }

        if let Some(pending) = in_flight.get(&request.key) {
            tracing::debug!(url = %request.url, "joining in-flight fetch");
            return pending.clone();
        }

        let key = request.key.clone();
        let inner = Arc::clone(&self.inner);
        let pending = async move {
            let key = request.key.clone();
            let value = inner.settle(request).await;
            inner.in_flight.lock().remove(&key);
            value
        }
        .boxed()
        .shared();

        in_flight.insert(key, pending.clone());
        pending
    }
}

impl Inner {
    /// Run hooks, send the request and resolve failures to defaults.
    async fn settle(&self, request: Request) -> Option<Value> {
        let Request {
            key,
            mut url,
            mut init,
            endpoint,
        } = request;

        if let Some(hook) = endpoint.as_ref().and_then(Endpoint::before_fetch) {
            (url, init) = hook.before_fetch(url, init).await;
        }

        match self.send(&url, &init).await {
            Ok(mut value) => {
                if let Some(hook) = endpoint.as_ref().and_then(Endpoint::after_fetch) {
                    value = hook.after_fetch(value).await;
                }

                if init.is_cacheable() {
                    self.completed.lock().insert(key, value.clone());
                }

                tracing::debug!(url = %url, "fetch complete");
                Some(value)
            }
            Err(failure) => match init.default {
                Some(default) => {
                    tracing::warn!(url = %url, error = %failure, "fetch failed, using default");
                    Some(default)
                }
                None => {
                    tracing::warn!(url = %url, error = %failure, "fetch failed");
                    None
                }
            },
        }
    }

    async fn send(&self, url: &str, init: &FetchInit) -> Result<Value, FetchFailure> {
        let mut builder = self.client.request(init.method.clone(), url);
        for (name, value) in &init.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &init.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();

        let accepted = match init.status {
            Some(expected) => status.as_u16() == expected,
            None => status.is_success(),
        };
        if !accepted {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));

        let text = response.text().await?;

        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(Value::String(text))
        }
    }
}

//! Fetch client for sencha data loaders.
//!
//! Resolves `endpoint:/path` shorthands against configured endpoints,
//! coalesces concurrent identical requests, caches completed GET responses
//! and degrades to configured defaults instead of failing.

pub mod cache;
pub mod endpoint;
pub mod request;
pub mod store;

pub use cache::FetchCache;
pub use endpoint::{resolve_url, AfterFetch, BeforeFetch, Endpoint, EndpointConfig, ResolvedUrl};
pub use request::{request_key, FetchInit};
pub use store::Store;

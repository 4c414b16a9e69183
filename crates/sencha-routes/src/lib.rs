//! Route expansion for sencha.
//!
//! Turns a tree of view files, a route pattern, a locale list and per-view
//! parameter records into concrete [`Route`]s with computed slugs, urls and
//! output paths, cross-linked to their siblings and localized variants.

pub mod params;
pub mod resolver;
pub mod route;
pub mod slug;

pub use params::{
    fill_route_params, find_route_params, has_route_params, route_param_names, ParamsTable,
    RouteParams,
};
pub use resolver::{
    expand_routes, RouteDataLoader, RouteError, RouteOptions, RouteParamsProvider, RouteResolver,
    GLOBAL_SCOPE,
};
pub use route::{find_route, format_url, output_path, Route, RouteLink};
pub use slug::{normalize_slug, transform_path_to_slug, view_id, SlugOptions, DEFAULT_PATTERN};

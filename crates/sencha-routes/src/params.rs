//! Bracketed route parameters (`/projects/[project]`).

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::slug::view_id;

/// One parameter record: placeholder name to substituted value.
pub type RouteParams = BTreeMap<String, String>;

/// Resolved parameter records keyed by view id.
pub type ParamsTable = HashMap<String, Vec<RouteParams>>;

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]+)\]").expect("route param pattern is valid")
});

/// Whether a slug contains at least one `[name]` placeholder.
///
/// Matching is regex based, so an unclosed bracket is not a placeholder
/// and a bracket pair may span path separators.
pub fn has_route_params(slug: &str) -> bool {
    PARAM_RE.is_match(slug)
}

/// Names of the placeholders in a slug, in order of appearance.
pub fn route_param_names(slug: &str) -> Vec<String> {
    PARAM_RE
        .captures_iter(slug)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Substitute placeholders with values from a parameter record.
///
/// Placeholders without a value are left untouched.
pub fn fill_route_params(slug: &str, params: &RouteParams) -> String {
    PARAM_RE
        .replace_all(slug, |caps: &Captures<'_>| {
            params
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace every placeholder with `[]` so instances of a pattern share a key.
pub fn collapse_route_params(slug: &str) -> String {
    PARAM_RE.replace_all(slug, "[]").into_owned()
}

/// Look up the parameter records registered for a view.
///
/// Both the requested view and the registered keys are normalized (leading
/// slash, separators, extension) before the exact comparison.
pub fn find_route_params<'a>(view: &str, table: &'a ParamsTable) -> &'a [RouteParams] {
    let wanted = view_id(view);

    if let Some(params) = table.get(&wanted) {
        return params;
    }

    table
        .iter()
        .find(|(key, _)| view_id(key) == wanted)
        .map(|(_, params)| params.as_slice())
        .unwrap_or(&[])
}

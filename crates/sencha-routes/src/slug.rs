//! Slug computation from view paths and route patterns.

/// Route pattern used when none is configured.
pub const DEFAULT_PATTERN: &str = "/:slug";

/// Options applied when turning a view path into a slug.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugOptions<'a> {
    /// Locale substituted for `:locale`. `None` removes the segment.
    pub locale: Option<&'a str>,
}

/// Turn a view path into a slug using a route pattern.
///
/// The extension is stripped, a trailing `index` segment collapses into its
/// directory, and `:locale` / `:slug` tokens in `pattern` are substituted.
///
/// ```
/// use sencha_routes::{transform_path_to_slug, SlugOptions};
///
/// assert_eq!(transform_path_to_slug("index", &SlugOptions::default(), None), "/");
/// assert_eq!(transform_path_to_slug("about.pug", &SlugOptions::default(), None), "/about");
/// assert_eq!(
///     transform_path_to_slug("about.njk", &SlugOptions { locale: Some("fr") }, Some("/:locale/:slug")),
///     "/fr/about"
/// );
/// ```
pub fn transform_path_to_slug(path: &str, options: &SlugOptions<'_>, pattern: Option<&str>) -> String {
    let normalized = path.replace('\\', "/");
    let stem = strip_extension(&normalized);
    let stem = stem.trim_matches('/');

    let stem = if stem == "index" {
        ""
    } else {
        stem.strip_suffix("/index").unwrap_or(stem)
    };

    let slug = pattern
        .unwrap_or(DEFAULT_PATTERN)
        .replace(":locale", options.locale.unwrap_or(""))
        .replace(":slug", stem);

    normalize_slug(&slug)
}

/// Compute the view id of a path relative to the views root.
///
/// Separators become `/`, leading slashes and the extension are removed:
/// `blog\[post].md` becomes `blog/[post]`.
pub fn view_id(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    strip_extension(normalized.trim_start_matches('/')).to_string()
}

/// Collapse duplicate slashes, force a leading slash and drop the trailing one.
pub fn normalize_slug(slug: &str) -> String {
    let segments: Vec<&str> = slug.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Strip the extension of the last path segment. Dotfiles keep their name.
fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(0) | None => path,
        Some(dot) => &path[..name_start + dot],
    }
}

//! Path segmentation and prefix arithmetic.
//!
//! Every path that enters the router, at registration or at request time,
//! goes through [`segments`]. That is where the single trailing-slash rule
//! lives: `/users/` and `/users` produce the same segments, so they match the
//! same route. There is no redirect.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Percent-decodes a request path before it is matched.
///
/// Invalid UTF-8 after decoding is replaced, not rejected. An encoded `/`
/// (`%2F`) becomes a separator like any other.
///
/// ```rust
/// use strata::path::decode;
///
/// assert_eq!(decode("/users/a%20b"), "/users/a b");
/// ```
pub fn decode(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8_lossy()
}

/// Splits `path` into its non-empty `/`-separated segments.
///
/// Leading, trailing and repeated separators produce no segments, so `""`,
/// `"/"` and `"//"` all yield nothing (the root).
///
/// ```rust
/// use strata::path::segments;
///
/// assert_eq!(segments("/users//42/"), vec!["users", "42"]);
/// assert!(segments("/").is_empty());
/// ```
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalizes a scope prefix: always starts with `/`, never ends with `/`
/// unless it is the root itself.
pub fn normalize(prefix: &str) -> String {
    let parts = segments(prefix);
    if parts.is_empty() {
        return "/".to_owned();
    }
    let mut out = String::with_capacity(prefix.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Joins a scope prefix and a relative path into a normalized absolute path.
pub fn join(base: &str, path: &str) -> String {
    let base = normalize(base);
    let path = normalize(path);
    match (base.as_str(), path.as_str()) {
        ("/", _) => path,
        (_, "/") => base,
        _ => base + &path,
    }
}

//! Request path canonicalisation.
//!
//! The router never sees the raw request target. [`normalize_path`] strips the query string and
//! fragment, percent-decodes the remainder, then rebuilds a `/`-rooted path segment by segment:
//! empty and `.` segments vanish, `..` pops the last kept segment. A `..` with nothing left to pop
//! is [`WebError::PathEscapesRoot`], reported before anything touches the filesystem.
//!
//! Decoding happens *before* segmentation, so `%2e%2e` is treated exactly like `..`.

use crate::error::WebError;

/// Split a request target into its path and optional query string.
///
/// Any `#fragment` is discarded.
#[must_use]
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    let target = target.split('#').next().unwrap_or("");
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// Canonicalize a raw, percent-encoded request target.
///
/// # Errors
///
/// - [`WebError::InvalidPathEncoding`] if the decoded bytes are not UTF-8
/// - [`WebError::PathEscapesRoot`] if a `..` segment has nothing left to pop
///
/// # Example
///
/// ```rust
/// use webobj::path::normalize_path;
///
/// assert_eq!(normalize_path("/a/./b/../c").unwrap(), "/a/c");
/// assert!(normalize_path("/a/../../b").is_err());
/// ```
pub fn normalize_path(raw: &str) -> Result<String, WebError> {
    let (path, _query) = split_target(raw);
    let decoded = urlencoding::decode(path).map_err(|_| WebError::InvalidPathEncoding)?;

    let mut kept: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if kept.pop().is_none() {
                    return Err(WebError::PathEscapesRoot);
                }
            }
            other => kept.push(other),
        }
    }

    let mut normalized = String::with_capacity(decoded.len() + 1);
    normalized.push('/');
    normalized.push_str(&kept.join("/"));
    Ok(normalized)
}

/// Decode a query string into ordered key/value pairs.
#[must_use]
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(q) => url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_segments_collapse() {
        assert_eq!(normalize_path("/a/./b/../c").unwrap(), "/a/c");
    }

    #[test]
    fn test_normalizing_is_idempotent() {
        let once = normalize_path("/a/./b/../c").unwrap();
        assert_eq!(normalize_path(&once).unwrap(), once);
    }

    #[test]
    fn test_escape_above_root_rejected() {
        assert!(matches!(
            normalize_path("/a/../../b"),
            Err(WebError::PathEscapesRoot)
        ));
        assert!(matches!(
            normalize_path("/.."),
            Err(WebError::PathEscapesRoot)
        ));
    }

    #[test]
    fn test_encoded_parent_segments_decoded_first() {
        assert!(matches!(
            normalize_path("/%2e%2e/etc/passwd"),
            Err(WebError::PathEscapesRoot)
        ));
        assert_eq!(normalize_path("/a/%2E%2E/b").unwrap(), "/b");
        assert_eq!(normalize_path("/hello%20world").unwrap(), "/hello world");
    }

    #[test]
    fn test_empty_segments_and_trailing_slash_dropped() {
        assert_eq!(normalize_path("").unwrap(), "/");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("//a///b/").unwrap(), "/a/b");
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        assert_eq!(normalize_path("/items/42?x=1#top").unwrap(), "/items/42");
        let (path, query) = split_target("/p?x=1&y=two%20words");
        assert_eq!(path, "/p");
        let pairs = parse_query(query);
        assert_eq!(pairs[0], ("x".to_string(), "1".to_string()));
        assert_eq!(pairs[1], ("y".to_string(), "two words".to_string()));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(matches!(
            normalize_path("/%ff%fe"),
            Err(WebError::InvalidPathEncoding)
        ));
    }
}

//! Path helpers for the coordination store.
//!
//! Paths are slash-delimited and case-sensitive. Every stored path is kept
//! in normalized form: a single leading `/`, no empty segments and no
//! trailing `/`.

use crate::error::{PersisterError, PersisterResult};

pub const PATH_DELIM: char = '/';

/// Prefix of every service storage root. Changing it orphans existing data.
pub const SERVICE_ROOT_PREFIX: &str = "dcos-service";

const ESCAPED_DELIM: &str = "__";

/// Normalize a path, rejecting `.` and `..` segments.
pub fn normalize(path: &str) -> PersisterResult<String> {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split(PATH_DELIM).filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(PersisterError::InvalidPath(path.to_string()));
        }
        out.push(PATH_DELIM);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(PATH_DELIM);
    }
    Ok(out)
}

/// Join a relative path onto a root. Both sides are normalized.
pub fn join(root: &str, path: &str) -> PersisterResult<String> {
    let root = normalize(root)?;
    let path = normalize(path)?;
    Ok(match (root.as_str(), path.as_str()) {
        ("/", _) => path,
        (_, "/") => root,
        _ => format!("{root}{path}"),
    })
}

/// Parent of a normalized path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind(PATH_DELIM) {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a normalized path.
pub fn name(path: &str) -> &str {
    path.rsplit(PATH_DELIM).next().unwrap_or(path)
}

/// Proper ancestors of a normalized path, outermost first, excluding `/`.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == "/" {
            break;
        }
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}

/// True if `candidate` is `path` itself or lies underneath it.
pub fn is_within(candidate: &str, path: &str) -> bool {
    if path == "/" {
        return true;
    }
    candidate == path
        || (candidate.starts_with(path) && candidate[path.len()..].starts_with(PATH_DELIM))
}

/// Escape a service name into a single path segment.
///
/// A leading slash (folder-style names such as `/myteam/database`) is
/// dropped, and remaining slashes become `__`.
pub fn escape_service_name(name: &str) -> String {
    name.trim_start_matches(PATH_DELIM)
        .replace(PATH_DELIM, ESCAPED_DELIM)
}

/// Inverse of [`escape_service_name`] for names without a leading slash
/// and without a literal `__`: `a__b` comes back as `a/b`.
pub fn unescape_service_name(escaped: &str) -> String {
    escaped.replace(ESCAPED_DELIM, "/")
}

/// Storage root for a service: `/dcos-service-<escaped-name>`.
pub fn service_root_path(service_name: &str) -> String {
    format!(
        "/{SERVICE_ROOT_PREFIX}-{}",
        escape_service_name(service_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize("").unwrap(), "/");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("a//b/").unwrap(), "/a/b");
        assert_eq!(normalize("/Tasks/hello-0").unwrap(), "/Tasks/hello-0");
        assert!(normalize("a/../b").is_err());
        assert!(normalize("./a").is_err());
    }

    #[test]
    fn joins_under_root() {
        assert_eq!(join("/dcos-service-x", "servicename").unwrap(), "/dcos-service-x/servicename");
        assert_eq!(join("/dcos-service-x", "/").unwrap(), "/dcos-service-x");
        assert_eq!(join("/", "a/b").unwrap(), "/a/b");
    }

    #[test]
    fn parents_and_ancestors() {
        assert_eq!(parent("/a/b/c"), Some("/a/b"));
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/"), None);
        assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b"]);
        assert!(ancestors("/a").is_empty());
        assert_eq!(name("/a/b/c"), "c");
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn folder_and_dotted_names_get_distinct_roots() {
        assert_eq!(escape_service_name("myteam/database"), "myteam__database");
        assert_eq!(escape_service_name("/myteam/database"), "myteam__database");
        assert_eq!(
            service_root_path("myteam/database"),
            "/dcos-service-myteam__database"
        );
        assert_ne!(
            service_root_path("myteam/database"),
            service_root_path("myteam.database")
        );
        assert_eq!(service_root_path("hello-world"), "/dcos-service-hello-world");
    }

    #[test]
    fn literal_double_underscore_is_not_preserved() {
        assert_eq!(escape_service_name("a__b"), "a__b");
        assert_eq!(unescape_service_name("a__b"), "a/b");
        // Both names share a root; the stored service name tells them apart.
        assert_eq!(service_root_path("a__b"), service_root_path("a/b"));
    }

    proptest! {
        #[test]
        fn escape_round_trips(segments in prop::collection::vec("[a-z0-9][a-z0-9.-]{0,8}", 1..5)) {
            let name = segments.join("/");
            let escaped = escape_service_name(&name);
            prop_assert!(!escaped.contains('/'));
            prop_assert_eq!(unescape_service_name(&escaped), name);
        }
    }
}

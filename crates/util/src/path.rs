//! Binding path arithmetic.
//!
//! Paths are slash separated. Absolute paths start with `/`; relative paths are resolved
//! against the path of a context. Key predicates such as `('42')` are part of a segment.

use bindery_types::OPERATION_MARKER;

/// Joins path parts with `/`, skipping empty parts. A part starting with `(` is appended
/// without a separator so that key predicates attach to the preceding segment.
///
/// ```ignore
/// assert_eq!(build_path(&["/Orders('1')", "Items"]), "/Orders('1')/Items");
/// assert_eq!(build_path(&["Items", "('2')", ""]), "Items('2')");
/// ```
pub fn build_path(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts.iter().filter(|part| !part.is_empty()) {
        if !out.is_empty() && !out.ends_with('/') && !part.starts_with('(') && !part.starts_with('/') {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

/// Resolves `path` against an optional context path.
///
/// Returns `None` for a relative path without context (an unresolved binding).
pub fn resolve_path(path: &str, context_path: Option<&str>) -> Option<String> {
    if path.starts_with('/') {
        return Some(path.to_string());
    }
    let context_path = context_path?;
    if path.is_empty() {
        return Some(context_path.to_string());
    }
    if context_path.ends_with('/') {
        Some(format!("{}{}", context_path, path))
    } else {
        Some(format!("{}/{}", context_path, path))
    }
}

/// Returns the part of `path` below `base_path`, or `None` if `path` is not `base_path`
/// itself or one of its descendants.
pub fn relative_path(path: &str, base_path: &str) -> Option<String> {
    if base_path == "/" {
        return path.strip_prefix('/').map(str::to_string);
    }
    let rest = path.strip_prefix(base_path)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    rest.strip_prefix('/').map(str::to_string)
}

/// Whether the path contains a deferred operation marker anywhere.
pub fn is_deferred_operation_path(path: &str) -> bool {
    path.contains(OPERATION_MARKER)
}

/// Removes a trailing operation marker, if present.
pub fn strip_operation_marker(path: &str) -> &str {
    path.strip_suffix(OPERATION_MARKER).unwrap_or(path)
}

/// The bare operation name of a deferred operation path: last segment without marker.
///
/// `"/Orders('1')/name.space.Confirm(...)"` yields `"name.space.Confirm"`.
pub fn operation_name(path: &str) -> &str {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    strip_operation_marker(last_segment)
}

/// Everything before the last `/` of a relative binding path, or `""` if there is none.
///
/// For `"ToCustomer/name.space.Rate(...)"` this is `"ToCustomer"`: the navigation part in
/// front of the operation segment.
pub fn parent_segment_path(path: &str) -> &str {
    path.rfind('/').map(|index| &path[..index]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_path_joins_and_skips_empty_parts() {
        assert_eq!(build_path(&["/Orders('1')", "Items"]), "/Orders('1')/Items");
        assert_eq!(build_path(&["", "Items", ""]), "Items");
        assert_eq!(build_path(&["Items", "('2')"]), "Items('2')");
        assert_eq!(build_path(&["/", "Orders"]), "/Orders");
        assert_eq!(build_path(&[]), "");
    }

    #[test]
    fn resolve_path_handles_absolute_relative_and_root_context() {
        assert_eq!(resolve_path("/Orders", Some("/Ignored")).as_deref(), Some("/Orders"));
        assert_eq!(resolve_path("Items", Some("/Orders('1')")).as_deref(), Some("/Orders('1')/Items"));
        assert_eq!(resolve_path("Orders", Some("/")).as_deref(), Some("/Orders"));
        assert_eq!(resolve_path("", Some("/Orders('1')")).as_deref(), Some("/Orders('1')"));
        assert_eq!(resolve_path("Items", None), None);
    }

    #[test]
    fn relative_path_requires_segment_boundary() {
        assert_eq!(relative_path("/Orders('1')/Note", "/Orders('1')").as_deref(), Some("Note"));
        assert_eq!(relative_path("/Orders('1')", "/Orders('1')").as_deref(), Some(""));
        assert_eq!(relative_path("/Orders('10')/Note", "/Orders('1')"), None);
        assert_eq!(relative_path("/Customers", "/Orders"), None);
        assert_eq!(relative_path("/Orders", "/").as_deref(), Some("Orders"));
        assert_eq!(relative_path("/Run(...)/value", "/Run(...)").as_deref(), Some("value"));
    }

    #[test]
    fn operation_helpers() {
        assert!(is_deferred_operation_path("/Orders('1')/Confirm(...)"));
        assert!(!is_deferred_operation_path("/Orders('1')"));
        assert_eq!(operation_name("/Orders('1')/name.space.Confirm(...)"), "name.space.Confirm");
        assert_eq!(operation_name("GetCount(...)"), "GetCount");
        assert_eq!(strip_operation_marker("/Orders('1')/Confirm(...)"), "/Orders('1')/Confirm");
        assert_eq!(parent_segment_path("ToCustomer/name.space.Rate(...)"), "ToCustomer");
        assert_eq!(parent_segment_path("name.space.Rate(...)"), "");
    }
}

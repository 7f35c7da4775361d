// Pail - Uniform Bucket Storage
// Copyright (C) 2026 Pail Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Key and path sanitization.
//!
//! Keys are opaque `/`-delimited strings. Validation happens before any
//! I/O is attempted so a structurally invalid name never reaches the
//! backend, let alone leaves a partial write behind.

use std::path::{Path, PathBuf};

use crate::error::{BucketError, BucketResult};

/// Validate a bucket key.
///
/// Rejects empty keys and keys containing a NUL byte, which no backend
/// can address (NUL terminates filesystem paths and is forbidden in
/// document names). A `..` segment is also rejected: on a filesystem
/// backend it would resolve to a path outside the bucket root.
pub fn validate_key(key: &str) -> BucketResult<()> {
    if key.is_empty() {
        return Err(BucketError::invalid_name(key));
    }
    if key.bytes().any(|b| b == 0) {
        return Err(BucketError::invalid_name(key));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(BucketError::invalid_name(key));
    }
    Ok(())
}

/// Validate a local filesystem path supplied by a caller.
///
/// The same structural rules as [`validate_key`] apply: an empty path or
/// a path with an embedded NUL byte is rejected before any I/O.
pub fn validate_local_path(path: &Path) -> BucketResult<()> {
    let raw = path.as_os_str().as_encoded_bytes();
    if raw.is_empty() || raw.contains(&0) {
        return Err(BucketError::invalid_name(path.to_string_lossy()));
    }
    Ok(())
}

/// Join two key fragments with the `/` delimiter.
///
/// Either side may be empty; redundant separators at the join point are
/// collapsed so that `join_key("foo/", "/bar")` and `join_key("foo",
/// "bar")` produce the same key.
pub fn join_key(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}/{rest}"),
    }
}

/// Strip a listing prefix from a full key, yielding the relative part.
///
/// Used by Pull to turn listed keys back into relative mirror paths. If
/// `name` does not actually start with `prefix` it is returned unchanged.
pub fn strip_key_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return name.trim_start_matches('/');
    }
    match name.strip_prefix(prefix) {
        Some(rest) => rest.trim_start_matches('/'),
        None => name,
    }
}

/// Map a `/`-delimited key onto a relative filesystem path.
pub(crate) fn key_to_rel_path(key: &str) -> PathBuf {
    key.split('/').filter(|s| !s.is_empty()).collect()
}

/// Map a relative filesystem path onto a `/`-delimited key.
///
/// Non-UTF-8 path segments are replaced lossily; such names cannot be
/// expressed as keys in the first place.
pub(crate) fn rel_path_to_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_and_empty_keys_are_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key("\u{0}").is_err());
        assert!(validate_key("foo\u{0}bar").is_err());
        assert!(validate_key("foo/bar.txt").is_ok());
    }

    #[test]
    fn parent_directory_segments_are_rejected() {
        assert!(validate_key("..").is_err());
        assert!(validate_key("../evil").is_err());
        assert!(validate_key("foo/../evil").is_err());
        assert!(validate_key("foo/..bar").is_ok());
        assert!(validate_key("foo..bar").is_ok());
    }

    #[test]
    fn local_paths_with_nul_are_rejected() {
        assert!(validate_local_path(Path::new("foo\u{0}bar")).is_err());
        assert!(validate_local_path(Path::new("")).is_err());
        assert!(validate_local_path(Path::new("/tmp/ok")).is_ok());
    }

    #[test]
    fn join_collapses_redundant_separators() {
        assert_eq!(join_key("foo", "bar"), "foo/bar");
        assert_eq!(join_key("foo/", "/bar"), "foo/bar");
        assert_eq!(join_key("", "bar"), "bar");
        assert_eq!(join_key("foo", ""), "foo");
        assert_eq!(join_key("", ""), "");
    }

    #[test]
    fn strip_is_the_inverse_of_join() {
        assert_eq!(strip_key_prefix("foo/bar", "foo"), "bar");
        assert_eq!(strip_key_prefix("foo/bar", ""), "foo/bar");
        assert_eq!(strip_key_prefix("unrelated", "foo"), "unrelated");
        assert_eq!(strip_key_prefix(&join_key("a/b", "c/d"), "a/b"), "c/d");
    }

    #[test]
    fn keys_and_relative_paths_round_trip() {
        let rel = key_to_rel_path("a/b/c.txt");
        assert_eq!(rel, PathBuf::from("a").join("b").join("c.txt"));
        assert_eq!(rel_path_to_key(&rel), "a/b/c.txt");
    }
}

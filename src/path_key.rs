//! Normalized, root-relative path keys.
//!
//! A [`PathKey`] is the only way a path is identified inside a tree, a manifest,
//! or a remote object name. Keys are `/`-separated, never contain `.` or `..`
//! segments, never contain empty segments and never start or end with `/`. The
//! empty key denotes the root of a tree.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathKeyError {
    #[error("Path key is not normalized: {0:?}")]
    NotNormalized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PathKey(String);

/// Lexically normalizes `path` into a [`PathKey`].
///
/// Redundant separators and `.` segments are dropped and `..` pops the previous
/// segment. A `..` at the top is dropped, so the result can never escape the
/// root. No filesystem access takes place and symlinks are not resolved.
pub fn normalize(path: &str) -> PathKey {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    PathKey(segments.join("/"))
}

impl PathKey {
    pub fn root() -> Self {
        PathKey(String::new())
    }

    /// Accepts `s` only if it already is in normal form.
    pub fn parse(s: &str) -> Result<Self, PathKeyError> {
        let key = normalize(s);
        if key.0 != s {
            return Err(PathKeyError::NotNormalized(s.to_string()));
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key of the containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<PathKey> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(PathKey(self.0[..idx].to_string())),
            None => Some(PathKey::root()),
        }
    }

    /// Appends `name` as a single child segment, normalizing the result.
    pub fn join(&self, name: &str) -> PathKey {
        if self.is_root() {
            normalize(name)
        } else {
            normalize(&format!("{}/{}", self.0, name))
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Resolves this key below a local directory.
    pub fn to_local_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PathKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resolves_dot_and_dotdot() {
        assert_eq!(normalize("foo/./bar/foo/.."), normalize("foo/bar"));
        assert_eq!(normalize("foo/bar").as_str(), "foo/bar");
    }

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("a//b///c/").as_str(), "a/b/c");
        assert_eq!(normalize("/a/b").as_str(), "a/b");
    }

    #[test]
    fn test_normalize_never_escapes_root() {
        assert_eq!(normalize("../x").as_str(), "x");
        assert_eq!(normalize("a/../../b").as_str(), "b");
        assert!(normalize("..").is_root());
        assert!(normalize("./.").is_root());
        assert!(normalize("").is_root());
    }

    #[test]
    fn test_normalize_keeps_dotted_names() {
        assert_eq!(normalize("a/.hidden/..b/c.").as_str(), "a/.hidden/..b/c.");
    }

    #[test]
    fn test_normalized_keys_contain_no_dot_segments() {
        let inputs = ["x/./y/../../z", ".././a/./b/..", "a/b/c/../../../.."];
        for input in inputs {
            let key = normalize(input);
            assert!(key.segments().all(|s| s != "." && s != ".."), "{input}");
        }
    }

    #[test]
    fn test_parse_rejects_non_normal_keys() {
        assert!(PathKey::parse("a/b").is_ok());
        assert!(PathKey::parse("").is_ok());
        assert_eq!(
            PathKey::parse("a/../b"),
            Err(PathKeyError::NotNormalized("a/../b".to_string()))
        );
        assert!(PathKey::parse("/a").is_err());
        assert!(PathKey::parse("a/").is_err());
        assert!(PathKey::parse("a//b").is_err());
        assert!(PathKey::parse("..").is_err());
    }

    #[test]
    fn test_parent() {
        let key = normalize("a/b/c.txt");
        assert_eq!(key.parent(), Some(normalize("a/b")));
        assert_eq!(normalize("a").parent(), Some(PathKey::root()));
        assert_eq!(PathKey::root().parent(), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(PathKey::root().join("a"), normalize("a"));
        assert_eq!(normalize("a").join("b"), normalize("a/b"));
    }

    #[test]
    fn test_to_local_path() {
        let root = Path::new("/tmp/restore");
        assert_eq!(
            normalize("a/b.txt").to_local_path(root),
            PathBuf::from("/tmp/restore/a/b.txt")
        );
        assert_eq!(PathKey::root().to_local_path(root), root.to_path_buf());
    }

    #[test]
    fn test_ordering_is_lexical() {
        let mut keys = vec![normalize("b"), normalize("a/z"), normalize("a")];
        keys.sort();
        assert_eq!(keys, vec![normalize("a"), normalize("a/z"), normalize("b")]);
    }
}

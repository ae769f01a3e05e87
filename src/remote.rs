//! Remote addressing: `bucket::remote-dir` specs and object key layout.
//!
//! File content for a target lives under `backup/<remote-dir>/<path-key>`.
//! The manifest lives under a separate top-level namespace,
//! `manifests/<remote-dir>/index.bin`, so no file path key can ever name it.

use crate::path_key::{PathKey, normalize};
use std::fmt;
use std::str::FromStr;

pub const CONTENT_NAMESPACE: &str = "backup";
pub const MANIFEST_NAMESPACE: &str = "manifests";
pub const MANIFEST_NAME: &str = "index.bin";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Incorrect remote bucket/directory parameter {0:?} (expected <bucket>::<remote-dir>)")]
    MissingSeparator(String),
    #[error("Invalid bucket name {0:?}")]
    InvalidBucket(String),
}

/// A parsed `<bucket>::<remote-dir>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub bucket: String,
    pub target: RemoteTarget,
}

impl FromStr for RemoteSpec {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bucket, remote_dir) = s
            .split_once("::")
            .ok_or_else(|| RemoteError::MissingSeparator(s.to_string()))?;

        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
            return Err(RemoteError::InvalidBucket(bucket.to_string()));
        }

        Ok(RemoteSpec {
            bucket: bucket.to_string(),
            target: RemoteTarget::new(remote_dir),
        })
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.bucket, self.target.dir().as_str())
    }
}

/// A backup target within a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    dir: PathKey,
}

impl RemoteTarget {
    pub fn new(remote_dir: &str) -> Self {
        RemoteTarget {
            dir: normalize(remote_dir),
        }
    }

    pub fn dir(&self) -> &PathKey {
        &self.dir
    }

    /// Prefix shared by every content object of this target, with a trailing `/`.
    pub fn content_prefix(&self) -> String {
        format!("{}/", join_key(CONTENT_NAMESPACE, &self.dir))
    }

    pub fn blob_key(&self, path: &PathKey) -> String {
        join_key(&join_key(CONTENT_NAMESPACE, &self.dir), path)
    }

    /// Zero-byte marker object that makes an empty directory visible.
    pub fn directory_marker_key(&self, path: &PathKey) -> String {
        format!("{}/", self.blob_key(path))
    }

    pub fn manifest_key(&self) -> String {
        format!(
            "{}/{}",
            join_key(MANIFEST_NAMESPACE, &self.dir),
            MANIFEST_NAME
        )
    }
}

fn join_key(prefix: &str, key: &PathKey) -> String {
    if key.is_root() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, key.as_str())
    }
}

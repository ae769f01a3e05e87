//! Storage boundary: named blobs in a remote bucket.

use std::path::PathBuf;

mod fs_store;

pub use fs_store::FileSystemStore;

#[cfg(test)]
pub(crate) mod mem_store;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),
    /// Failure affecting a single object. Other objects may still work.
    #[error("Transfer of {key} failed: {source}")]
    Object {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// The backend as a whole is unusable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),
    #[error("Bucket not found: {0}")]
    BucketNotFound(PathBuf),
}

impl StoreError {
    /// Whether the error means no further object operation can succeed.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::BucketNotFound(_)
        )
    }
}

/// Abstraction over a backend that stores named blobs.
pub trait BlobStore {
    /// Store `data` under `key`, replacing any existing object.
    fn put(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError>;
    /// Retrieve the object stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    /// All object keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    /// Whether empty directories need an explicit zero-byte marker object
    /// to be visible.
    fn needs_directory_markers(&self) -> bool {
        false
    }
}

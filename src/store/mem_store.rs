use super::{BlobStore, StoreError};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory bucket with knobs for simulating a misbehaving backend.
#[derive(Default)]
pub struct MemStore {
    objects: BTreeMap<String, Vec<u8>>,
    /// Every successful `put`, in call order.
    pub puts: Vec<String>,
    /// Keys whose transfers fail as a per-object error.
    pub failing_keys: BTreeSet<String>,
    /// When set, every operation fails as if the backend went away.
    pub unavailable: bool,
    pub directory_markers: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces an object's content behind the engine's back.
    pub fn tamper(&mut self, key: &str, data: &[u8]) {
        self.objects.insert(key.to_string(), data.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<&Vec<u8>> {
        self.objects.get(key)
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        if self.failing_keys.contains(key) {
            return Err(StoreError::Object {
                key: key.to_string(),
                source: std::io::Error::other("simulated transfer failure"),
            });
        }
        Ok(())
    }
}

impl BlobStore for MemStore {
    fn put(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        self.check(key)?;
        self.objects.insert(key.to_string(), data.to_vec());
        self.puts.push(key.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check(key)?;
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check(prefix)?;
        Ok(self
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn needs_directory_markers(&self) -> bool {
        self.directory_markers
    }
}

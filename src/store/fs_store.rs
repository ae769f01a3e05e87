use super::{BlobStore, StoreError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A bucket backed by a local directory. Object keys map to relative paths.
///
/// On disk a key and a key below it (`a` and `a/b`) cannot both exist. Writing
/// one removes the other, so a file that became a directory (or the reverse)
/// can still be stored.
pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Opens the bucket at `base_path`, which must already exist.
    pub fn open(base_path: PathBuf) -> Result<Self, StoreError> {
        if !base_path.is_dir() {
            return Err(StoreError::BucketNotFound(base_path));
        }
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Classifies an I/O failure on `key`. Losing the bucket directory
    /// itself makes every later operation fail too.
    fn object_error(&self, key: &str, e: std::io::Error) -> StoreError {
        if !self.base_path.is_dir() {
            StoreError::Unavailable(format!(
                "bucket directory {} disappeared",
                self.base_path.display()
            ))
        } else {
            StoreError::Object {
                key: key.to_string(),
                source: e,
            }
        }
    }

    /// Removes whatever occupies the place of `path` or one of its parent
    /// directories below the bucket root.
    fn clear_conflicts(&self, path: &Path) -> std::io::Result<()> {
        for ancestor in path
            .ancestors()
            .skip(1)
            .take_while(|a| *a != self.base_path.as_path())
        {
            match std::fs::symlink_metadata(ancestor) {
                Ok(metadata) if !metadata.is_dir() => {
                    debug!("Removing object shadowed by a new key: {}", ancestor.display());
                    std::fs::remove_file(ancestor)?;
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        match std::fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => {
                debug!("Removing objects below a new key: {}", path.display());
                std::fs::remove_dir_all(path)
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn write_atomically(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().unwrap_or(&self.base_path);
        std::fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(data)?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl BlobStore for FileSystemStore {
    fn put(&mut self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        debug!("Storing {} ({} bytes)", key, data.len());
        self.clear_conflicts(&path)
            .and_then(|()| self.write_atomically(&path, data))
            .map_err(|e| self.object_error(key, e))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::IsADirectory
                ) && self.base_path.is_dir() =>
            {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(self.object_error(key, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        collect_keys(&self.base_path, "", &mut keys)
            .map_err(|e| self.object_error(prefix, e))?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(dir: &Path, key_prefix: &str, keys: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let key = if key_prefix.is_empty() {
            name
        } else {
            format!("{}/{}", key_prefix, name)
        };

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &key, keys)?;
        } else if file_type.is_file() {
            keys.push(key);
        }
    }
    Ok(())
}

//! Local secret key used to sign and verify manifests.
//!
//! The key file holds raw key bytes. It is created once with restrictive
//! permissions and never leaves the machine. Whoever holds the key can forge
//! a valid manifest, and losing it makes every published manifest
//! unverifiable.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Length of freshly generated keys.
pub const KEY_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Key file is empty: {0}")]
    Empty(PathBuf),
    #[error("Failed to gather randomness: {0}")]
    Random(getrandom::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Wraps existing key material. Empty keys are refused.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            None
        } else {
            Some(SecretKey(bytes))
        }
    }

    /// Generates `KEY_LEN` bytes from the OS random number generator.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = vec![0u8; KEY_LEN];
        getrandom::getrandom(&mut bytes).map_err(KeyError::Random)?;
        Ok(SecretKey(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes redacted>)", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Existing,
    Created,
}

/// Loads the key at `path`, or generates and persists a new one if absent.
pub fn load_or_create(path: &Path) -> Result<(SecretKey, KeyOrigin), KeyError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            info!("Using existing key {}", path.display());
            restrict_permissions(path)?;
            let key = SecretKey::from_bytes(bytes).ok_or_else(|| KeyError::Empty(path.into()))?;
            Ok((key, KeyOrigin::Existing))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Creating new keys in {}", path.display());
            let key = SecretKey::generate()?;
            save(path, &key)?;
            Ok((key, KeyOrigin::Created))
        }
        Err(e) => Err(io_error(e, path)),
    }
}

/// Writes the key atomically: temp file, fsync, rename.
fn save(path: &Path, key: &SecretKey) -> Result<(), KeyError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| io_error(e, parent))?;

    restrict_permissions(temp_file.path())?;

    temp_file
        .write_all(key.bytes())
        .map_err(|e| io_error(e, path))?;
    temp_file.as_file().sync_all().map_err(KeyError::Io)?;

    temp_file
        .persist_noclobber(path)
        .map_err(|e| io_error(e.error, path))?;

    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_error(e, path))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

fn io_error(e: std::io::Error, path: &Path) -> KeyError {
    if e.kind() == ErrorKind::PermissionDenied {
        KeyError::PermissionDenied(path.to_path_buf())
    } else {
        KeyError::Io(e)
    }
}

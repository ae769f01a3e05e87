use crate::checksum::ContentHash;
use crate::index::{self, IndexError, ManifestIntegrityError, VerifiedIndex};
use crate::keystore::SecretKey;
use crate::path_key::PathKey;
use crate::remote::RemoteTarget;
use crate::report::{FileFailure, RunStatus};
use crate::store::{BlobStore, StoreError};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("Restore aborted, manifest cannot be trusted: {0}")]
    ManifestIntegrity(#[from] ManifestIntegrityError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Cannot create restore directory {path}: {source}")]
    LocalRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<IndexError> for RestoreError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Integrity(e) => RestoreError::ManifestIntegrity(e),
            IndexError::Store(e) => RestoreError::Store(e),
        }
    }
}

#[derive(Debug)]
pub struct RestoreReport {
    pub restored: usize,
    pub directories: usize,
    /// Files whose downloaded content did not match the manifest.
    pub compromised: Vec<PathKey>,
    /// Files or directories that could not be transferred or written.
    pub failed: Vec<FileFailure>,
    pub status: RunStatus,
}

#[derive(Debug)]
pub struct VerifyReport {
    pub verified: usize,
    pub compromised: Vec<PathKey>,
    pub failed: Vec<FileFailure>,
    /// Content objects under the target that the manifest does not reference.
    pub unreferenced: Vec<String>,
    pub status: RunStatus,
}

enum Fetched {
    Verified(Vec<u8>),
    Compromised,
    Failed(FileFailure),
}

/// Downloads the blob of `path` and checks it against `expected`.
///
/// Only a systemic store failure is returned as an error.
fn fetch_file(
    store: &dyn BlobStore,
    target: &RemoteTarget,
    path: &PathKey,
    expected: ContentHash,
) -> Result<Fetched, StoreError> {
    let blob_key = target.blob_key(path);
    debug!("Downloading: {}", blob_key);

    let data = match store.get(&blob_key) {
        Ok(data) => data,
        Err(e) if e.is_systemic() => return Err(e),
        Err(e) => return Ok(Fetched::Failed(FileFailure::new(path, e))),
    };

    let actual = ContentHash::of_bytes(&data);
    if actual != expected {
        error!(
            "Content of {} does not match manifest (expected {}, got {})",
            path, expected, actual
        );
        return Ok(Fetched::Compromised);
    }

    Ok(Fetched::Verified(data))
}

/// Restore the signed state of `target` into `local_root`.
///
/// # Behavior
///
/// **Manifest gate:**
/// - The manifest is fetched and verified first. If it is missing, its
///   signature does not match, or it cannot be decoded, the restore aborts
///   before anything is written locally.
///
/// **Per-file policy:**
/// - Every directory in the manifest is created, including empty ones.
/// - Every file is downloaded and re-hashed. Content that does not match the
///   manifest is reported as compromised and not written.
/// - Matching content is written atomically, replacing whatever is at the
///   local path, even if it already has the same content.
/// - Per-object transfer errors and local write errors are recorded and the
///   restore continues. A systemic store failure aborts.
pub fn restore(
    store: &dyn BlobStore,
    key: &SecretKey,
    target: &RemoteTarget,
    local_root: &Path,
) -> Result<RestoreReport, RestoreError> {
    let VerifiedIndex { tree, .. } = index::fetch_required(store, target, key)?;

    std::fs::create_dir_all(local_root).map_err(|source| RestoreError::LocalRoot {
        path: local_root.to_path_buf(),
        source,
    })?;

    let mut directories = 0;
    let mut failed = Vec::new();
    let mut broken_dirs: BTreeSet<PathKey> = BTreeSet::new();

    for (path, _) in tree.directories() {
        let local_path = path.to_local_path(local_root);
        match std::fs::create_dir_all(&local_path) {
            Ok(()) => directories += 1,
            Err(e) => {
                warn!("Failed to create directory {}: {}", local_path.display(), e);
                failed.push(FileFailure::new(path, e));
                broken_dirs.insert(path.clone());
            }
        }
    }

    let mut restored = 0;
    let mut compromised = Vec::new();

    for (path, hash) in tree.files() {
        if path
            .parent()
            .is_some_and(|parent| broken_dirs.contains(&parent))
        {
            failed.push(FileFailure::new(path, "parent directory could not be created"));
            continue;
        }

        match fetch_file(store, target, path, hash)? {
            Fetched::Verified(data) => {
                let local_path = path.to_local_path(local_root);
                match write_atomically(&local_path, &data) {
                    Ok(()) => {
                        info!("Restored {}", path);
                        restored += 1;
                    }
                    Err(e) => {
                        warn!("Failed to write {}: {}", local_path.display(), e);
                        failed.push(FileFailure::new(path, e));
                    }
                }
            }
            Fetched::Compromised => compromised.push(path.clone()),
            Fetched::Failed(failure) => {
                warn!("Failed to download {}: {}", failure.path, failure.reason);
                failed.push(failure);
            }
        }
    }

    let status = RunStatus::from_warnings(!compromised.is_empty() || !failed.is_empty());

    Ok(RestoreReport {
        restored,
        directories,
        compromised,
        failed,
        status,
    })
}

/// Check every blob referenced by the manifest of `target` without writing
/// anything locally.
pub fn verify_remote(
    store: &dyn BlobStore,
    key: &SecretKey,
    target: &RemoteTarget,
) -> Result<VerifyReport, RestoreError> {
    let VerifiedIndex { tree, .. } = index::fetch_required(store, target, key)?;

    let mut verified = 0;
    let mut compromised = Vec::new();
    let mut failed = Vec::new();

    for (path, hash) in tree.files() {
        match fetch_file(store, target, path, hash)? {
            Fetched::Verified(_) => verified += 1,
            Fetched::Compromised => compromised.push(path.clone()),
            Fetched::Failed(failure) => failed.push(failure),
        }
    }

    let mut referenced: BTreeSet<String> = tree
        .files()
        .map(|(path, _)| target.blob_key(path))
        .collect();
    referenced.extend(
        tree.directories()
            .map(|(path, _)| target.directory_marker_key(path)),
    );

    let unreferenced: Vec<String> = store
        .list(&target.content_prefix())?
        .into_iter()
        .filter(|k| !referenced.contains(k))
        .collect();

    let status = RunStatus::from_warnings(!compromised.is_empty() || !failed.is_empty());

    Ok(VerifyReport {
        verified,
        compromised,
        failed,
        unreferenced,
        status,
    })
}

/// Writes to a temporary file next to `path`, then renames it into place.
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(data)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

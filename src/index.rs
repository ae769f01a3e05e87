//! Fetching and publishing the signed manifest of a remote target.

use crate::keystore::SecretKey;
use crate::manifest::{Manifest, ManifestError};
use crate::remote::RemoteTarget;
use crate::store::{BlobStore, StoreError};
use crate::tree::DirectoryTree;
use tracing::{debug, info};

/// The manifest cannot be trusted. Always fatal for the whole operation.
#[derive(Debug, thiserror::Error)]
pub enum ManifestIntegrityError {
    #[error("No manifest found at {0}")]
    Missing(String),
    #[error("Manifest signature mismatch at {0} (tampered manifest or wrong key)")]
    SignatureMismatch(String),
    #[error("Manifest at {key} is signed but unreadable: {source}")]
    Malformed {
        key: String,
        #[source]
        source: ManifestError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Integrity(#[from] ManifestIntegrityError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// A manifest fetched from the store whose signature checked out.
#[derive(Debug)]
pub struct VerifiedIndex {
    pub tree: DirectoryTree,
    pub manifest: Manifest,
}

/// Fetches and verifies the manifest for `target`.
///
/// Returns `Ok(None)` if no manifest was ever published. A manifest that is
/// present but fails verification is an error, never `None`.
pub fn fetch(
    store: &dyn BlobStore,
    target: &RemoteTarget,
    key: &SecretKey,
) -> Result<Option<VerifiedIndex>, IndexError> {
    let manifest_key = target.manifest_key();

    let blob = match store.get(&manifest_key) {
        Ok(blob) => blob,
        Err(StoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    debug!("Fetched manifest {} ({} bytes)", manifest_key, blob.len());

    let manifest = Manifest::from_blob(&blob)
        .map_err(|_| ManifestIntegrityError::SignatureMismatch(manifest_key.clone()))?;

    let tree = match manifest.open(key) {
        Ok(tree) => tree,
        Err(ManifestError::SignatureMismatch) => {
            return Err(ManifestIntegrityError::SignatureMismatch(manifest_key).into());
        }
        Err(source) => {
            return Err(ManifestIntegrityError::Malformed {
                key: manifest_key,
                source,
            }
            .into());
        }
    };

    info!("Verified manifest {}", manifest_key);

    Ok(Some(VerifiedIndex { tree, manifest }))
}

/// Like [`fetch`], but a missing manifest is an integrity error.
pub fn fetch_required(
    store: &dyn BlobStore,
    target: &RemoteTarget,
    key: &SecretKey,
) -> Result<VerifiedIndex, IndexError> {
    fetch(store, target, key)?
        .ok_or_else(|| ManifestIntegrityError::Missing(target.manifest_key()).into())
}

/// Writes `manifest` as the single index object of `target`, replacing any
/// previous one.
pub fn publish(
    store: &mut dyn BlobStore,
    target: &RemoteTarget,
    manifest: &Manifest,
) -> Result<(), StoreError> {
    let manifest_key = target.manifest_key();
    store.put(&manifest_key, &manifest.to_blob())?;
    info!("Published manifest {}", manifest_key);
    Ok(())
}

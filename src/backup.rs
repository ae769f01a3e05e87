use crate::checksum::ContentHash;
use crate::index::{self, IndexError, ManifestIntegrityError};
use crate::keystore::SecretKey;
use crate::manifest::{Manifest, ManifestError};
use crate::path_key::PathKey;
use crate::remote::RemoteTarget;
use crate::report::{FileFailure, RunStatus};
use crate::store::{BlobStore, StoreError};
use crate::tree::{DirectoryTree, TreeAssembler, TreeError, TreeNode, build_tree};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("Previous backup cannot be trusted, refusing to overwrite it: {0}")]
    ManifestIntegrity(#[from] ManifestIntegrityError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<IndexError> for BackupError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Integrity(e) => BackupError::ManifestIntegrity(e),
            IndexError::Store(e) => BackupError::Store(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackupOptions {
    pub follow_symlinks: bool,
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct BackupReport {
    /// Files whose content was uploaded (or would be, on a dry run).
    pub uploaded: Vec<PathKey>,
    /// Files whose content matched the previous manifest.
    pub skipped: usize,
    pub failed: Vec<FileFailure>,
    pub directories: usize,
    /// Whether a previous manifest existed for the target.
    pub had_previous: bool,
    pub status: RunStatus,
}

/// Snapshot `local_root` and publish it as the new state of `target`.
///
/// # Behavior
///
/// **Manifest gate:**
/// - The previous manifest of `target` is fetched and verified before any
///   upload. If none exists the previous tree is treated as empty.
/// - If one exists but fails verification the backup aborts with
///   `ManifestIntegrity` and the store is left untouched.
///
/// **Change detection:**
/// - A file is skipped if the previous manifest has a file at the same key
///   with the same content hash. Everything else is uploaded to
///   `backup/<target>/<key>`.
/// - Uploaded bytes are re-hashed; a file that changed since it was scanned
///   is not uploaded and reported as failed.
///
/// **Partial failure:**
/// - A per-object store error or a local read error is recorded in `failed`
///   and the backup continues. A systemic store error aborts.
/// - A failed file keeps its previous manifest entry when there is one (that
///   content is still stored), and is left out of the new manifest otherwise.
///
/// **Publishing:**
/// - The signed manifest is written last, replacing the previous one. On a
///   dry run nothing at all is written.
pub fn backup(
    store: &mut dyn BlobStore,
    key: &SecretKey,
    local_root: &Path,
    target: &RemoteTarget,
    options: BackupOptions,
) -> Result<BackupReport, BackupError> {
    let local = build_tree(local_root, options.follow_symlinks)?;

    let previous = index::fetch(store, target, key)?;
    let had_previous = previous.is_some();
    let previous = match previous {
        Some(verified) => verified.tree,
        None => {
            info!("No existing backup found");
            DirectoryTree::empty()
        }
    };

    let mut uploaded = Vec::new();
    let mut skipped = 0;
    let mut failed = Vec::new();

    for (path, hash) in local.files() {
        if previous.file_hash(path) == Some(hash) {
            debug!("Unchanged: {}", path);
            skipped += 1;
            continue;
        }

        if options.dry_run {
            info!("Would upload: {}", path);
            uploaded.push(path.clone());
            continue;
        }

        match upload_file(store, local_root, target, path, hash) {
            Ok(()) => uploaded.push(path.clone()),
            Err(UploadError::Fatal(e)) => return Err(e.into()),
            Err(UploadError::Skipped(failure)) => {
                warn!("Failed to upload {}: {}", failure.path, failure.reason);
                failed.push(failure);
            }
        }
    }

    if store.needs_directory_markers() && !options.dry_run {
        for (path, children) in local.directories() {
            if !children.is_empty() {
                continue;
            }
            let marker_key = target.directory_marker_key(path);
            match store.put(&marker_key, &[]) {
                Ok(()) => debug!("Created directory marker {}", marker_key),
                Err(e) if e.is_systemic() => return Err(e.into()),
                Err(e) => {
                    warn!("Failed to create directory marker for {}: {}", path, e);
                    failed.push(FileFailure::new(path, e));
                }
            }
        }
    }

    let directories = local.directories().count();

    if !options.dry_run {
        let failed_paths: BTreeSet<&PathKey> = failed.iter().map(|f| &f.path).collect();
        let published = published_tree(&local, &previous, &failed_paths)?;
        let manifest = Manifest::create(&published, key)?;
        index::publish(store, target, &manifest)?;
    }

    let status = RunStatus::from_warnings(!failed.is_empty());

    Ok(BackupReport {
        uploaded,
        skipped,
        failed,
        directories,
        had_previous,
        status,
    })
}

enum UploadError {
    Fatal(StoreError),
    Skipped(FileFailure),
}

fn upload_file(
    store: &mut dyn BlobStore,
    local_root: &Path,
    target: &RemoteTarget,
    path: &PathKey,
    expected: ContentHash,
) -> Result<(), UploadError> {
    let local_path = path.to_local_path(local_root);
    let data = std::fs::read(&local_path)
        .map_err(|e| UploadError::Skipped(FileFailure::new(path, e)))?;

    if ContentHash::of_bytes(&data) != expected {
        return Err(UploadError::Skipped(FileFailure::new(
            path,
            "file modified during backup",
        )));
    }

    let blob_key = target.blob_key(path);
    info!("Uploading: {}", blob_key);

    match store.put(&blob_key, &data) {
        Ok(()) => Ok(()),
        Err(e) if e.is_systemic() => Err(UploadError::Fatal(e)),
        Err(e) => Err(UploadError::Skipped(FileFailure::new(path, e))),
    }
}

/// The tree to sign: `local`, except that files in `failed` fall back to
/// their entry in `previous`, or are dropped if they have none.
fn published_tree(
    local: &DirectoryTree,
    previous: &DirectoryTree,
    failed: &BTreeSet<&PathKey>,
) -> Result<DirectoryTree, TreeError> {
    if failed.is_empty() {
        return Ok(local.clone());
    }

    let mut assembler = TreeAssembler::new();
    for (path, node) in local.entries() {
        match node {
            TreeNode::Directory { .. } => assembler.add_directory(path.clone())?,
            TreeNode::File { hash } if !failed.contains(path) => {
                assembler.add_file(path.clone(), *hash)?
            }
            TreeNode::File { .. } => {
                if let Some(previous_hash) = previous.file_hash(path) {
                    assembler.add_file(path.clone(), previous_hash)?;
                }
            }
        }
    }
    Ok(assembler.finish())
}

//! In-memory representation of a snapshotted directory tree.
//!
//! A [`DirectoryTree`] is a flat map from [`PathKey`] to [`TreeNode`]. The root
//! directory is always present under the empty key, and every other node has
//! a directory node for each of its ancestors. Trees are built once (from the
//! filesystem or from a manifest) and are read-only afterwards.

use crate::checksum::{ChecksumError, ContentHash, checksum_file};
use crate::dir_list::{DirListError, EntryKind, list_directory};
use crate::path_key::PathKey;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("Parent of {0} is not a directory")]
    MissingParent(PathKey),
    #[error("Duplicate entry: {0}")]
    Duplicate(PathKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Directory { children: BTreeSet<PathKey> },
    File { hash: ContentHash },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    nodes: BTreeMap<PathKey, TreeNode>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl DirectoryTree {
    /// A tree holding only the root directory.
    pub fn empty() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathKey::root(),
            TreeNode::Directory {
                children: BTreeSet::new(),
            },
        );
        DirectoryTree { nodes }
    }

    pub fn get(&self, key: &PathKey) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    pub fn file_hash(&self, key: &PathKey) -> Option<ContentHash> {
        match self.get(key) {
            Some(TreeNode::File { hash }) => Some(*hash),
            _ => None,
        }
    }

    /// Non-root entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&PathKey, &TreeNode)> {
        self.nodes.iter().filter(|(key, _)| !key.is_root())
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathKey, ContentHash)> {
        self.nodes.iter().filter_map(|(key, node)| match node {
            TreeNode::File { hash } => Some((key, *hash)),
            TreeNode::Directory { .. } => None,
        })
    }

    /// Non-root directories in key order.
    pub fn directories(&self) -> impl Iterator<Item = (&PathKey, &BTreeSet<PathKey>)> {
        self.entries().filter_map(|(key, node)| match node {
            TreeNode::Directory { children } => Some((key, children)),
            TreeNode::File { .. } => None,
        })
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }
}

/// Accumulates nodes in arbitrary order and produces a [`DirectoryTree`].
///
/// Parents must be inserted before their children.
pub(crate) struct TreeAssembler {
    tree: DirectoryTree,
}

impl TreeAssembler {
    pub(crate) fn new() -> Self {
        TreeAssembler {
            tree: DirectoryTree::empty(),
        }
    }

    pub(crate) fn add_directory(&mut self, key: PathKey) -> Result<(), TreeError> {
        self.insert(
            key,
            TreeNode::Directory {
                children: BTreeSet::new(),
            },
        )
    }

    pub(crate) fn add_file(&mut self, key: PathKey, hash: ContentHash) -> Result<(), TreeError> {
        self.insert(key, TreeNode::File { hash })
    }

    fn insert(&mut self, key: PathKey, node: TreeNode) -> Result<(), TreeError> {
        let parent = key.parent().ok_or_else(|| TreeError::Duplicate(key.clone()))?;

        if self.tree.nodes.contains_key(&key) {
            return Err(TreeError::Duplicate(key));
        }

        match self.tree.nodes.get_mut(&parent) {
            Some(TreeNode::Directory { children }) => {
                children.insert(key.clone());
            }
            _ => return Err(TreeError::MissingParent(key)),
        }

        self.tree.nodes.insert(key, node);
        Ok(())
    }

    pub(crate) fn finish(self) -> DirectoryTree {
        self.tree
    }
}

/// Walks `root` depth-first and snapshots it into a [`DirectoryTree`].
///
/// Every directory becomes a node, including empty ones. Every regular file is
/// hashed by streaming its content. Symlinks are followed only when
/// `follow_symlinks` is set; there is no cycle detection, so a symlink loop
/// recurses until the OS rejects the path.
pub fn build_tree(root: &Path, follow_symlinks: bool) -> Result<DirectoryTree, TreeError> {
    if !root.is_dir() {
        return Err(TreeError::NotADirectory(root.to_path_buf()));
    }

    info!("Scanning {}", root.display());

    let mut assembler = TreeAssembler::new();
    walk_directory(root, &PathKey::root(), follow_symlinks, &mut assembler)?;
    let tree = assembler.finish();

    debug!(
        "Scanned {} files in {} directories",
        tree.file_count(),
        tree.directories().count()
    );

    Ok(tree)
}

fn walk_directory(
    current_dir: &Path,
    current_key: &PathKey,
    follow_symlinks: bool,
    assembler: &mut TreeAssembler,
) -> Result<(), TreeError> {
    for entry in list_directory(current_dir, follow_symlinks)? {
        let path = current_dir.join(&entry.name);
        let key = current_key.join(&entry.name);

        if entry.via_symlink {
            debug!("Following symlink {}", path.display());
        }

        match entry.kind {
            EntryKind::Dir => {
                assembler.add_directory(key.clone())?;
                walk_directory(&path, &key, follow_symlinks, assembler)?;
            }
            EntryKind::File => {
                let hash = checksum_file(&path)?;
                assembler.add_file(key, hash)?;
            }
        }
    }

    Ok(())
}

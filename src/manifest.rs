//! Canonical serialization and signing of directory trees.
//!
//! The serialized form is a TOML document with a version header and one entry
//! per non-root node, keyed by [`PathKey`] in sorted order. It contains no
//! timestamps, so the same tree always yields the same bytes. The signature
//! is an HMAC-SHA256 over those bytes under the local secret key.
//!
//! On the wire a manifest is a single blob: the 32 byte signature followed by
//! the serialized tree.

use crate::checksum::ContentHash;
use crate::keystore::SecretKey;
use crate::path_key::PathKey;
use crate::tree::{DirectoryTree, TreeAssembler, TreeError, TreeNode};
use crate::util::hashing::{hash_field, hash_u64_field};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_LEN: usize = 32;

const SIGNATURE_DOMAIN: &[u8] = b"TREEVAULT_MANIFEST_V1";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Manifest is not valid UTF-8")]
    NotUtf8,
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),
    #[error("Inconsistent manifest: {0}")]
    Inconsistent(#[from] TreeError),
    #[error("Manifest too short to hold a signature ({0} bytes)")]
    Truncated(usize),
    #[error("Manifest signature mismatch")]
    SignatureMismatch,
    #[error("Secret key rejected by HMAC")]
    InvalidKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
enum ManifestEntry {
    #[serde(rename = "file")]
    File { sha256: ContentHash },
    #[serde(rename = "dir")]
    Dir {},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    version: u32,
}

/// Extracts only the metadata section, ignoring everything else, so that the
/// version can be checked before the rest of the document is interpreted.
#[derive(Debug, Deserialize)]
struct MetadataOnly {
    metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestBody {
    metadata: Metadata,
    #[serde(default)]
    entries: BTreeMap<PathKey, ManifestEntry>,
}

const SUPPORTED_VERSION: u32 = 1;

/// Canonical encoding of `tree`.
pub fn serialize(tree: &DirectoryTree) -> Result<Vec<u8>, ManifestError> {
    let entries = tree
        .entries()
        .map(|(key, node)| {
            let entry = match node {
                TreeNode::File { hash } => ManifestEntry::File { sha256: *hash },
                TreeNode::Directory { .. } => ManifestEntry::Dir {},
            };
            (key.clone(), entry)
        })
        .collect();

    let body = ManifestBody {
        metadata: Metadata {
            version: SUPPORTED_VERSION,
        },
        entries,
    };

    Ok(toml::to_string_pretty(&body)?.into_bytes())
}

/// Decodes bytes produced by [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<DirectoryTree, ManifestError> {
    let content = std::str::from_utf8(bytes).map_err(|_| ManifestError::NotUtf8)?;

    let metadata_only: MetadataOnly = toml::from_str(content)?;
    if metadata_only.metadata.version != SUPPORTED_VERSION {
        return Err(ManifestError::UnsupportedVersion(
            metadata_only.metadata.version,
        ));
    }

    let body: ManifestBody = toml::from_str(content)?;

    // Sorted keys put every directory before its descendants.
    let mut assembler = TreeAssembler::new();
    for (key, entry) in body.entries {
        match entry {
            ManifestEntry::Dir {} => assembler.add_directory(key)?,
            ManifestEntry::File { sha256 } => assembler.add_file(key, sha256)?,
        }
    }

    Ok(assembler.finish())
}

fn keyed_mac(bytes: &[u8], key: &SecretKey) -> Result<HmacSha256, ManifestError> {
    let mut mac =
        HmacSha256::new_from_slice(key.bytes()).map_err(|_| ManifestError::InvalidKey)?;
    hash_field(&mut mac, SIGNATURE_DOMAIN);
    hash_u64_field(&mut mac, u64::from(SUPPORTED_VERSION));
    hash_field(&mut mac, bytes);
    Ok(mac)
}

/// HMAC-SHA256 of `bytes` under `key`.
pub fn sign(bytes: &[u8], key: &SecretKey) -> Result<[u8; SIGNATURE_LEN], ManifestError> {
    Ok(keyed_mac(bytes, key)?.finalize().into_bytes().into())
}

/// Checks `signature` against `bytes` in constant time.
pub fn verify(bytes: &[u8], signature: &[u8], key: &SecretKey) -> bool {
    match keyed_mac(bytes, key) {
        Ok(mac) => mac.verify_slice(signature).is_ok(),
        Err(_) => false,
    }
}

/// A serialized tree together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    serialized_tree: Vec<u8>,
    signature: [u8; SIGNATURE_LEN],
}

impl Manifest {
    /// Serializes and signs `tree`.
    pub fn create(tree: &DirectoryTree, key: &SecretKey) -> Result<Self, ManifestError> {
        let serialized_tree = serialize(tree)?;
        let signature = sign(&serialized_tree, key)?;
        Ok(Manifest {
            serialized_tree,
            signature,
        })
    }

    /// Splits a published blob into signature and body. Nothing is verified.
    pub fn from_blob(blob: &[u8]) -> Result<Self, ManifestError> {
        if blob.len() < SIGNATURE_LEN {
            return Err(ManifestError::Truncated(blob.len()));
        }
        let (signature, serialized_tree) = blob.split_at(SIGNATURE_LEN);
        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(signature);
        Ok(Manifest {
            serialized_tree: serialized_tree.to_vec(),
            signature: sig,
        })
    }

    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(SIGNATURE_LEN + self.serialized_tree.len());
        blob.extend_from_slice(&self.signature);
        blob.extend_from_slice(&self.serialized_tree);
        blob
    }

    pub fn serialized_tree(&self) -> &[u8] {
        &self.serialized_tree
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Verifies the signature and only then decodes the tree.
    pub fn open(&self, key: &SecretKey) -> Result<DirectoryTree, ManifestError> {
        if !verify(&self.serialized_tree, &self.signature, key) {
            return Err(ManifestError::SignatureMismatch);
        }
        deserialize(&self.serialized_tree)
    }
}

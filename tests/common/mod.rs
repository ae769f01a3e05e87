use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BUCKET: &str = "bucket";

/// A scratch area holding a source tree, a store root with one bucket, and a
/// key file location.
pub struct Vault {
    temp: TempDir,
}

// Each integration test file is compiled as its own crate and only uses some
// of these accessors.
#[allow(dead_code)]
impl Vault {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("store").join(BUCKET)).unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        Vault { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("src")
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.root().join("store").join(BUCKET)
    }

    pub fn key_file(&self) -> PathBuf {
        self.root().join("secret.key")
    }

    pub fn write_source(&self, rel: &str, contents: &str) {
        let path = self.source().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Stored object for `key` inside the bucket.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_dir().join(key)
    }
}

/// A `treevault` invocation pointed at the vault's key file and store root,
/// isolated from the caller's environment.
pub fn treevault_cmd(vault: &Vault) -> Command {
    treevault_cmd_with_key(vault, "secret.key")
}

/// Like [`treevault_cmd`], with a key file relative to the vault root.
#[allow(dead_code)]
pub fn treevault_cmd_with_key(vault: &Vault, key_file: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("treevault");
    cmd.env_remove("RUST_LOG")
        .env_remove("TREEVAULT_KEY_FILE")
        .env_remove("TREEVAULT_STORE_ROOT")
        .arg("-C")
        .arg(vault.root())
        .arg("--key-file")
        .arg(key_file)
        .arg("--store-root")
        .arg("store");
    cmd
}

pub fn remote(dir: &str) -> String {
    format!("{}::{}", BUCKET, dir)
}

#[allow(dead_code)]
pub fn backup(vault: &Vault, dir: &str) {
    treevault_cmd(vault)
        .arg("backup")
        .arg("src")
        .arg(remote(dir))
        .assert()
        .success();
}

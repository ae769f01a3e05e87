use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid content hash: {0:?}")]
pub struct InvalidContentHash(String);

/// SHA-256 digest of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        ContentHash(Sha256::digest(bytes).into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, InvalidContentHash> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidContentHash(s.to_string()))?;
        Ok(ContentHash(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes the SHA-256 checksum of a file with concurrent modification detection.
///
/// # Behavior
/// - Records the file's modification time before reading
/// - Reads the file in chunks and computes SHA-256, so files larger than
///   memory are fine
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors
/// - `ChecksumError::Io`: File doesn't exist or other I/O errors
/// - `ChecksumError::PermissionDenied`: Insufficient permissions to read the file
/// - `ChecksumError::ConcurrentModification`: File was detected as being modified while
///   checksumming. Note that the absence of this error is *not* a guarantee that the
///   file was *not* modified.
pub fn checksum_file(path: &Path) -> Result<ContentHash, ChecksumError> {
    debug!("Checksumming {}", path.display());

    let metadata_before = std::fs::metadata(path).map_err(|e| io_error(e, path))?;
    let mtime_before = metadata_before.modified().map_err(ChecksumError::Io)?;

    let mut file = File::open(path).map_err(|e| io_error(e, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ChecksumError::Io)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let metadata_after = std::fs::metadata(path).map_err(ChecksumError::Io)?;
    let mtime_after = metadata_after.modified().map_err(ChecksumError::Io)?;

    if mtime_before != mtime_after {
        return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
    }

    let hash = ContentHash(hasher.finalize().into());

    debug!("Checksum of {} is {}", path.display(), hash);

    Ok(hash)
}

fn io_error(e: std::io::Error, path: &Path) -> ChecksumError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ChecksumError::PermissionDenied(path.to_path_buf())
    } else {
        ChecksumError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_checksum_simple_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Hello, world!").unwrap();
        temp_file.flush().unwrap();

        let result = checksum_file(temp_file.path()).unwrap();

        assert_eq!(
            result.to_hex(),
            "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
        );
    }

    #[test]
    fn test_checksum_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();

        let result = checksum_file(temp_file.path()).unwrap();

        assert_eq!(
            result.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_large_file_matches_in_memory_hash() {
        let mut temp_file = NamedTempFile::new().unwrap();

        // Not a multiple of the read buffer size.
        let content: Vec<u8> = (0..(1024 * 1024 + 17)).map(|i| (i % 251) as u8).collect();
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let result = checksum_file(temp_file.path()).unwrap();

        assert_eq!(result, ContentHash::of_bytes(&content));
    }

    #[test]
    fn test_checksum_nonexistent_file() {
        let result = checksum_file(Path::new("/nonexistent/file.txt"));

        match result {
            Err(ChecksumError::Io(_)) => {}
            _ => panic!("Expected IO error for nonexistent file"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_checksum_permission_denied() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        let mut perms = fs::metadata(temp_file.path()).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(temp_file.path(), perms).unwrap();

        // Root ignores permission bits, nothing to test in that case.
        if File::open(temp_file.path()).is_ok() {
            return;
        }

        match checksum_file(temp_file.path()) {
            Err(ChecksumError::PermissionDenied(_)) => {}
            _ => panic!("Expected PermissionDenied error for permission denied"),
        }
    }

    #[test]
    fn test_hex_round_trip_and_rejection() {
        let hash = ContentHash::of_bytes(b"abc");
        assert_eq!(ContentHash::from_hex(&hash.to_hex()), Ok(hash));
        assert!(ContentHash::from_hex("abc").is_err());
        assert!(ContentHash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_checksum_concurrent_modification() {
        // Races a background thread that keeps bumping the mtime against the
        // checksum operation. With a 5MB file and 100 attempts, failure is
        // extremely unlikely.
        use filetime::{FileTime, set_file_mtime};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = vec![b'X'; 5 * 1024 * 1024];
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let path = temp_file.path().to_path_buf();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let modifier_handle = thread::spawn(move || {
            let mut counter = 0u64;
            while !stop_flag_clone.load(Ordering::Relaxed) {
                counter = counter.wrapping_add(1);
                let mtime = FileTime::from_unix_time(1_000_000_000 + (counter as i64), 0);
                let _ = set_file_mtime(&path, mtime);
            }
        });

        let mut got_concurrent_modification = false;
        for _ in 0..100 {
            match checksum_file(temp_file.path()) {
                Err(ChecksumError::ConcurrentModification(_)) => {
                    got_concurrent_modification = true;
                    break;
                }
                Ok(_) => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("Unexpected error: {}", e),
            }
        }

        stop_flag.store(true, Ordering::Relaxed);
        modifier_handle.join().unwrap();

        assert!(
            got_concurrent_modification,
            "Expected to detect concurrent modification at least once in 100 attempts"
        );
    }
}

//! Non-recursive directory listing.
//!
//! Lists the immediate children of one directory, classifying each as a file
//! or a directory. Symlinks are either resolved to what they point at or
//! dropped, depending on the caller's symlink policy. Anything that is neither
//! a regular file nor a directory (after resolution) is dropped.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Whether the entry was reached through a symlink.
    pub via_symlink: bool,
}

/// Lists the children of `dir`, sorted by name.
///
/// With `follow_symlinks`, a symlink is classified by its target. Dangling
/// symlinks are skipped with a warning. Without it, symlinks are skipped.
pub fn list_directory(dir: &Path, follow_symlinks: bool) -> Result<Vec<FsEntry>, DirListError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| io_error(e, dir))?;

    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(DirListError::Io)?;
        let path = entry.path();

        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| DirListError::NonUtf8Name(path.clone()))?;

        let metadata = std::fs::symlink_metadata(&path).map_err(|e| io_error(e, &path))?;

        let via_symlink = metadata.file_type().is_symlink();
        let metadata = if via_symlink {
            if !follow_symlinks {
                debug!("Skipping symlink {}", path.display());
                continue;
            }
            match std::fs::metadata(&path) {
                Ok(target) => target,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("Skipping dangling symlink {}", path.display());
                    continue;
                }
                Err(e) => return Err(io_error(e, &path)),
            }
        } else {
            metadata
        };

        let kind = if metadata.is_dir() {
            EntryKind::Dir
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            debug!("Skipping special file {}", path.display());
            continue;
        };

        entries.push(FsEntry {
            name,
            kind,
            via_symlink,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(entries)
}

fn io_error(e: std::io::Error, path: &Path) -> DirListError {
    if e.kind() == ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(path.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(entries: &[FsEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_list_simple_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("file1.txt"), "content1").unwrap();
        fs::write(root.join("file2.txt"), "content2").unwrap();
        fs::create_dir(root.join("dir1")).unwrap();
        fs::write(root.join("dir1/file3.txt"), "content3").unwrap();

        let entries = list_directory(root, false).unwrap();

        assert_eq!(names(&entries), vec!["dir1", "file1.txt", "file2.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Dir);
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[2].kind, EntryKind::File);

        let subdir_entries = list_directory(&root.join("dir1"), false).unwrap();
        assert_eq!(names(&subdir_entries), vec!["file3.txt"]);
    }

    #[test]
    fn test_list_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let entries = list_directory(temp_dir.path(), false).unwrap();

        assert!(entries.is_empty());
    }

    #[test]
    fn test_list_deterministic_ordering() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("zebra.txt"), "z").unwrap();
        fs::write(root.join("apple.txt"), "a").unwrap();
        fs::write(root.join("banana.txt"), "b").unwrap();

        let entries1 = list_directory(root, false).unwrap();
        let entries2 = list_directory(root, false).unwrap();

        assert_eq!(names(&entries1), vec!["apple.txt", "banana.txt", "zebra.txt"]);
        assert_eq!(entries1, entries2);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_skipped_without_follow() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("target.txt"), "content").unwrap();
        fs::create_dir(root.join("dir")).unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("dir"), root.join("link_dir")).unwrap();

        let entries = list_directory(root, false).unwrap();

        assert_eq!(names(&entries), vec!["dir", "target.txt"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_resolved_with_follow() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("target.txt"), "content").unwrap();
        fs::create_dir(root.join("dir")).unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("dir"), root.join("link_dir")).unwrap();

        let entries = list_directory(root, true).unwrap();

        assert_eq!(names(&entries), vec!["dir", "link.txt", "link_dir", "target.txt"]);
        assert_eq!(entries[1].kind, EntryKind::File);
        assert!(entries[1].via_symlink);
        assert_eq!(entries[2].kind, EntryKind::Dir);
        assert!(entries[2].via_symlink);
        assert!(!entries[3].via_symlink);
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_symlink_skipped_with_follow() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        std::os::unix::fs::symlink("/nonexistent/target", root.join("broken_link")).unwrap();

        let entries = list_directory(root, true).unwrap();

        assert!(entries.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_fifo_skipped() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        mkfifo(&root.join("pipe"), Mode::S_IRWXU).unwrap();
        fs::write(root.join("file.txt"), "content").unwrap();

        let entries = list_directory(root, true).unwrap();

        assert_eq!(names(&entries), vec!["file.txt"]);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_non_utf8_name_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(OsStr::from_bytes(b"bad\xffname")), "x").unwrap();

        match list_directory(root, false) {
            Err(DirListError::NonUtf8Name(_)) => {}
            other => panic!("Expected NonUtf8Name error, got {:?}", other),
        }
    }

    #[test]
    fn test_list_missing_directory() {
        match list_directory(Path::new("/nonexistent/dir"), false) {
            Err(DirListError::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("Expected IO error, got {:?}", other),
        }
    }
}

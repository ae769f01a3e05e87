pub(super) const ROOT_LONG_ABOUT: &str = "\
Tamper-evident backup and restore of directory trees

Treevault copies a local directory tree into a bucket and records the state of the
whole tree in a single manifest signed with a secret key. On restore, the manifest
signature is checked before anything is written, and every file is re-hashed after
download. Content that does not match the signed manifest is never written locally.

CORE CONCEPTS:

  Buckets and targets:
    A bucket is a directory under --store-root. A target is a directory inside a
    bucket, written as <bucket>::<remote-dir>. Each target has its own manifest.

  Manifest:
    A TOML document listing every file (with its SHA-256) and every directory of
    the backed-up tree, prefixed with an HMAC-SHA256 signature over its bytes.
    Stored at manifests/<remote-dir>/index.bin inside the bucket.

  Secret key:
    Random bytes kept in --key-file (default: secret.key). Created on first use
    with permissions 0600. Without the key that signed a manifest, nothing can
    be restored from it.

TYPICAL WORKFLOW:

  1. Create the bucket once:
     $ mkdir -p /mnt/vault/photos-bucket

  2. Back up a directory:
     $ treevault --store-root /mnt/vault backup ~/Pictures photos-bucket::pictures

  3. Back up again later (only new and changed files are uploaded):
     $ treevault --store-root /mnt/vault backup ~/Pictures photos-bucket::pictures

  4. Check what the bucket holds:
     $ treevault --store-root /mnt/vault verify photos-bucket::pictures

  5. Restore somewhere else:
     $ treevault --store-root /mnt/vault restore /tmp/pictures photos-bucket::pictures

COMMANDS:

  backup
    Scan a local tree, upload new and changed files, and publish a new signed
    manifest. Refuses to run if the existing manifest fails verification.

  restore
    Verify the manifest, then download, re-hash and write every file it lists.
    Files whose content fails verification are reported and skipped.

  list
    Print the tree recorded in the verified manifest, and its signature.

  verify
    Download and re-hash every file in the manifest without writing anything.

GLOBAL OPTIONS:

  -C <DIRECTORY>
    Change to directory before operating (like git -C or make -C).

  --key-file <PATH>
    Secret key file. Also read from TREEVAULT_KEY_FILE.

  --store-root <PATH>
    Directory containing the buckets. Also read from TREEVAULT_STORE_ROOT.

EXIT CODES:

  0:   Completed without warnings
  1:   Completed, but some files were skipped (see log output)
  255: Aborted (untrusted manifest, storage failure, invalid arguments)
";

pub(super) const BACKUP_LONG_ABOUT: &str = "\
Upload new and changed files and publish a signed manifest

USAGE:

  treevault backup <LOCAL_DIR> <bucket>::<remote-dir>

BEHAVIOR:

1. Walks LOCAL_DIR and computes the SHA-256 of every regular file
2. Fetches and verifies the current manifest of the target, if there is one
3. Uploads every file whose hash differs from the manifest, or that is new
4. Signs and publishes a manifest describing the local tree

Unchanged files are never re-uploaded. Files that disappeared locally are dropped
from the new manifest, but their stored content is left in place.

If a file cannot be read or uploaded, the backup continues without it and exits
with status 1. The new manifest keeps the previously recorded version of such a
file, so a later restore still returns the last good copy.

If the existing manifest is present but its signature does not match (tampering
or a different key), the backup aborts before uploading anything.

SYMBOLIC LINKS:

Symbolic links are skipped by default. With --follow-symlinks, the link target is
backed up in place of the link.

EXAMPLES:

  # First backup of a project
  $ treevault backup ./project bucket::project

  # Preview what would be uploaded
  $ treevault -v backup --dry-run ./project bucket::project
";

pub(super) const RESTORE_LONG_ABOUT: &str = "\
Download and verify every file listed in the signed manifest

USAGE:

  treevault restore <LOCAL_DIR> <bucket>::<remote-dir>

BEHAVIOR:

1. Fetches the manifest and checks its signature with the secret key
2. Creates LOCAL_DIR and every directory in the manifest, including empty ones
3. Downloads each file, re-hashes it and compares against the manifest
4. Writes matching files, replacing whatever exists at the same path

Nothing is written if the manifest is missing or its signature does not match.

A file whose downloaded content does not match the manifest is reported as
compromised and is not written. The restore continues with the remaining files
and exits with status 1.

Files in LOCAL_DIR that are not in the manifest are left alone.

EXAMPLES:

  $ treevault restore /tmp/project bucket::project
";

pub(super) const LIST_LONG_ABOUT: &str = "\
Print the tree recorded in the signed manifest

USAGE:

  treevault list <bucket>::<remote-dir>

Prints one line per entry. Directories end with '/'; files show the first digits of
their SHA-256. The base64 manifest signature is printed last.

The listing only happens after the manifest signature has been verified.
";

pub(super) const VERIFY_LONG_ABOUT: &str = "\
Check every stored file against the signed manifest without restoring

USAGE:

  treevault verify <bucket>::<remote-dir>

Verifies the manifest signature, then downloads and re-hashes every file it lists.
Nothing is written locally.

Reports:
  - Compromised files (content differs from the manifest)
  - Files that could not be downloaded
  - Stored objects under the target that the manifest does not reference

Unreferenced objects are informational (for example, content of files deleted since
an earlier backup) and do not affect the exit code.

EXAMPLES:

  # Nightly audit
  0 3 * * * treevault --store-root /mnt/vault verify bucket::project || alert_admin
";

use crate::backup::BackupReport;
use crate::manifest::Manifest;
use crate::report::FileFailure;
use crate::restore::{RestoreReport, VerifyReport};
use crate::tree::{DirectoryTree, TreeNode};
use base64::Engine;

pub fn print_tree(tree: &DirectoryTree) {
    for line in format_tree_lines(tree) {
        println!("{}", line);
    }
}

fn format_tree_lines(tree: &DirectoryTree) -> Vec<String> {
    tree.entries()
        .map(|(path, node)| match node {
            TreeNode::Directory { .. } => format!("{}/", path),
            TreeNode::File { hash } => {
                format!("{}  sha256: {}", path, truncate_sha256(&hash.to_hex()))
            }
        })
        .collect()
}

pub fn format_signature(manifest: &Manifest) -> String {
    base64::engine::general_purpose::STANDARD.encode(manifest.signature())
}

/// One-line summary of a backup, e.g. `Uploaded 2 files + 1 index file (5 unchanged, 3 directories)`.
pub fn backup_summary(report: &BackupReport, dry_run: bool) -> String {
    let counts = format!(
        "({} unchanged, {} directories)",
        report.skipped, report.directories
    );
    if dry_run {
        format!("Would upload {} files {}", report.uploaded.len(), counts)
    } else {
        format!(
            "Uploaded {} files + 1 index file {}",
            report.uploaded.len(),
            counts
        )
    }
}

pub fn restore_summary(report: &RestoreReport) -> String {
    format!(
        "Restored {} files, {} directories",
        report.restored, report.directories
    )
}

pub fn print_backup_report(report: &BackupReport) {
    for path in &report.uploaded {
        println!("{:<2} {}", "U", path);
    }
    print_failures(&report.failed);
}

pub fn print_restore_report(report: &RestoreReport) {
    for path in &report.compromised {
        println!("{:<2} {}", "C", path);
    }
    print_failures(&report.failed);
}

pub fn print_verify_report(report: &VerifyReport) {
    for path in &report.compromised {
        println!("{:<2} {}", "C", path);
    }
    print_failures(&report.failed);
    for key in &report.unreferenced {
        println!("{:<2} {}", "?", key);
    }
}

fn print_failures(failures: &[FileFailure]) {
    for line in failures.iter().map(format_failure) {
        println!("{}", line);
    }
}

fn format_failure(failure: &FileFailure) -> String {
    format!("{:<2} {}: {}", "F", failure.path, failure.reason)
}

fn truncate_sha256(sha256: &str) -> String {
    if sha256.len() > 12 {
        format!("{}...", &sha256[..12])
    } else {
        sha256.to_string()
    }
}

mod help_text;

use crate::remote::RemoteSpec;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tamper-evident backup and restore of directory trees
#[derive(Parser, Debug)]
#[command(name = "treevault", version, about, long_about = help_text::ROOT_LONG_ABOUT)]
pub struct Cli {
    /// Change to DIRECTORY before doing anything
    #[arg(short = 'C', global = true, value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Increase log output (-v for info, -vv for debug). Takes precedence over RUST_LOG.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        conflicts_with = "verbose"
    )]
    pub log_level: Option<LogLevel>,

    /// Secret key used to sign and verify manifests (created if missing)
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TREEVAULT_KEY_FILE",
        default_value = "secret.key"
    )]
    pub key_file: PathBuf,

    /// Directory holding one subdirectory per bucket
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TREEVAULT_STORE_ROOT",
        default_value = "."
    )]
    pub store_root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload new and changed files and publish a signed manifest
    #[command(long_about = help_text::BACKUP_LONG_ABOUT)]
    Backup {
        /// Local directory to back up
        #[arg(value_name = "LOCAL_DIR")]
        local_dir: PathBuf,

        /// Destination as <bucket>::<remote-dir>
        #[arg(value_name = "REMOTE")]
        remote: RemoteSpec,

        /// Back up the targets of symbolic links instead of skipping them
        #[arg(long)]
        follow_symlinks: bool,

        /// Report what would be uploaded without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Download and verify every file listed in the signed manifest
    #[command(long_about = help_text::RESTORE_LONG_ABOUT)]
    Restore {
        /// Local directory to restore into (created if missing)
        #[arg(value_name = "LOCAL_DIR")]
        local_dir: PathBuf,

        /// Source as <bucket>::<remote-dir>
        #[arg(value_name = "REMOTE")]
        remote: RemoteSpec,
    },

    /// Print the tree recorded in the signed manifest
    #[command(long_about = help_text::LIST_LONG_ABOUT)]
    List {
        /// Source as <bucket>::<remote-dir>
        #[arg(value_name = "REMOTE")]
        remote: RemoteSpec,
    },

    /// Check every stored file against the signed manifest without restoring
    #[command(long_about = help_text::VERIFY_LONG_ABOUT)]
    Verify {
        /// Source as <bucket>::<remote-dir>
        #[arg(value_name = "REMOTE")]
        remote: RemoteSpec,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

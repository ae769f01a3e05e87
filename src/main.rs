mod backup;
mod checksum;
mod cli;
mod dir_list;
mod display;
mod index;
mod keystore;
mod manifest;
mod path_key;
mod remote;
mod report;
mod restore;
mod store;
mod tree;
mod util;

use backup::BackupOptions;
use cli::{Cli, Command, LogLevel};
use keystore::{KeyOrigin, SecretKey};
use remote::RemoteSpec;
use report::RunStatus;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use store::FileSystemStore;
use tracing::{Event, Level, Subscriber, debug, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct VaultExitCode;

impl VaultExitCode {
    fn from_status(status: RunStatus) -> ExitCode {
        match status {
            RunStatus::Complete => ExitCode::SUCCESS,
            RunStatus::CompletedWithWarnings => Self::completed_with_warnings(),
        }
    }

    /// Exit code used when the run finished but some files were skipped.
    fn completed_with_warnings() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used when the run was aborted (untrusted manifest, storage
    /// failure, invalid arguments, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

/// Settings shared by every subcommand.
struct Context {
    key_file: PathBuf,
    store_root: PathBuf,
}

impl Context {
    fn load_key(&self) -> anyhow::Result<SecretKey> {
        let (key, origin) = keystore::load_or_create(&self.key_file)?;
        if origin == KeyOrigin::Created {
            warn!(
                "Generated a new secret key at {}. Keep a copy: backups cannot be restored without it.",
                self.key_file.display()
            );
        }
        Ok(key)
    }

    fn open_bucket(&self, remote: &RemoteSpec) -> anyhow::Result<FileSystemStore> {
        Ok(FileSystemStore::open(self.store_root.join(&remote.bucket))?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    // Change working directory if -C was specified
    if let Some(directory) = cli.directory
        && let Err(e) = std::env::set_current_dir(&directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return VaultExitCode::any_error();
    }

    let ctx = Context {
        key_file: cli.key_file,
        store_root: cli.store_root,
    };

    let result: anyhow::Result<ExitCode> = match cli.command {
        Command::Backup {
            local_dir,
            remote,
            follow_symlinks,
            dry_run,
        } => handle_backup(
            &ctx,
            &local_dir,
            &remote,
            BackupOptions {
                follow_symlinks,
                dry_run,
            },
        ),
        Command::Restore { local_dir, remote } => handle_restore(&ctx, &local_dir, &remote),
        Command::List { remote } => handle_list(&ctx, &remote),
        Command::Verify { remote } => handle_verify(&ctx, &remote),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            VaultExitCode::any_error()
        }
    }
}

fn handle_backup(
    ctx: &Context,
    local_dir: &Path,
    remote: &RemoteSpec,
    options: BackupOptions,
) -> anyhow::Result<ExitCode> {
    let key = ctx.load_key()?;
    let mut store = ctx.open_bucket(remote)?;

    info!("Backing up {} to {}", local_dir.display(), remote);

    let report = backup::backup(&mut store, &key, local_dir, &remote.target, options)?;

    display::print_backup_report(&report);

    if !report.had_previous {
        info!("First backup of {}", remote);
    }
    if options.dry_run {
        info!("DRY RUN - nothing was uploaded");
    }
    info!("{}", display::backup_summary(&report, options.dry_run));

    if report.status == RunStatus::CompletedWithWarnings {
        warn!(
            "Backup {}: {} file(s) could not be backed up",
            report.status,
            report.failed.len()
        );
    }

    Ok(VaultExitCode::from_status(report.status))
}

fn handle_restore(ctx: &Context, local_dir: &Path, remote: &RemoteSpec) -> anyhow::Result<ExitCode> {
    let key = ctx.load_key()?;
    let store = ctx.open_bucket(remote)?;

    info!("Restoring {} to {}", remote, local_dir.display());

    let report = restore::restore(&store, &key, &remote.target, local_dir)?;

    display::print_restore_report(&report);

    if !report.compromised.is_empty() {
        error!(
            "{} file(s) failed verification and were not restored",
            report.compromised.len()
        );
    }
    if !report.failed.is_empty() {
        warn!("{} item(s) could not be restored", report.failed.len());
    }

    info!("{}", display::restore_summary(&report));
    info!("Restore {}", report.status);

    Ok(VaultExitCode::from_status(report.status))
}

fn handle_list(ctx: &Context, remote: &RemoteSpec) -> anyhow::Result<ExitCode> {
    let key = ctx.load_key()?;
    let store = ctx.open_bucket(remote)?;

    let verified = index::fetch_required(&store, &remote.target, &key)?;
    debug!(
        "Manifest body is {} bytes",
        verified.manifest.serialized_tree().len()
    );

    display::print_tree(&verified.tree);
    println!();
    println!(
        "Signature: {}",
        display::format_signature(&verified.manifest)
    );

    info!(
        "{} files in {} directories",
        verified.tree.file_count(),
        verified.tree.directories().count()
    );

    Ok(ExitCode::SUCCESS)
}

fn handle_verify(ctx: &Context, remote: &RemoteSpec) -> anyhow::Result<ExitCode> {
    let key = ctx.load_key()?;
    let store = ctx.open_bucket(remote)?;

    let report = restore::verify_remote(&store, &key, &remote.target)?;

    display::print_verify_report(&report);

    if !report.unreferenced.is_empty() {
        info!(
            "{} stored object(s) are not referenced by the manifest",
            report.unreferenced.len()
        );
    }

    match report.status {
        RunStatus::Complete => {
            info!("Verification successful: {} files verified", report.verified);
        }
        RunStatus::CompletedWithWarnings => {
            error!(
                "Verification failed: {} compromised, {} unreadable",
                report.compromised.len(),
                report.failed.len()
            );
        }
    }

    Ok(VaultExitCode::from_status(report.status))
}

fn default_filter(verbose: u8, log_level: Option<LogLevel>) -> Option<&'static str> {
    if let Some(level) = log_level {
        return Some(level.as_filter());
    }
    match verbose {
        0 => None,
        1 => Some("info"),
        _ => Some("debug"),
    }
}

fn init_tracing(verbose: u8, log_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match default_filter(verbose, log_level) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::TRACE => writer.write_str("TRACE: ")?,
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use book_sync::config::FeedCapabilities;
use book_sync::digest::canonicalize;
use book_sync::error::{SyncError, EXIT_OK};
use book_sync::loader;
use book_sync::lock::ExpectedStats;
use book_sync::order_book::BookState;
use book_sync::session::{run_session, SessionReport};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "book-sync", version, about = "Align an order book snapshot with buffered deltas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Align a snapshot with a delta buffer and report the digest
    Align(AlignArgs),
    /// Digest a snapshot on its own
    Digest(DigestArgs),
}

#[derive(Debug, Args)]
#[command(group(
    clap::ArgGroup::new("window")
        .required(true)
        .multiple(true)
        .args(["capabilities", "reorder_window"])
))]
struct AlignArgs {
    /// REST snapshot JSON
    #[arg(long)]
    snapshot: PathBuf,

    /// Buffered deltas, one JSON envelope per line
    #[arg(long)]
    buffer: PathBuf,

    /// Feed capability TOML
    #[arg(long, env = "BOOK_SYNC_CAPABILITIES")]
    capabilities: Option<PathBuf>,

    /// Reorder window capacity; overrides the capability file
    #[arg(long)]
    reorder_window: Option<usize>,

    /// Expected-stats lock to verify against
    #[arg(long)]
    lock: Option<PathBuf>,

    /// Write a lock certifying this run
    #[arg(long)]
    write_lock: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct DigestArgs {
    #[arg(long)]
    snapshot: PathBuf,

    /// Print the canonical book as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(version = book_sync::SERVICE_VERSION, "book-sync starting");

    match cli.command {
        Command::Align(args) => align(args),
        Command::Digest(args) => digest(args),
    }
}

fn align(args: AlignArgs) -> anyhow::Result<ExitCode> {
    let report = match run_align(&args) {
        Ok(report) => report,
        Err(e) => return report_failure(&e),
    };

    if let Some(path) = &args.write_lock {
        if let Err(e) = loader::write_lock(path, &ExpectedStats::from_report(&report)) {
            return report_failure(&e);
        }
    }

    let mut out = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &report).context("writing report")?;
        writeln!(out)?;
    } else {
        print_summary(&mut out, &report)?;
    }
    Ok(ExitCode::from(EXIT_OK))
}

fn run_align(args: &AlignArgs) -> Result<SessionReport, SyncError> {
    let capabilities = match (&args.capabilities, args.reorder_window) {
        (Some(path), Some(window)) => FeedCapabilities::load(path)?.override_reorder_window(window)?,
        (Some(path), None) => FeedCapabilities::load(path)?,
        (None, Some(window)) => FeedCapabilities::with_reorder_window(window)?,
        (None, None) => {
            return Err(SyncError::Config(
                book_sync::config::ConfigError::MissingReorderWindow,
            ))
        }
    };

    let snapshot = loader::load_snapshot(&args.snapshot)?;
    let messages = loader::load_buffer(&args.buffer)?;
    let lock = args.lock.as_deref().map(loader::load_lock).transpose()?;

    run_session(&snapshot, messages, &capabilities, lock.as_ref())
}

fn digest(args: DigestArgs) -> anyhow::Result<ExitCode> {
    let snapshot = match loader::load_snapshot(&args.snapshot) {
        Ok(snapshot) => snapshot,
        Err(e) => return report_failure(&e),
    };
    let book = canonicalize(&BookState::from_levels(&snapshot.bids, &snapshot.asks));

    let mut out = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &book).context("writing canonical book")?;
        writeln!(out)?;
    } else {
        writeln!(out, "seqId={} digest={}", snapshot.seq_id, book.digest)?;
    }
    Ok(ExitCode::from(EXIT_OK))
}

fn print_summary(out: &mut impl Write, report: &SessionReport) -> io::Result<()> {
    let s = &report.stats;
    let first = s
        .align_first_event_seq_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());

    writeln!(
        out,
        "{} snapshot_seqId={} buffer_messages_n={} duplicates_n={} discarded_n={} applied_n={} \
         align_first_event_seqId={} final_seqId={}{}",
        report.status,
        s.snapshot_seq_id,
        s.buffer_messages_n,
        s.duplicates_n,
        s.discarded_n,
        s.applied_n,
        first,
        s.final_seq_id,
        if report.verified { " verified" } else { "" },
    )?;
    writeln!(out, "canonical_book_digest_sha256={}", report.book.digest)
}

fn report_failure(err: &SyncError) -> anyhow::Result<ExitCode> {
    tracing::error!(status = err.status_label(), error = %err, "book-sync failed");
    let mut out = io::stdout().lock();
    writeln!(out, "{}: {}", err.status_label(), err)?;
    Ok(ExitCode::from(err.exit_code()))
}

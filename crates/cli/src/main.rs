use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::ArgAction;
use clap::{Args, Parser, Subcommand};
use phoenix_core::{
    list_backup, render_markdown_summary, run_recovery_with_sink, RecoveryEvent,
    RecoveryEventKind, RecoveryOptions, RunSummary,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "phoenix",
    version,
    about = "Restore files that diverged from a trusted backup mirror after ransomware or corruption.",
    after_help = "Example: phoenix recover -o ./original_data -b ./backup --dry-run"
)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Also write a per-run log file into this directory.
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compare the original tree with the backup and restore diverged files.
    Recover(RecoverArgs),
    /// List backup files without restoring anything.
    List(ListArgs),
}

#[derive(Debug, Args)]
struct RecoverArgs {
    /// Path to the original (possibly corrupted) directory.
    #[arg(short = 'o', long, value_name = "DIR")]
    original: PathBuf,

    /// Path to the backup directory.
    #[arg(short = 'b', long, value_name = "DIR")]
    backup: PathBuf,

    /// Simulate recovery without modifying files.
    #[arg(long)]
    dry_run: bool,

    /// Exclude glob patterns, matched against paths relative to the root (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Write the JSON run report to this file.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write a markdown summary to this file.
    #[arg(long, value_name = "FILE")]
    md: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Path to the backup directory.
    #[arg(short = 'b', long, value_name = "DIR")]
    backup: PathBuf,

    /// Exclude glob patterns (repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1.., action = ArgAction::Append)]
    exclude: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_dir.as_deref())?;
    info!("Phoenix data recovery started");

    let result = match cli.command {
        Commands::Recover(args) => run_recover_command(args),
        Commands::List(args) => run_list_command(args),
    };

    info!("Phoenix data recovery finished");
    result
}

fn run_recover_command(args: RecoverArgs) -> Result<()> {
    let options = RecoveryOptions {
        original_root: args.original,
        backup_root: args.backup,
        dry_run: args.dry_run,
        excludes: args.exclude,
        ..RecoveryOptions::default()
    };

    let mut events = Vec::new();
    let mut console = |event: &RecoveryEvent| {
        print_event(event);
        events.push(event.clone());
    };
    let report = run_recovery_with_sink(&options, &mut console)?;

    print_summary(&report.summary);

    if let Some(path) = args.report {
        let payload =
            serde_json::to_string_pretty(&report).context("failed to serialize run report")?;
        fs::write(&path, payload)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if let Some(path) = args.md {
        let markdown = render_markdown_summary(&report, &events);
        fs::write(&path, markdown).with_context(|| {
            format!("failed to write markdown summary to {}", path.display())
        })?;
        println!("Markdown summary written to {}", path.display());
    }

    Ok(())
}

fn run_list_command(args: ListArgs) -> Result<()> {
    let listing = list_backup(&args.backup, &args.exclude)?;

    println!("Available backup files:");
    for file in &listing.files {
        println!("- {}", args.backup.join(file).display());
    }
    for warning in &listing.warnings {
        println!("Warning: {warning}");
    }
    println!("{} file(s) in {}", listing.files.len(), listing.backup_root);
    Ok(())
}

fn print_event(event: &RecoveryEvent) {
    let path = event
        .original_path
        .as_deref()
        .or(event.relative_path.as_deref())
        .unwrap_or("<unknown>");
    let detail = event.detail.as_deref().unwrap_or("unknown error");

    match event.kind {
        RecoveryEventKind::Matched => {}
        RecoveryEventKind::SimulatedRestore => {
            println!("Simulated recovery: would restore {path} from backup.")
        }
        RecoveryEventKind::Restored => println!("✔ Recovered: {path} from backup."),
        RecoveryEventKind::RestoreFailed => println!("✘ Failed to recover: {path} ({detail})"),
        RecoveryEventKind::MissingBackupCounterpart => {
            println!("- No backup for {path}; left unchanged.")
        }
        RecoveryEventKind::UnreadableOriginal => println!("✘ Cannot read {path}: {detail}"),
        RecoveryEventKind::UnreadableBackup => {
            println!("✘ Cannot read backup of {path}: {detail}")
        }
        RecoveryEventKind::InvalidPath => println!("✘ Skipped {path}: {detail}"),
    }
}

fn print_summary(summary: &RunSummary) {
    if summary.restored == 0 && summary.failed == 0 {
        println!("No corrupted files were found or all are up-to-date.");
    }
    println!(
        "Inspected {} file(s): {} {}, {} failed, {} without backup, {} unreadable.",
        summary.inspected,
        summary.restored,
        if summary.dry_run {
            "would be restored"
        } else {
            "restored"
        },
        summary.failed,
        summary.missing_backup,
        summary.unreadable
    );
    if summary.cancelled {
        println!("Run canceled before every file was inspected.");
    }
}

fn init_tracing(debug: bool, log_dir: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let name = format!(
                "phoenix_{}.log",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            let path = dir.join(name);
            let file = File::create(&path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}

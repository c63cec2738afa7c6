//! Ferry CLI
//!
//! Cancellable, progress-reporting file operations on top of rclone

mod config;
mod progress;

use clap::{Parser, Subcommand};
use console::{Term, style};
use ferry_core::{
    Coordinator, EngineConfig, OperationContext, OperationKind, Outcome, PartialArtifact, Rclone,
    RemotePath, TransferItem, TransferRequest, format_size, logs,
};
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use config::Config;
use progress::{TransferProgress, format_duration};

/// Exit status of a run stopped by a second Ctrl-C
const INTERRUPT_EXIT_CODE: i32 = 130;

/// Ferry - rclone transfers with live progress and clean cancellation
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files or directories into a destination directory
    Copy {
        /// Sources followed by the destination, as remote:path
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Move files or directories into a destination directory
    Move {
        /// Sources followed by the destination, as remote:path
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },

    /// Delete files or directory trees
    Delete {
        /// Paths to delete, as remote:path
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create a directory
    Mkdir {
        /// Directory to create, as remote:path
        path: String,
    },

    /// List a directory
    Ls {
        /// Directory to list, as remote:path
        path: String,
    },

    /// Show the total size of a directory tree
    Size {
        /// Directory to measure, as remote:path
        path: String,
    },

    /// Remove old rclone log files
    PruneLogs {
        /// Number of log files to keep
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env();

    init_logging(&config, cli.verbose)?;

    // Validate configuration
    config.validate()?;
    let engine = config.engine_config();

    match cli.command {
        Commands::Copy { paths } => {
            let confirm = config.transfer.confirm_copy && !cli.yes;
            let kind = OperationKind::Copy;
            transfer(kind, paths, confirm, cli.yes, &engine).await?;
        }
        Commands::Move { paths } => {
            let confirm = config.transfer.confirm_move && !cli.yes;
            let kind = OperationKind::Move;
            transfer(kind, paths, confirm, cli.yes, &engine).await?;
        }
        Commands::Delete { paths } => {
            let confirm = config.transfer.confirm_delete && !cli.yes;
            delete(paths, confirm, &engine).await?;
        }
        Commands::Mkdir { path } => {
            make_directory(&path, &engine).await?;
        }
        Commands::Ls { path } => {
            list(&path, &engine).await?;
        }
        Commands::Size { path } => {
            size(&path, &engine).await?;
        }
        Commands::PruneLogs { keep } => {
            let keep = keep.unwrap_or(engine.transfer.log_retention);
            let dir = &engine.transfer.logs_dir;
            let removed = logs::cleanup_old_logs(dir, keep).await;
            println!("Removed {removed} log file(s) from {}", dir.display());
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let debug_var = std::env::var("RCLONE_DEBUG");
    let debug_env = debug_var.is_ok_and(|v| config::is_truthy(&v));
    let level = if verbose || debug_env {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };

    let builder = tracing_subscriber::fmt().with_env_filter(level);
    match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Ask a yes/no question on the terminal
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("{prompt} [y/N] "))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Parse a `remote:path` argument
fn parse_path(arg: &str) -> anyhow::Result<RemotePath> {
    Ok(RemotePath::parse(arg)?)
}

/// Describe a source by listing its parent directory
///
/// Sources missing from the listing are treated as files.
async fn describe_source(
    rclone: &Rclone,
    source: RemotePath,
    destination: &RemotePath,
) -> anyhow::Result<TransferItem> {
    if source.is_root() {
        anyhow::bail!("Cannot transfer the root of remote '{}'", source.remote);
    }

    let parent = source.parent();
    let name = source.file_name().to_string();
    let entries = rclone.list_directory(&parent).await;
    let item = match entries.iter().find(|e| e.name == name) {
        Some(entry) => TransferItem::from_entry(&parent, entry, destination.clone()),
        None => {
            tracing::debug!(
                source = %source,
                "source not found in parent listing, assuming a file"
            );
            TransferItem::new(name, source, destination.clone(), false, 0)
        }
    };
    Ok(item)
}

/// Copy or move sources into the last path argument
async fn transfer(
    kind: OperationKind,
    mut paths: Vec<String>,
    confirm_first: bool,
    yes: bool,
    engine: &EngineConfig,
) -> anyhow::Result<()> {
    let Some(destination) = paths.pop() else {
        anyhow::bail!("Missing destination");
    };
    let destination = parse_path(&destination)?;
    let rclone = Rclone::new(engine);

    let mut items = Vec::with_capacity(paths.len());
    for source in &paths {
        let source = parse_path(source)?;
        let item = describe_source(&rclone, source, &destination).await?;
        items.push(item);
    }
    let request = TransferRequest::new(kind, items, destination.clone())?;

    let total_size: u64 = request.items().iter().map(|i| i.size).sum();
    println!("Operation: {kind}");
    println!("Items: {}", request.len());
    println!("Size: {}", format_size(total_size, false));
    println!("Destination: {destination}");

    let prompt = format!(
        "{} {} item(s) to {destination}?",
        capitalize(&kind.to_string()),
        request.len()
    );
    if confirm_first && !confirm(&prompt)? {
        println!("Aborted");
        return Ok(());
    }

    run_request(request, yes, engine).await
}

/// Delete paths through the coordinator
async fn delete(
    paths: Vec<String>,
    confirm_first: bool,
    engine: &EngineConfig,
) -> anyhow::Result<()> {
    let rclone = Rclone::new(engine);
    let mut items = Vec::with_capacity(paths.len());
    for path in &paths {
        let path = parse_path(path)?;
        let parent = path.parent();
        items.push(describe_source(&rclone, path, &parent).await?);
    }
    let Some(root) = items.first().map(|i| i.destination.clone()) else {
        anyhow::bail!("Nothing to delete");
    };
    let request = TransferRequest::new(OperationKind::Delete, items, root)?;

    for item in request.items() {
        let kind = if item.is_dir { "directory" } else { "file" };
        println!("  {} ({kind})", item.source);
    }
    if confirm_first && !confirm(&format!("Delete {} item(s)?", request.len()))? {
        println!("Aborted");
        return Ok(());
    }

    run_request(request, true, engine).await
}

/// Create one directory through the coordinator
async fn make_directory(path: &str, engine: &EngineConfig) -> anyhow::Result<()> {
    let path = parse_path(path)?;
    let item = TransferItem::new(path.file_name(), path.clone(), path.parent(), true, 0);
    let request = TransferRequest::new(OperationKind::Mkdir, vec![item], path.parent())?;
    run_request(request, true, engine).await
}

/// Run a request with live progress and Ctrl-C cancellation
async fn run_request(
    request: TransferRequest,
    yes: bool,
    engine: &EngineConfig,
) -> anyhow::Result<()> {
    let kind = request.kind();
    let mut coordinator = Coordinator::new(engine)?;
    let (ctx, mut events) = OperationContext::new(engine.transfer.channel_capacity);

    let interrupts = watch_interrupts(ctx.cancel_token());
    let mut view = TransferProgress::new(request.items());
    let started = Instant::now();

    let run = tokio::spawn(async move {
        let outcome = coordinator.run(&request, &ctx).await;
        (coordinator, outcome)
    });

    while let Some(event) = events.recv().await {
        view.update(&event);
    }

    let joined = run.await;
    interrupts.abort();
    let _interrupts = exit_on_interrupt();
    let (coordinator, outcome) = joined?;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = format!("{} failed", capitalize(&kind.to_string()));
            view.abandon_with_message(message);
            return Err(e.into());
        }
    };

    match &outcome {
        Outcome::Completed { count } => {
            view.finish_with_message(format!(
                "{} {count} item(s) in {}",
                kind.past_tense(),
                format_duration(started.elapsed())
            ));
        }
        Outcome::Cancelled { item, completed, .. } => {
            let at = item
                .as_deref()
                .map(|i| format!(" during {i}"))
                .unwrap_or_default();
            view.abandon_with_message(format!(
                "{} cancelled{at} after {completed} item(s)",
                capitalize(&kind.to_string())
            ));
        }
        Outcome::ItemFailed {
            name, exit_code, ..
        } => {
            let code = match exit_code {
                Some(c) => c.to_string(),
                None => "a signal".to_string(),
            };
            view.abandon_with_message(format!("{name} failed (exit code {code})"));
        }
    }

    let artifacts = outcome.artifacts();
    remove_partials(&coordinator, artifacts, yes).await?;

    if let Outcome::ItemFailed { name, .. } = &outcome {
        anyhow::bail!("{} of '{name}' failed, remaining items were skipped", kind);
    }
    Ok(())
}

/// What a Ctrl-C does at the current point of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Ask the coordinator to stop
    Cancel,
    /// Leave immediately with [`INTERRUPT_EXIT_CODE`]
    Exit,
}

impl InterruptAction {
    fn for_token(token: &CancellationToken) -> Self {
        if token.is_cancelled() {
            Self::Exit
        } else {
            Self::Cancel
        }
    }
}

/// Cancel `token` on the first Ctrl-C and exit on the next one
///
/// Abort the returned task once the run is over.
fn watch_interrupts(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match InterruptAction::for_token(&token) {
                InterruptAction::Cancel => {
                    tracing::info!("interrupt received, cancelling");
                    token.cancel();
                }
                InterruptAction::Exit => {
                    tracing::warn!("interrupted, exiting");
                    std::process::exit(INTERRUPT_EXIT_CODE);
                }
            }
        }
    })
}

/// Exit on any Ctrl-C
///
/// Tokio keeps SIGINT claimed after the first listener, so prompts shown
/// after a run need this to stay interruptible.
fn exit_on_interrupt() -> JoinHandle<()> {
    let finished = CancellationToken::new();
    finished.cancel();
    watch_interrupts(finished)
}

/// Offer removal of partial files left behind
async fn remove_partials(
    coordinator: &Coordinator,
    artifacts: &[PartialArtifact],
    yes: bool,
) -> anyhow::Result<()> {
    if artifacts.is_empty() {
        return Ok(());
    }

    let heading = format!("Found {} partial file(s):", artifacts.len());
    println!("{}", style(heading).yellow());
    for artifact in artifacts {
        let size = format_size(artifact.size, false);
        println!("  {} ({size})", artifact.path);
    }

    if !yes && !confirm("Delete them?")? {
        println!("Partial files kept");
        return Ok(());
    }

    let report = coordinator.cleaner().remove(artifacts).await;
    println!("Deleted {} partial file(s)", report.deleted);
    for (path, reason) in &report.failures {
        eprintln!("{} {path}: {reason}", style("Failed to delete").red());
    }
    Ok(())
}

/// List a directory
async fn list(path: &str, engine: &EngineConfig) -> anyhow::Result<()> {
    let path = parse_path(path)?;
    let rclone = Rclone::new(engine);

    let mut entries = rclone.list_directory(&path).await;
    entries.sort_by_key(|e| (!e.is_dir, e.name.clone()));

    for entry in &entries {
        let size = format_size(u64::try_from(entry.size).unwrap_or(0), entry.is_dir);
        if entry.is_dir {
            println!("{size:>10}  {}/", style(&entry.name).blue().bold());
        } else {
            println!("{size:>10}  {}", entry.name);
        }
    }
    println!("{} entries", entries.len());
    Ok(())
}

/// Show the size of a directory tree
async fn size(path: &str, engine: &EngineConfig) -> anyhow::Result<()> {
    let path = parse_path(path)?;
    let rclone = Rclone::new(engine);

    let Some(info) = rclone.directory_size(&path).await else {
        anyhow::bail!("Could not determine size of {path}");
    };
    println!("Files: {}", info.count);
    println!("Size: {}", format_size(info.bytes, false));
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

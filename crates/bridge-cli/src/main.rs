//! notion-bridge: keep markdown files and Notion pages in sync.
//!
//! Thin command-line surface over bridge-core: single-file sync, batch
//! runs, workspace discovery, and a watch mode driven by the debounced
//! file watcher.

mod watcher;

use anyhow::{bail, Result};
use bridge_core::engine::collect_markdown_files;
use bridge_core::{
    ratelimit, Config, Direction, NotionApi, RemoteGateway, RemotePage, SearchKind, SyncEngine,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use watcher::FileWatcher;

#[derive(Parser, Debug)]
#[command(name = "notion-bridge")]
#[command(about = "Bridge between markdown files and Notion pages")]
struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SyncDirection {
    /// Markdown to Notion
    Push,
    /// Notion to markdown
    Pull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum WatchDirection {
    Push,
    Pull,
    Both,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter configuration file
    Init,

    /// Sync a single file with Notion
    Sync {
        /// Markdown file to sync
        #[arg(long)]
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = SyncDirection::Push)]
        direction: SyncDirection,

        /// Notion page id to pull from (defaults to the file's stored link)
        #[arg(long)]
        page_id: Option<String>,
    },

    /// Sync every markdown file under a directory
    SyncAll {
        /// Directory to scan (defaults to the configured markdown root)
        #[arg(long)]
        directory: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = SyncDirection::Push)]
        direction: SyncDirection,

        /// List the files that would be synced without syncing
        #[arg(long)]
        dry_run: bool,
    },

    /// Discover and pull pages from the Notion workspace
    PullWorkspace {
        /// Search query (empty = all accessible pages)
        #[arg(long, default_value = "")]
        query: String,

        /// Directory to save pulled files (defaults to the markdown root)
        #[arg(long)]
        directory: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Pull all child pages of a Notion parent page
    PullChildren {
        /// Notion page id to pull child pages from
        #[arg(long)]
        parent_id: String,

        /// Directory to save pulled files (defaults to the markdown root)
        #[arg(long)]
        directory: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Watch for changes and sync automatically
    Watch {
        #[arg(long, value_enum, default_value_t = WatchDirection::Push)]
        direction: WatchDirection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug,bridge_core=debug"
    } else {
        "info,bridge_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Init => init_config(&cli.config),
        command => {
            let config = Config::load(&cli.config)?;
            run(command, config).await
        }
    }
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("config file {} already exists", path.display());
    }
    Config::starter().save(path)?;
    println!("Created configuration file at {}", path.display());
    println!("Edit this file to set your Notion API token and sync preferences.");
    Ok(())
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Init => unreachable!("handled before config load"),

        Command::Sync { file, direction, page_id } => {
            let engine = build_engine(&config, direction == SyncDirection::Push)?;

            let outcome = match direction {
                SyncDirection::Push => engine.push_file(&file).await,
                SyncDirection::Pull => {
                    let page_id = match page_id {
                        Some(id) => id,
                        None => match engine.linked_page_id(&file).await {
                            Ok(Some(id)) => id,
                            _ => bail!(
                                "no notion_page_id stored in {} (pass --page-id)",
                                file.display()
                            ),
                        },
                    };
                    engine.pull_page(&page_id, Some(&file)).await
                }
            };

            if outcome.success {
                println!("Success: {}", outcome.message);
                Ok(())
            } else {
                bail!("{}", outcome.message);
            }
        }

        Command::SyncAll { directory, direction, dry_run } => {
            let dir = directory.unwrap_or_else(|| config.directories.markdown_root.clone());
            let engine = build_engine(&config, direction == SyncDirection::Push)?;

            let files = collect_markdown_files(&dir, &config.directories.excluded_patterns)?;
            if files.is_empty() {
                println!("No markdown files found in {}", dir.display());
                return Ok(());
            }

            if dry_run {
                println!("Dry run - the following files would be synced:");
                for file in files {
                    println!("  {}", file.display());
                }
                return Ok(());
            }

            let cancel = arm_cancel();
            let report = engine
                .sync_all(&dir, engine_direction(direction), &cancel)
                .await;
            println!(
                "Sync complete: {} succeeded, {} failed, {} skipped",
                report.succeeded, report.failed, report.skipped
            );
            Ok(())
        }

        Command::PullWorkspace { query, directory, dry_run } => {
            let engine = pull_engine(&config, directory)?;
            let pages = engine.gateway().search(&query, SearchKind::Pages).await?;

            if pages.is_empty() {
                println!("No pages found in your Notion workspace.");
                return Ok(());
            }
            println!("Found {} page(s) in your Notion workspace:", pages.len());
            pull_batch(&engine, pages, dry_run).await
        }

        Command::PullChildren { parent_id, directory, dry_run } => {
            let engine = pull_engine(&config, directory)?;

            match engine.gateway().get_page(&parent_id).await {
                Ok(parent) => println!("Getting child pages from: {}", parent.title),
                Err(e) => println!("Warning: could not access parent page {}: {}", parent_id, e),
            }

            let pages = engine.gateway().get_child_pages(&parent_id).await?;
            if pages.is_empty() {
                println!("No child pages found.");
                return Ok(());
            }
            println!("Found {} child page(s):", pages.len());
            pull_batch(&engine, pages, dry_run).await
        }

        Command::Watch { direction } => {
            let needs_parent = matches!(direction, WatchDirection::Push | WatchDirection::Both);
            let engine = build_engine(&config, needs_parent)?;
            watch(engine, &config, direction).await
        }
    }
}

/// Validate credentials and construct the engine over the HTTP gateway.
fn build_engine(config: &Config, needs_parent: bool) -> Result<SyncEngine<NotionApi>> {
    let mut checked = config.clone();
    checked.sync.direction = if needs_parent { "push".into() } else { "pull".into() };
    checked.validate()?;

    let api = NotionApi::new(config.notion.token.clone(), ratelimit::shared());
    Ok(SyncEngine::new(
        api,
        config.notion.parent_page_id.clone(),
        config.directories.markdown_root.clone(),
    )
    .with_excluded_patterns(config.directories.excluded_patterns.clone()))
}

/// Engine whose derived-filename pulls land in `directory`.
fn pull_engine(config: &Config, directory: Option<PathBuf>) -> Result<SyncEngine<NotionApi>> {
    let dir = directory.unwrap_or_else(|| config.directories.markdown_root.clone());
    std::fs::create_dir_all(&dir)?;

    let mut config = config.clone();
    config.directories.markdown_root = dir;
    build_engine(&config, false)
}

fn engine_direction(direction: SyncDirection) -> Direction {
    match direction {
        SyncDirection::Push => Direction::Push,
        SyncDirection::Pull => Direction::Pull,
    }
}

/// Ctrl-C arms the flag; batches stop between documents.
fn arm_cancel() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested, stopping after the current document");
            flag.store(true, Ordering::Relaxed);
        }
    });
    cancel
}

/// Pull a list of discovered pages into derived filenames.
async fn pull_batch(
    engine: &SyncEngine<NotionApi>,
    pages: Vec<RemotePage>,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        println!("Dry run - the following pages would be pulled:");
        for page in pages {
            println!("  {} (ID: {})", page.title, page.id);
        }
        return Ok(());
    }

    let cancel = arm_cancel();
    let mut succeeded = 0;
    let mut failed = 0;

    for page in pages {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let outcome = engine.pull_page(&page.id, None).await;
        if outcome.success {
            succeeded += 1;
        } else {
            failed += 1;
            println!("Failed to pull '{}': {}", page.title, outcome.message);
        }
    }

    println!("Pull complete: {} succeeded, {} failed", succeeded, failed);
    Ok(())
}

/// Watch the markdown root and sync each changed file in the configured
/// direction.
async fn watch(
    engine: SyncEngine<NotionApi>,
    config: &Config,
    direction: WatchDirection,
) -> Result<()> {
    let root = config.directories.markdown_root.clone();
    std::fs::create_dir_all(&root)?;

    let mut watcher = FileWatcher::new(root, config.directories.excluded_patterns.clone())?;
    println!(
        "Watching {} ({:?} direction). Press Ctrl+C to stop.",
        watcher.root().display(),
        direction
    );

    loop {
        tokio::select! {
            Some(path) = watcher.recv() => {
                on_change(&engine, &path, direction).await;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping watcher.");
                break;
            }
        }
    }

    Ok(())
}

async fn on_change(engine: &SyncEngine<NotionApi>, path: &Path, direction: WatchDirection) {
    println!("File changed: {}", path.display());

    if matches!(direction, WatchDirection::Push | WatchDirection::Both) {
        let outcome = engine.push_file(path).await;
        report_outcome("Push", &outcome.message, outcome.success);
    }

    if matches!(direction, WatchDirection::Pull | WatchDirection::Both) {
        match engine.linked_page_id(path).await {
            Ok(Some(page_id)) => {
                let outcome = engine.pull_page(&page_id, Some(path)).await;
                report_outcome("Pull", &outcome.message, outcome.success);
            }
            Ok(None) => {
                println!("Skipped pull: no notion_page_id in {}", path.display());
            }
            Err(e) => {
                println!("Skipped pull: {}", e);
            }
        }
    }
}

fn report_outcome(action: &str, message: &str, success: bool) {
    if success {
        println!("{} succeeded: {}", action, message);
    } else {
        println!("{} failed: {}", action, message);
    }
}

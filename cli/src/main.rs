//! ChainSweep CLI.
//!
//! # Commands
//! ```text
//! chainsweep allocate  [--count N] [--wordlist <file>] [--json]
//! chainsweep scan      --from <block> --to <block> [--endpoint <url>]... [--batch-size N] [--concurrency N]
//! chainsweep status
//! chainsweep balances  [--limit N]
//! chainsweep task      --id <rank> [--set-status pending|completed|found]
//! chainsweep info
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chainsweep_core::{
    AllocationStore, ScanStore, SweepConfig, TaskAllocator, TaskStatus, Vocabulary,
};
use chainsweep_storage::SqliteStorage;

mod cmd_allocate;
mod cmd_scan;
mod logging;

#[derive(Parser)]
#[command(
    name = "chainsweep",
    about = "Combinatorial task allocator and resumable block scanner",
    long_about = "
ChainSweep: hand out 12-word combinations as numbered tasks, and scan
block ranges into a table of observed balances. Both resume from the
database after a restart.

ENVIRONMENT VARIABLES:
  RUST_LOG    Log filter, overrides the configured level
",
    version
)]
struct Cli {
    /// YAML config file (dotted keys, e.g. `retry.max.attempts`)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides `database.path`)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue the next task(s) from the combination space
    Allocate {
        /// Number of tasks to issue
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,
        /// Newline-separated word list (default: BIP-39 English)
        #[arg(long)]
        wordlist: Option<PathBuf>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Scan a closed block range and accumulate participant balances
    Scan {
        /// First block (>= 1)
        #[arg(long)]
        from: u64,
        /// Last block (<= chain head)
        #[arg(long)]
        to: u64,
        /// RPC endpoint URL; repeat for a pool (overrides `endpoints`)
        #[arg(long = "endpoint")]
        endpoints: Vec<String>,
        /// Blocks per committed batch (overrides `max.blocks.per.batch`)
        #[arg(long)]
        batch_size: Option<u64>,
        /// Concurrent fetches per stage (overrides `fetch.concurrency`)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show allocation and scan progress
    Status {
        /// Word list the tasks were drawn from (default: BIP-39 English)
        #[arg(long)]
        wordlist: Option<PathBuf>,
    },

    /// List the largest accumulated balances
    Balances {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show an issued task, optionally recording a worker's outcome
    Task {
        /// Task id (decimal rank)
        #[arg(long)]
        id: String,
        /// New status: pending | completed | found
        #[arg(long)]
        set_status: Option<String>,
    },

    /// Show build and default configuration info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SweepConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SweepConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    if cli.verbose {
        config.log.level = "debug".into();
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Allocate { count, wordlist, json } => {
            cmd_allocate::run(&config, count, wordlist.as_deref(), json).await
        }

        Commands::Scan { from, to, endpoints, batch_size, concurrency, json } => {
            if !endpoints.is_empty() {
                config.endpoints = endpoints;
            }
            if let Some(n) = batch_size {
                config.max_blocks_per_batch = n;
            }
            if let Some(n) = concurrency {
                config.fetch_concurrency = n;
            }
            cmd_scan::run(&config, from, to, json).await
        }

        Commands::Status { wordlist } => cmd_status(&config, wordlist.as_deref()).await,

        Commands::Balances { limit } => cmd_balances(&config, limit).await,

        Commands::Task { id, set_status } => cmd_task(&config, &id, set_status.as_deref()).await,

        Commands::Info => cmd_info(&config),
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

async fn open_store(config: &SweepConfig) -> Result<SqliteStorage> {
    SqliteStorage::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))
}

fn load_vocabulary(path: Option<&std::path::Path>) -> Result<Vocabulary> {
    match path {
        Some(p) => Vocabulary::from_file(p).with_context(|| format!("loading word list {}", p.display())),
        None => Ok(Vocabulary::bip39_english()),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_status(config: &SweepConfig, wordlist: Option<&std::path::Path>) -> Result<()> {
    let store = open_store(config).await?;
    let summary = store.summary().await?;
    let last_block = store.last_processed_block().await?;

    let allocator = TaskAllocator::new(load_vocabulary(wordlist)?, store);
    let last_index = allocator.last_index().await?;

    println!("Database: {}", config.database_path);
    println!();
    println!("Allocation ({})", allocator.strategy_name());
    println!("  Total combinations: {}", allocator.total_combinations());
    match last_index {
        Some(i) => println!("  Last issued rank:   {i}"),
        None => println!("  Last issued rank:   (none)"),
    }
    println!("  Tasks issued:       {} ({} pending)", summary.tasks, summary.pending_tasks);
    println!();
    println!("Scan");
    match last_block {
        Some(b) => println!("  Last processed block: {b}"),
        None => println!("  Last processed block: (none)"),
    }
    println!("  Batches committed:    {}", summary.checkpoints);
    println!("  Addresses with funds: {}", summary.balances);
    Ok(())
}

async fn cmd_balances(config: &SweepConfig, limit: usize) -> Result<()> {
    let store = open_store(config).await?;
    let balances = store.balances(limit).await?;
    if balances.is_empty() {
        println!("No balances recorded.");
        return Ok(());
    }
    println!("{:<44}  {}", "ADDRESS", "BALANCE (wei)");
    for obs in balances {
        println!("{:<44}  {}", obs.address, obs.amount);
    }
    Ok(())
}

async fn cmd_task(config: &SweepConfig, id: &str, set_status: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;

    if let Some(raw) = set_status {
        let status: TaskStatus = raw.parse().map_err(|e: String| anyhow!(e))?;
        if !store.set_task_status(id, status).await? {
            anyhow::bail!("no task with id {id}");
        }
    }

    let (task, status) = store
        .task(id)
        .await?
        .ok_or_else(|| anyhow!("no task with id {id}"))?;

    println!("Task:    {}", task.task_id);
    println!("Status:  {status}");
    println!("Version: {}", task.version);
    println!("Words:   {}", task.phrase());
    Ok(())
}

fn cmd_info(config: &SweepConfig) -> Result<()> {
    println!("ChainSweep v{}", env!("CARGO_PKG_VERSION"));
    println!("  Allocation strategy:  seq-queue (12 words per task)");
    println!("  Retry:                {} attempts, {} ms apart", config.retry_max_attempts, config.retry_sleep_time_ms);
    println!("  Blocks per batch:     {}", config.max_blocks_per_batch);
    println!("  Fetch concurrency:    {}", config.fetch_concurrency);
    println!("  Endpoint selection:   {:?}", config.endpoint_selection);
    println!("  Endpoints configured: {}", config.endpoints.len());
    println!("  Database:             {}", config.database_path);
    println!("  Storage backends:     memory, SQLite (feature: sqlite)");
    Ok(())
}

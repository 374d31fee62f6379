//! Binary entry point for mnemo.
//!
//! This binary provides the CLI interface for the mnemo retrieval engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use mnemo::indexer::FileOutcome;
use mnemo::{DocRetriever, Indexer, MnemoConfig, RetrievalMode, Retriever, Store, ToolCatalog};
use std::path::PathBuf;
use std::process::ExitCode;

/// Mnemo - a persistent-memory retrieval engine for AI coding agents.
#[derive(Parser)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MNEMO_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Index the markdown corpus into the store.
    Index {
        /// Re-index every file regardless of its content hash, and prune
        /// records for files that no longer exist.
        #[arg(long)]
        force: bool,

        /// Corpus directory (default: the configured corpus path).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Search the indexed corpus.
    Search {
        /// The search query.
        query: String,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict results to one source file.
        #[arg(short, long)]
        file: Option<String>,

        /// Expand hits in dated logs to their enclosing session (default).
        #[arg(long, conflicts_with = "chunk")]
        session: bool,

        /// Return raw chunk hits without session expansion.
        #[arg(long)]
        chunk: bool,

        /// Condense expanded sessions to their high-value subsections.
        #[arg(long, conflicts_with = "chunk")]
        context: bool,
    },

    /// Rebuild the tool catalog and curated docs from on-disk descriptors.
    Sync,

    /// Recommend catalog tools for a task.
    Recommend {
        /// The task description.
        task: String,

        /// Maximum number of suggestions.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Retrieve curated documentation for a task.
    Retrieve {
        /// The task description.
        task: String,

        /// Maximum number of docs.
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_directive = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &MnemoConfig) -> mnemo::Result<()> {
    match command {
        Commands::Index { force, dir } => cmd_index(config, force, dir),

        Commands::Search {
            query,
            limit,
            file,
            session: _,
            chunk,
            context,
        } => {
            let mode = if chunk {
                RetrievalMode::Chunk
            } else if context {
                RetrievalMode::Context
            } else {
                RetrievalMode::Session
            };
            cmd_search(config, query, limit, file, mode)
        },

        Commands::Sync => cmd_sync(config),

        Commands::Recommend { task, limit } => cmd_recommend(config, task, limit),

        Commands::Retrieve { task, limit } => cmd_retrieve(config, task, limit),
    }
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> mnemo::Result<MnemoConfig> {
    if let Some(config_path) = path {
        if !config_path.trim().is_empty() {
            return MnemoConfig::load_from_file(std::path::Path::new(config_path));
        }
    }
    Ok(MnemoConfig::load_default())
}

/// Index command.
fn cmd_index(config: &MnemoConfig, force: bool, dir: Option<PathBuf>) -> mnemo::Result<()> {
    let store = Store::open(&config.db_path())?;
    let indexer = Indexer::new(&store, config);

    let corpus = dir.unwrap_or_else(|| config.corpus_path());
    let summary = indexer.index_directory(&corpus, force)?;

    for (file, outcome) in &summary.outcomes {
        match outcome {
            FileOutcome::Indexed(chunks) => println!("indexed  {file} ({chunks} chunks)"),
            FileOutcome::Skipped => println!("skipped  {file} (unchanged)"),
            FileOutcome::Failed(cause) => println!("failed   {file}: {cause}"),
        }
    }

    println!();
    println!(
        "{} indexed, {} skipped, {} failed",
        summary.indexed(),
        summary.skipped(),
        summary.failed()
    );
    if summary.pruned > 0 {
        println!("{} stale file(s) pruned", summary.pruned);
    }

    let stats = store.stats()?;
    println!("store: {} chunks across {} files", stats.chunks, stats.files);
    Ok(())
}

/// Search command. Always exits 0: an unusable store degrades to the
/// no-matches message rather than an error.
fn cmd_search(
    config: &MnemoConfig,
    query: String,
    limit: Option<usize>,
    file: Option<String>,
    mode: RetrievalMode,
) -> mnemo::Result<()> {
    let limit = limit.unwrap_or(config.default_limit);

    let output = Store::open(&config.db_path()).and_then(|store| {
        Retriever::new(&store, config).retrieve(&query, limit, file.as_deref(), mode)
    });

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Search degraded: {e}");
            println!("No matches found.");
            return Ok(());
        },
    };

    if output.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    for hit in &output.sessions {
        println!(
            "[{:.2}] {} :: {} (lines {}-{})",
            hit.score,
            hit.session.file,
            hit.session.name,
            hit.session.line_start,
            hit.session.line_end
        );
        println!("{}", indent(&hit.session.content));
        println!();
    }

    for hit in &output.chunks {
        println!(
            "[{:.2}] {} (lines {}-{}, {})",
            hit.score,
            hit.chunk.file,
            hit.chunk.line_start,
            hit.chunk.line_end,
            hit.match_kind.as_str()
        );
        println!("{}", indent(&hit.chunk.content));
        println!();
    }

    Ok(())
}

/// Sync command.
fn cmd_sync(config: &MnemoConfig) -> mnemo::Result<()> {
    let store = Store::open(&config.db_path())?;

    let catalog = ToolCatalog::new(&store, config);
    let summary = catalog.sync()?;
    println!(
        "tools: {} written, {} unchanged, {} removed",
        summary.written, summary.skipped, summary.removed
    );
    for (domain, count) in &summary.domain_counts {
        println!("  {domain}: {count}");
    }

    let docs = DocRetriever::new(&store, config);
    let ingested = docs.sync()?;
    println!("docs: {ingested} ingested");
    Ok(())
}

/// Recommend command.
fn cmd_recommend(config: &MnemoConfig, task: String, limit: Option<usize>) -> mnemo::Result<()> {
    let store = Store::open(&config.db_path())?;
    let catalog = ToolCatalog::new(&store, config);

    let limit = limit.unwrap_or(config.default_limit);
    let recommendations = catalog.recommend(&task, limit)?;

    if recommendations.is_empty() {
        println!("No matching tools.");
        return Ok(());
    }

    for recommendation in &recommendations {
        let record = &recommendation.record;
        println!(
            "[{:.2}] {} ({}, {})",
            recommendation.confidence,
            record.id,
            record.kind.as_str(),
            record.domain
        );
        if !record.description.is_empty() {
            println!("       {}", record.description);
        }
        if !recommendation.matched_keywords.is_empty() {
            println!("       matched: {}", recommendation.matched_keywords.join(", "));
        }
    }

    Ok(())
}

/// Retrieve command.
fn cmd_retrieve(config: &MnemoConfig, task: String, limit: Option<usize>) -> mnemo::Result<()> {
    let store = Store::open(&config.db_path())?;
    let retriever = DocRetriever::new(&store, config);

    let limit = limit.unwrap_or(config.default_limit);
    let hits = retriever.retrieve(&task, limit)?;

    if hits.is_empty() {
        println!("No matching docs.");
        return Ok(());
    }

    for hit in &hits {
        println!("## {} ({:.2})", hit.doc.tool_name, hit.score);
        println!("{}", hit.doc.description);
        println!();
        println!("{}", hit.doc.full_documentation);
        println!();
    }

    Ok(())
}

/// Indents multi-line output for display under its header line.
fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("       {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

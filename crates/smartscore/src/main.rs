//! smartscore - music metrics from the command line
//!
//! Subcommands:
//! - `smartscore analyze <file>` - Analyze a local MIDI file
//! - `smartscore batch <files>...` - Analyze many uploads (or stored hashes)
//! - `smartscore instruments <file|hash>` - List part names
//! - `smartscore ingest <file>` - Store a file, print its hash
//! - `smartscore query <hash>` - Analyze a stored file, cached
//! - `smartscore evict <hash>` - Drop a stored file and its cached results
//! - `smartscore config` - Print the effective configuration
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scoreconf::SmartScoreConfig;

mod commands;

#[derive(Parser)]
#[command(name = "smartscore")]
#[command(about = "Melodic, harmonic, rhythmic and formal metrics for MIDI scores")]
#[command(version)]
struct Cli {
    /// Config file used instead of ./smartscore.toml
    #[arg(long, global = true, env = "SMARTSCORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Which metrics to compute and over which parts.
#[derive(Args, Debug, Clone)]
pub struct Selection {
    /// Category: instrumental, melodic, rhythmic, harmonic, textural,
    /// formal, interaction, comparative, differentiating or all
    #[arg(short, long)]
    pub category: Option<String>,

    /// Granularity: global, aggregate, per_measure or all
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Comma-separated part names to keep (case-insensitive)
    #[arg(short, long, value_delimiter = ',')]
    pub instruments: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a local MIDI file
    Analyze {
        file: PathBuf,

        #[command(flatten)]
        selection: Selection,
    },

    /// Analyze several files with the same request
    Batch {
        /// Paths relative to the uploads directory, or hashes with --stored
        #[arg(required = true)]
        files: Vec<String>,

        /// Uploads directory (defaults to paths.uploads_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Treat file arguments as content hashes in the store
        #[arg(long)]
        stored: bool,

        /// Worker threads; 0 uses every core (defaults to analysis.worker_threads)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        #[command(flatten)]
        selection: Selection,
    },

    /// List the part names of a local file or a stored hash
    Instruments { target: String },

    /// Validate a MIDI file and add it to the content store
    Ingest { file: PathBuf },

    /// Analyze a stored file, answering from the cache when possible
    Query {
        hash: String,

        #[command(flatten)]
        selection: Selection,
    },

    /// Remove a stored file and every cached result for it
    Evict { hash: String },

    /// Print the effective configuration as TOML
    Config {
        /// Also list the files and variables it came from
        #[arg(long)]
        sources: bool,
    },
}

fn init_tracing(config: &SmartScoreConfig) {
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = SmartScoreConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading configuration")?;
    init_tracing(&config);

    let output = match cli.command {
        Commands::Analyze { file, selection } => commands::analyze(&config, &file, &selection)?,
        Commands::Batch {
            files,
            dir,
            stored,
            threads,
            selection,
        } => commands::batch(
            &config,
            &files,
            dir,
            stored,
            threads,
            &selection,
        )?,
        Commands::Instruments { target } => commands::instruments(&config, &target)?,
        Commands::Ingest { file } => commands::ingest(&config, &file)?,
        Commands::Query { hash, selection } => commands::query(&config, &hash, &selection)?,
        Commands::Evict { hash } => commands::evict(&config, &hash)?,
        Commands::Config { sources: show } => {
            print!("{}", config.to_toml());
            if show {
                commands::print_sources(&sources);
            }
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

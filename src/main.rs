//! # Travel Search CLI (`travel`)
//!
//! ## Usage
//!
//! ```bash
//! travel --config ./config/travel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `travel init` | Create the SQLite database and schema |
//! | `travel ingest` | Load the source CSV into the collection |
//! | `travel search "<question>"` | Filtered semantic search |
//! | `travel rename "<question>"` | Rename a store, then search |
//! | `travel stats` | Show collection counts |

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travel_search::config;
use travel_search::ingest;
use travel_search::migrate;
use travel_search::query::{self, ParamOverrides};
use travel_search::stats;

/// Travel Search CLI: semantic search over tourism store listings.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/travel.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "travel", version, about = "Semantic search over tourism store listings")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/travel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest the configured CSV into the collection.
    ///
    /// Rows whose positional id is already stored are skipped, so
    /// re-running after a failure resumes from the last committed batch.
    Ingest {
        /// Log each batch and print the last stored metadata record.
        #[arg(long)]
        debug: bool,

        /// Override `[ingest].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Search stores matching a question.
    Search {
        /// Natural-language question.
        question: String,

        /// Restrict to a city. Repeat for several.
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Restrict to a store type. Repeat for several.
        #[arg(long = "type")]
        types: Vec<String>,

        /// Earliest creation date, inclusive (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Latest creation date, inclusive (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum similarity in [0, 1].
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Rename a store, then search.
    ///
    /// Every record whose name equals `--store-name` is listed under
    /// `--new-name` from then on. An unknown store is reported and the
    /// search still runs.
    Rename {
        /// Natural-language question.
        question: String,

        /// Exact current name of the store.
        #[arg(long)]
        store_name: String,

        /// Name to display instead.
        #[arg(long)]
        new_name: String,

        /// Restrict to a city. Repeat for several.
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Restrict to a store type. Repeat for several.
        #[arg(long = "type")]
        types: Vec<String>,
    },

    /// Show record counts for the configured collection.
    Stats,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "travel_search=debug,travel_search_core=debug"
    } else {
        "travel_search=info,travel_search_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug = matches!(cli.command, Commands::Ingest { debug: true, .. });
    init_tracing(debug);

    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest { debug, batch_size } => {
            ingest::run_ingest(&cfg, debug, batch_size).await?;
        }
        Commands::Search {
            question,
            cities,
            types,
            start,
            end,
            limit,
            threshold,
        } => {
            let filters = query::build_filters(&cities, &types, start, end);
            let overrides = ParamOverrides { limit, threshold };
            query::run_search(&cfg, &question, &filters, &overrides).await?;
        }
        Commands::Rename {
            question,
            store_name,
            new_name,
            cities,
            types,
        } => {
            let filters = query::build_filters(&cities, &types, None, None);
            query::run_rename(
                &cfg,
                &question,
                &store_name,
                &new_name,
                &filters,
                &ParamOverrides::default(),
            )
            .await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

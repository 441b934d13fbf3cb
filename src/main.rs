//! # Wellness RAG CLI (`wrag`)
//!
//! ## Usage
//!
//! ```bash
//! wrag --config ./config/wrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wrag init` | Create the SQLite database and schema |
//! | `wrag ingest <file>` | Validate, chunk, embed and store research documents |
//! | `wrag search "<query>"` | Answer a question with citations and an evidence grade |
//! | `wrag grade <file>` | Grade a document set offline |
//! | `wrag reembed` | Embed chunks that have no vector yet |
//! | `wrag stats` | Show what is indexed |
//! | `wrag health` | Check the database and provider credentials |
//! | `wrag reset --yes` | Delete every document and chunk |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use wellness_rag::search::FilterArgs;
use wellness_rag::{config, embed_cmd, grade, ingest, logging, migrate, search, stats};

/// Wellness RAG: evidence-graded answers over wellness research.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/wrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wrag",
    about = "Wellness RAG — evidence-graded answers over wellness research",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest research documents from a JSON file.
    ///
    /// Chunks are embedded inline when an embedding provider is configured,
    /// otherwise they are stored pending `wrag reembed`.
    Ingest {
        /// JSON array of document records, or `{"documents": [...]}`.
        file: PathBuf,

        /// Validate and count chunks without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of records to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the indexed research.
    Search {
        query: String,

        /// Maximum number of chunks to retrieve (1-50).
        #[arg(long)]
        limit: Option<usize>,

        /// Restrict to a study type, e.g. "Randomized Controlled Trial". Repeatable.
        #[arg(long = "study-type")]
        study_types: Vec<String>,

        /// Earliest publication date (YYYY-MM-DD, YYYY-MM or YYYY).
        #[arg(long)]
        since: Option<String>,

        /// Latest publication date (YYYY-MM-DD, YYYY-MM or YYYY).
        #[arg(long)]
        until: Option<String>,

        /// Drop documents reporting fewer participants, or none.
        #[arg(long)]
        min_sample_size: Option<u32>,

        /// Drop documents that declare a conflict of interest.
        #[arg(long)]
        exclude_conflicts: bool,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Grade the evidence in a documents file without retrieval.
    Grade {
        file: PathBuf,

        /// Year recency is measured against. Defaults to the current year.
        #[arg(long)]
        as_of_year: Option<i32>,

        #[arg(long)]
        json: bool,
    },

    /// Embed chunks that are missing vectors.
    Reembed {
        /// Re-embed a single chunk, even if it already has a vector.
        #[arg(long)]
        chunk_id: Option<String>,

        /// Maximum number of chunks to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without embedding anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show database statistics.
    Stats,

    /// Check database connectivity and provider configuration.
    Health {
        #[arg(long)]
        json: bool,
    },

    /// Delete all documents and chunks.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            dry_run,
            limit,
        } => {
            ingest::run_ingest(&cfg, &file, dry_run, limit).await?;
        }
        Commands::Search {
            query,
            limit,
            study_types,
            since,
            until,
            min_sample_size,
            exclude_conflicts,
            json,
        } => {
            let filters = FilterArgs {
                study_types,
                since,
                until,
                min_sample_size,
                exclude_conflicts,
            };
            search::run_search(&cfg, &query, limit, filters, json).await?;
        }
        Commands::Grade {
            file,
            as_of_year,
            json,
        } => {
            grade::run_grade(&cfg, &file, as_of_year, json)?;
        }
        Commands::Reembed {
            chunk_id,
            limit,
            batch_size,
            dry_run,
        } => {
            embed_cmd::run_reembed(&cfg, chunk_id.as_deref(), limit, batch_size, dry_run).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Health { json } => {
            stats::run_health(&cfg, json).await?;
        }
        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!("Refusing to delete all data without --yes");
            }
            migrate::reset(&cfg).await?;
        }
    }

    Ok(())
}

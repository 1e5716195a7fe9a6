//! # Prompt Harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest [--config ./config/harvest.toml] [--progress human|json|off] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest run` | Fetch, extract, classify, and dedup every source (dry-run) |
//! | `harvest run --live` | Same, then write new records to the store |
//! | `harvest run --output-json P --output-csv P [--export-all]` | Also export new (or all scraped) cases |
//! | `harvest init` | Create the local SQLite schema (sqlite backend) |
//! | `harvest sources` | List configured sources and their candidate files |
//! | `harvest schema` | Print the remote table schema as JSON |
//!
//! Live runs against the Airtable backend read `AIRTABLE_API_KEY` and
//! `AIRTABLE_BASE_ID` from the environment. `GITHUB_TOKEN` is optional.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use prompt_harvest::config::{self, StoreBackend};
use prompt_harvest::export::{self, ExportScope};
use prompt_harvest::pipeline::{self, Pipeline, RunMode};
use prompt_harvest::progress::ProgressMode;
use prompt_harvest::schema;
use prompt_harvest::sources;
use prompt_harvest::store::{self, SqliteStore};
use prompt_harvest::summary;

/// Prompt Harvest: collect prompt cases from community markdown
/// collections into a deduplicated record store.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Harvest prompt cases from community markdown collections into a deduplicated record store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/harvest.toml` when that file exists, and to
    /// built-in defaults otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Progress on stderr: `human`, `json`, or `off`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true, value_parser = ProgressMode::parse)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the harvest pipeline.
    ///
    /// Dry-run by default: fetches, extracts, classifies, and dedups every
    /// source, then prints a summary and a sample of would-be-created
    /// records without writing anything.
    Run {
        /// Write new records to the configured store.
        #[arg(long)]
        live: bool,

        /// Only harvest this source (`OWNER/REPO`).
        #[arg(long)]
        source: Option<String>,

        /// Also write the run's new records to this JSON file.
        #[arg(long)]
        output_json: Option<PathBuf>,

        /// Also write the run's new records to this CSV file.
        #[arg(long)]
        output_csv: Option<PathBuf>,

        /// Export every scraped case, duplicates included, instead of only
        /// the new ones.
        #[arg(long)]
        export_all: bool,
    },

    /// Initialize the local database schema.
    ///
    /// Only meaningful for the sqlite backend. Idempotent.
    Init,

    /// List configured sources and the candidate files tried for each.
    Sources,

    /// Print the remote store table schema as JSON.
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress_mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(progress_mode.log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            live,
            source,
            output_json,
            output_csv,
            export_all,
        } => {
            let selected = pipeline::select_sources(&cfg.sources, source.as_deref())?;
            let mode = if live { RunMode::Live } else { RunMode::DryRun };

            let store = match mode {
                RunMode::Live => Some(store::open_store(&cfg.store).await?),
                RunMode::DryRun => store::open_store_for_read(&cfg.store)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "store unavailable for dry-run read");
                        None
                    }),
            };

            let pipeline = Pipeline::from_config(&cfg)?;
            let reporter = progress_mode.reporter();
            let report = pipeline
                .run(&selected, mode, store.as_deref(), reporter.as_ref())
                .await?;

            let scope = if export_all {
                ExportScope::All
            } else {
                ExportScope::New
            };
            let exported = export::records_for(&report, scope);
            if let Some(path) = output_json {
                export::write_records_json(&path, mode, scope, &exported)?;
            }
            if let Some(path) = output_csv {
                export::write_records_csv(&path, &exported)?;
            }
            summary::print_summary(&report.summary, &report.new_records, cfg.output.sample_size);
        }
        Commands::Init => match cfg.store.backend {
            StoreBackend::Sqlite => {
                let store = SqliteStore::open(&cfg.store.db_path).await?;
                let cases = store.count().await?;
                store.close().await;
                println!(
                    "Database initialized successfully ({}, {} cases).",
                    cfg.store.db_path.display(),
                    cases
                );
            }
            StoreBackend::Airtable => {
                println!(
                    "The airtable backend has no local schema. Run `harvest schema` for the table definition."
                );
            }
        },
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Schema => {
            schema::print_schema(&cfg)?;
        }
    }

    Ok(())
}

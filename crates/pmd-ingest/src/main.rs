//! PMD Ingest - product master data feed tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pmd_common::logging::{init_logging, LogConfig, LogLevel};
use pmd_ingest::{Attachment, Catalog, FeedDocument, InMemoryCatalog, IngestConfig, ProductMasterData};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pmd-ingest")]
#[command(author, version, about = "Product master data feed ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report which files are PMD feeds
    Detect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Reconcile PMD feeds against a catalog and apply the differences
    Run {
        /// JSON catalog snapshot, created if missing
        #[arg(short, long, default_value = "catalog.json")]
        catalog: PathBuf,

        /// Feed name used in progress logs
        #[arg(short, long)]
        name: Option<String>,

        /// Prepare only, leave the catalog untouched
        #[arg(long)]
        dry_run: bool,

        /// Postgres catalog instead of the JSON snapshot
        #[cfg(feature = "database")]
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("pmd-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let pmd = ProductMasterData::new(IngestConfig::from_env()?)?;

    match cli.command {
        Command::Detect { files } => {
            for file in pmd.autotype(&files) {
                info!("{} is a PMD feed", file.display());
            }
        },
        Command::Run {
            catalog,
            name,
            dry_run,
            #[cfg(feature = "database")]
            database_url,
            files,
        } => {
            let mut document = load_document(&pmd, name, &files)?;

            #[cfg(feature = "database")]
            {
                if let Some(url) = database_url {
                    let catalog = pmd_ingest::PgCatalog::connect(&url)
                        .await
                        .context("Failed to connect to catalog database")?;
                    return run(&pmd, &catalog, &mut document, dry_run).await;
                }
            }

            let snapshot = InMemoryCatalog::load_or_empty(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            run(&pmd, &snapshot, &mut document, dry_run).await?;

            if !dry_run {
                snapshot
                    .save(&catalog)
                    .with_context(|| format!("Failed to save catalog {}", catalog.display()))?;
            }
        },
    }

    Ok(())
}

fn load_document(pmd: &ProductMasterData, name: Option<String>, files: &[PathBuf]) -> Result<FeedDocument> {
    let feeds = pmd.autotype(files);
    for skipped in files.iter().filter(|f| !feeds.contains(f)) {
        warn!("Skipping {}: not a PMD feed", skipped.display());
    }

    let inputs = feeds
        .iter()
        .map(|path| Attachment::read(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let name = name.unwrap_or_else(|| default_name(&feeds));
    Ok(FeedDocument::new(name, inputs))
}

fn default_name(feeds: &[&PathBuf]) -> String {
    feeds
        .first()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pmd".to_string())
}

async fn run<C: Catalog>(
    pmd: &ProductMasterData,
    catalog: &C,
    document: &mut FeedDocument,
    dry_run: bool,
) -> Result<()> {
    info!(document = %document.summary(), "Preparing feed");
    let prepared = pmd.prepare(catalog, document).await?;

    if dry_run {
        info!("Dry run, {} records staged and not applied", prepared.staged());
        return Ok(());
    }

    let applied = pmd.execute(catalog, document).await?;
    info!(
        updated = applied.updated,
        created = applied.created,
        "Ingestion complete"
    );
    Ok(())
}

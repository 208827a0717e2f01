mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_diff::{KeyFormat, PaginationMode, PipelineConfig};
use catalog_diff_http::{CatalogClient, CatalogClientConfig, StatusPolicy};
use catalog_diff_store::SqliteSnapshotStore;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "catalog-diff")]
#[command(about = "Detect changes in the competitor sets of a paginated product catalog")]
struct Cli {
    /// Config file (defaults to ~/.config/catalog-diff/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Snapshot database file
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Catalog name that scopes snapshots and history within the store
    #[arg(long, global = true)]
    catalog: Option<String>,
    /// Write the log into a file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every catalog page and record competitor changes
    Run {
        /// Concurrent page fetchers
        #[arg(long)]
        fetch_workers: Option<usize>,
        /// Concurrent change detectors
        #[arg(long)]
        detect_workers: Option<usize>,
        /// Capacity of the page and batch queues
        #[arg(long)]
        queue_capacity: Option<usize>,
        /// Walk pages one by one until the first missing page
        #[arg(long)]
        probe: bool,
    },
    /// Show recent run reports, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the stored snapshot of one product
    Show {
        /// Catalog product id
        product_id: String,
    },
}

fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("could not determine data directory")?;
    let dir = base.join("catalog-diff");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

fn db_path(cli: &Cli, config: &AppConfig) -> Result<PathBuf> {
    match cli.store.as_ref().or(config.store.path.as_ref()) {
        Some(path) => Ok(path.clone()),
        None => Ok(data_dir()?.join("snapshots.db")),
    }
}

fn open_store(path: &Path, catalog: &str, config: &AppConfig) -> Result<SqliteSnapshotStore> {
    let key_format = KeyFormat::parse(&config.store.key_format)
        .with_context(|| format!("unknown key format: {}", config.store.key_format))?;

    SqliteSnapshotStore::open(path, catalog, key_format)
        .with_context(|| format!("failed to open snapshot store: {}", path.display()))
}

fn build_client(config: &AppConfig, label: &str) -> Result<CatalogClient> {
    let status_policy = StatusPolicy::parse(&config.api.status_policy)
        .with_context(|| format!("unknown status policy: {}", config.api.status_policy))?;

    CatalogClient::new(CatalogClientConfig {
        label: label.to_owned(),
        base_url: config.api.url.clone(),
        app_key: config.api.app_key.clone(),
        status_policy,
        request_timeout: config.api.request_timeout_secs.map(Duration::from_secs),
    })
    .context("failed to build catalog client")
}

fn pipeline_config(
    config: &AppConfig,
    fetch_workers: Option<usize>,
    detect_workers: Option<usize>,
    queue_capacity: Option<usize>,
    probe: bool,
) -> Result<PipelineConfig> {
    let section = &config.pipeline;
    let pagination = if probe {
        PaginationMode::Probe
    } else {
        PaginationMode::parse(&section.pagination)
            .with_context(|| format!("unknown pagination mode: {}", section.pagination))?
    };

    Ok(PipelineConfig {
        fetch_workers: fetch_workers.unwrap_or(section.fetch_workers),
        detect_workers: detect_workers.unwrap_or(section.detect_workers),
        queue_capacity: queue_capacity.unwrap_or(section.queue_capacity),
        pagination,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log.as_deref())?;

    let app_config = config::load_config(cli.config.as_deref());
    let catalog = cli
        .catalog
        .clone()
        .unwrap_or_else(|| app_config.store.catalog.clone());
    let path = db_path(&cli, &app_config)?;
    let store = open_store(&path, &catalog, &app_config)?;

    match cli.command {
        Command::Run {
            fetch_workers,
            detect_workers,
            queue_capacity,
            probe,
        } => {
            let pipeline = pipeline_config(
                &app_config,
                fetch_workers,
                detect_workers,
                queue_capacity,
                probe,
            )?;
            let client = build_client(&app_config, &catalog)?;
            commands::run::run(Arc::new(store), Arc::new(client), pipeline).await
        }
        Command::History { limit } => commands::history::run(&store, limit),
        Command::Show { product_id } => commands::show::run(&store, &product_id).await,
    }
}

//! Thin application bootstrap: wires the catalog and preview service
//! together behind a couple of CLI verbs. Settings/profile loading,
//! platform detection, and the rest of the application shell this would
//! sit inside are out of the core's scope (see spec §1) — this binary
//! exists only so the library is runnable end to end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use previewcore::catalog::{CatalogStore, IngestFileRecord};
use previewcore::logging;
use previewcore::preview::{EventLogger, PreviewService, PreviewServiceConfig};
use previewcore::scanner;

#[derive(Parser)]
#[command(name = "previewcore")]
#[command(about = "Photo catalog and color-managed preview pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a root, scan it, and ingest the files found into the catalog.
    Ingest {
        /// Path to the catalog database file.
        #[arg(long, default_value = "catalog.db")]
        catalog: PathBuf,
        /// Filesystem root to scan and ingest.
        root: PathBuf,
    },
    /// Warm the preview cache for a previously ingested root.
    Warm {
        /// Path to the catalog database file.
        #[arg(long, default_value = "catalog.db")]
        catalog: PathBuf,
        /// Filesystem root to warm (must already be registered).
        root: PathBuf,
        /// Neighbor-prefetch window around each requested file.
        #[arg(long, default_value_t = 2)]
        prefetch: usize,
        /// Number of worker threads.
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn main() -> Result<()> {
    let _guard = logging::init_logging().context("failed to initialize logging")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { catalog, root } => run_ingest(&catalog, &root),
        Commands::Warm { catalog, root, prefetch, workers } => {
            run_warm(&catalog, &root, prefetch, workers)
        }
    }
}

fn run_ingest(catalog_path: &PathBuf, root: &PathBuf) -> Result<()> {
    let store = CatalogStore::configure_database(catalog_path)
        .with_context(|| format!("failed to open catalog at {}", catalog_path.display()))?;

    let root_id = store
        .register_root(root)
        .with_context(|| format!("failed to register root {}", root.display()))?;

    let entries = scanner::scan(root)
        .with_context(|| format!("failed to scan root {}", root.display()))?;
    let records = IngestFileRecord::from_scan_entries(entries);
    let count = records.len();

    store
        .ingest_records(root_id, &records)
        .context("failed to ingest scanned records")?;

    println!("Registered root {root_id} at {}", root.display());
    println!("Ingested {count} files");
    Ok(())
}

fn run_warm(catalog_path: &PathBuf, root: &PathBuf, prefetch: usize, workers: Option<usize>) -> Result<()> {
    let store = Arc::new(
        CatalogStore::configure_database(catalog_path)
            .with_context(|| format!("failed to open catalog at {}", catalog_path.display()))?,
    );
    let root_id = store
        .register_root(root)
        .with_context(|| format!("failed to register root {}", root.display()))?;

    let config = PreviewServiceConfig {
        worker_count: workers.unwrap_or_else(|| PreviewServiceConfig::default().worker_count),
        ..Default::default()
    };
    let service = PreviewService::new(config);
    service.set_catalog_service(store.clone());
    let logger = Arc::new(EventLogger::new());
    service.set_event_sink(logger.clone());
    service.prime_caches(prefetch);

    service
        .warm_root(root_id, root)
        .with_context(|| format!("failed to warm root {}", root.display()))?;
    service.wait_until_idle();

    let (hits, misses, errors, avg_gpu_ms) = logger.summary();
    println!("Warmed root {root_id} at {}", root.display());
    println!(
        "events: {} hits, {} misses, {} errors, avg gpu upload {:.2}ms",
        hits, misses, errors, avg_gpu_ms
    );
    Ok(())
}

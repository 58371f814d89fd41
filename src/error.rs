//! Error kinds for the catalog boundary.
//!
//! Degraded-path failures (extract/transform/GPU upload) are never
//! represented here — they are folded into `CacheEvent`/`PreviewImage`
//! fields instead, per the pipeline's never-abort-a-worker contract.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog used before configure_database")]
    NotOpen,

    #[error("preview root missing: {0}")]
    RootMissing(PathBuf),

    #[error("catalog store failure: {0}")]
    StoreFailure(#[from] rusqlite::Error),

    #[error("invalid catalog configuration: {0}")]
    ConfigError(String),
}

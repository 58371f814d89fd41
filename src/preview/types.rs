//! In-memory types shared across the preview pipeline.

use std::path::PathBuf;

use crate::cache::Tier;

/// In-memory record identifying a file for the preview pipeline; distinct
/// from the catalog's `File` row. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewDescriptor {
    pub root_id: i64,
    pub file_id: Option<i64>,
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub file_size: u64,
    pub capture_ts: i64,
}

impl PreviewDescriptor {
    /// `"<relative_path>#<root_id>"`.
    pub fn cache_key(&self) -> String {
        format!("{}#{}", self.relative_path, self.root_id)
    }
}

/// A produced preview image, in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub cache_key: String,
    pub source_path: PathBuf,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color_managed: bool,
    pub color_profile: String,
}

/// Structured observable emitted once per processed job.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    pub root_id: i64,
    pub relative_path: String,
    pub tier: Tier,
    pub hit: bool,
    pub error: bool,
    pub error_message: String,
    pub backend: String,
    pub gpu_upload_ms: f64,
    pub color_transform_ms: f64,
}

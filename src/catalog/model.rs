//! Catalog data model: roots, files, stacks, sync events.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scanner::ScanEntry;

/// RAW extensions recognized for stacking and ICC-extractor gating (lowercased, with dot).
const RAW_EXTENSIONS: &[&str] = &[
    ".cr2", ".cr3", ".nef", ".arw", ".raf", ".orf", ".rw2", ".dng",
];

/// JPEG extensions (lowercased, with dot).
const JPEG_EXTENSIONS: &[&str] = &[".jpg", ".jpeg"];

/// Lowercase a file's extension including its leading dot, e.g. `"IMG.CR3" -> ".cr3"`.
/// Files with no extension produce an empty string.
pub fn normalize_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx..].to_lowercase(),
        None => String::new(),
    }
}

pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS.contains(&ext)
}

pub fn is_jpeg_extension(ext: &str) -> bool {
    JPEG_EXTENSIONS.contains(&ext)
}

/// The filename-base used for stacking: the substring before the last `.`.
/// A name with no `.` is its own base.
pub fn filename_base(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) => &filename[..idx],
        None => filename,
    }
}

/// Preview state recorded for a file, farthest stage reached so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle = 0,
    Cached = 1,
    GpuResident = 2,
}

impl PreviewState {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => PreviewState::Cached,
            2 => PreviewState::GpuResident,
            _ => PreviewState::Idle,
        }
    }
}

/// A registered scan root.
#[derive(Debug, Clone, PartialEq)]
pub struct Root {
    pub id: i64,
    pub absolute_path: String,
    pub created_at: i64,
}

/// A single ingested file record, as produced by the scanner before it is
/// assigned an id by `ingest_records`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestFileRecord {
    pub relative_path: String,
    pub filename: String,
    pub extension: String,
    pub capture_ts: i64,
    pub file_size: i64,
}

impl IngestFileRecord {
    /// Build a record from a relative path and raw file stats, normalizing
    /// the extension and deriving the filename.
    pub fn new(relative_path: impl Into<String>, capture_ts: i64, file_size: i64) -> Self {
        let relative_path = relative_path.into();
        let filename = Path::new(&relative_path)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.clone());
        let extension = normalize_extension(&filename);
        Self {
            relative_path,
            filename,
            extension,
            capture_ts,
            file_size,
        }
    }

    /// Converts a freshly scanned root into ingest-ready records in
    /// parallel; scan order plays no role here since `ingest_records`
    /// sorts each stacking group by `relative_path` itself.
    pub fn from_scan_entries(entries: Vec<ScanEntry>) -> Vec<IngestFileRecord> {
        entries
            .into_par_iter()
            .map(|entry| IngestFileRecord::new(entry.relative_path, entry.capture_ts, entry.file_size as i64))
            .collect()
    }
}

/// Structured payload for a `created`/`modified`/`removed` sync-queue
/// event. The catalog stores `payload` as an opaque string; this is the
/// shape callers are expected to serialize into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEventPayload {
    pub file_size: i64,
    pub capture_ts: i64,
}

impl SyncEventPayload {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// A catalog row as returned by `list_files`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub id: i64,
    pub relative_path: String,
    pub extension: String,
    pub stack_group_id: Option<i64>,
    pub preview_state: PreviewState,
}

/// A stack's materialized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
    Pair,
    Sequence,
}

impl StackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackType::Pair => "pair",
            StackType::Sequence => "sequence",
        }
    }
}

/// An append-only sync-queue event.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
    pub id: i64,
    pub root_id: i64,
    pub relative_path: String,
    pub event_type: String,
    pub payload: String,
    pub processed: bool,
    pub created_at: i64,
}

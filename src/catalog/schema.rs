use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::CatalogError;

/// Durable, single-process SQL catalog.
///
/// All mutating operations take the internal mutex, ensuring serial writes
/// and consistent reads; reads take the same lock rather than a
/// reader/writer split, since the pipeline is I/O-bound rather than
/// contention-bound.
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    /// Open or create the catalog at `path`, creating its parent directory
    /// if needed, and initialize the schema.
    pub fn configure_database(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::ConfigError(format!(
                        "failed to create catalog directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory catalog. Used by tests and by short-lived tools.
    pub fn configure_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create missing tables/indexes. Idempotent.
    pub fn initialize_schema(&self) -> Result<(), CatalogError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS root_folders (
                id INTEGER PRIMARY KEY,
                path TEXT UNIQUE NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                root_id INTEGER NOT NULL REFERENCES root_folders(id) ON DELETE CASCADE,
                relative_path TEXT NOT NULL,
                filename TEXT NOT NULL,
                extension TEXT NOT NULL,
                capture_ts INTEGER NOT NULL,
                file_size INTEGER NOT NULL,
                rating INTEGER NOT NULL DEFAULT 0,
                color INTEGER NOT NULL DEFAULT 0,
                ingest_seq INTEGER NOT NULL DEFAULT 0,
                stack_group_id INTEGER,
                metadata_rev INTEGER NOT NULL DEFAULT 0,
                preview_state INTEGER NOT NULL DEFAULT 0,
                UNIQUE(root_id, relative_path)
            );

            CREATE TABLE IF NOT EXISTS stacks (
                stack_group_id INTEGER PRIMARY KEY,
                type TEXT NOT NULL CHECK (type IN ('pair', 'sequence')),
                anchor_file_id INTEGER NOT NULL REFERENCES files(id)
            );

            CREATE TABLE IF NOT EXISTS metadata_blobs (
                file_id INTEGER PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
                iptc_json TEXT,
                xmp_json TEXT,
                updated_at INTEGER,
                template_source TEXT
            );

            CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY,
                root_id INTEGER NOT NULL REFERENCES root_folders(id),
                relative_path TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                processed_flag INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_root_relpath ON files(root_id, relative_path);
            CREATE INDEX IF NOT EXISTS idx_files_browse ON files(root_id, capture_ts, ingest_seq, id);
            CREATE INDEX IF NOT EXISTS idx_sync_queue_pending ON sync_queue(processed_flag, id);
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

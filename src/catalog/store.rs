use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension};

use crate::error::CatalogError;

use super::model::{
    filename_base, is_jpeg_extension, is_raw_extension, FileRow, IngestFileRecord, PreviewState,
    Root, StackType, SyncEvent,
};
use super::schema::CatalogStore;

fn now_epoch_s() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl CatalogStore {
    /// Register a root by absolute path. Idempotent: registering the same
    /// path twice returns the same id.
    pub fn register_root(&self, absolute_path: &Path) -> Result<i64, CatalogError> {
        let canonical = absolute_path
            .canonicalize()
            .unwrap_or_else(|_| absolute_path.to_path_buf());
        let path_str = canonical.to_string_lossy().to_string();

        let conn = self.conn();
        if let Some(id) = conn
            .query_row(
                "SELECT id FROM root_folders WHERE path = ?1",
                [&path_str],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO root_folders (path, created_at) VALUES (?1, ?2)",
            params![path_str, now_epoch_s()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a registered root by id.
    pub fn get_root(&self, root_id: i64) -> Result<Option<Root>, CatalogError> {
        let conn = self.conn();
        let root = conn
            .query_row(
                "SELECT id, path, created_at FROM root_folders WHERE id = ?1",
                [root_id],
                |row| {
                    Ok(Root {
                        id: row.get(0)?,
                        absolute_path: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(root)
    }

    /// Ingest a batch of file records for `root_id` in a single transaction.
    /// Groups records sharing a filename base (within this batch) into a
    /// stack when the group size is >= 2. The anchor is the first member
    /// once the group is sorted by `relative_path`, so re-ingesting the
    /// same files in a different scan order yields the same anchor.
    pub fn ingest_records(
        &self,
        root_id: i64,
        records: &[IngestFileRecord],
    ) -> Result<Vec<i64>, CatalogError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(records.len());
        // filename base -> list of (relative_path, file_id)
        let mut groups: HashMap<&str, Vec<(&str, i64)>> = HashMap::new();

        for record in records {
            tx.execute(
                "INSERT INTO files
                    (root_id, relative_path, filename, extension, capture_ts, file_size,
                     rating, color, ingest_seq, stack_group_id, metadata_rev, preview_state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0, NULL, 0, 0)",
                params![
                    root_id,
                    record.relative_path,
                    record.filename,
                    record.extension,
                    record.capture_ts,
                    record.file_size,
                ],
            )?;
            let file_id = tx.last_insert_rowid();
            ids.push(file_id);

            groups
                .entry(filename_base(&record.filename))
                .or_default()
                .push((record.relative_path.as_str(), file_id));
        }

        for (_base, mut members) in groups {
            if members.len() < 2 {
                continue;
            }
            members.sort_by(|a, b| a.0.cmp(b.0));

            let has_raw = records
                .iter()
                .any(|r| members.iter().any(|m| m.0 == r.relative_path) && is_raw_extension(&r.extension));
            let has_jpeg = records
                .iter()
                .any(|r| members.iter().any(|m| m.0 == r.relative_path) && is_jpeg_extension(&r.extension));
            let stack_type = if has_raw && has_jpeg {
                StackType::Pair
            } else {
                StackType::Sequence
            };

            let anchor_file_id = members[0].1;
            tx.execute(
                "INSERT INTO stacks (type, anchor_file_id) VALUES (?1, ?2)",
                params![stack_type.as_str(), anchor_file_id],
            )?;
            let stack_group_id = tx.last_insert_rowid();

            for (_, file_id) in &members {
                tx.execute(
                    "UPDATE files SET stack_group_id = ?1 WHERE id = ?2",
                    params![stack_group_id, file_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// List a root's files ordered by ascending id.
    pub fn list_files(&self, root_id: i64) -> Result<Vec<FileRow>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, relative_path, extension, stack_group_id, preview_state
             FROM files WHERE root_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([root_id], |row| {
                let preview_state: i64 = row.get(4)?;
                Ok(FileRow {
                    id: row.get(0)?,
                    relative_path: row.get(1)?,
                    extension: row.get(2)?,
                    stack_group_id: row.get(3)?,
                    preview_state: PreviewState::from_i64(preview_state),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Write a file's new preview state. No-op if the file no longer exists.
    pub fn update_preview_state(&self, file_id: i64, state: PreviewState) -> Result<(), CatalogError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE files SET preview_state = ?1 WHERE id = ?2",
            params![state as i64, file_id],
        )?;
        Ok(())
    }

    /// Append a sync-queue event; assigns a monotonic id.
    pub fn enqueue_sync_event(
        &self,
        root_id: i64,
        relative_path: &str,
        event_type: &str,
        payload: &str,
    ) -> Result<i64, CatalogError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_queue (root_id, relative_path, event_type, payload, processed_flag, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![root_id, relative_path, event_type, payload, now_epoch_s()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All events not yet marked processed, in id order.
    pub fn pending_sync_events(&self) -> Result<Vec<SyncEvent>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, root_id, relative_path, event_type, payload, processed_flag, created_at
             FROM sync_queue WHERE processed_flag = 0 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let processed_flag: i64 = row.get(5)?;
                Ok(SyncEvent {
                    id: row.get(0)?,
                    root_id: row.get(1)?,
                    relative_path: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                    processed: processed_flag != 0,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark a sync-queue event as processed. At-least-once delivery: a
    /// crash between reading pending events and calling this will redeliver
    /// the event on the next `pending_sync_events` call.
    pub fn mark_sync_event_processed(&self, id: i64) -> Result<(), CatalogError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE sync_queue SET processed_flag = 1 WHERE id = ?1",
            [id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(relative_path: &str) -> IngestFileRecord {
        IngestFileRecord::new(relative_path, 0, 100)
    }

    #[test]
    fn register_root_is_idempotent() {
        let store = CatalogStore::configure_in_memory().unwrap();
        let id1 = store.register_root(Path::new("/tmp/nonexistent-root-a")).unwrap();
        let id2 = store.register_root(Path::new("/tmp/nonexistent-root-a")).unwrap();
        assert_eq!(id1, id2);
        assert!(id1 >= 1);
    }

    #[test]
    fn schema_init_scenario() {
        let store = CatalogStore::configure_in_memory().unwrap();
        let id = store.register_root(Path::new("/tmp/r")).unwrap();
        assert!(id >= 1);
        assert!(store.list_files(id).unwrap().is_empty());
    }

    #[test]
    fn stack_pair_scenario() {
        let store = CatalogStore::configure_in_memory().unwrap();
        let root_id = store.register_root(Path::new("/tmp/stack-pair")).unwrap();

        let records = vec![
            record("IMG_0001.CR3"),
            record("IMG_0001.JPG"),
            record("RANDOM.TXT"),
        ];
        let ids = store.ingest_records(root_id, &records).unwrap();
        assert_eq!(ids.len(), 3);

        let rows = store.list_files(root_id).unwrap();
        assert_eq!(rows.len(), 3);

        let stacked: Vec<&FileRow> = rows.iter().filter(|r| r.stack_group_id.is_some()).collect();
        assert_eq!(stacked.len(), 2);
        assert_eq!(stacked[0].stack_group_id, stacked[1].stack_group_id);

        let txt_row = rows.iter().find(|r| r.relative_path == "RANDOM.TXT").unwrap();
        assert!(txt_row.stack_group_id.is_none());

        let conn = store.conn();
        let stack_type: String = conn
            .query_row(
                "SELECT type FROM stacks WHERE stack_group_id = ?1",
                [stacked[0].stack_group_id.unwrap()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stack_type, "pair");
    }

    #[test]
    fn sequence_stack_when_no_raw_jpeg_pair() {
        let store = CatalogStore::configure_in_memory().unwrap();
        let root_id = store.register_root(Path::new("/tmp/seq")).unwrap();

        // Same filename base, neither a RAW+JPEG pair -> "sequence".
        let same_base = vec![
            IngestFileRecord::new("seq.cr3", 0, 1),
            IngestFileRecord::new("seq.raf", 0, 1),
        ];
        let ids = store.ingest_records(root_id, &same_base).unwrap();
        assert_eq!(ids.len(), 2);
        let rows = store.list_files(root_id).unwrap();
        let stack_id = rows[0].stack_group_id.unwrap();
        let conn = store.conn();
        let stack_type: String = conn
            .query_row(
                "SELECT type FROM stacks WHERE stack_group_id = ?1",
                [stack_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stack_type, "sequence");
    }

    #[test]
    fn anchor_is_stable_regardless_of_ingest_order() {
        let store_a = CatalogStore::configure_in_memory().unwrap();
        let root_a = store_a.register_root(Path::new("/tmp/anchor-a")).unwrap();
        store_a
            .ingest_records(root_a, &[record("IMG_0001.CR3"), record("IMG_0001.JPG")])
            .unwrap();

        let store_b = CatalogStore::configure_in_memory().unwrap();
        let root_b = store_b.register_root(Path::new("/tmp/anchor-b")).unwrap();
        store_b
            .ingest_records(root_b, &[record("IMG_0001.JPG"), record("IMG_0001.CR3")])
            .unwrap();

        let anchor_path = |store: &CatalogStore, root_id: i64| -> String {
            let conn = store.conn();
            conn.query_row(
                "SELECT f.relative_path FROM files f
                 JOIN stacks s ON s.anchor_file_id = f.id
                 WHERE f.root_id = ?1",
                [root_id],
                |row| row.get(0),
            )
            .unwrap()
        };

        assert_eq!(anchor_path(&store_a, root_a), anchor_path(&store_b, root_b));
        assert_eq!(anchor_path(&store_a, root_a), "IMG_0001.CR3");
    }

    #[test]
    fn sync_queue_round_trip() {
        let store = CatalogStore::configure_in_memory().unwrap();
        let root_id = store.register_root(Path::new("/tmp/sync")).unwrap();

        let event_id = store
            .enqueue_sync_event(root_id, "IMG_0001.CR3", "created", "{}")
            .unwrap();

        let pending = store.pending_sync_events().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].processed);
        assert_eq!(pending[0].id, event_id);

        store.mark_sync_event_processed(event_id).unwrap();
        assert!(store.pending_sync_events().unwrap().is_empty());
    }

    #[test]
    fn update_preview_state_on_missing_file_is_noop() {
        let store = CatalogStore::configure_in_memory().unwrap();
        store.update_preview_state(999, PreviewState::Cached).unwrap();
    }
}

mod model;
mod schema;
mod store;

pub use model::{
    filename_base, is_jpeg_extension, is_raw_extension, normalize_extension, FileRow,
    IngestFileRecord, PreviewState, Root, StackType, SyncEvent, SyncEventPayload,
};
pub use schema::CatalogStore;

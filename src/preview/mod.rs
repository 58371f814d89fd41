//! The preview pipeline: extraction, color management, GPU upload, and the
//! worker pool that drives them.

mod color;
mod extractor;
mod gpu_bridge;
mod icc;
mod service;
mod sink;
mod types;

pub use color::ColorTransformer;
pub use extractor::{extract, MAX_READ_BYTES};
pub use gpu_bridge::{create_bridge, Backend, GpuBridge, StubGpuBridge};
pub use icc::extract_embedded_profile;
pub use service::{PreviewService, PreviewServiceConfig};
pub use sink::{CacheEventSink, EventLogger, MockUiSubscriber, Navigator};
pub use types::{CacheEvent, PreviewDescriptor, PreviewImage};

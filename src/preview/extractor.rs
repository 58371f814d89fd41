//! Preview Extractor (C4): reads a bounded byte prefix as a preview
//! surrogate. Not a decoded image — a deterministic stand-in whose shape
//! (width/height) is derived from the file size, so a real decoder can
//! later be swapped in behind the same interface.

use std::fs::File;
use std::io::Read;

use super::types::{PreviewDescriptor, PreviewImage};

/// Maximum number of bytes read from the head of the source file.
pub const MAX_READ_BYTES: usize = 262_144;

fn pseudo_dimension(basis: u64, floor: u32) -> u32 {
    floor.max(floor + (basis % 2048) as u32)
}

/// Read up to `MAX_READ_BYTES` from `descriptor.absolute_path`. On I/O
/// failure, `pixels = [0]` rather than surfacing an error — extraction
/// failures are a degraded path, not a caller-visible error (§7).
pub fn extract(descriptor: &PreviewDescriptor) -> PreviewImage {
    let pixels = match File::open(&descriptor.absolute_path) {
        Ok(mut file) => {
            let mut buf = vec![0u8; MAX_READ_BYTES];
            match file.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    if buf.is_empty() {
                        vec![0]
                    } else {
                        buf
                    }
                }
                Err(_) => vec![0],
            }
        }
        Err(_) => vec![0],
    };

    let width = pseudo_dimension(descriptor.file_size, 512);
    let height = pseudo_dimension(descriptor.file_size / 2, 256);

    PreviewImage {
        cache_key: descriptor.cache_key(),
        source_path: descriptor.absolute_path.clone(),
        pixels,
        width,
        height,
        color_managed: false,
        color_profile: String::new(),
    }
}

//! ICC Profile Extractor (C5): parses JPEG APP2 segments to reconstruct an
//! embedded ICC profile.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP2: u8 = 0xE2;
const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE";

fn is_jpeg_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("jpg") | Some("jpeg")
    )
}

/// Returns the embedded ICC profile reassembled from JPEG APP2 chunks, or
/// empty if absent, malformed, or the file is not a JPEG (RAW ICC
/// extraction is a future extension).
pub fn extract_embedded_profile(path: &Path) -> Vec<u8> {
    if !is_jpeg_path(path) {
        return Vec::new();
    }
    let Ok(bytes) = fs::read(path) else {
        return Vec::new();
    };
    extract_from_jpeg_bytes(&bytes)
}

fn extract_from_jpeg_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() < 2 || bytes[0..2] != SOI {
        return Vec::new();
    }

    let mut chunks: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
    let mut chunk_total_seen: Option<u8> = None;
    let mut pos = 2usize;

    loop {
        // Scan for the 0xFF marker prefix.
        while pos < bytes.len() && bytes[pos] != 0xFF {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        // Skip any fill bytes (multiple consecutive 0xFF).
        while pos < bytes.len() && bytes[pos] == 0xFF {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        let marker = bytes[pos];
        pos += 1;

        if marker == EOI || marker == SOS {
            break;
        }

        if pos + 2 > bytes.len() {
            break;
        }
        let length = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        if length < 2 {
            break;
        }
        let payload_len = length - 2;
        if pos + 2 + payload_len > bytes.len() {
            break;
        }
        let payload = &bytes[pos + 2..pos + 2 + payload_len];
        pos += 2 + payload_len;

        if marker == APP2 && payload.len() >= 14 && payload[0..11] == *ICC_SIGNATURE && payload[11] == 0 {
            let chunk_index = payload[12];
            let chunk_total = payload[13];
            if chunk_index >= 1 && chunk_total >= 1 {
                chunks.insert(chunk_index, payload[14..].to_vec());
                chunk_total_seen =
                    Some(chunk_total_seen.map_or(chunk_total, |seen| seen.max(chunk_total)));
            }
        }
        // Any other marker: already skipped via pos advance above.
    }

    let expected = chunk_total_seen.unwrap_or(chunks.len() as u8);
    if expected == 0 {
        return Vec::new();
    }

    let mut assembled = Vec::new();
    for index in 1..=expected {
        match chunks.get(&index) {
            Some(chunk) => assembled.extend_from_slice(chunk),
            None => return Vec::new(),
        }
    }
    assembled
}

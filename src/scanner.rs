//! Directory Scanner (C3): walks a root, yielding file descriptors.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::error::CatalogError;

/// A single regular file found under a scanned root.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub absolute_path: PathBuf,
    /// Forward-slash-separated path relative to the scan root.
    pub relative_path: String,
    pub file_size: u64,
    /// Last-modified time in whole epoch seconds, 0 if unavailable.
    pub capture_ts: i64,
}

/// Recursively enumerates regular files under `root`.
///
/// Symlinked files are followed; symlinked directories are not recursed
/// into (to avoid cycles). Fails with `RootMissing` if `root` does not
/// exist.
pub fn scan(root: &Path) -> Result<Vec<ScanEntry>, CatalogError> {
    if !root.exists() {
        return Err(CatalogError::RootMissing(root.to_path_buf()));
    }

    let mut entries = Vec::new();

    // follow_links(false): walkdir never descends through a symlinked
    // directory on its own. We then resolve each symlink entry's target
    // ourselves so that a symlink to a *file* is still reported.
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }

        let metadata = if file_type.is_symlink() {
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            }
        } else if file_type.is_file() {
            match entry.metadata() {
                Ok(meta) => meta,
                Err(_) => continue,
            }
        } else {
            continue;
        };

        let relative_path = to_forward_slash_relative(root, path);
        let capture_ts = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        entries.push(ScanEntry {
            absolute_path: path.to_path_buf(),
            relative_path,
            file_size: metadata.len(),
            capture_ts,
        });
    }

    Ok(entries)
}

fn to_forward_slash_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scan_missing_root_fails() {
        let result = scan(Path::new("/nonexistent/preview-root"));
        assert!(matches!(result, Err(CatalogError::RootMissing(_))));
    }

    #[test]
    fn scan_finds_nested_files_with_forward_slash_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/photo.jpg"), b"data").unwrap();
        fs::write(root.join("top.jpg"), b"data").unwrap();

        let entries = scan(root).unwrap();
        let mut relative_paths: Vec<&str> =
            entries.iter().map(|e| e.relative_path.as_str()).collect();
        relative_paths.sort();

        assert_eq!(relative_paths, vec!["a/b/photo.jpg", "top.jpg"]);
    }

    #[test]
    fn scan_reports_file_size() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("photo.jpg"), b"0123456789").unwrap();

        let entries = scan(root).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_size, 10);
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_file_symlink_but_not_directory_symlink() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("real_dir")).unwrap();
        fs::write(root.join("real_dir/inner.jpg"), b"data").unwrap();
        fs::write(root.join("real_file.jpg"), b"data").unwrap();

        symlink(root.join("real_file.jpg"), root.join("link_to_file.jpg")).unwrap();
        symlink(root.join("real_dir"), root.join("link_to_dir")).unwrap();

        let entries = scan(root).unwrap();
        let mut relative_paths: Vec<&str> =
            entries.iter().map(|e| e.relative_path.as_str()).collect();
        relative_paths.sort();

        // The symlinked file is followed and reported; the symlinked
        // directory is not recursed into, so "link_to_dir/inner.jpg" never
        // appears (and the symlink itself is not a regular file, so it's
        // absent too).
        assert_eq!(
            relative_paths,
            vec!["link_to_file.jpg", "real_dir/inner.jpg", "real_file.jpg"]
        );
    }
}

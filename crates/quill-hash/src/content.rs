//! Per-file content hashing, memoized by modification time

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Stat-plus-hash snapshot of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Last-modified time in milliseconds since the epoch; used to
    /// invalidate the memoized hash.
    pub mtime_ms: u64,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 of the file contents, hex-encoded.
    pub hash: String,
}

/// SHA-256 of arbitrary bytes, hex-encoded.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// The hash of empty content; stands in for files that do not exist.
pub fn empty_hash() -> String {
    hex::encode(Sha256::new().finalize())
}

/// Computes and memoizes content hashes for files under a source root.
///
/// Entries are keyed by logical path and carry the mtime observed when the
/// hash was computed. A lookup whose stat disagrees with the memo entry
/// recomputes and replaces it, so no explicit invalidation call exists; the
/// cost is one stat per lookup.
#[derive(Debug)]
pub struct ContentHasher {
    root: PathBuf,
    cache: DashMap<String, FileInfo>,
}

impl ContentHasher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stat, hash and memoize the file at the given logical path. Returns
    /// `None` for missing paths and non-files, evicting any stale entry.
    pub fn file_info(&self, path: &str) -> Option<FileInfo> {
        let full = self.root.join(path);
        let metadata = match std::fs::metadata(&full) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                self.cache.remove(path);
                return None;
            }
        };
        let mtime_ms = mtime_millis(&metadata)?;

        if let Some(entry) = self.cache.get(path) {
            if entry.mtime_ms >= mtime_ms {
                return Some(entry.clone());
            }
        }

        let contents = match std::fs::read(&full) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::warn!("Cannot read {}: {}", full.display(), error);
                self.cache.remove(path);
                return None;
            }
        };
        let info = FileInfo {
            mtime_ms,
            size: contents.len() as u64,
            hash: hash_bytes(&contents),
        };
        self.cache.insert(path.to_string(), info.clone());
        Some(info)
    }

    /// The content hash for the given path, or the empty-content hash when
    /// the file does not exist.
    pub fn file_hash(&self, path: &str) -> String {
        self.file_info(path).map_or_else(empty_hash, |info| info.hash)
    }
}

pub(crate) fn mtime_millis(metadata: &std::fs::Metadata) -> Option<u64> {
    let modified = metadata.modified().ok()?;
    let elapsed = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(elapsed.as_millis() as u64)
}

//! Cache directory layout for generated artifacts

use std::path::{Path, PathBuf};

/// Hidden directory holding all quill state within the source root.
pub const CACHE_DIR: &str = ".quill";

/// Subdirectory of [`CACHE_DIR`] mirroring logical paths of generated files.
pub const CACHE_TREE: &str = "cache";

/// Get the cache tree path: `<root>/.quill/cache`
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(CACHE_TREE)
}

/// The root-relative logical location of a generated artifact,
/// e.g. `.quill/cache/data/sales.csv`.
pub fn cache_output_path(target: &str) -> String {
    format!("{CACHE_DIR}/{CACHE_TREE}/{target}")
}

/// Temp file used while a loader is writing its output. The process id in
/// the name keeps two racing build processes from sharing a temp file.
pub fn temp_path(root: &Path, target: &str) -> PathBuf {
    cache_dir(root).join(format!("{target}.{}", std::process::id()))
}

/// Sentinel recording a failed generation attempt; its mtime is the failure
/// timestamp. Lives alongside the temp file it was renamed from.
pub fn failure_marker_path(root: &Path, target: &str) -> PathBuf {
    let mut path = temp_path(root, target).into_os_string();
    path.push(".err");
    PathBuf::from(path)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Remove the entire cache directory.
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = root.join(CACHE_DIR);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
        tracing::debug!("Cache cleared: {}", cache.display());
    }
    Ok(())
}

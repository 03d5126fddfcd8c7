//! Transitive module-graph hashing
//!
//! The digest of a module folds in the module's own contents, every local
//! import reachable from it, and every attached file it references. It feeds
//! cache-busting URLs, so it must be stable across repeated builds of
//! unchanged content: the fold is order-sensitive and the walk visits paths
//! in first-discovered order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use quill_core::analyzer::{ModuleAnalyzer, ModuleRefs};
use quill_core::route::{RouteMatch, route};
use quill_core::{file_ext, normalize, resolve_relative, strip_ext};

use crate::content::{ContentHasher, empty_hash, hash_bytes, mtime_millis};

/// Analyzed snapshot of one module, memoized by mtime like
/// [`crate::content::FileInfo`].
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub mtime_ms: u64,
    /// SHA-256 of the module source.
    pub hash: String,
    /// Imports and file attachments, as written in the source.
    pub refs: ModuleRefs,
}

/// Find the source file backing a module's logical path. A `.js` logical
/// path may be backed by a `.ts`, `.jsx` or `.tsx` source.
pub fn find_module(root: &Path, path: &str) -> Option<RouteMatch> {
    let ext = file_ext(path);
    if ext.is_empty() {
        return None;
    }
    let mut exts = vec![ext.to_string()];
    if ext == ".js" {
        exts.extend([".ts", ".jsx", ".tsx"].map(String::from));
    }
    route(root, strip_ext(path), &exts)
}

/// Walks a module's transitive local-import graph and folds per-node hashes
/// into one digest. Cycle-safe: visited-set membership is by resolved path.
pub struct ModuleGraphHasher {
    root: PathBuf,
    content: Arc<ContentHasher>,
    analyzer: Arc<dyn ModuleAnalyzer>,
    cache: DashMap<String, ModuleInfo>,
}

impl ModuleGraphHasher {
    pub fn new(
        root: impl Into<PathBuf>,
        content: Arc<ContentHasher>,
        analyzer: Arc<dyn ModuleAnalyzer>,
    ) -> Self {
        Self {
            root: root.into(),
            content,
            analyzer,
            cache: DashMap::new(),
        }
    }

    /// Analyze the module at the given logical path, memoized by the source
    /// file's mtime. Returns `None` when the module is missing or analysis
    /// fails; stale memo entries are evicted either way.
    pub fn module_info(&self, path: &str) -> Option<ModuleInfo> {
        let Some(found) = find_module(&self.root, path) else {
            return None;
        };
        let key = found.path;
        let full = self.root.join(&key);
        let metadata = match std::fs::metadata(&full) {
            Ok(metadata) => metadata,
            Err(_) => {
                self.cache.remove(&key);
                return None;
            }
        };
        let mtime_ms = mtime_millis(&metadata)?;

        if let Some(entry) = self.cache.get(&key) {
            if entry.mtime_ms >= mtime_ms {
                return Some(entry.clone());
            }
        }

        let source = match std::fs::read_to_string(&full) {
            Ok(source) => source,
            Err(_) => {
                self.cache.remove(&key);
                return None;
            }
        };
        let refs = match self.analyzer.analyze(&key, &source) {
            Ok(refs) => refs,
            Err(error) => {
                tracing::debug!("Module analysis failed: {}", error);
                self.cache.remove(&key);
                return None;
            }
        };
        let info = ModuleInfo {
            mtime_ms,
            hash: hash_bytes(source.as_bytes()),
            refs,
        };
        self.cache.insert(key, info.clone());
        Some(info)
    }

    /// The transitive content digest for the module at the given logical
    /// path, hashing file attachments through the plain content hasher.
    pub fn module_hash(&self, path: &str) -> String {
        self.module_hash_with(path, &|p| self.content.file_hash(p))
    }

    /// Like [`Self::module_hash`] but with a caller-supplied hash for
    /// referenced files, so the build layer can substitute loader-aware
    /// source hashes for attachments.
    pub fn module_hash_with(&self, path: &str, file_hash: &dyn Fn(&str) -> String) -> String {
        let mut digest = Sha256::new();
        let mut queue: Vec<String> = vec![normalize(path)];
        let mut visited: HashSet<String> = queue.iter().cloned().collect();
        let mut index = 0;
        while index < queue.len() {
            let current = queue[index].clone();
            index += 1;
            if !current.ends_with(".js") {
                // e.g. a file referenced directly from the worklist
                digest.update(file_hash(&current).as_bytes());
                continue;
            }
            match self.module_info(&current) {
                Some(info) => {
                    digest.update(info.hash.as_bytes());
                    for import in info
                        .refs
                        .local_static_imports
                        .iter()
                        .chain(&info.refs.local_dynamic_imports)
                    {
                        let resolved = resolve_relative(&current, import);
                        if visited.insert(resolved.clone()) {
                            queue.push(resolved);
                        }
                    }
                    for file in &info.refs.file_attachments {
                        digest.update(file_hash(&resolve_relative(&current, file)).as_bytes());
                    }
                }
                // A missing or broken module degrades the digest
                // deterministically instead of failing the build.
                None => digest.update(empty_hash().as_bytes()),
            }
        }
        hex::encode(digest.finalize())
    }
}

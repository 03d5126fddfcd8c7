//! Build cache driver
//!
//! One driver per source root. Resolution and hashing are synchronous;
//! artifact materialization is async because it may spawn generators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_core::analyzer::SimpleModuleAnalyzer;
use quill_core::error::{LoadError, LoadResult};
use quill_core::{ProjectConfig, cache_output_path, clear_cache};
use quill_hash::{ContentHasher, ModuleGraphHasher, empty_hash, hash_bytes};
use quill_loader::{LoadOptions, LoaderCatalog, LoaderExecutor};

pub struct BuildCacheDriver {
    root: PathBuf,
    catalog: LoaderCatalog,
    executor: LoaderExecutor,
    content: Arc<ContentHasher>,
    modules: ModuleGraphHasher,
}

impl BuildCacheDriver {
    /// Build a driver for the given source root, honoring interpreter
    /// overrides from `quill.toml` if present.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let config = ProjectConfig::load(&root)?;
        let content = Arc::new(ContentHasher::new(&root));
        Ok(Self {
            catalog: LoaderCatalog::new(&root, config.interpreter_table()),
            executor: LoaderExecutor::new(&root),
            modules: ModuleGraphHasher::new(
                &root,
                Arc::clone(&content),
                Arc::new(SimpleModuleAnalyzer::new()),
            ),
            content,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &LoaderCatalog {
        &self.catalog
    }

    pub fn executor(&self) -> &LoaderExecutor {
        &self.executor
    }

    /// Materialize the artifact for a logical path and return the
    /// root-relative path to read it from: the literal file itself, or its
    /// entry in the cache tree.
    pub async fn resolve_artifact_path(
        &self,
        path: &str,
        options: LoadOptions,
    ) -> LoadResult<String> {
        match self.catalog.resolve(path) {
            Some(loader) => self.executor.load(loader, options).await,
            None => {
                tracing::debug!("no loader for {}", path);
                Err(LoadError::NotFound {
                    path: path.to_string(),
                })
            }
        }
    }

    /// The file to watch for changes to a logical path: the path itself
    /// when it exists as a file, otherwise its generator's source.
    pub fn source_file_path(&self, path: &str) -> String {
        if !self.root.join(path).is_file() {
            if let Some(loader) = self.catalog.resolve(path) {
                return loader.source_path;
            }
        }
        path.to_string()
    }

    /// The file holding a logical path's bytes after a build: the path
    /// itself when it exists as a file, otherwise its cache entry.
    pub fn output_file_path(&self, path: &str) -> String {
        if !self.root.join(path).is_file() && self.catalog.resolve(path).is_some() {
            return cache_output_path(path);
        }
        path.to_string()
    }

    /// Cache-busting hash of a logical path's source. For loader-backed
    /// paths the generator's content hash is folded with its mtime, so
    /// touching the generator invalidates downstream consumers even when
    /// its contents are unchanged. Absent sources hash as empty content.
    pub fn source_hash(&self, path: &str) -> String {
        let source = self.source_file_path(path);
        match self.content.file_info(&source) {
            Some(info) if source != path => {
                hash_bytes(format!("{}{}", info.hash, info.mtime_ms).as_bytes())
            }
            Some(info) => info.hash,
            None => empty_hash(),
        }
    }

    /// Hash of the materialized artifact; fails if it was never produced.
    pub fn output_hash(&self, path: &str) -> LoadResult<String> {
        let output = self.output_file_path(path);
        match self.content.file_info(&output) {
            Some(info) => Ok(info.hash),
            None => Err(LoadError::OutputMissing { path: output }),
        }
    }

    /// Transitive module digest with loader-aware hashes for referenced
    /// files, so editing a generator busts importers of its output.
    pub fn module_hash(&self, path: &str) -> String {
        self.modules.module_hash_with(path, &|p| self.source_hash(p))
    }

    /// Remove the cache tree for this source root.
    pub fn clear_cache(&self) -> std::io::Result<()> {
        clear_cache(&self.root)
    }
}

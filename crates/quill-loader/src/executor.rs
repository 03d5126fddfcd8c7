//! Cached loader execution
//!
//! Runs resolved loaders and commits their output into the cache tree.
//! Correctness under concurrent access rests on two things: the in-flight
//! map shares a single execution among all callers for the same target, and
//! the final cache path only ever changes via a rename from a temp file, so
//! readers see either the previous complete artifact or the new one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use quill_core::error::{LoadError, LoadResult};
use quill_core::{cache_output_path, ensure_parent, failure_marker_path, temp_path};

use crate::archive::{ExtractError, extract_member};
use crate::loader::{Loader, Strategy};

/// How long a failure marker suppresses re-execution.
pub const FAILURE_COOLDOWN: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Return a stale cache entry instead of re-running the generator;
    /// used during full builds where staleness is corrected elsewhere.
    pub use_stale: bool,
}

type SharedLoad = Shared<BoxFuture<'static, LoadResult<String>>>;

/// Executes loaders and owns the in-flight de-duplication map. Cloning is
/// cheap and clones share state, so one executor can serve a preview server
/// and a batch build at once.
#[derive(Clone)]
pub struct LoaderExecutor {
    root: Arc<PathBuf>,
    inflight: Arc<DashMap<String, SharedLoad>>,
    cooldown: Duration,
}

impl LoaderExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
            inflight: Arc::new(DashMap::new()),
            cooldown: FAILURE_COOLDOWN,
        }
    }

    /// Override the failure cooldown (tests shorten it).
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Materialize the loader's target, returning the artifact's path
    /// relative to the source root. Static loaders return their own path;
    /// everything else resolves through the cache tree.
    pub async fn load(&self, loader: Loader, options: LoadOptions) -> LoadResult<String> {
        if loader.is_static() {
            return Ok(loader.source_path);
        }
        let key = loader.target_path.clone();
        let shared = match self.inflight.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let shared = self.begin(loader, options);
                entry.insert(shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Start one execution for a target and wrap it for concurrent
    /// waiters. The in-flight entry is removed once the result settles,
    /// success or failure, so the next request starts fresh.
    fn begin(&self, loader: Loader, options: LoadOptions) -> SharedLoad {
        let executor = self.clone();
        async move {
            let target = loader.target_path.clone();
            let started = Instant::now();
            tracing::info!("load {}", target);
            let result = executor.execute(&loader, options).await;
            executor.inflight.remove(&target);
            let elapsed = started.elapsed().as_millis();
            match &result {
                Ok(path) => {
                    let size = std::fs::metadata(executor.root.join(path))
                        .map(|m| m.len())
                        .unwrap_or(0);
                    if size == 0 {
                        tracing::info!("load {} -> empty output in {}ms", target, elapsed);
                    } else {
                        tracing::info!("load {} -> {} bytes in {}ms", target, size, elapsed);
                    }
                }
                Err(error) => {
                    tracing::warn!("load {} failed in {}ms: {}", target, elapsed, error);
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    async fn execute(&self, loader: &Loader, options: LoadOptions) -> LoadResult<String> {
        let root = self.root.as_path();
        let target = &loader.target_path;
        let source_full = root.join(&loader.source_path);
        let output_path = cache_output_path(target);
        let cache_full = root.join(&output_path);

        let source_mtime = match mtime(&source_full).await {
            Some(mtime) => mtime,
            None => {
                return Err(LoadError::NotFound {
                    path: loader.source_path.clone(),
                });
            }
        };
        match mtime(&cache_full).await {
            None => tracing::debug!("{} missing", target),
            Some(cache_mtime) if cache_mtime < source_mtime => {
                if options.use_stale {
                    tracing::debug!("{} using stale", target);
                    return Ok(output_path);
                }
                tracing::debug!("{} stale", target);
            }
            Some(_) => {
                tracing::debug!("{} fresh", target);
                return Ok(output_path);
            }
        }

        self.run(loader, options, source_mtime, output_path, cache_full)
            .await
    }

    async fn run(
        &self,
        loader: &Loader,
        options: LoadOptions,
        source_mtime: SystemTime,
        output_path: String,
        cache_full: PathBuf,
    ) -> LoadResult<String> {
        let root = self.root.as_path();
        let target = &loader.target_path;

        let marker = failure_marker_path(root, target);
        if let Some(marker_mtime) = mtime(&marker).await {
            let age = SystemTime::now()
                .duration_since(marker_mtime)
                .unwrap_or_default();
            if marker_mtime > source_mtime && age < self.cooldown {
                return Err(LoadError::SuppressedRetry {
                    path: loader.source_path.clone(),
                });
            }
            let _ = tokio::fs::remove_file(&marker).await;
        }

        let temp = temp_path(root, target);
        ensure_parent(&temp).map_err(|e| LoadError::io(target.clone(), e))?;
        ensure_parent(&cache_full).map_err(|e| LoadError::io(target.clone(), e))?;
        let output = std::fs::File::create(&temp).map_err(|e| LoadError::io(target.clone(), e))?;

        match self.run_strategy(loader, options, output).await {
            Ok(()) => {
                tokio::fs::rename(&temp, &cache_full)
                    .await
                    .map_err(|e| LoadError::io(target.clone(), e))?;
                Ok(output_path)
            }
            Err(error) => {
                // Keep the partial output for debugging; the marker's own
                // mtime records the failure time.
                let _ = tokio::fs::rename(&temp, &marker).await;
                Err(error)
            }
        }
    }

    async fn run_strategy(
        &self,
        loader: &Loader,
        options: LoadOptions,
        output: std::fs::File,
    ) -> LoadResult<()> {
        match &loader.strategy {
            Strategy::Static => Ok(()),
            Strategy::Command { program, args } => {
                let status = tokio::process::Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::from(output))
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(|e| LoadError::io(loader.source_path.clone(), e))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(LoadError::GeneratorExit {
                        path: loader.source_path.clone(),
                        code: status.code().unwrap_or(-1),
                    })
                }
            }
            Strategy::Extract {
                archive,
                format,
                member,
            } => {
                let inner: BoxFuture<'_, LoadResult<String>> =
                    Box::pin(self.load((**archive).clone(), options));
                let archive_rel = inner.await?;
                let archive_full = self.root.join(&archive_rel);
                let format = *format;
                let member = member.clone();
                let mut output = output;
                let extracted = tokio::task::spawn_blocking(move || {
                    extract_member(&archive_full, format, &member, &mut output)
                })
                .await
                .map_err(|e| {
                    LoadError::io(loader.source_path.clone(), std::io::Error::other(e))
                })?;
                extracted.map_err(|error| match error {
                    ExtractError::MemberMissing(member) => LoadError::ArchiveMemberMissing {
                        archive: archive_rel.clone(),
                        member,
                    },
                    ExtractError::Format(message) => LoadError::io(
                        archive_rel.clone(),
                        std::io::Error::new(std::io::ErrorKind::InvalidData, message),
                    ),
                    ExtractError::Io(error) => LoadError::io(archive_rel.clone(), error),
                })
            }
        }
    }
}

async fn mtime(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok()
}

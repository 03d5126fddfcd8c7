//! Error taxonomy for artifact resolution and generation

use std::sync::Arc;

use thiserror::Error;

pub type LoadResult<T> = Result<T, LoadError>;

/// Failure modes of the loader pipeline.
///
/// The enum is `Clone` (io errors held behind an `Arc`) because a single
/// in-flight execution result is shared by every concurrent caller for the
/// same target.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// No loader resolves the requested path and no literal file exists.
    /// Not retried; the caller reports a missing referenced file.
    #[error("missing referenced file: {path}")]
    NotFound { path: String },

    /// The generator ran and exited non-zero. Recorded via a failure
    /// marker; retried after the cooldown or a source edit.
    #[error("loader {path} exited with code {code}")]
    GeneratorExit { path: String, code: i32 },

    /// The requested member does not exist in the archive. Same retry
    /// treatment as a non-zero exit.
    #[error("archive member not found: {member} in {archive}")]
    ArchiveMemberMissing { archive: String, member: String },

    /// A failure marker is still within its cooldown window; the generator
    /// was not re-invoked. Distinguished from the original failure so
    /// callers can render "skipped" instead of re-reporting it.
    #[error("loader {path} skipped due to recent error")]
    SuppressedRetry { path: String },

    /// The artifact has never been produced.
    #[error("output file not found: {path}")]
    OutputMissing { path: String },

    /// Cache directory not writable, disk full, and the like. Always
    /// fatal, never suppressed or retried.
    #[error("i/o error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl LoadError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Whether this failure should abort the enclosing build operation
    /// rather than being collected per-artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

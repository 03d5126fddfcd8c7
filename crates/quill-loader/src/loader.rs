//! Loader descriptors

use std::collections::BTreeMap;

use crate::archive::ArchiveFormat;

/// Describes how to produce one logical path's bytes. Loaders are cheap,
/// stateless descriptors created per request; they do not own the cache.
#[derive(Debug, Clone)]
pub struct Loader {
    /// The backing file relative to the source root: the literal file for
    /// [`Strategy::Static`], the generator script for [`Strategy::Command`],
    /// the archive's own backing file for [`Strategy::Extract`]. Clients
    /// watch this path to know when the loader needs a re-run.
    pub source_path: String,
    /// The logical path this loader produces.
    pub target_path: String,
    /// Named captures from a parameterized route, forwarded to generators
    /// as `--name=value` flags.
    pub params: BTreeMap<String, String>,
    pub strategy: Strategy,
}

/// How a loader materializes its target.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// The file already exists; nothing to run.
    Static,
    /// Spawn an interpreter with the script path (and any param flags);
    /// its stdout becomes the artifact.
    Command { program: String, args: Vec<String> },
    /// Pull a single member out of an archive produced by the nested
    /// loader. Archives chain: the inner loader may itself be a generator.
    Extract {
        archive: Box<Loader>,
        format: ArchiveFormat,
        member: String,
    },
}

impl Loader {
    /// Whether this loader needs to execute anything to produce its target.
    pub fn is_static(&self) -> bool {
        matches!(self.strategy, Strategy::Static)
    }
}

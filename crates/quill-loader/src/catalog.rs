//! Loader resolution
//!
//! Maps a requested logical path to the loader responsible for producing
//! it: the literal file, a generator script with an interpreter suffix, or
//! a member of a (possibly generated) sibling archive.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quill_core::config::{ARCHIVE_EXTENSIONS, InterpreterTable};
use quill_core::route::{RouteMatch, route};
use quill_core::{dir_name, file_ext, strip_ext};

use crate::archive::ArchiveFormat;
use crate::loader::{Loader, Strategy};

pub struct LoaderCatalog {
    root: PathBuf,
    interpreters: InterpreterTable,
}

impl LoaderCatalog {
    pub fn new(root: impl Into<PathBuf>, interpreters: InterpreterTable) -> Self {
        Self {
            root: root.into(),
            interpreters,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the loader for the given logical path, if one exists. Files win
    /// over archives; within archives, the nearest ancestor wins, and an
    /// existing directory stops the ascent.
    pub fn resolve(&self, target: &str) -> Option<Loader> {
        self.resolve_file(target)
            .or_else(|| self.resolve_archive(target))
    }

    fn resolve_file(&self, target: &str) -> Option<Loader> {
        let ext = file_ext(target);
        if ext.is_empty() {
            // A name without an extension could collide with a generator
            // for any interpreter; only the literal file is accepted.
            if self
                .interpreters
                .extensions()
                .any(|iext| self.root.join(format!("{target}{iext}")).is_file())
            {
                tracing::debug!("Ignoring generator for extension-less target: {target}");
            }
            let found = route(&self.root, target, &[String::new()])?;
            return Some(static_loader(found, target));
        }

        let mut exts = vec![ext.to_string()];
        exts.extend(self.interpreters.extensions().map(|iext| format!("{ext}{iext}")));
        let found = route(&self.root, strip_ext(target), &exts)?;
        if found.ext == ext {
            return Some(static_loader(found, target));
        }
        let iext = found.ext[ext.len()..].to_string();
        self.command_loader(found, &iext, target)
    }

    fn resolve_archive(&self, target: &str) -> Option<Loader> {
        let exts = self.archive_extensions();
        let mut dir = dir_name(target);
        while !dir.is_empty() {
            // An existing directory wins over any deeper archive
            if self.root.join(dir).is_dir() {
                return None;
            }
            if let Some(found) = route(&self.root, dir, &exts) {
                let member = target[dir.len() + 1..].to_string();
                return self.extract_loader(found, dir, member, target);
            }
            dir = dir_name(dir);
        }
        None
    }

    /// `.zip`, `.tar`, `.tgz`, then `.zip.js`, `.zip.py`, etc.
    fn archive_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = ARCHIVE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        for aext in ARCHIVE_EXTENSIONS {
            for iext in self.interpreters.extensions() {
                exts.push(format!("{aext}{iext}"));
            }
        }
        exts
    }

    fn extract_loader(
        &self,
        found: RouteMatch,
        dir: &str,
        member: String,
        target: &str,
    ) -> Option<Loader> {
        if let Some(format) = ArchiveFormat::from_ext(&found.ext) {
            // A literal (or parameterized-literal) archive
            let source_path = found.path.clone();
            let params = found.params.clone();
            let inner = static_loader(found, &source_path);
            return Some(Loader {
                source_path,
                target_path: target.to_string(),
                params,
                strategy: Strategy::Extract {
                    archive: Box::new(inner),
                    format,
                    member,
                },
            });
        }
        // A generated archive: the interpreter suffix comes last, e.g.
        // "data.zip.js" has archive ext ".zip" and interpreter ext ".js"
        let iext = file_ext(&found.ext).to_string();
        let aext = &found.ext[..found.ext.len() - iext.len()];
        let format = ArchiveFormat::from_ext(aext)?;
        let archive_target = format!("{dir}{aext}");
        let source_path = found.path.clone();
        let params = found.params.clone();
        let inner = self.command_loader(found, &iext, &archive_target)?;
        Some(Loader {
            source_path,
            target_path: target.to_string(),
            params,
            strategy: Strategy::Extract {
                archive: Box::new(inner),
                format,
                member,
            },
        })
    }

    fn command_loader(&self, found: RouteMatch, iext: &str, target: &str) -> Option<Loader> {
        let command = self.interpreters.get(iext)?;
        let script = self.root.join(&found.path).to_string_lossy().into_owned();
        let (program, mut args) = match command.split_first() {
            // An empty command means the script runs directly
            None => (script, Vec::new()),
            Some((program, rest)) => {
                let mut args: Vec<String> = rest.to_vec();
                args.push(script);
                (program.clone(), args)
            }
        };
        args.extend(param_flags(&found.params));
        Some(Loader {
            source_path: found.path,
            target_path: target.to_string(),
            params: found.params,
            strategy: Strategy::Command { program, args },
        })
    }
}

fn static_loader(found: RouteMatch, target: &str) -> Loader {
    Loader {
        source_path: found.path,
        target_path: target.to_string(),
        params: found.params,
        strategy: Strategy::Static,
    }
}

/// Route captures become `--name=value` generator flags; non-ASCII-word
/// names are dropped.
fn param_flags(params: &BTreeMap<String, String>) -> Vec<String> {
    params
        .iter()
        .filter(|(name, _)| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .map(|(name, value)| format!("--{name}={value}"))
        .collect()
}

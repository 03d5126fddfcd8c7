//! Interpreter table and project configuration

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Archive formats the loader pipeline can extract single members from.
/// `.tar.gz` must precede `.tgz` only in documentation; matching uses the
/// full suffix so order is not significant between them.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".tar", ".tar.gz", ".tgz"];

/// Maps a generator script extension to the command that runs it. An empty
/// command list means the script is executed directly (e.g. `.exe`).
///
/// Entries are kept in declaration order; when several interpreter
/// extensions could produce the same target, the first declared wins.
#[derive(Debug, Clone)]
pub struct InterpreterTable {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for InterpreterTable {
    fn default() -> Self {
        let defaults: &[(&str, &[&str])] = &[
            (".js", &["node", "--no-warnings=ExperimentalWarning"]),
            (".ts", &["tsx"]),
            (".py", &["python3"]),
            (".r", &["Rscript"]),
            (".R", &["Rscript"]),
            (".rs", &["rust-script"]),
            (".go", &["go", "run"]),
            (".java", &["java"]),
            (".jl", &["julia"]),
            (".php", &["php"]),
            (".sh", &["sh"]),
            (".exe", &[]),
        ];
        Self {
            entries: defaults
                .iter()
                .map(|(ext, cmd)| (ext.to_string(), cmd.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }
}

impl InterpreterTable {
    /// Interpreter extensions in declaration order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(ext, _)| ext.as_str())
    }

    /// The command template for an interpreter extension.
    pub fn get(&self, ext: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(e, _)| e == ext)
            .map(|(_, cmd)| cmd.as_slice())
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.get(ext).is_some()
    }

    /// Apply project overrides: a command list replaces (or appends) an
    /// entry, a removal drops a builtin.
    pub fn apply(&mut self, overrides: &BTreeMap<String, InterpreterOverride>) {
        for (ext, value) in overrides {
            match value {
                InterpreterOverride::Command(cmd) => {
                    if let Some(entry) = self.entries.iter_mut().find(|(e, _)| e == ext) {
                        entry.1 = cmd.clone();
                    } else {
                        self.entries.push((ext.clone(), cmd.clone()));
                    }
                }
                InterpreterOverride::Removed(_) => {
                    self.entries.retain(|(e, _)| e != ext);
                }
            }
        }
    }
}

/// A single interpreter override in `quill.toml`. `false` removes a builtin
/// entry; a string array replaces its command.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InterpreterOverride {
    Command(Vec<String>),
    Removed(bool),
}

/// Project configuration, read from `quill.toml` at the source root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub interpreters: BTreeMap<String, InterpreterOverride>,
}

impl ProjectConfig {
    /// Load `quill.toml` from the source root, if present.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = root.join("quill.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&raw)?;
        tracing::debug!("Loaded project config: {}", path.display());
        Ok(config)
    }

    /// The effective interpreter table: builtins plus overrides.
    pub fn interpreter_table(&self) -> InterpreterTable {
        let mut table = InterpreterTable::default();
        table.apply(&self.interpreters);
        table
    }
}

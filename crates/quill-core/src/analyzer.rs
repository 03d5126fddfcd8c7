//! Module analyzer interface
//!
//! The lexical scope analyzer that understands the document language's code
//! cells is an external collaborator. This module defines the seam it plugs
//! into, plus a regex-based analyzer that covers plain ES modules well
//! enough for the CLI and for tests.

use regex::Regex;
use thiserror::Error;

/// References extracted from one module's source. Paths are as written in
/// the source (relative to the module); resolution against the source root
/// is the caller's concern. Order follows discovery order in the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleRefs {
    /// Local static imports (`import ... from "./x.js"`).
    pub local_static_imports: Vec<String>,
    /// Local dynamic imports (`import("./x.js")`).
    pub local_dynamic_imports: Vec<String>,
    /// Global static imports (bare or protocol specifiers).
    pub global_static_imports: Vec<String>,
    /// Global dynamic imports.
    pub global_dynamic_imports: Vec<String>,
    /// Attached file paths (`FileAttachment("data.csv")`).
    pub file_attachments: Vec<String>,
}

#[derive(Debug, Clone, Error)]
#[error("failed to analyze {path}: {message}")]
pub struct AnalyzeError {
    pub path: String,
    pub message: String,
}

/// Extracts imports and file attachments from module source text.
pub trait ModuleAnalyzer: Send + Sync {
    fn analyze(&self, path: &str, source: &str) -> Result<ModuleRefs, AnalyzeError>;
}

/// A specifier is local when it points inside the source tree rather than
/// at a package or URL.
fn is_local(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// Regex-based [`ModuleAnalyzer`]. Not a real parser: it scans for import
/// declarations, dynamic `import()` calls, and `FileAttachment()` calls.
/// Good enough for ES modules that keep specifiers as string literals.
pub struct SimpleModuleAnalyzer {
    static_import: Regex,
    bare_import: Regex,
    dynamic_import: Regex,
    attachment: Regex,
}

impl Default for SimpleModuleAnalyzer {
    fn default() -> Self {
        Self {
            static_import: Regex::new(
                r#"(?m)^\s*(?:import|export)\b[^;'"]*?\bfrom\s*["']([^"']+)["']"#,
            )
            .unwrap(),
            bare_import: Regex::new(r#"(?m)^\s*import\s*["']([^"']+)["']"#).unwrap(),
            dynamic_import: Regex::new(r#"\bimport\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
            attachment: Regex::new(r#"\bFileAttachment\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
        }
    }
}

impl SimpleModuleAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleAnalyzer for SimpleModuleAnalyzer {
    fn analyze(&self, _path: &str, source: &str) -> Result<ModuleRefs, AnalyzeError> {
        let mut refs = ModuleRefs::default();
        for capture in self
            .static_import
            .captures_iter(source)
            .chain(self.bare_import.captures_iter(source))
        {
            let specifier = capture[1].to_string();
            let bucket = if is_local(&specifier) {
                &mut refs.local_static_imports
            } else {
                &mut refs.global_static_imports
            };
            if !bucket.contains(&specifier) {
                bucket.push(specifier);
            }
        }
        for capture in self.dynamic_import.captures_iter(source) {
            let specifier = capture[1].to_string();
            let bucket = if is_local(&specifier) {
                &mut refs.local_dynamic_imports
            } else {
                &mut refs.global_dynamic_imports
            };
            if !bucket.contains(&specifier) {
                bucket.push(specifier);
            }
        }
        for capture in self.attachment.captures_iter(source) {
            let name = capture[1].to_string();
            if !refs.file_attachments.contains(&name) {
                refs.file_attachments.push(name);
            }
        }
        Ok(refs)
    }
}

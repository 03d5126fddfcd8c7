//! Parameterized route matching
//!
//! A requested path can be backed by several on-disk names: the literal
//! file, a generator script with an interpreter suffix, or names with
//! bracketed `[param]` segments at any component. The exact literal path
//! wins over any parameterized match, and a shallower parameter beats a
//! deeper one, so the most specific candidate is always returned.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

/// A successful route match.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// The matched file path relative to the source root.
    pub path: String,
    /// Which of the candidate extensions matched.
    pub ext: String,
    /// Named captures from bracketed segments, if any.
    pub params: BTreeMap<String, String>,
}

/// Whether a single path component contains a `[param]` capture.
pub fn is_parameterized(name: &str) -> bool {
    param_pattern().is_match(name)
}

fn param_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\[([a-z_]\w*)\]").unwrap())
}

/// Find the file backing `path` within `root`, trying each extension in
/// `exts` appended to the final component. Returns the most specific match.
pub fn route(root: &Path, path: &str, exts: &[String]) -> Option<RouteMatch> {
    let normalized = crate::paths::normalize(path);
    let parts: Vec<&str> = normalized.split('/').collect();
    route_params(root, "", &parts, exts)
}

fn route_params(root: &Path, cwd: &str, parts: &[&str], exts: &[String]) -> Option<RouteMatch> {
    match parts {
        [] => None,
        [name] => route_leaf(root, cwd, name, exts),
        [first, rest @ ..] => {
            let dir_path = root.join(cwd).join(first);
            if dir_path.exists() {
                if !dir_path.is_dir() {
                    return None; // ignore non-directories
                }
                if !is_parameterized(first) {
                    if let Some(found) = route_params(root, &join(cwd, first), rest, exts) {
                        return Some(found);
                    }
                }
            }
            if first.is_empty() {
                return None;
            }
            for entry in parameterized_entries(root, cwd, |p| p.is_dir()) {
                let Some(params) = match_params(&entry, first) else {
                    continue;
                };
                if let Some(mut found) = route_params(root, &join(cwd, &entry), rest, exts) {
                    found.params.extend(params);
                    return Some(found);
                }
            }
            None
        }
    }
}

fn route_leaf(root: &Path, cwd: &str, name: &str, exts: &[String]) -> Option<RouteMatch> {
    if !is_parameterized(name) {
        for ext in exts {
            let candidate = format!("{name}{ext}");
            let full = root.join(cwd).join(&candidate);
            if full.exists() {
                if !full.is_file() {
                    return None; // ignore non-files
                }
                return Some(RouteMatch {
                    path: join(cwd, &candidate),
                    ext: ext.clone(),
                    params: BTreeMap::new(),
                });
            }
        }
    }
    if name.is_empty() {
        return None;
    }
    for ext in exts {
        for entry in parameterized_entries(root, cwd, |p| p.is_file()) {
            let Some(base) = entry.strip_suffix(ext.as_str()) else {
                continue;
            };
            let Some(params) = match_params(base, name) else {
                continue;
            };
            return Some(RouteMatch {
                path: join(cwd, &entry),
                ext: ext.clone(),
                params,
            });
        }
    }
    None
}

/// Directory entries under `root/cwd` whose names carry a `[param]`
/// capture, sorted for deterministic resolution.
fn parameterized_entries(root: &Path, cwd: &str, filter: impl Fn(&Path) -> bool) -> Vec<String> {
    let dir = root.join(cwd);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| filter(&e.path()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| is_parameterized(name))
        .collect();
    names.sort();
    names
}

/// Match `input` against a bracketed pattern such as `[id].csv`, returning
/// the named captures.
fn match_params(pattern: &str, input: &str) -> Option<BTreeMap<String, String>> {
    let regex = compile_pattern(pattern)?;
    let captures = regex.captures(input)?;
    let mut params = BTreeMap::new();
    for name in regex.capture_names().flatten() {
        if let Some(value) = captures.name(name) {
            params.insert(name.to_string(), value.as_str().to_string());
        }
    }
    Some(params)
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    let mut source = String::from("^(?i)");
    let mut last = 0;
    for capture in param_pattern().captures_iter(pattern) {
        let whole = capture.get(0).unwrap();
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        source.push_str(&format!("(?P<{}>.+)", &capture[1]));
        last = whole.end();
    }
    source.push_str(&regex::escape(&pattern[last..]));
    source.push('$');
    Regex::new(&source).ok()
}

fn join(cwd: &str, name: &str) -> String {
    if cwd.is_empty() {
        name.to_string()
    } else {
        format!("{cwd}/{name}")
    }
}

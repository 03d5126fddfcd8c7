//! Slash-separated logical paths relative to the source root

/// Normalize a logical path: collapse `.` and empty segments, resolve `..`
/// against earlier segments. Segments that would climb above the root are
/// dropped, so the result always stays within the source root.
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(segment),
        }
    }
    stack.join("/")
}

/// Resolve a reference found in `base` (a logical path) against `base`'s
/// directory. References starting with `/` are root-relative.
pub fn resolve_relative(base: &str, reference: &str) -> String {
    if let Some(rooted) = reference.strip_prefix('/') {
        return normalize(rooted);
    }
    let dir = dir_name(base);
    if dir.is_empty() {
        normalize(reference)
    } else {
        normalize(&format!("{dir}/{reference}"))
    }
}

/// The directory portion of a logical path, without a trailing slash.
/// Returns `""` for top-level paths.
pub fn dir_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// The final extension of a logical path including the leading dot, or `""`
/// when there is none. A leading dot alone (dotfiles) is not an extension.
pub fn file_ext(path: &str) -> &str {
    let name = match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    };
    match name.rfind('.') {
        Some(i) if i > 0 => &name[i..],
        _ => "",
    }
}

/// `path` with its final extension removed.
pub fn strip_ext(path: &str) -> &str {
    let ext = file_ext(path);
    &path[..path.len() - ext.len()]
}

//! Path helpers.
//!
//! Inside the VFS every path is absolute and slash-separated. Repository
//! paths in tree indexes and diff results are relative; [`to_relative`] and
//! [`to_absolute`] are the only sanctioned translations between the two.

/// Normalize a path to the canonical VFS form.
///
/// Empty segments and `.` are dropped, `..` pops one segment (never above
/// the root). The result always starts with `/` and never ends with one,
/// except for the root itself.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Join `child` onto `base` and normalize.
pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{base}/{child}"))
}

/// Parent of a normalized path. The root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Final segment of a normalized path (empty for the root).
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// All strict ancestors of a normalized path, nearest first, ending at `/`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |&p| parent(p))
}

/// Prefix that every descendant of `dir` starts with.
pub(crate) fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{dir}/")
    }
}

/// Strip the leading slash of a VFS path for use as a repository path.
pub fn to_relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Convert a repository-relative path into its VFS form.
pub fn to_absolute(path: &str) -> String {
    normalize(path)
}

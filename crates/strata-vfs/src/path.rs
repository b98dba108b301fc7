//! Path normalization.
//!
//! Every backend works on canonical paths: rooted at `/`, slash-separated,
//! no empty, `.` or `..` segments and no trailing slash (except the root).

use crate::error::{VfsError, VfsResult};

/// Normalize `path` to canonical form.
///
/// Relative paths are interpreted from the root, so `a/b` and `/a/b` are the
/// same path. A `..` that would climb above the root fails with
/// [`VfsError::InvalidPath`].
pub fn clean(path: &str) -> VfsResult<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(VfsError::invalid_path(path));
                }
            }
            s => parts.push(s),
        }
    }
    let mut out = String::with_capacity(path.len() + 1);
    for seg in &parts {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Split a canonical path into `(parent, base)`.
///
/// The root splits into `("/", "")`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("/", path),
    }
}

/// Segments of a canonical path; empty for the root.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Join a canonical directory path and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if name.is_empty() {
        dir.to_string()
    } else if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Strip `prefix` from `path` on a segment boundary.
///
/// Both paths must be canonical. Returns the remainder as a canonical path
/// (`/` when they are equal), or `None` when `prefix` is not an ancestor of
/// (or equal to) `path`.
pub fn relative_to(path: &str, prefix: &str) -> Option<String> {
    if prefix == "/" {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

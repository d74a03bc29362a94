//! Path resolution against the session working directory
//!
//! - expands a leading `~`
//! - joins relative paths onto the session cwd
//! - folds `.` and `..` lexically (no filesystem access, no existence check)

use std::path::{Component, Path, PathBuf};

/// Resolve a user-supplied path to an absolute one
pub fn resolve(raw: &str, cwd: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(raw.trim()).to_string();
    let candidate = PathBuf::from(expanded);

    let joined = if candidate.is_absolute() {
        candidate
    } else {
        cwd.join(candidate)
    };

    normalize(&joined)
}

/// Lexically normalize a path: drop `.`, apply `..`, never climb above root
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = out.parent().is_none();
                if !at_root {
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Best-effort real path: canonical when it exists, lexical otherwise
pub fn real_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}

/// Split a missing path into (parent dir, final name) for suggestion lookups
pub fn split_parent(path: &Path) -> Option<(PathBuf, String)> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let parent = path.parent()?.to_path_buf();
    Some((parent, name))
}

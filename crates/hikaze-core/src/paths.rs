//! Lexical path helpers shared by the classifier, the quick-tag worker and
//! configuration loading.
//!
//! Nothing in here touches the filesystem except [`absolutize`], which reads
//! the current directory for relative input.

use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and remove `.` / `..` components lexically.
///
/// Symlinks are deliberately left unresolved: a configured root that is a
/// junction must keep its configured spelling so classification matches the
/// paths the walker yields.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_lexically(&absolute)
}

/// Drop `.` components and fold `..` into the preceding component.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Key used when comparing two paths for equality or ancestry.
///
/// Windows paths are case-insensitive and accept both separators, so they
/// are folded to lower case with `/` separators. Elsewhere the key is the
/// path text unchanged.
pub fn comparison_key(path: &Path) -> String {
    let text = path.to_string_lossy();
    if cfg!(windows) {
        text.replace('\\', "/").to_lowercase()
    } else {
        text.into_owned()
    }
}

/// Whether `root` is `path` itself or one of its ancestors, compared
/// component by component on the comparison key.
pub fn is_within(path: &Path, root: &Path) -> bool {
    let path_key = comparison_key(path);
    let root_key = comparison_key(root);
    let root_key = root_key.trim_end_matches('/');
    if root_key.is_empty() {
        // The filesystem root contains every absolute path.
        return path_key.starts_with('/');
    }
    path_key == root_key
        || path_key
            .strip_prefix(root_key)
            .is_some_and(|rest| rest.starts_with('/') || (cfg!(windows) && rest.starts_with('\\')))
}

/// Segments of `path` below `root`, with `.` and `..` removed.
///
/// Returns `None` when `root` does not contain `path`.
pub fn segments_below(path: &Path, root: &Path) -> Option<Vec<String>> {
    if !is_within(path, root) {
        return None;
    }
    let root_depth = root.components().count();
    Some(
        path.components()
            .skip(root_depth)
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Path text with backslashes turned into forward slashes, lower-cased.
///
/// Used for keyword heuristics that must behave the same for Windows and
/// POSIX spellings.
pub fn slash_lower(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

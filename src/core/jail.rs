//! Path confinement for task I/O
//!
//! Every path a recipe names is relative to the target directory and must
//! resolve to the target directory itself or something beneath it.
//!
//! Containment is checked lexically. Symbolic links are not followed, so a
//! link that already exists inside the target directory and points outside
//! it is not detected here.

use super::error::TaskError;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path (no filesystem access).
pub(crate) fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut has_root = false;

    for c in path.components() {
        match c {
            Component::Prefix(p) => {
                out.clear();
                out.push(p.as_os_str());
                has_root = true;
            }
            Component::RootDir => {
                out.push(Component::RootDir.as_os_str());
                has_root = true;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out
                    .components()
                    .next_back()
                    .is_some_and(|last| matches!(last, Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !has_root {
                    // Preserve leading ".." for relative paths.
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }

    out
}

/// Resolve `relative` against `base` and require the result to stay inside `base`.
///
/// `base` is expected to be absolute and normalized; see [`PathJail`] for a
/// wrapper that takes care of that once.
pub fn resolve(base: &Path, relative: &str) -> Result<PathBuf, TaskError> {
    let candidate = normalize_lexical(&base.join(relative));

    // Path::starts_with compares whole components, so "/srv/data2" is not
    // considered inside "/srv/data".
    if candidate == base || candidate.starts_with(base) {
        Ok(candidate)
    } else {
        Err(TaskError::PathEscape {
            path: relative.to_string(),
        })
    }
}

/// A target directory that all task paths are resolved against.
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
}

impl PathJail {
    /// Create a jail rooted at `root`. Relative roots are made absolute
    /// against the current directory.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let absolute = std::path::absolute(root.as_ref())?;
        Ok(Self {
            root: normalize_lexical(&absolute),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> Result<PathBuf, TaskError> {
        resolve(&self.root, relative)
    }

    /// Resolve a path and reject the jail root itself.
    pub fn resolve_below(&self, relative: &str) -> Result<PathBuf, TaskError> {
        let path = self.resolve(relative)?;
        if path == self.root {
            return Err(TaskError::validation(format!(
                "'{}' refers to the target directory itself",
                relative
            )));
        }
        Ok(path)
    }

    /// Render a jailed path relative to the root, for output lines.
    pub fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

//! Common filesystem utilities
//!
//! Blocking helpers shared by the structural handlers and the source
//! archive handler. Callers run them on the blocking pool.

use crate::core::error::TaskError;
use std::path::Path;
use walkdir::WalkDir;

/// Ensure a file's parent directory exists.
pub fn ensure_parent_dir(path: &Path) -> Result<(), TaskError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| TaskError::io_at("create directory", parent, e))?;
    }
    Ok(())
}

/// Copy a file, creating parent directories as needed.
pub fn copy_file(src: &Path, dest: &Path) -> Result<u64, TaskError> {
    ensure_parent_dir(dest)?;
    std::fs::copy(src, dest).map_err(|e| {
        TaskError::io(
            format!("copy failed: {} -> {}", src.display(), dest.display()),
            e,
        )
    })
}

/// Copy a file or directory tree into `dest`, skipping symbolic links.
///
/// Existing files under `dest` are overwritten. Returns the number of files
/// copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64, TaskError> {
    let md = std::fs::symlink_metadata(src).map_err(|e| TaskError::io_at("stat", src, e))?;
    if md.file_type().is_symlink() {
        tracing::debug!(path = %src.display(), "skipping symlink");
        return Ok(0);
    }
    if md.is_file() {
        copy_file(src, dest)?;
        return Ok(1);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            TaskError::io(
                format!("cannot walk {}", src.display()),
                std::io::Error::other(e),
            )
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| TaskError::PathEscape {
                path: entry.path().display().to_string(),
            })?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping symlink");
        } else if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| TaskError::io_at("create directory", &target, e))?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<bool, TaskError> {
    let md = match std::fs::symlink_metadata(path) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(TaskError::io_at("stat", path, e)),
    };
    let result = if md.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| TaskError::io_at("remove", path, e))?;
    Ok(true)
}

/// Move a file or tree, falling back to copy + remove across filesystems.
pub fn move_path(src: &Path, dest: &Path) -> Result<(), TaskError> {
    ensure_parent_dir(dest)?;
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_tree(src, dest)?;
            remove_path(src).map(|_| ())
        }
        Err(e) => Err(TaskError::io(
            format!("move failed: {} -> {}", src.display(), dest.display()),
            e,
        )),
    }
}

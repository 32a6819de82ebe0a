//! Structural filesystem tasks: unzip, move, copy, remove, ensure_directory.
//!
//! Every path goes through the context's jail before it is touched.

use super::internal::{extract, fs_utils};
use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::output;
use crate::recipe::PathList;
use std::path::Path;

async fn exists(path: &Path) -> Result<bool, TaskError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| TaskError::io_at("stat", path, e))
}

/// Reject a source and destination where one contains the other.
///
/// Replacing an ancestor of the source deletes the source, and copying a
/// directory into its own subtree never terminates.
fn ensure_disjoint(verb: &str, src: &Path, dest: &Path) -> Result<(), TaskError> {
    if src.starts_with(dest) || dest.starts_with(src) {
        return Err(TaskError::validation(format!(
            "cannot {} {} to {}: source and destination overlap",
            verb,
            src.display(),
            dest.display()
        )));
    }
    Ok(())
}

async fn replace_existing(dest: &Path) -> Result<(), TaskError> {
    let d = dest.to_path_buf();
    tokio::task::spawn_blocking(move || fs_utils::remove_path(&d)).await??;
    Ok(())
}

/// Extract a zip or tar archive. The format is taken from the file name.
pub async fn unzip(
    ctx: &ExecutionContext,
    source: &str,
    destination: &str,
) -> Result<(), TaskError> {
    let archive = ctx.jail().resolve_below(source)?;
    let dest = ctx.jail().resolve(destination)?;
    let format = extract::detect_format(source)
        .ok_or_else(|| TaskError::validation(format!("cannot detect archive format: {}", source)))?;

    let (a, d) = (archive.clone(), dest.clone());
    tokio::task::spawn_blocking(move || extract::extract(&a, &d, format)).await??;

    output::detail(&format!(
        "extracted {} to {}",
        ctx.jail().display(&archive),
        ctx.jail().display(&dest)
    ));
    Ok(())
}

/// Move a file or directory. Refuses to replace an existing destination
/// unless `overwrite` is set.
pub async fn move_path(
    ctx: &ExecutionContext,
    source: &str,
    destination: &str,
    overwrite: bool,
) -> Result<(), TaskError> {
    let src = ctx.jail().resolve_below(source)?;
    let dest = ctx.jail().resolve_below(destination)?;

    if !exists(&src).await? {
        return Err(TaskError::validation(format!("move source does not exist: {}", source)));
    }
    ensure_disjoint("move", &src, &dest)?;
    if exists(&dest).await? {
        if !overwrite {
            return Err(TaskError::validation(format!(
                "move destination already exists: {}",
                destination
            )));
        }
        replace_existing(&dest).await?;
    }

    let (s, d) = (src.clone(), dest.clone());
    tokio::task::spawn_blocking(move || fs_utils::move_path(&s, &d)).await??;

    output::detail(&format!(
        "moved {} -> {}",
        ctx.jail().display(&src),
        ctx.jail().display(&dest)
    ));
    Ok(())
}

/// Copy a file or directory tree.
///
/// With `overwrite` set an existing destination is removed first, so the
/// result is an exact copy of the source. With `overwrite` unset an existing
/// destination is left untouched and the task fails, or is skipped when
/// `error_on_exist` is also unset.
pub async fn copy_path(
    ctx: &ExecutionContext,
    source: &str,
    destination: &str,
    overwrite: bool,
    error_on_exist: bool,
) -> Result<(), TaskError> {
    let src = ctx.jail().resolve_below(source)?;
    let dest = ctx.jail().resolve(destination)?;

    if !exists(&src).await? {
        return Err(TaskError::validation(format!("copy source does not exist: {}", source)));
    }
    ensure_disjoint("copy", &src, &dest)?;
    if exists(&dest).await? {
        if overwrite {
            replace_existing(&dest).await?;
        } else if error_on_exist {
            return Err(TaskError::validation(format!(
                "copy destination already exists: {}",
                destination
            )));
        } else {
            output::skip(&format!("{} exists, not copying", destination));
            return Ok(());
        }
    }

    let (s, d) = (src.clone(), dest.clone());
    let copied = tokio::task::spawn_blocking(move || fs_utils::copy_tree(&s, &d)).await??;

    output::detail(&format!(
        "copied {} -> {} ({} files)",
        ctx.jail().display(&src),
        ctx.jail().display(&dest),
        copied
    ));
    Ok(())
}

/// Remove files or directories. Missing paths are ignored.
pub async fn remove(ctx: &ExecutionContext, paths: &PathList) -> Result<(), TaskError> {
    // Resolve everything first so one bad path removes nothing.
    let resolved = paths
        .iter()
        .map(|p| ctx.jail().resolve_below(p))
        .collect::<Result<Vec<_>, _>>()?;

    for path in resolved {
        let p = path.clone();
        let removed = tokio::task::spawn_blocking(move || fs_utils::remove_path(&p)).await??;
        if removed {
            output::detail(&format!("removed {}", ctx.jail().display(&path)));
        }
    }
    Ok(())
}

pub async fn ensure_directory(ctx: &ExecutionContext, path: &str) -> Result<(), TaskError> {
    let dir = ctx.jail().resolve(path)?;
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| TaskError::io_at("create directory", &dir, e))?;
    output::detail(&format!("ensured {}", ctx.jail().display(&dir)));
    Ok(())
}

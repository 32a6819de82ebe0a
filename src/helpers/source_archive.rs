//! `download_source_archive` - fetch a repository snapshot into the target directory
//!
//! Steps:
//! 1. pick the ref: the task's `ref`, or the repository's default branch
//!    (looked up once per repository per run, see [`BranchCache`])
//! 2. download `<archive_base>/<owner>/<repo>/archive/<ref>.zip`, retrying
//!    once after a fixed backoff
//! 3. extract into a scratch directory inside the target directory
//! 4. optionally descend into `subpath`
//! 5. copy into `destination`, skipping symlinks
//!
//! The scratch directory is removed afterwards whether or not the task
//! succeeded. Failure to remove it is logged and otherwise ignored.

use super::internal::{extract, fs_utils, http};
use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::jail;
use crate::core::output;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Default branches resolved during one run, keyed by `owner/repo`.
#[derive(Debug, Default, Clone)]
pub struct BranchCache {
    branches: HashMap<String, String>,
}

impl BranchCache {
    pub fn get(&self, repository: &str) -> Option<&str> {
        self.branches.get(repository).map(String::as_str)
    }

    pub fn insert(&mut self, repository: &str, branch: String) {
        self.branches.insert(repository.to_string(), branch);
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

async fn default_branch(ctx: &mut ExecutionContext, repository: &str) -> Result<String, TaskError> {
    if let Some(branch) = ctx.branches().get(repository) {
        tracing::debug!(repository, branch, "default branch cache hit");
        return Ok(branch.to_string());
    }

    output::sub_action(&format!("resolving default branch of {}", repository));
    let url = format!(
        "{}/repos/{}",
        ctx.config().github_api_base.trim_end_matches('/'),
        repository
    );
    let timeout = ctx.config().metadata_timeout;
    let token = ctx.config().github_token.clone();

    let json = tokio::task::spawn_blocking(move || http::get_json(&url, timeout, token.as_deref()))
        .await??;

    let branch = json
        .get("default_branch")
        .and_then(|v| v.as_str())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| {
            TaskError::Network(format!("no default_branch in metadata for {}", repository))
        })?
        .to_string();

    ctx.branches_mut().insert(repository, branch.clone());
    Ok(branch)
}

/// Download with one retry after `backoff`.
async fn fetch_with_retry(
    url: String,
    dest: PathBuf,
    timeout: Duration,
    backoff: Duration,
) -> Result<u64, TaskError> {
    let attempt = {
        let (url, dest) = (url.clone(), dest.clone());
        tokio::task::spawn_blocking(move || http::download_to(&url, &dest, timeout)).await?
    };

    match attempt {
        Ok(bytes) => Ok(bytes),
        Err(first) => {
            output::warning(&format!(
                "archive fetch failed ({}), retrying in {:?}",
                first, backoff
            ));
            tokio::time::sleep(backoff).await;
            tokio::task::spawn_blocking(move || http::download_to(&url, &dest, timeout)).await?
        }
    }
}

/// The directory an archive's content starts in: its single top-level
/// directory if there is exactly one entry, otherwise the extraction root.
fn content_root(extracted: &Path) -> Result<PathBuf, TaskError> {
    let entries = std::fs::read_dir(extracted)
        .map_err(|e| TaskError::io_at("read", extracted, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TaskError::io_at("read", extracted, e))?;

    if let [only] = entries.as_slice() {
        let file_type = only
            .file_type()
            .map_err(|e| TaskError::io_at("stat", &only.path(), e))?;
        if file_type.is_dir() {
            return Ok(only.path());
        }
    }
    Ok(extracted.to_path_buf())
}

fn remove_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::debug!(path = %path.display(), error = %e, "scratch cleanup failed");
    }
}

pub async fn download_source_archive(
    ctx: &mut ExecutionContext,
    repository: &str,
    reference: Option<&str>,
    subpath: Option<&str>,
    destination: &str,
) -> Result<(), TaskError> {
    let dest = ctx.jail().resolve(destination)?;

    let reference = match reference {
        Some(r) => ctx.vars().render(r).into_owned(),
        None => default_branch(ctx, repository).await?,
    };

    let scratch = tempfile::Builder::new()
        .prefix(".provision-src-")
        .tempdir_in(ctx.jail().root())
        .map_err(|e| TaskError::io_at("create scratch directory in", ctx.jail().root(), e))?;

    let url = format!(
        "{}/{}/archive/{}.zip",
        ctx.config().archive_base.trim_end_matches('/'),
        repository,
        reference
    );
    output::sub_action(&format!("fetching {}@{}", repository, reference));

    let result = install_from_archive(ctx, url, scratch.path(), subpath, &dest).await;
    remove_scratch(scratch);

    let copied = result?;
    output::detail(&format!(
        "copied {} files from {}@{} into {}",
        copied,
        repository,
        reference,
        ctx.jail().display(&dest)
    ));
    Ok(())
}

async fn install_from_archive(
    ctx: &ExecutionContext,
    url: String,
    scratch: &Path,
    subpath: Option<&str>,
    dest: &Path,
) -> Result<u64, TaskError> {
    let archive = scratch.join("source.zip");
    let extracted = scratch.join("extracted");
    let config = ctx.config();

    fetch_with_retry(
        url,
        archive.clone(),
        config.archive_timeout,
        config.archive_retry_backoff,
    )
    .await?;

    let subpath = subpath.map(str::to_string);
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
        extract::extract(&archive, &extracted, extract::ArchiveFormat::Zip)?;

        let mut source = content_root(&extracted)?;
        if let Some(sub) = subpath {
            source = jail::resolve(&source, &sub)?;
            if !source.exists() {
                return Err(TaskError::validation(format!(
                    "subpath '{}' not found in archive",
                    sub
                )));
            }
        }

        fs_utils::copy_tree(&source, &dest)
    })
    .await?
}

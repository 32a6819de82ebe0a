//! `download_file` - fetch a URL into the target directory.

use super::internal::http;
use crate::core::context::ExecutionContext;
use crate::core::error::TaskError;
use crate::core::output;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hash a file with SHA-256, returning lowercase hex.
fn sha256_file(path: &Path) -> Result<String, TaskError> {
    let mut file = std::fs::File::open(path).map_err(|e| TaskError::io_at("open", path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buffer)
            .map_err(|e| TaskError::io_at("read", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check a file against an expected digest. A mismatching file is deleted.
pub(crate) fn verify_sha256(path: &Path, expected: &str) -> Result<(), TaskError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not discard corrupt download");
    }
    Err(TaskError::Integrity {
        path: path.display().to_string(),
        expected: expected.to_lowercase(),
        actual,
    })
}

/// Download `url` to the jailed `destination`, optionally checking its SHA-256.
///
/// Public variables are substituted into the URL.
pub async fn download_file(
    ctx: &ExecutionContext,
    url: &str,
    destination: &str,
    sha256: Option<&str>,
) -> Result<(), TaskError> {
    let dest = ctx.jail().resolve_below(destination)?;
    let url = ctx.vars().render(url).into_owned();
    let timeout = ctx.config().http_timeout;
    let expected = sha256.map(str::to_string);

    output::detail(&format!("GET {}", url));
    let target = dest.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        let bytes = http::download_to(&url, &target, timeout)?;
        if let Some(expected) = expected {
            verify_sha256(&target, &expected)?;
        }
        Ok::<_, TaskError>(bytes)
    })
    .await??;

    output::detail(&format!(
        "downloaded {} ({} bytes)",
        ctx.jail().display(&dest),
        bytes
    ));
    Ok(())
}

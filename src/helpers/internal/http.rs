//! Blocking HTTP primitives (ureq)
//!
//! Handlers call these from `spawn_blocking`. Any non-2xx status is a
//! [`TaskError::Network`].

use super::fs_utils;
use super::progress::{ProgressGuard, upgrade_to_bytes};
use crate::core::error::TaskError;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

const USER_AGENT: &str = concat!("recipe-provision/", env!("CARGO_PKG_VERSION"));

fn network_error(url: &str, e: ureq::Error) -> TaskError {
    match e {
        ureq::Error::Status(code, _) => {
            TaskError::Network(format!("HTTP {} from {}", code, url))
        }
        ureq::Error::Transport(t) => TaskError::Network(format!("{}: {}", url, t)),
    }
}

fn request(url: &str, timeout: Duration) -> ureq::Request {
    ureq::get(url).timeout(timeout).set("User-Agent", USER_AGENT)
}

/// GET a JSON document, optionally with a bearer token.
pub fn get_json(
    url: &str,
    timeout: Duration,
    token: Option<&str>,
) -> Result<serde_json::Value, TaskError> {
    let mut req = request(url, timeout).set("Accept", "application/vnd.github+json");
    if let Some(token) = token {
        req = req.set("Authorization", &format!("Bearer {}", token));
    }

    req.call()
        .map_err(|e| network_error(url, e))?
        .into_json()
        .map_err(|e| TaskError::Network(format!("invalid JSON from {}: {}", url, e)))
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// `dest` is created (or truncated) only after a successful status.
pub fn download_to(url: &str, dest: &Path, timeout: Duration) -> Result<u64, TaskError> {
    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let progress = ProgressGuard::spinner(&format!("downloading {}", filename));

    let response = request(url, timeout)
        .call()
        .map_err(|e| network_error(url, e))?;

    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        upgrade_to_bytes(progress.bar(), len);
    }

    fs_utils::ensure_parent_dir(dest)?;
    let mut file = std::fs::File::create(dest).map_err(|e| TaskError::io_at("create", dest, e))?;

    let mut reader = response.into_reader();
    let mut buffer = [0u8; 8192];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| TaskError::Network(format!("read error from {}: {}", url, e)))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(|e| TaskError::io_at("write", dest, e))?;
        total_bytes += bytes_read as u64;
        progress.bar().set_position(total_bytes);
    }

    Ok(total_bytes)
}

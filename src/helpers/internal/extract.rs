//! Native archive extraction (no external tools needed)
//!
//! Supports zip and tar (plain, gz, xz, bz2, zst). Entries with absolute
//! paths or `..` components are rejected. Symbolic and hard links are not
//! materialized: they are skipped with a debug log, so nothing extracted here
//! can point outside the destination.

use crate::core::error::TaskError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
}

/// Detect archive format from a file name.
pub fn detect_format(name: &str) -> Option<ArchiveFormat> {
    let name = name.to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveFormat::TarXz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Some(ArchiveFormat::TarBz2)
    } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
        Some(ArchiveFormat::TarZst)
    } else if name.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

fn is_unsafe_entry(path: &Path) -> bool {
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

/// Reject writes through an existing symlink below `dest`.
fn ensure_no_symlink_components(dest: &Path, full_path: &Path) -> Result<(), TaskError> {
    let Ok(rel) = full_path.strip_prefix(dest) else {
        return Err(TaskError::PathEscape {
            path: full_path.display().to_string(),
        });
    };

    let mut cur = dest.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(md) = std::fs::symlink_metadata(&cur)
            && md.file_type().is_symlink()
        {
            return Err(TaskError::validation(format!(
                "extraction blocked: symlink in path component: {}",
                cur.display()
            )));
        }
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), TaskError> {
    std::fs::create_dir_all(path).map_err(|e| TaskError::io_at("create directory", path, e))
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), TaskError> {
    let mut archive = tar::Archive::new(reader);

    let entries = archive
        .entries()
        .map_err(|e| TaskError::io("tar read error", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| TaskError::io("tar entry error", e))?;
        let path = entry
            .path()
            .map_err(|e| TaskError::io("tar path error", e))?
            .into_owned();

        if is_unsafe_entry(&path) {
            return Err(TaskError::validation(format!(
                "archive contains unsafe path: {}",
                path.display()
            )));
        }

        // Some archives contain a "." entry; treat it as a no-op.
        if path.as_os_str().is_empty() || path == Path::new(".") {
            continue;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::debug!(path = %path.display(), "skipping link entry");
            continue;
        }

        let full_path = dest.join(&path);
        ensure_no_symlink_components(dest, &full_path)?;

        if let Some(parent) = full_path.parent() {
            create_dir(parent)?;
        }

        entry
            .unpack(&full_path)
            .map_err(|e| TaskError::io(format!("unpack error for {}", path.display()), e))?;
    }

    Ok(())
}

fn open(archive: &Path) -> Result<BufReader<File>, TaskError> {
    File::open(archive)
        .map(BufReader::new)
        .map_err(|e| TaskError::io_at("open", archive, e))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), TaskError> {
    let zip_err = |e: zip::result::ZipError| {
        TaskError::io(
            format!("zip read error in {}", archive_path.display()),
            std::io::Error::other(e),
        )
    };

    let mut archive = zip::ZipArchive::new(open(archive_path)?).map_err(zip_err)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(zip_err)?;

        let Some(rel) = file.enclosed_name() else {
            return Err(TaskError::validation(format!(
                "archive contains unsafe path: {}",
                file.name()
            )));
        };

        // S_IFLNK entries carry the link target as their content.
        if file.unix_mode().is_some_and(|m| m & 0o170000 == 0o120000) {
            tracing::debug!(path = %rel.display(), "skipping symlink entry");
            continue;
        }

        let outpath = dest.join(&rel);
        ensure_no_symlink_components(dest, &outpath)?;

        if file.is_dir() {
            create_dir(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            create_dir(parent)?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| TaskError::io_at("create", &outpath, e))?;
        std::io::copy(&mut file, &mut outfile)
            .map_err(|e| TaskError::io_at("write", &outpath, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                    .ok();
            }
        }
    }

    Ok(())
}

/// Extract `archive` into `dest`, creating `dest` if needed.
///
/// Blocking; call from `spawn_blocking`.
pub fn extract(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<(), TaskError> {
    create_dir(dest)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::Tar => extract_tar(open(archive)?, dest),
        ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(open(archive)?), dest),
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(open(archive)?), dest),
        ArchiveFormat::TarBz2 => extract_tar(bzip2::read::BzDecoder::new(open(archive)?), dest),
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(open(archive)?)
                .map_err(|e| TaskError::io("zstd init error", e))?;
            extract_tar(decoder, dest)
        }
    }
}

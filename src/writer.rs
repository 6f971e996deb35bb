use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::builder::Package;
use crate::error::PackageError;

/// ENOSPC on Unix
const DISK_FULL: i32 = 28;

fn is_disk_full(e: &io::Error) -> bool {
    e.raw_os_error() == Some(DISK_FULL)
}

/// Destination of a package entry below `out_dir`.
/// Entries that would escape `out_dir` are rejected.
pub fn destination(out_dir: &Path, relative: &str) -> Result<PathBuf, PackageError> {
    let mut dst = out_dir.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PackageError::WriteFailed {
                path: out_dir.join(relative),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid package path '{relative}'"),
                ),
            });
        }
        dst.push(segment);
    }
    Ok(dst)
}

/// Write one file, creating parent directories as needed
pub fn write_file(dst: &Path, contents: &[u8]) -> Result<u64, PackageError> {
    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                if is_disk_full(&e) {
                    return PackageError::DiskFull {
                        path: parent.to_path_buf(),
                    };
                }
                PackageError::WriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    fs::write(dst, contents).map_err(|e| {
        if is_disk_full(&e) {
            return PackageError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        PackageError::WriteFailed {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;
    Ok(contents.len() as u64)
}

/// Write every file of `package` below `out_dir`, returns (files_written, bytes_written).
///
/// `on_file` is called after each file with its relative path and size.
pub fn write_package(
    package: &Package,
    out_dir: &Path,
    shutdown: &AtomicBool,
    mut on_file: impl FnMut(&str, u64),
) -> Result<(u64, u64), PackageError> {
    let mut files_written = 0u64;
    let mut bytes_written = 0u64;

    for (relative, contents) in package.files() {
        if shutdown.load(Ordering::Relaxed) {
            return Err(PackageError::Cancelled);
        }

        let dst = destination(out_dir, relative)?;
        let bytes = write_file(&dst, contents)?;
        tracing::debug!(path = %dst.display(), bytes, "wrote");
        files_written += 1;
        bytes_written += bytes;
        on_file(relative, bytes);
    }

    Ok((files_written, bytes_written))
}

//! Filesystem operations module.
//!
//! This module provides the low-level primitives the engine is built on:
//! - The `FileOperations` trait, the injectable copy primitive
//! - `LocalFileOperations`, its implementation over `std::fs`
//! - Creating directories recursively

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::CopyError;

const COPY_BUFFER_SIZE: usize = 81920;

/// File-level primitives consumed by the transfer and verification engines.
///
/// Implementations must make `copy_file` atomic from the caller's point of
/// view: either the destination ends up holding the complete file or the
/// call fails and no partial file is left under the destination name.
pub trait FileOperations: Send + Sync {
    /// Copy one file.
    ///
    /// Returns `Ok(false)` when the destination exists and `overwrite` is off.
    fn copy_file(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<bool, CopyError>;

    /// Copy a directory tree file by file. Returns the number of files copied.
    fn copy_directory(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<usize, CopyError> {
        if !self.directory_exists(src) {
            return Err(CopyError::from_io(
                src,
                io::Error::new(io::ErrorKind::NotFound, "Source directory not found"),
            ));
        }

        self.create_directory(dst)?;
        let mut copied = 0;

        for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
            if cancel.is_cancelled() {
                return Err(CopyError::Cancelled);
            }
            let entry = entry.map_err(|e| walk_error(src, e))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|e| CopyError::Unknown {
                    message: e.to_string(),
                })?;
            let target = dst.join(relative);

            if entry.file_type().is_dir() {
                self.create_directory(&target)?;
            } else if entry.file_type().is_file()
                && self.copy_file(entry.path(), &target, overwrite, cancel)?
            {
                copied += 1;
            }
        }

        Ok(copied)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Size in bytes of the file at `path`.
    fn file_size(&self, path: &Path) -> Result<u64, CopyError> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| CopyError::from_io(path, e))
    }

    /// Create `path` and any missing parents.
    fn create_directory(&self, path: &Path) -> Result<(), CopyError>;

    /// Count regular files below `path` at any depth.
    fn count_files_recursively(&self, path: &Path) -> Result<usize, CopyError> {
        let mut count = 0;
        for entry in WalkDir::new(path).min_depth(1) {
            let entry = entry.map_err(|e| walk_error(path, e))?;
            if entry.file_type().is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> CopyError {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(io_err) => CopyError::from_io(path, io_err),
        None => CopyError::Unknown {
            message: format!("Filesystem loop detected at {}", path.display()),
        },
    }
}

/// `FileOperations` over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileOperations;

impl FileOperations for LocalFileOperations {
    fn copy_file(
        &self,
        src: &Path,
        dst: &Path,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<bool, CopyError> {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }

        let src_metadata = fs::metadata(src).map_err(|e| CopyError::from_io(src, e))?;
        if src_metadata.is_dir() {
            return Err(CopyError::Io {
                path: src.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "Source is a directory"),
            });
        }

        if dst.exists() && !overwrite {
            return Ok(false);
        }

        ensure_parent_dir_exists(dst)?;

        let partial = partial_path(dst);
        let outcome = stream_copy(src, &partial, cancel).and_then(|()| {
            fs::rename(&partial, dst).map_err(|e| CopyError::from_io(dst, e))
        });
        if let Err(e) = outcome {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        // Preserve modification time if available
        if let Ok(mtime) = src_metadata.modified() {
            let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
        }

        Ok(true)
    }

    fn create_directory(&self, path: &Path) -> Result<(), CopyError> {
        fs::create_dir_all(path).map_err(|e| CopyError::from_io(path, e))
    }
}

/// Sibling of `dst` used while the copy is in flight.
fn partial_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{}.syncflow-part", name))
}

fn stream_copy(src: &Path, dst: &Path, cancel: &CancellationToken) -> Result<(), CopyError> {
    let mut src_file = fs::File::open(src).map_err(|e| CopyError::from_io(src, e))?;
    let mut dst_file = fs::File::create(dst).map_err(|e| CopyError::from_io(dst, e))?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }
        let read = src_file
            .read(&mut buffer)
            .map_err(|e| CopyError::from_io(src, e))?;
        if read == 0 {
            break;
        }
        dst_file
            .write_all(&buffer[..read])
            .map_err(|e| CopyError::from_io(dst, e))?;
    }

    dst_file.flush().map_err(|e| CopyError::from_io(dst, e))
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns CopyError if the parent exists but is not a directory, or if
/// directory creation fails
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), CopyError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };

    // Skip if parent is empty path (relative root)
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(CopyError::Io {
            path: parent.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| CopyError::from_io(parent, e))
        }
        Err(e) => Err(CopyError::from_io(parent, e)),
    }
}

//! Source tree inventory.
//!
//! `build_inventory` is the primary scan: it records every file with its
//! size, counts subdirectories and collects a diagnostic for every entry it
//! could not read. One unreadable entry never aborts the scan; only
//! cancellation does.
//!
//! `calculate_directory_size` and `count_files` are best-effort helpers used
//! for estimates. They silently skip entries they cannot read and return the
//! partial value instead of failing.

use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::{classify_io_error, EngineError, ErrorCategory};
use crate::model::{FileEntry, FileInventoryResult};

/// Scan `source` recursively.
///
/// A blank or missing source yields an empty inventory with one diagnostic.
///
/// # Errors
/// Returns `EngineError::Cancelled` if `cancel` fires during the scan. No
/// other error is returned.
pub fn build_inventory(
    source: &Path,
    cancel: &CancellationToken,
) -> Result<FileInventoryResult, EngineError> {
    let mut result = FileInventoryResult::default();

    if source.as_os_str().is_empty() || !source.is_dir() {
        result
            .inaccessible_paths
            .push(format!("Source path does not exist: {}", source.display()));
        return Ok(result);
    }

    cancel.check()?;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        cancel.check()?;

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(source).to_path_buf();
                let diagnostic = match err.io_error() {
                    Some(io_err) => describe_failure(&path, io_err),
                    None => format!("Filesystem loop detected: {}", path.display()),
                };
                log::debug!("Inventory scan skipped entry: {}", diagnostic);
                result.inaccessible_paths.push(diagnostic);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            result.directory_count += 1;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                let size = metadata.len();
                let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
                log::trace!("File entry: {} (size: {})", entry.path().display(), size);
                result.files.push(FileEntry {
                    path: entry.path().to_path_buf(),
                    size,
                    modified,
                });
                result.total_file_count += 1;
                result.total_size_bytes += size;
            }
            Err(err) => {
                let diagnostic = match err.io_error() {
                    Some(io_err) => describe_failure(entry.path(), io_err),
                    None => format!("Unexpected error {}: {}", entry.path().display(), err),
                };
                log::debug!("Inventory scan skipped file: {}", diagnostic);
                result.inaccessible_paths.push(diagnostic);
            }
        }
    }

    log::debug!(
        "Inventory of {}: {}",
        source.display(),
        result.summary()
    );

    Ok(result)
}

/// Diagnostic line for an entry that could not be read.
fn describe_failure(path: &Path, err: &io::Error) -> String {
    match classify_io_error(path, err) {
        ErrorCategory::AccessDenied => format!("Access denied: {}", path.display()),
        ErrorCategory::DirectoryNotFound => format!(
            "Directory not found: {}",
            path.parent().unwrap_or(path).display()
        ),
        ErrorCategory::FileNotFound => format!("File not found: {}", path.display()),
        ErrorCategory::PathTooLong => format!("Path too long: {}", path.display()),
        ErrorCategory::Io => format!("IO error {}: {}", path.display(), err),
        _ => format!("Unexpected error {}: {}", path.display(), err),
    }
}

/// Total bytes of all readable files below `path`; 0 when `path` is not a directory.
pub fn calculate_directory_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return 0;
    }

    WalkDir::new(path)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Number of files below `path`; 0 when `path` is not a directory.
pub fn count_files(path: &Path) -> usize {
    if !path.is_dir() {
        return 0;
    }

    WalkDir::new(path)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

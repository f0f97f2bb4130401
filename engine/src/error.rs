//! Error types for the transfer engine.
//!
//! There are two layers of errors:
//! - `CopyError` is produced by the file-copy primitive for a single file. The
//!   engine never lets it escape a run; it is classified into an
//!   `ErrorCategory` and recorded as a `TransferError`.
//! - `EngineError` represents run-level conditions. Only `Cancelled` is ever
//!   propagated out of inventory building; the transfer engine turns the rest
//!   into a single System-category error on the result.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::io;
use std::path::{Path, PathBuf};

/// Category surfaced to the user for a failed transfer item.
///
/// Every category is retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    #[serde(rename = "Access Denied")]
    AccessDenied,
    #[serde(rename = "Directory Not Found")]
    DirectoryNotFound,
    #[serde(rename = "File Not Found")]
    FileNotFound,
    #[serde(rename = "Path Too Long")]
    PathTooLong,
    #[serde(rename = "IO Error")]
    Io,
    #[serde(rename = "Unknown Error")]
    Unknown,
    /// Destination volume ran critically low during a run
    Storage,
    /// The run itself failed outside the per-file scope
    System,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::DirectoryNotFound => "Directory Not Found",
            Self::FileNotFound => "File Not Found",
            Self::PathTooLong => "Path Too Long",
            Self::Io => "IO Error",
            Self::Unknown => "Unknown Error",
            Self::Storage => "Storage",
            Self::System => "System",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single file copy, as reported by a `FileOperations` implementation.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("Access to the path '{}' is denied", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not find a part of the path '{}'", path.display())]
    DirectoryNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not find file '{}'", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("The path '{}' exceeds the maximum length", path.display())]
    PathTooLong {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copy interrupted by the cancellation token; not a file failure.
    #[error("Copy cancelled")]
    Cancelled,

    #[error("{message}")]
    Unknown { message: String },
}

impl CopyError {
    /// Classify an I/O failure that happened while touching `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match classify_io_error(&path, &source) {
            ErrorCategory::AccessDenied => Self::AccessDenied { path, source },
            ErrorCategory::DirectoryNotFound => Self::DirectoryNotFound { path, source },
            ErrorCategory::FileNotFound => Self::FileNotFound { path, source },
            ErrorCategory::PathTooLong => Self::PathTooLong { path, source },
            _ => Self::Io { path, source },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AccessDenied { .. } => ErrorCategory::AccessDenied,
            Self::DirectoryNotFound { .. } => ErrorCategory::DirectoryNotFound,
            Self::FileNotFound { .. } => ErrorCategory::FileNotFound,
            Self::PathTooLong { .. } => ErrorCategory::PathTooLong,
            Self::Io { .. } => ErrorCategory::Io,
            Self::Cancelled | Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Map an `io::Error` raised on `path` to a user-facing category.
///
/// A not-found error is a "Directory Not Found" when the parent of `path` is
/// itself missing, otherwise "File Not Found".
pub fn classify_io_error(path: &Path, err: &io::Error) -> ErrorCategory {
    if is_name_too_long(err) {
        return ErrorCategory::PathTooLong;
    }

    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorCategory::AccessDenied,
        io::ErrorKind::NotFound => match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                ErrorCategory::DirectoryNotFound
            }
            _ => ErrorCategory::FileNotFound,
        },
        _ => ErrorCategory::Io,
    }
}

#[cfg(unix)]
fn is_name_too_long(err: &io::Error) -> bool {
    err.raw_os_error() == Some(rustix::io::Errno::NAMETOOLONG.raw_os_error())
}

#[cfg(windows)]
fn is_name_too_long(err: &io::Error) -> bool {
    use windows_sys::Win32::Foundation::ERROR_FILENAME_EXCED_RANGE;
    err.raw_os_error() == Some(ERROR_FILENAME_EXCED_RANGE as i32)
}

#[cfg(not(any(unix, windows)))]
fn is_name_too_long(_err: &io::Error) -> bool {
    false
}

/// Run-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// A folder mapping has a blank source or destination path
    #[error("Folder mapping {index} has invalid paths")]
    InvalidMapping { index: usize },

    /// Catch-all for unexpected errors
    #[error("Engine error: {message}")]
    Unknown { message: String },
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CopyError> for EngineError {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::Cancelled => EngineError::Cancelled,
            other => EngineError::Unknown {
                message: other.to_string(),
            },
        }
    }
}

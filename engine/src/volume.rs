//! Free-space queries against the volume holding a path.
//!
//! The destination folder often does not exist before the first transfer, so
//! every query resolves the nearest existing ancestor first.

use std::io;
use std::path::{Path, PathBuf};

/// Identifier returned when the volume of a path cannot be determined.
pub const UNKNOWN_DRIVE: &str = "Unknown Drive";

/// Source of volume information. `SystemVolumes` asks the OS; tests inject fixed figures.
pub trait VolumeProbe: Send + Sync {
    /// Bytes available to the current user on the volume holding `path`.
    fn available_space(&self, path: &Path) -> io::Result<u64>;

    /// Human-readable identifier of the volume holding `path`.
    fn volume_id(&self, path: &Path) -> String;
}

/// `VolumeProbe` backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemVolumes;

impl VolumeProbe for SystemVolumes {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        let existing = nearest_existing_ancestor(path)?;
        platform::available_space(&existing)
    }

    fn volume_id(&self, path: &Path) -> String {
        nearest_existing_ancestor(path)
            .ok()
            .and_then(|existing| platform::volume_root(&existing))
            .unwrap_or_else(|| UNKNOWN_DRIVE.to_string())
    }
}

/// Absolute form of `path`, walked up until an existing entry is found.
pub fn nearest_existing_ancestor(path: &Path) -> io::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "The path is empty",
        ));
    }

    let absolute = std::path::absolute(path)?;
    absolute
        .ancestors()
        .find(|candidate| candidate.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No existing ancestor for {}", path.display()),
            )
        })
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    pub fn available_space(path: &Path) -> io::Result<u64> {
        let stats = rustix::fs::statvfs(path)?;
        Ok(stats.f_bavail.saturating_mul(stats.f_frsize))
    }

    /// Mount point of `path`: the highest ancestor still on the same device.
    pub fn volume_root(path: &Path) -> Option<String> {
        let device = std::fs::metadata(path).ok()?.dev();
        let mut root = path;
        for ancestor in path.ancestors().skip(1) {
            match std::fs::metadata(ancestor) {
                Ok(meta) if meta.dev() == device => root = ancestor,
                _ => break,
            }
        }
        Some(root.display().to_string())
    }
}

#[cfg(windows)]
mod platform {
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::path::{Component, Path, PathBuf};
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    pub fn available_space(path: &Path) -> io::Result<u64> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let mut free_bytes_available: u64 = 0;
        let ok = unsafe {
            GetDiskFreeSpaceExW(
                wide.as_ptr(),
                &mut free_bytes_available,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };

        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(free_bytes_available)
        }
    }

    /// Drive root such as `C:\` or a UNC share prefix.
    pub fn volume_root(path: &Path) -> Option<String> {
        let mut root = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => root.push(component),
                _ => break,
            }
        }
        if root.as_os_str().is_empty() {
            None
        } else {
            Some(root.display().to_string())
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::io;
    use std::path::Path;

    pub fn available_space(_path: &Path) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "Free space queries are not supported on this platform",
        ))
    }

    pub fn volume_root(_path: &Path) -> Option<String> {
        None
    }
}

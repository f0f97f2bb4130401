//! Where the CLI keeps its files.

use std::path::PathBuf;

/// Environment variable overriding the profile store location.
pub const STORE_ENV: &str = "SYNCFLOW_PROFILES";

const STORE_FILE: &str = "profiles.json";

/// Per-user configuration directory for SyncFlow.
pub fn syncflow_config_dir() -> Result<PathBuf, String> {
    let home = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .map_err(|_| "Unable to resolve USERPROFILE/HOME".to_string())?
    } else {
        std::env::var("HOME").map_err(|_| "Unable to resolve HOME".to_string())?
    };

    let mut path = PathBuf::from(home);
    if cfg!(target_os = "macos") {
        path.push("Library");
        path.push("Application Support");
        path.push("syncflow");
    } else {
        path.push(".config");
        path.push("syncflow");
    }
    Ok(path)
}

/// The store path given on the command line, or the default one.
pub fn resolve_store_path(explicit: Option<PathBuf>) -> Result<PathBuf, String> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(syncflow_config_dir()?.join(STORE_FILE)),
    }
}

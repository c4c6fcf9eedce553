/// Canonical file paths for the daemon's data files.
///
/// Both files live in one data directory (the platform data dir by default,
/// or `--data-dir`):
///   - config.toml  Written by the settings screen, read and watched by the daemon.
///   - status.toml  Written by the daemon, read by the renderer.
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the platform data directory for the daemon.
pub fn app_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("id", "xms", "CapsuleEdge")
        .ok_or_else(|| anyhow!("failed to resolve a home directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn config_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATUS_FILE_NAME)
}

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::engine::{Command, Handle};
use crate::policy::Timeouts;
use crate::state::IslandConfig;

/// Root configuration structure. Deserialized from config.toml in the data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Overlay position and per-state geometry.
    #[serde(default)]
    pub island: IslandConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// User toggles owned by the settings screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub overlay_enabled: bool,
    /// Start the overlay at boot. Read by the platform launcher, carried here
    /// so the whole settings record round-trips.
    pub auto_start: bool,
    /// Hide the overlay while the device is in landscape.
    pub hide_in_landscape: bool,
    pub first_launch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overlay_enabled: true,
            auto_start: true,
            hide_in_landscape: true,
            first_launch: true,
        }
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`. Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` command.
pub async fn watch_config(path: PathBuf, handle: Handle) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            warn!("failed to create config watcher: {e}");
            return;
        }
    };

    // Watch the parent directory rather than the file directly so we catch
    // editor-style atomic saves (write-new + rename).
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            warn!("config path {} has no parent directory", path.display());
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        warn!("failed to watch config directory {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load_or_default(&path) {
                Ok(config) => {
                    info!("config reloaded");
                    if handle.send(Command::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("failed to reload config: {e:#}"),
            }
        }
    }
}

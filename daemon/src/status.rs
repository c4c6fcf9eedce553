use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::event::EventKind;
use crate::state::UiState;

/// Snapshot of the island written to status.toml in the data directory.
/// The renderer and settings screen read this file; the daemon never does.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IslandStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// RFC 3339 time the snapshot was taken.
    pub updated_at: String,
    /// Kind of the active event, repeated at the top level for quick reads.
    pub active_kind: EventKind,
    /// The full published state the renderer draws from.
    pub state: UiState,
}

impl IslandStatus {
    pub fn from_state(state: &UiState) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            active_kind: state.active_event.kind(),
            state: state.clone(),
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged, never propagated.
pub fn write_status(path: &Path, status: &IslandStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!("failed to write status file: {e}");
            }
        }
        Err(e) => warn!("failed to serialize status: {e}"),
    }
}

/// Rewrites the status file on every state change until the engine goes away.
pub async fn run_writer(path: PathBuf, mut rx: watch::Receiver<UiState>) {
    loop {
        let status = IslandStatus::from_state(&rx.borrow_and_update());
        debug!(kind = ?status.active_kind, display = ?status.state.display_state, "writing status");
        write_status(&path, &status);
        if rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::*;
    use crate::event::{IslandEvent, Payload};
    use crate::state::DisplayState;

    fn playing_state() -> UiState {
        let mut state = UiState::new();
        state.is_service_running = true;
        state.display_state = DisplayState::Compact;
        let mut playback = media("player", "song", true);
        playback.position_ms = 42_000;
        state.active_event = IslandEvent::at(Payload::MediaPlayback(playback), 5);
        state
    }

    fn read_back(path: &Path) -> IslandStatus {
        toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    // ── IslandStatus::from_state ──────────────────────────────────────────────

    #[test]
    fn idle_state_snapshot() {
        let s = IslandStatus::from_state(&UiState::new());
        assert_eq!(s.active_kind, EventKind::Idle);
        assert_eq!(s.state, UiState::new());
    }

    #[test]
    fn version_matches_cargo_pkg() {
        let s = IslandStatus::from_state(&UiState::new());
        assert_eq!(s.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn snapshot_carries_whole_state() {
        let state = playing_state();
        let s = IslandStatus::from_state(&state);
        assert_eq!(s.active_kind, EventKind::MediaPlayback);
        assert_eq!(s.state, state);
    }

    #[test]
    fn enums_serialize_to_snake_case() {
        let s = IslandStatus::from_state(&playing_state());
        let text = toml::to_string_pretty(&s).unwrap();
        assert!(text.contains("display_state = \"compact\""));
        assert!(text.contains("active_kind = \"media_playback\""));
        assert!(text.contains("kind = \"media_playback\""));
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("status.toml");
        write_status(&path, &IslandStatus::from_state(&UiState::new()));
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let original = IslandStatus::from_state(&playing_state());
        write_status(&path, &original);
        assert_eq!(read_back(&path), original);
    }

    #[test]
    fn renderer_reads_position_config_and_charging_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut state = playing_state();
        state.config.scale = 1.5;
        state.config.offset_y = 12.0;
        write_status(&path, &IslandStatus::from_state(&state));
        let parsed = read_back(&path);
        match &parsed.state.active_event.payload {
            Payload::MediaPlayback(m) => {
                assert_eq!(m.position_ms, 42_000);
                assert_eq!(m.duration_ms, 200_000);
                assert_eq!(m.artist, "Artist");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(parsed.state.config.scale, 1.5);
        assert_eq!(parsed.state.config.offset_y, 12.0);

        let mut plugged = charging(64, true);
        plugged.is_fast_charging = true;
        state.active_event = IslandEvent::at(Payload::Charging(plugged), 9);
        write_status(&path, &IslandStatus::from_state(&state));
        match read_back(&path).state.active_event.payload {
            Payload::Charging(c) => {
                assert_eq!(c.level, 64);
                assert!(c.is_fast_charging);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    // ── run_writer ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn writer_follows_state_until_sender_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        let (tx, rx) = watch::channel(UiState::new());
        let writer = tokio::spawn(run_writer(path.clone(), rx));

        tx.send(playing_state()).unwrap();
        drop(tx);
        writer.await.unwrap();

        let parsed = read_back(&path);
        assert_eq!(parsed.active_kind, EventKind::MediaPlayback);
        assert_eq!(parsed.state.display_state, DisplayState::Compact);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::event::{EventKey, IslandEvent, Payload};

/// Shortest delay any timeout may be configured to.
pub const MIN_TIMEOUT_MS: u64 = 100;
/// Window in which an identical notification is not shown again.
pub const NOTIFICATION_REPEAT_WINDOW: Duration = Duration::from_secs(10);

/// Auto-collapse and auto-dismiss delays, in milliseconds. Read from
/// `[timeouts]` in config.toml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    /// Expanded notification collapses after this long.
    pub notification_collapse_ms: u64,
    /// ...and is dismissed this long after collapsing.
    pub notification_dismiss_ms: u64,
    /// A paused track is dismissed after this long.
    pub media_pause_ms: u64,
    /// Charging indicator stays expanded this long.
    pub charging_collapse_ms: u64,
    /// ...and is dismissed this long after collapsing.
    pub charging_dismiss_ms: u64,
    pub bluetooth_dismiss_ms: u64,
    pub ringer_dismiss_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            notification_collapse_ms: 5_000,
            notification_dismiss_ms: 1_000,
            media_pause_ms: 60_000,
            charging_collapse_ms: 4_000,
            charging_dismiss_ms: 2_000,
            bluetooth_dismiss_ms: 3_000,
            ringer_dismiss_ms: 2_000,
        }
    }
}

impl Timeouts {
    pub fn notification_collapse(&self) -> Duration {
        millis(self.notification_collapse_ms)
    }

    pub fn notification_dismiss(&self) -> Duration {
        millis(self.notification_dismiss_ms)
    }

    pub fn media_pause(&self) -> Duration {
        millis(self.media_pause_ms)
    }

    pub fn charging_collapse(&self) -> Duration {
        millis(self.charging_collapse_ms)
    }

    pub fn charging_dismiss(&self) -> Duration {
        millis(self.charging_dismiss_ms)
    }

    pub fn bluetooth_dismiss(&self) -> Duration {
        millis(self.bluetooth_dismiss_ms)
    }

    pub fn ringer_dismiss(&self) -> Duration {
        millis(self.ringer_dismiss_ms)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_TIMEOUT_MS))
}

/// What must still be on screen for a delayed action to run. Checked against
/// the active event when the timer fires; a guard that no longer holds turns
/// the fire into a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// The very same event is still active.
    Same(EventKey),
    /// The active event is still this track, and it is still paused.
    PausedTrack { app_id: String, title: String },
    /// The same charging event is still active and still charging.
    StillCharging(EventKey),
}

impl Guard {
    pub fn holds(&self, active: &IslandEvent) -> bool {
        match self {
            Guard::Same(key) => active.key() == *key,
            Guard::PausedTrack { app_id, title } => matches!(
                &active.payload,
                Payload::MediaPlayback(m) if m.same_track(app_id, title) && !m.is_playing
            ),
            Guard::StillCharging(key) => {
                active.key() == *key
                    && matches!(&active.payload, Payload::Charging(c) if c.is_charging)
            }
        }
    }
}

/// Suppresses notifications with the same app, title and text seen within
/// [`NOTIFICATION_REPEAT_WINDOW`].
#[derive(Debug, Default)]
pub struct RecentNotifications {
    seen: HashMap<String, Instant>,
}

impl RecentNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the notification should be shown, and remembers it.
    pub fn admit(&mut self, app_id: &str, title: &str, text: &str, now: Instant) -> bool {
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < NOTIFICATION_REPEAT_WINDOW);
        let key = format!("{app_id}:{title}:{text}");
        if self.seen.contains_key(&key) {
            return false;
        }
        self.seen.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::*;

    // ── timeouts ──────────────────────────────────────────────────────────────

    #[test]
    fn default_timeout_table() {
        let t = Timeouts::default();
        assert_eq!(t.notification_collapse(), Duration::from_secs(5));
        assert_eq!(t.notification_dismiss(), Duration::from_secs(1));
        assert_eq!(t.media_pause(), Duration::from_secs(60));
        assert_eq!(t.charging_collapse(), Duration::from_secs(4));
        assert_eq!(t.charging_dismiss(), Duration::from_secs(2));
        assert_eq!(t.bluetooth_dismiss(), Duration::from_secs(3));
        assert_eq!(t.ringer_dismiss(), Duration::from_secs(2));
    }

    #[test]
    fn timeouts_below_minimum_are_raised() {
        let t = Timeouts {
            ringer_dismiss_ms: 0,
            ..Timeouts::default()
        };
        assert_eq!(t.ringer_dismiss(), Duration::from_millis(MIN_TIMEOUT_MS));
    }

    // ── guards ────────────────────────────────────────────────────────────────

    #[test]
    fn same_guard_requires_identical_key() {
        let first = IslandEvent::at(Payload::Notification(notification("a", "x")), 1);
        let second = IslandEvent::at(Payload::Notification(notification("a", "x")), 2);
        let guard = Guard::Same(first.key());
        assert!(guard.holds(&first));
        assert!(!guard.holds(&second));
        assert!(!guard.holds(&IslandEvent::idle()));
    }

    #[test]
    fn paused_track_guard() {
        let guard = Guard::PausedTrack {
            app_id: "player".to_string(),
            title: "song".to_string(),
        };
        let paused = IslandEvent::at(Payload::MediaPlayback(media("player", "song", false)), 1);
        let playing = IslandEvent::at(Payload::MediaPlayback(media("player", "song", true)), 1);
        let other = IslandEvent::at(Payload::MediaPlayback(media("player", "next", false)), 1);
        assert!(guard.holds(&paused));
        assert!(!guard.holds(&playing));
        assert!(!guard.holds(&other));
    }

    #[test]
    fn still_charging_guard() {
        let on = IslandEvent::at(Payload::Charging(charging(40, true)), 1);
        let off = IslandEvent::at(Payload::Charging(charging(40, false)), 1);
        let guard = Guard::StillCharging(on.key());
        assert!(guard.holds(&on));
        assert!(!guard.holds(&off));
    }

    // ── recent notifications ──────────────────────────────────────────────────

    #[test]
    fn repeat_within_window_is_suppressed() {
        let mut recent = RecentNotifications::new();
        let t0 = Instant::now();
        assert!(recent.admit("chat", "Bob", "hi", t0));
        assert!(!recent.admit("chat", "Bob", "hi", t0 + Duration::from_secs(9)));
        assert!(recent.admit("chat", "Bob", "hi again", t0 + Duration::from_secs(9)));
    }

    #[test]
    fn repeat_after_window_is_admitted() {
        let mut recent = RecentNotifications::new();
        let t0 = Instant::now();
        assert!(recent.admit("chat", "Bob", "hi", t0));
        assert!(recent.admit("chat", "Bob", "hi", t0 + NOTIFICATION_REPEAT_WINDOW));
    }
}

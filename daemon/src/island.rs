/// The island's arbitration engine.
///
/// `Island` owns the pending queue and the published [`UiState`]. It decides
/// which event is on screen and how large the island is, and it publishes every
/// change on a `watch` channel so observers always see the latest state.
///
/// It is synchronous and has no notion of time: timers, polling
/// and producers live in `engine`, which calls into it from a single task.
use tokio::sync::watch;
use tracing::debug;

use crate::event::{EventKind, IslandEvent, MediaPlayback, Payload};
use crate::queue::EventQueue;
use crate::state::{DisplayState, IslandConfig, UiState};

pub struct Island {
    state: UiState,
    queue: EventQueue,
    tx: watch::Sender<UiState>,
}

impl Island {
    pub fn new() -> Self {
        let state = UiState::new();
        let (tx, _rx) = watch::channel(state.clone());
        Self {
            state,
            queue: EventQueue::new(),
            tx,
        }
    }

    /// Returns a receiver that sees every published [`UiState`].
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn active(&self) -> &IslandEvent {
        &self.state.active_event
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    // ── arbitration ───────────────────────────────────────────────────────────

    /// Queues `event` and shows it right away if the island is idle or the
    /// event's priority is at least the active one's. Returns true if shown.
    pub fn push_event(&mut self, event: IslandEvent) -> bool {
        if !self.queue.push(event.clone()) {
            debug!(kind = ?event.kind(), timestamp = event.timestamp, "duplicate event not queued");
        }

        let active = &self.state.active_event;
        if active.is_idle() || event.priority >= active.priority {
            debug!(kind = ?event.kind(), priority = event.priority, "promoting event");
            self.display_event(event);
            true
        } else {
            debug!(
                kind = ?event.kind(),
                priority = event.priority,
                active_priority = active.priority,
                "event waits in queue"
            );
            false
        }
    }

    /// Makes `event` the active event and picks the display state for it.
    pub fn display_event(&mut self, event: IslandEvent) {
        self.state.display_state = match event.payload {
            Payload::Idle => DisplayState::Collapsed,
            Payload::Notification(_) => DisplayState::Expanded,
            Payload::MediaPlayback(_)
            | Payload::Charging(_)
            | Payload::BluetoothConnection(_)
            | Payload::RingerMode(_) => DisplayState::Compact,
        };
        self.state.active_event = event;
        self.publish();
    }

    /// Drops the active event from the queue and shows the next one, or idle.
    ///
    /// When the active event is no longer queued (it was truncated away) the
    /// queue head is dropped instead.
    pub fn dismiss_current_event(&mut self) {
        let active_key = self.state.active_event.key();
        if self.queue.remove(active_key).is_none() {
            self.queue.pop_front();
        }
        let next = self.queue.front().cloned().unwrap_or_else(IslandEvent::idle);
        debug!(next = ?next.kind(), remaining = self.queue.len(), "dismissed active event");
        self.display_event(next);
    }

    /// Drops queued events of `kind` other than the active one.
    pub fn discard_queued(&mut self, kind: EventKind) {
        let active = self.state.active_event.key();
        self.queue.retain(|e| e.kind() != kind || e.key() == active);
    }

    pub fn clear_all_events(&mut self) {
        self.queue.clear();
        self.display_event(IslandEvent::idle());
    }

    // ── display state ─────────────────────────────────────────────────────────

    pub fn expand_island(&mut self) {
        if !self.state.active_event.is_idle() {
            self.state.display_state = DisplayState::Expanded;
            self.publish();
        }
    }

    /// Always goes to the minimal pill, never to `Compact`.
    pub fn collapse_island(&mut self) {
        self.state.display_state = DisplayState::Collapsed;
        self.publish();
    }

    pub fn expand_to_compact(&mut self) {
        if !self.state.active_event.is_idle() {
            self.state.display_state = DisplayState::Compact;
            self.publish();
        }
    }

    // ── in-place patches ──────────────────────────────────────────────────────

    /// Applies `f` to the active media event and its queued copy. Returns the
    /// patched event, or `None` if the active event is not media.
    pub fn patch_media(&mut self, f: impl Fn(&mut MediaPlayback)) -> Option<MediaPlayback> {
        if !matches!(self.state.active_event.payload, Payload::MediaPlayback(_)) {
            return None;
        }
        self.patch_active(|payload| {
            if let Payload::MediaPlayback(media) = payload {
                f(media);
            }
        });
        match &self.state.active_event.payload {
            Payload::MediaPlayback(media) => Some(media.clone()),
            _ => None,
        }
    }

    pub fn update_media_position(&mut self, position_ms: i64) -> bool {
        self.patch_media(|m| m.position_ms = position_ms).is_some()
    }

    /// Flips `is_playing` on the active media event, if there is one.
    pub fn update_media_play_state(&mut self, is_playing: bool) -> Option<MediaPlayback> {
        self.patch_media(|m| m.is_playing = is_playing)
    }

    /// Marks queued media from `app_id` as paused, leaving the active event
    /// alone. Returns true if a queued copy changed.
    pub fn pause_queued_media(&mut self, app_id: &str) -> bool {
        let active = self.state.active_event.key();
        let mut changed = false;
        for event in self.queue.iter_mut() {
            if event.key() == active {
                continue;
            }
            if let Payload::MediaPlayback(media) = &mut event.payload {
                if media.app_id == app_id && media.is_playing {
                    media.is_playing = false;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Refreshes level and fast-charge flag of an active charging event
    /// without touching the display state.
    pub fn update_charging(&mut self, level: u8, is_fast_charging: bool) -> bool {
        if !matches!(self.state.active_event.payload, Payload::Charging(_)) {
            return false;
        }
        self.patch_active(|payload| {
            if let Payload::Charging(charging) = payload {
                charging.level = level.min(100);
                charging.is_fast_charging = is_fast_charging;
            }
        });
        true
    }

    fn patch_active(&mut self, f: impl Fn(&mut Payload)) {
        let key = self.state.active_event.key();
        f(&mut self.state.active_event.payload);
        if let Some(queued) = self.queue.get_mut(key) {
            f(&mut queued.payload);
        }
        self.publish();
    }

    // ── service flags and config ──────────────────────────────────────────────

    pub fn set_service_running(&mut self, running: bool) {
        self.state.is_service_running = running;
        self.publish();
    }

    pub fn set_overlay_enabled(&mut self, enabled: bool) {
        self.state.is_overlay_enabled = enabled;
        self.publish();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.state.is_visible = visible;
        self.publish();
    }

    pub fn update_config(&mut self, config: IslandConfig) {
        self.state.config = config;
        self.publish();
    }

    /// Sends the current state to subscribers if it differs from the last one sent.
    fn publish(&self) {
        let state = &self.state;
        self.tx.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }
}

impl Default for Island {
    fn default() -> Self {
        Self::new()
    }
}

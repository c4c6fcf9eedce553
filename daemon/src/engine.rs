/// Single-owner event loop around [`Island`].
///
/// Every producer (notification interceptor, media-session observer, battery /
/// bluetooth / ringer receivers, the renderer's touch callbacks, the config
/// watcher) talks to the engine through a cloneable [`Handle`]. Commands are
/// handled one at a time on the engine task, as are timer fires and position
/// ticks, so no two mutations of the island ever interleave.
use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, Settings};
use crate::event::{
    self, BluetoothConnection, Charging, EventKey, EventKind, IslandEvent, MediaPlayback,
    Notification, Payload, RingerMode, SoundMode,
};
use crate::island::Island;
use crate::media::{self, PlaybackSample};
use crate::policy::{Guard, RecentNotifications, Timeouts};
use crate::state::{DisplayState, UiState};
use crate::timers::{Poller, TimerKey, Timers};
use crate::transport::{MediaAction, MediaTransport};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// A media session report: metadata plus the latest playback sample.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaUpdate {
    pub app_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub art: Option<String>,
    pub is_playing: bool,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub position_ms: i64,
    /// Wall-clock milliseconds at which `position_ms` was sampled; 0 if unknown.
    #[serde(default)]
    pub last_position_update_ms: i64,
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f32,
}

fn default_playback_speed() -> f32 {
    1.0
}

#[derive(Debug)]
pub enum Command {
    /// A notification was posted.
    Notification(Notification),
    /// A media session changed metadata or playback state.
    Media(MediaUpdate),
    /// Battery report; connect / disconnect is detected from `is_charging` edges.
    Battery(Charging),
    Bluetooth(BluetoothConnection),
    Ringer(RingerMode),
    Tap,
    LongPress,
    DismissRequested,
    OutsideTouch,
    /// Shrink an expanded island to the compact card.
    Compact,
    MediaAction(MediaAction),
    Orientation {
        landscape: bool,
    },
    /// Drop every pending event and go idle.
    ClearAll,
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// A policy timer expired. Sent by [`Timers`] only.
    TimerFired {
        key: TimerKey,
        generation: u64,
    },
    /// Position ticker fired. Sent by [`Poller`] only.
    PositionTick,
    /// Stop the engine; `run` returns the final state.
    Shutdown,
}

/// Producer side of the engine. Cheap to clone; every call is marshalled onto
/// the engine task.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::Sender<Command>,
}

impl Handle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("island engine has stopped"))
    }

    pub async fn notify_incoming(&self, notification: Notification) -> Result<()> {
        self.send(Command::Notification(notification)).await
    }

    pub async fn media_state_changed(&self, update: MediaUpdate) -> Result<()> {
        self.send(Command::Media(update)).await
    }

    pub async fn battery_changed(
        &self,
        level: u8,
        is_charging: bool,
        is_fast_charging: bool,
    ) -> Result<()> {
        self.send(Command::Battery(Charging {
            level,
            is_charging,
            is_fast_charging,
        }))
        .await
    }

    pub async fn bluetooth_changed(&self, connection: BluetoothConnection) -> Result<()> {
        self.send(Command::Bluetooth(connection)).await
    }

    pub async fn ringer_changed(&self, mode: SoundMode) -> Result<()> {
        self.send(Command::Ringer(RingerMode { mode })).await
    }

    pub async fn tap(&self) -> Result<()> {
        self.send(Command::Tap).await
    }

    pub async fn long_press(&self) -> Result<()> {
        self.send(Command::LongPress).await
    }

    pub async fn dismiss_requested(&self) -> Result<()> {
        self.send(Command::DismissRequested).await
    }

    pub async fn compact(&self) -> Result<()> {
        self.send(Command::Compact).await
    }

    pub async fn outside_touch(&self) -> Result<()> {
        self.send(Command::OutsideTouch).await
    }

    pub async fn media_action(&self, action: MediaAction) -> Result<()> {
        self.send(Command::MediaAction(action)).await
    }

    pub async fn orientation_changed(&self, landscape: bool) -> Result<()> {
        self.send(Command::Orientation { landscape }).await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.send(Command::ClearAll).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }
}

#[cfg(test)]
impl Handle {
    /// A handle whose commands land in the returned receiver instead of an engine.
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

/// Millisecond timestamps that follow the wall clock but never repeat, so two
/// events stamped by the engine never share an identity.
struct Stamper {
    origin_ms: i64,
    origin: Instant,
    last: i64,
}

impl Stamper {
    fn new() -> Self {
        Self {
            origin_ms: event::now_millis(),
            origin: Instant::now(),
            last: 0,
        }
    }

    fn now_ms(&self) -> i64 {
        self.origin_ms + self.origin.elapsed().as_millis() as i64
    }

    fn next(&mut self) -> i64 {
        let stamp = self.now_ms().max(self.last + 1);
        self.last = stamp;
        stamp
    }
}

pub struct Engine<T: MediaTransport> {
    island: Island,
    timers: Timers,
    poller: Poller,
    transport: T,
    rx: mpsc::Receiver<Command>,
    clock: Stamper,
    settings: Settings,
    timeouts: Timeouts,
    recent: RecentNotifications,
    /// Latest playback sample and the app that reported it.
    playback: Option<(String, PlaybackSample)>,
    charging: bool,
    landscape: bool,
    /// Active event whose policy timers have been started.
    armed: Option<EventKey>,
}

impl<T: MediaTransport> Engine<T> {
    pub fn new(config: &Config, transport: T) -> (Self, Handle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let mut engine = Self {
            island: Island::new(),
            timers: Timers::new(tx.clone()),
            poller: Poller::new(tx.clone()),
            transport,
            rx,
            clock: Stamper::new(),
            settings: Settings::default(),
            timeouts: Timeouts::default(),
            recent: RecentNotifications::new(),
            playback: None,
            charging: false,
            landscape: false,
            armed: None,
        };
        engine.apply_config(config.clone());
        (engine, Handle { tx })
    }

    /// Latest-value stream of the island state.
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.island.subscribe()
    }

    /// Handles commands until [`Command::Shutdown`], then returns the final state.
    pub async fn run(mut self) -> UiState {
        self.island.set_service_running(true);
        info!("island engine running");

        while let Some(command) = self.rx.recv().await {
            if matches!(command, Command::Shutdown) {
                info!("island engine shutting down");
                break;
            }
            self.handle(command);
            self.reconcile();
        }

        self.timers.cancel_all();
        self.poller.stop();
        self.island.set_service_running(false);
        self.island.state().clone()
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Notification(notification) => self.on_notification(notification),
            Command::Media(update) => self.on_media(update),
            Command::Battery(report) => self.on_battery(report),
            Command::Bluetooth(connection) => {
                self.push(Payload::BluetoothConnection(connection));
            }
            Command::Ringer(ringer) => {
                self.push(Payload::RingerMode(ringer));
            }
            Command::Tap => self.on_tap(),
            Command::LongPress => match self.island.state().display_state {
                DisplayState::Collapsed | DisplayState::Compact => self.island.expand_island(),
                DisplayState::Expanded => self.island.collapse_island(),
            },
            Command::DismissRequested => self.island.dismiss_current_event(),
            Command::Compact => self.island.expand_to_compact(),
            Command::OutsideTouch => {
                if self.island.state().display_state == DisplayState::Expanded {
                    self.island.collapse_island();
                }
            }
            Command::MediaAction(action) => {
                let app_id = match &self.island.active().payload {
                    Payload::MediaPlayback(m) => Some(m.app_id.clone()),
                    _ => None,
                };
                debug!(?action, app = ?app_id, "forwarding media action");
                self.transport.media_action(app_id.as_deref(), action);
            }
            Command::Orientation { landscape } => {
                self.landscape = landscape;
                self.update_visibility();
            }
            Command::ClearAll => {
                self.timers.cancel_all();
                self.island.clear_all_events();
            }
            Command::ConfigReloaded(config) => self.apply_config(config),
            Command::TimerFired { key, generation } => self.on_timer(key, generation),
            Command::PositionTick => self.on_position_tick(),
            Command::Shutdown => {}
        }
    }

    fn push(&mut self, payload: Payload) -> bool {
        let event = IslandEvent::at(payload, self.clock.next());
        let app = event.source_app().map(str::to_string);
        let kind = event.kind();
        let shown = self.island.push_event(event);
        debug!(?kind, app = ?app, queued = self.island.queue().len(), shown, "event pushed");
        shown
    }

    // ── producers ─────────────────────────────────────────────────────────────

    fn on_notification(&mut self, notification: Notification) {
        if notification.title.is_empty() && notification.text.is_empty() {
            debug!(app = %notification.app_id, "empty notification ignored");
            return;
        }
        let admitted = self.recent.admit(
            &notification.app_id,
            &notification.title,
            &notification.text,
            Instant::now(),
        );
        if !admitted {
            debug!(app = %notification.app_id, "repeated notification suppressed");
            return;
        }
        self.push(Payload::Notification(notification));
    }

    fn on_media(&mut self, update: MediaUpdate) {
        let sample = PlaybackSample {
            position_ms: update.position_ms,
            last_update_ms: update.last_position_update_ms,
            speed: update.playback_speed,
        };
        let (same_app, same_track) = match &self.island.active().payload {
            Payload::MediaPlayback(m) => (
                m.app_id == update.app_id,
                m.same_track(&update.app_id, &update.title),
            ),
            _ => (false, false),
        };

        if update.is_playing {
            self.playback = Some((update.app_id.clone(), sample));
            if same_track {
                self.island.patch_media(|m| {
                    m.artist = update.artist.clone();
                    m.art = update.art.clone();
                    m.duration_ms = update.duration_ms;
                    m.position_ms = update.position_ms;
                });
                self.set_media_playing(true);
            } else {
                self.timers.cancel(TimerKey::MediaPause);
                self.push(Payload::MediaPlayback(MediaPlayback {
                    app_id: update.app_id,
                    title: update.title,
                    artist: update.artist,
                    art: update.art,
                    is_playing: true,
                    duration_ms: update.duration_ms,
                    position_ms: update.position_ms,
                }));
            }
        } else if same_app {
            self.playback = Some((update.app_id.clone(), sample));
            self.set_media_playing(false);
        } else if self.island.pause_queued_media(&update.app_id) {
            // Surfaces paused; `arm` starts the pause timeout then.
            debug!(app = %update.app_id, "queued media marked paused");
            self.playback = Some((update.app_id.clone(), sample));
        } else {
            debug!(app = %update.app_id, "pause from inactive media session ignored");
        }
    }

    /// Patches the active media event and starts or cancels the pause timeout
    /// in the same step.
    fn set_media_playing(&mut self, is_playing: bool) {
        let was_playing =
            matches!(&self.island.active().payload, Payload::MediaPlayback(m) if m.is_playing);
        let Some(media) = self.island.update_media_play_state(is_playing) else {
            return;
        };

        if is_playing {
            if self.timers.cancel(TimerKey::MediaPause) {
                debug!(app = %media.app_id, "playback resumed, pause timeout cancelled");
            }
        } else {
            self.poller.stop();
            if was_playing || !self.timers.is_pending(TimerKey::MediaPause) {
                debug!(app = %media.app_id, "playback paused, starting pause timeout");
                self.arm_pause_timeout(&media);
            }
        }
    }

    fn arm_pause_timeout(&mut self, media: &MediaPlayback) {
        self.timers.replace(
            TimerKey::MediaPause,
            self.timeouts.media_pause(),
            Guard::PausedTrack {
                app_id: media.app_id.clone(),
                title: media.title.clone(),
            },
        );
    }

    fn on_battery(&mut self, report: Charging) {
        let was_charging = std::mem::replace(&mut self.charging, report.is_charging);
        match (was_charging, report.is_charging) {
            (false, true) => {
                info!(level = report.level, fast = report.is_fast_charging, "charger connected");
                self.push(Payload::Charging(Charging {
                    level: report.level.min(100),
                    ..report
                }));
            }
            (true, false) => {
                info!(level = report.level, "charger disconnected");
                self.timers.cancel(TimerKey::ChargingCollapse);
                self.timers.cancel(TimerKey::ChargingDismiss);
                self.island.discard_queued(EventKind::Charging);
                if matches!(self.island.active().payload, Payload::Charging(_)) {
                    self.island.dismiss_current_event();
                }
            }
            (true, true) => {
                self.island
                    .update_charging(report.level, report.is_fast_charging);
            }
            (false, false) => {}
        }
    }

    // ── user intents ──────────────────────────────────────────────────────────

    fn on_tap(&mut self) {
        match self.island.state().display_state {
            DisplayState::Collapsed | DisplayState::Compact => self.island.expand_island(),
            DisplayState::Expanded => match &self.island.active().payload {
                Payload::Notification(n) => {
                    let app_id = n.app_id.clone();
                    self.transport.open_app(&app_id);
                    self.island.dismiss_current_event();
                }
                _ => self.island.collapse_island(),
            },
        }
    }

    // ── timers ────────────────────────────────────────────────────────────────

    fn on_timer(&mut self, key: TimerKey, generation: u64) {
        let Some(guard) = self.timers.take_fired(key, generation) else {
            debug!(?key, "superseded timer fire ignored");
            return;
        };
        if !guard.holds(self.island.active()) {
            debug!(?key, "stale timer fire ignored");
            return;
        }

        debug!(?key, "timer fired");
        match key {
            TimerKey::NotificationCollapse => {
                self.island.collapse_island();
                self.timers.replace(
                    TimerKey::NotificationDismiss,
                    self.timeouts.notification_dismiss(),
                    guard,
                );
            }
            TimerKey::ChargingCollapse => {
                self.island.collapse_island();
                self.timers.replace(
                    TimerKey::ChargingDismiss,
                    self.timeouts.charging_dismiss(),
                    guard,
                );
            }
            TimerKey::NotificationDismiss
            | TimerKey::MediaPause
            | TimerKey::ChargingDismiss
            | TimerKey::BluetoothDismiss
            | TimerKey::RingerDismiss => self.island.dismiss_current_event(),
        }
    }

    /// Starts the policy timers for an event that just became active.
    fn arm(&mut self, event: &IslandEvent) {
        let key = event.key();
        match &event.payload {
            Payload::Idle => {}
            Payload::Notification(_) => self.timers.replace(
                TimerKey::NotificationCollapse,
                self.timeouts.notification_collapse(),
                Guard::Same(key),
            ),
            Payload::MediaPlayback(m) => {
                if !m.is_playing {
                    self.arm_pause_timeout(m);
                }
            }
            Payload::Charging(c) => {
                if c.is_charging {
                    self.island.expand_island();
                    self.timers.replace(
                        TimerKey::ChargingCollapse,
                        self.timeouts.charging_collapse(),
                        Guard::StillCharging(key),
                    );
                }
            }
            Payload::BluetoothConnection(_) => self.timers.replace(
                TimerKey::BluetoothDismiss,
                self.timeouts.bluetooth_dismiss(),
                Guard::Same(key),
            ),
            Payload::RingerMode(_) => self.timers.replace(
                TimerKey::RingerDismiss,
                self.timeouts.ringer_dismiss(),
                Guard::Same(key),
            ),
        }
    }

    /// Runs after every command: arms policies for a newly active event and
    /// keeps the position ticker running exactly while media is playing.
    fn reconcile(&mut self) {
        let active = self.island.active().clone();
        if active.is_idle() {
            self.armed = None;
        } else if self.armed != Some(active.key()) {
            self.armed = Some(active.key());
            debug!(kind = ?active.kind(), "event became active");
            self.arm(&active);
        }

        let playing = matches!(&active.payload, Payload::MediaPlayback(m) if m.is_playing);
        if playing && !self.poller.is_running() {
            self.poller.start();
        } else if !playing && self.poller.is_running() {
            self.poller.stop();
        }
    }

    fn on_position_tick(&mut self) {
        let (displayed, duration, app_id) = match &self.island.active().payload {
            Payload::MediaPlayback(m) if m.is_playing => {
                (m.position_ms, m.duration_ms, m.app_id.clone())
            }
            _ => {
                self.poller.stop();
                return;
            }
        };
        let sample = match &self.playback {
            Some((app, sample)) if *app == app_id => *sample,
            _ => PlaybackSample::unknown(displayed),
        };
        let position =
            media::extrapolate_position(&sample, displayed, duration, self.clock.now_ms());
        self.island.update_media_position(position);
    }

    // ── config ────────────────────────────────────────────────────────────────

    fn apply_config(&mut self, config: Config) {
        self.island.update_config(config.island.sanitized());
        self.island.set_overlay_enabled(config.settings.overlay_enabled);
        self.timeouts = config.timeouts;
        self.settings = config.settings;
        self.update_visibility();
    }

    fn update_visibility(&mut self) {
        let hidden = self.settings.hide_in_landscape && self.landscape;
        self.island.set_visible(!hidden);
    }
}

use serde::{Deserialize, Serialize};

pub const IDLE_PRIORITY: u8 = 0;
pub const NOTIFICATION_PRIORITY: u8 = 5;
pub const BLUETOOTH_PRIORITY: u8 = 6;
pub const CHARGING_PRIORITY: u8 = 7;
pub const MEDIA_PRIORITY: u8 = 8;
pub const RINGER_PRIORITY: u8 = 9;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Something the island can show. Every variant shares the `priority` /
/// `timestamp` envelope; the variant data lives in [`Payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandEvent {
    pub priority: u8,
    /// Wall-clock milliseconds. Together with the kind this is the event's identity.
    pub timestamp: i64,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Nothing to show; the island rests as a collapsed pill.
    Idle,
    Notification(Notification),
    MediaPlayback(MediaPlayback),
    Charging(Charging),
    BluetoothConnection(BluetoothConnection),
    RingerMode(RingerMode),
}

/// Discriminant of [`Payload`], used for dedup keys and timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Idle,
    Notification,
    MediaPlayback,
    Charging,
    BluetoothConnection,
    RingerMode,
}

/// Identity of an event: two events with the same key are the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Package / application id of the posting app.
    pub app_id: String,
    pub app_name: String,
    pub title: String,
    pub text: String,
    /// Opaque handle to the app icon, resolved by the renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPlayback {
    pub app_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art: Option<String>,
    pub is_playing: bool,
    /// Track length in milliseconds; 0 when unknown.
    #[serde(default)]
    pub duration_ms: i64,
    /// Displayed playback position in milliseconds.
    #[serde(default)]
    pub position_ms: i64,
}

impl MediaPlayback {
    /// True when this is track `title` played by `app_id`.
    pub fn same_track(&self, app_id: &str, title: &str) -> bool {
        self.app_id == app_id && self.title == title
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charging {
    /// Battery percentage, 0–100.
    pub level: u8,
    pub is_charging: bool,
    #[serde(default)]
    pub is_fast_charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BluetoothDeviceType {
    Headphones,
    Earbuds,
    Speaker,
    Watch,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothConnection {
    pub device_name: String,
    pub device_type: BluetoothDeviceType,
    pub is_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundMode {
    Normal,
    Vibrate,
    Silent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingerMode {
    pub mode: SoundMode,
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::Idle => EventKind::Idle,
            Payload::Notification(_) => EventKind::Notification,
            Payload::MediaPlayback(_) => EventKind::MediaPlayback,
            Payload::Charging(_) => EventKind::Charging,
            Payload::BluetoothConnection(_) => EventKind::BluetoothConnection,
            Payload::RingerMode(_) => EventKind::RingerMode,
        }
    }

    pub fn default_priority(&self) -> u8 {
        match self {
            Payload::Idle => IDLE_PRIORITY,
            Payload::Notification(_) => NOTIFICATION_PRIORITY,
            Payload::MediaPlayback(_) => MEDIA_PRIORITY,
            Payload::Charging(_) => CHARGING_PRIORITY,
            Payload::BluetoothConnection(_) => BLUETOOTH_PRIORITY,
            Payload::RingerMode(_) => RINGER_PRIORITY,
        }
    }
}

impl IslandEvent {
    /// The "nothing to show" sentinel: priority 0, timestamp 0.
    pub fn idle() -> Self {
        Self {
            priority: IDLE_PRIORITY,
            timestamp: 0,
            payload: Payload::Idle,
        }
    }

    /// Wraps `payload` with its default priority and an explicit timestamp.
    pub fn at(payload: Payload, timestamp: i64) -> Self {
        if matches!(payload, Payload::Idle) {
            return Self::idle();
        }
        Self {
            priority: payload.default_priority(),
            timestamp,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            kind: self.kind(),
            timestamp: self.timestamp,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.payload, Payload::Idle)
    }

    /// App id the event originated from, for notifications and media.
    pub fn source_app(&self) -> Option<&str> {
        match &self.payload {
            Payload::Notification(n) => Some(&n.app_id),
            Payload::MediaPlayback(m) => Some(&m.app_id),
            _ => None,
        }
    }
}

impl Default for IslandEvent {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn notification(app_id: &str, title: &str) -> Notification {
        Notification {
            app_id: app_id.to_string(),
            app_name: app_id.to_string(),
            title: title.to_string(),
            text: format!("{title} body"),
            icon: None,
            large_icon: None,
        }
    }

    pub fn media(app_id: &str, title: &str, is_playing: bool) -> MediaPlayback {
        MediaPlayback {
            app_id: app_id.to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            art: None,
            is_playing,
            duration_ms: 200_000,
            position_ms: 10_000,
        }
    }

    pub fn charging(level: u8, is_charging: bool) -> Charging {
        Charging {
            level,
            is_charging,
            is_fast_charging: false,
        }
    }

    pub fn bluetooth(name: &str, is_connected: bool) -> BluetoothConnection {
        BluetoothConnection {
            device_name: name.to_string(),
            device_type: BluetoothDeviceType::Earbuds,
            is_connected,
            battery_level: Some(80),
        }
    }

    pub fn ringer(mode: SoundMode) -> RingerMode {
        RingerMode { mode }
    }
}

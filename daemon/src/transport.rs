use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::warn;

/// Transport control requested from the island's media card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    PlayPause,
    Next,
    Previous,
}

/// Platform side of media control and app launching. The engine only routes
/// requests here; it holds no transport logic of its own.
pub trait MediaTransport: Send + 'static {
    /// `app_id` is the active media event's app, or `None` to let the
    /// platform pick any active session.
    fn media_action(&mut self, app_id: Option<&str>, action: MediaAction);

    fn open_app(&mut self, app_id: &str);
}

/// Outbound request as written on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    MediaAction {
        #[serde(skip_serializing_if = "Option::is_none")]
        app_id: Option<String>,
        action: MediaAction,
    },
    OpenApp {
        app_id: String,
    },
}

/// Writes each request as one JSON line to `W` (stdout in the daemon).
pub struct JsonLinesTransport<W: Write + Send + 'static> {
    out: W,
}

impl<W: Write + Send + 'static> JsonLinesTransport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, message: &Outbound) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to encode outbound request: {e}");
                return;
            }
        };
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            warn!("failed to write outbound request: {e}");
        }
    }
}

impl<W: Write + Send + 'static> MediaTransport for JsonLinesTransport<W> {
    fn media_action(&mut self, app_id: Option<&str>, action: MediaAction) {
        self.emit(&Outbound::MediaAction {
            app_id: app_id.map(str::to_string),
            action,
        });
    }

    fn open_app(&mut self, app_id: &str) {
        self.emit(&Outbound::OpenApp {
            app_id: app_id.to_string(),
        });
    }
}

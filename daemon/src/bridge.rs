/// Inbound platform bridge.
///
/// The platform host (notification listener, media-session observer, system
/// broadcast receivers, overlay touch handlers) writes one JSON object per line
/// to the daemon's stdin, tagged by `"type"`. Each line becomes one call on the
/// engine [`Handle`]. Malformed lines are logged and skipped.
use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::engine::{Handle, MediaUpdate};
use crate::event::{BluetoothConnection, Charging, Notification, RingerMode};
use crate::transport::MediaAction;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Notification(Notification),
    Media(MediaUpdate),
    Battery(Charging),
    Bluetooth(BluetoothConnection),
    Ringer(RingerMode),
    Tap,
    LongPress,
    Dismiss,
    OutsideTouch,
    Compact,
    MediaAction { action: MediaAction },
    Orientation { landscape: bool },
    Clear,
}

impl BridgeMessage {
    /// Hands the message to the engine.
    pub async fn forward(self, handle: &Handle) -> Result<()> {
        match self {
            BridgeMessage::Notification(n) => handle.notify_incoming(n).await,
            BridgeMessage::Media(update) => handle.media_state_changed(update).await,
            BridgeMessage::Battery(report) => {
                handle
                    .battery_changed(report.level, report.is_charging, report.is_fast_charging)
                    .await
            }
            BridgeMessage::Bluetooth(connection) => handle.bluetooth_changed(connection).await,
            BridgeMessage::Ringer(ringer) => handle.ringer_changed(ringer.mode).await,
            BridgeMessage::Tap => handle.tap().await,
            BridgeMessage::LongPress => handle.long_press().await,
            BridgeMessage::Dismiss => handle.dismiss_requested().await,
            BridgeMessage::OutsideTouch => handle.outside_touch().await,
            BridgeMessage::Compact => handle.compact().await,
            BridgeMessage::MediaAction { action } => handle.media_action(action).await,
            BridgeMessage::Orientation { landscape } => handle.orientation_changed(landscape).await,
            BridgeMessage::Clear => handle.clear_all().await,
        }
    }
}

/// Parses one bridge line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<BridgeMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let message = serde_json::from_str(line).context("invalid bridge message")?;
    Ok(Some(message))
}

/// Forwards every message read from `reader` to the engine until EOF.
/// Returns an error if reading fails or the engine has stopped.
pub async fn run<R>(reader: R, handle: Handle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read from bridge")?
    {
        match parse_line(&line) {
            Ok(Some(message)) => {
                debug!(?message, "bridge message");
                message.forward(&handle).await?;
            }
            Ok(None) => {}
            Err(e) => warn!("skipping bridge line: {e:#}"),
        }
    }
    info!("bridge input closed");
    Ok(())
}

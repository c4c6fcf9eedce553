use serde::{Deserialize, Serialize};

use crate::event::IslandEvent;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;

/// How much room the island takes on screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    /// The minimal pill.
    #[default]
    Collapsed,
    /// Slightly wider, glanceable status.
    Compact,
    /// Full card with content and controls.
    Expanded,
}

/// Position and geometry of the overlay. Read from `[island]` in config.toml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IslandConfig {
    pub offset_x: f32,
    pub offset_y: f32,
    /// Uniform scale applied to every size below. Clamped to [0.5, 2.0].
    pub scale: f32,
    pub collapsed_width: f32,
    pub collapsed_height: f32,
    pub compact_width: f32,
    pub compact_height: f32,
    pub expanded_width: f32,
    pub expanded_height: f32,
    pub corner_radius: f32,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
            collapsed_width: 120.0,
            collapsed_height: 36.0,
            compact_width: 240.0,
            compact_height: 56.0,
            expanded_width: 380.0,
            expanded_height: 220.0,
            corner_radius: 24.0,
        }
    }
}

impl IslandConfig {
    /// Returns a copy with out-of-range values pulled back into range.
    pub fn sanitized(&self) -> Self {
        let scale = if self.scale.is_finite() {
            self.scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        };
        Self {
            scale,
            corner_radius: self.corner_radius.max(0.0),
            ..self.clone()
        }
    }
}

/// Everything the renderer needs to draw the island. Published on every change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiState {
    pub display_state: DisplayState,
    pub is_service_running: bool,
    pub is_overlay_enabled: bool,
    /// False while the overlay is hidden for landscape; layered on top of
    /// `display_state`, which is left untouched.
    pub is_visible: bool,
    pub active_event: IslandEvent,
    pub config: IslandConfig,
}

impl UiState {
    /// Constructs the initial idle state on startup.
    pub fn new() -> Self {
        Self {
            display_state: DisplayState::Collapsed,
            is_service_running: false,
            is_overlay_enabled: true,
            is_visible: true,
            active_event: IslandEvent::idle(),
            config: IslandConfig::default(),
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};

use crate::error::InventoryResult;
use crate::geometry::GridGeometry;

// --- Defaults ---
pub const DEFAULT_DRAG_MOVE_THRESHOLD: f32 = 3.0;
pub const DEFAULT_HOLD_STILL_SECS: f32 = 0.8;
pub const DEFAULT_HOLD_STILL_AFTER_MOVE_SECS: f32 = 0.2;
pub const DEFAULT_CONTAINER_OPEN_SECS: f32 = 0.2;
pub const DEFAULT_CONTAINER_CLOSE_SECS: f32 = 0.15;
pub const DEFAULT_BUMP_SECS: f32 = 0.15;

/// Shape and rules of one grid.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_true")]
    pub can_hold_containers: bool,
}

fn default_true() -> bool {
    true
}

impl GridConfig {
    pub fn new(width: u32, height: u32) -> Self {
        GridConfig { width, height, can_hold_containers: true }
    }

    pub fn without_containers(mut self) -> Self {
        self.can_hold_containers = false;
        self
    }

    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.width, self.height)
    }
}

/// Engine-wide tuning. Every field has a default, so `{}` is a valid config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Pointer travel (in host units) per tick that counts as moving the held item.
    pub drag_move_threshold: f32,
    /// Seconds the held item must stay still before a hold action fires.
    pub hold_still_secs: f32,
    /// Same as `hold_still_secs`, once the item has moved inside the current grid.
    pub hold_still_after_move_secs: f32,
    /// Touch mode: hold actions open and close containers.
    pub touch_controls: bool,
    pub container_open_secs: f32,
    pub container_close_secs: f32,
    /// Pulse on a container that received items while closed.
    pub bump_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            drag_move_threshold: DEFAULT_DRAG_MOVE_THRESHOLD,
            hold_still_secs: DEFAULT_HOLD_STILL_SECS,
            hold_still_after_move_secs: DEFAULT_HOLD_STILL_AFTER_MOVE_SECS,
            touch_controls: false,
            container_open_secs: DEFAULT_CONTAINER_OPEN_SECS,
            container_close_secs: DEFAULT_CONTAINER_CLOSE_SECS,
            bump_secs: DEFAULT_BUMP_SECS,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> InventoryResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        log::debug!("[Config] Loaded engine config: {:?}", config);
        Ok(config)
    }

    pub fn hold_threshold(&self, has_moved: bool) -> f32 {
        if has_moved {
            self.hold_still_after_move_secs
        } else {
            self.hold_still_secs
        }
    }
}

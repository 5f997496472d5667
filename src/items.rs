/******************************************************************************
 *                                                                            *
 * Item definitions (immutable templates owned by configuration), the         *
 * resolver used to look them up by config ID, and the small stack helpers    *
 * shared by drops, resets and auto-drops.                                    *
 *                                                                            *
 ******************************************************************************/

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::error::InventoryResult;
use crate::models::EquipSlot;

// --- Item Definition ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemDefinition {
    #[serde(rename = "configID")]
    pub config_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Footprint `(width, height)` in cells for the default orientation.
    pub dimensions: (u32, u32),
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
    #[serde(default)]
    pub can_rotate: bool,
    #[serde(default)]
    pub equip_slot: EquipSlot,
    /// Present only for containers: the grid this item opens.
    #[serde(default)]
    pub container_grid: Option<GridConfig>,
}

fn default_stack_size() -> u32 {
    1
}

impl ItemDefinition {
    pub fn new(config_id: impl Into<String>, dimensions: (u32, u32), stack_size: u32) -> Self {
        let config_id = config_id.into();
        ItemDefinition {
            display_name: config_id.clone(),
            config_id,
            dimensions,
            stack_size: stack_size.max(1),
            can_rotate: false,
            equip_slot: EquipSlot::None,
            container_grid: None,
        }
    }

    pub fn rotatable(mut self) -> Self {
        self.can_rotate = true;
        self
    }

    pub fn with_equip_slot(mut self, slot: EquipSlot) -> Self {
        self.equip_slot = slot;
        self
    }

    /// Turns this definition into a container opening `grid`. Containers never stack.
    pub fn container(mut self, grid: GridConfig) -> Self {
        self.container_grid = Some(grid);
        self.stack_size = 1;
        self
    }

    pub fn is_container(&self) -> bool {
        self.container_grid.is_some()
    }

    pub fn is_stackable(&self) -> bool {
        self.stack_size > 1
    }
}

// --- Resolver ---

/// Looks up full item metadata from a bare config ID.
pub trait ItemResolver {
    fn lookup(&self, config_id: &str) -> Option<Arc<ItemDefinition>>;
}

/// In-memory catalog of definitions keyed by config ID.
#[derive(Debug, Default, Clone)]
pub struct ItemCatalog {
    definitions: HashMap<String, Arc<ItemDefinition>>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ItemDefinition>) -> Self {
        let mut catalog = ItemCatalog::new();
        for def in definitions {
            catalog.insert(def);
        }
        catalog
    }

    pub fn from_json_str(json: &str) -> InventoryResult<Self> {
        let definitions: Vec<ItemDefinition> = serde_json::from_str(json)?;
        let catalog = ItemCatalog::from_definitions(definitions);
        log::info!("[Catalog] Loaded {} item definitions.", catalog.len());
        Ok(catalog)
    }

    pub fn insert(&mut self, mut def: ItemDefinition) -> Arc<ItemDefinition> {
        if def.stack_size == 0 {
            log::warn!("[Catalog] Definition '{}' declared stack size 0; using 1.", def.config_id);
            def.stack_size = 1;
        }
        if def.is_container() && def.stack_size != 1 {
            log::warn!("[Catalog] Container '{}' declared stack size {}; containers never stack.", def.config_id, def.stack_size);
            def.stack_size = 1;
        }
        let def = Arc::new(def);
        if self.definitions.insert(def.config_id.clone(), def.clone()).is_some() {
            log::debug!("[Catalog] Replaced definition '{}'.", def.config_id);
        }
        def
    }

    pub fn get(&self, config_id: &str) -> Option<Arc<ItemDefinition>> {
        self.definitions.get(config_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl ItemResolver for ItemCatalog {
    fn lookup(&self, config_id: &str) -> Option<Arc<ItemDefinition>> {
        self.get(config_id)
    }
}

// --- Instance IDs ---

/// Hands out persistent instance IDs for stacks split off existing ones.
#[derive(Debug, Default)]
pub struct InstanceIdGenerator;

impl InstanceIdGenerator {
    pub fn next_id(&mut self) -> String {
        let mut rng = rand::thread_rng();
        format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>())
    }
}

// --- Stack helpers ---

/// Result of merging a moving stack onto a resting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeResult {
    pub transferred: u32,
    pub source_remaining: u32,
    pub target_count: u32,
}

impl MergeResult {
    pub fn source_consumed(&self) -> bool {
        self.source_remaining == 0
    }
}

/// Works out how `amount` units from a stack of `source_count` land on a target
/// stack of `target_count`, capped at the definition's stack size.
pub fn calculate_merge_result(
    def: &ItemDefinition,
    source_count: u32,
    target_count: u32,
    amount: u32,
) -> Result<MergeResult, String> {
    if !def.is_stackable() {
        return Err(format!("Item '{}' does not stack", def.config_id));
    }
    let space_available = def.stack_size.saturating_sub(target_count);
    if space_available == 0 {
        return Err("Target stack is full".to_string());
    }
    let transferred = amount.min(source_count).min(space_available);
    Ok(MergeResult {
        transferred,
        source_remaining: source_count - transferred,
        target_count: target_count + transferred,
    })
}

/*
 * src/collection.rs
 *
 * Purpose: Flattens a tree of occupants (containers holding occupants,
 * to any depth) into the flat record list used for persistence, and
 * rebuilds the tree from such a list.
 *
 * Subgrid 0 is always the root. A container with contents gets a fresh
 * child subgrid index, which its contents carry as their parent index.
 */

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::distributor::{overlapping, PlacementScratch};
use crate::error::{InventoryError, InventoryResult};
use crate::items::{InstanceIdGenerator, ItemDefinition, ItemResolver};
use crate::models::{AutoAddResult, GridPosition};
use crate::occupant::{GridOccupant, Occupant, OccupantIds};

/// One occupant as persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlatOccupantRecord {
    #[serde(rename = "itemConfigID")]
    pub item_config_id: String,
    #[serde(rename = "itemInstanceID")]
    pub item_instance_id: String,
    pub grid_position: GridPosition,
    pub parent_subgrid_index: u32,
    pub child_subgrid_index: u32,
}

/// A whole occupant tree as a flat list. Serializes as a bare JSON array.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ItemCollection {
    pub occupants: Vec<FlatOccupantRecord>,
}

impl ItemCollection {
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn to_json(&self) -> InventoryResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> InventoryResult<Self> {
        serde_json::from_str(json).map_err(|e| InventoryError::MalformedCollectionData {
            instance_id: String::new(),
            reason: e.to_string(),
        })
    }
}

// --- Compile ---

/// Depth-first flattening. Containers with contents take child indices from a
/// running counter, so indices are unique across siblings and depth. Only
/// dormant contents are visible here; spawned grids must be snapshotted first.
pub fn compile(occupants: &[Occupant]) -> ItemCollection {
    let mut records = Vec::new();
    let mut next_index = 1;
    compile_level(occupants, 0, &mut next_index, &mut records);
    log::debug!("[Compiler] Compiled {} records across {} subgrid(s).", records.len(), next_index);
    ItemCollection { occupants: records }
}

fn compile_level(occupants: &[Occupant], parent: u32, next_index: &mut u32, records: &mut Vec<FlatOccupantRecord>) {
    for occupant in occupants {
        let subs = occupant.sub_occupants();
        let child = if occupant.is_container() && !subs.is_empty() {
            let index = *next_index;
            *next_index += 1;
            index
        } else {
            0
        };
        records.push(FlatOccupantRecord {
            item_config_id: occupant.definition.config_id.clone(),
            item_instance_id: occupant.instance_id.clone(),
            grid_position: occupant.position(),
            parent_subgrid_index: parent,
            child_subgrid_index: child,
        });
        if child != 0 {
            compile_level(subs, child, next_index, records);
        }
    }
}

/// Compiles a fresh root-level collection for `batch` laid out in an empty grid
/// shaped like `config`. Returns `None` unless every unit fits.
pub fn compile_distribution(
    batch: &[(Arc<ItemDefinition>, u32)],
    config: &GridConfig,
    instance_ids: &mut InstanceIdGenerator,
) -> Option<ItemCollection> {
    let empty: Vec<Occupant> = Vec::new();
    let plan = PlacementScratch::new().plan(batch, config, &empty, None);
    if plan.result() != AutoAddResult::FullyFits {
        log::warn!("[Compiler] Batch does not fit a {}x{} grid ({} unit(s) left over).", config.width, config.height, plan.unplaced_units);
        return None;
    }
    let occupants = plan
        .stacks
        .iter()
        .map(|stack| FlatOccupantRecord {
            item_config_id: stack.definition.config_id.clone(),
            item_instance_id: instance_ids.next_id(),
            grid_position: GridPosition::new(stack.coords, stack.orientation, stack.count),
            parent_subgrid_index: 0,
            child_subgrid_index: 0,
        })
        .collect();
    Some(ItemCollection { occupants })
}

// --- Decompile ---

/// Rebuilt tree plus every record that had to be skipped or repaired.
#[derive(Debug, Default)]
pub struct Decompiled {
    pub occupants: Vec<Occupant>,
    pub issues: Vec<InventoryError>,
}

struct Decompiler<'a, R: ?Sized> {
    groups: BTreeMap<u32, Vec<&'a FlatOccupantRecord>>,
    consumed: HashSet<u32>,
    resolver: &'a R,
    ids: &'a mut OccupantIds,
    issues: Vec<InventoryError>,
}

impl<'a, R: ItemResolver + ?Sized> Decompiler<'a, R> {
    fn reject(&mut self, record: &FlatOccupantRecord, reason: String) {
        log::warn!("[Compiler] Skipping record '{}' ({}): {}", record.item_instance_id, record.item_config_id, reason);
        self.issues.push(InventoryError::MalformedCollectionData {
            instance_id: record.item_instance_id.clone(),
            reason,
        });
    }

    fn build_level(&mut self, index: u32, config: &GridConfig) -> Vec<Occupant> {
        let records = match self.groups.get(&index) {
            Some(records) => records.clone(),
            None => return Vec::new(),
        };
        let geometry = config.geometry();
        let mut level: Vec<Occupant> = Vec::with_capacity(records.len());

        for record in records {
            let def = match self.resolver.lookup(&record.item_config_id) {
                Some(def) => def,
                None => {
                    self.reject(record, format!("unknown item config '{}'", record.item_config_id));
                    continue;
                }
            };
            let pos = record.grid_position;
            if pos.stack_count == 0 || pos.stack_count > def.stack_size {
                self.reject(record, format!("stack count {} outside 1..={}", pos.stack_count, def.stack_size));
                continue;
            }
            if !geometry.fits(pos.coords, def.dimensions, pos.orientation) {
                self.reject(record, format!("footprint at {:?} leaves subgrid {}", pos.coords, index));
                continue;
            }
            if def.is_container() && !config.can_hold_containers {
                self.reject(record, format!("subgrid {} cannot hold containers", index));
                continue;
            }
            let occupant = Occupant::new(self.ids.next_id(), record.item_instance_id.clone(), def.clone(), pos, config.width);
            if !overlapping(&level, None, occupant.occupying_indices()).is_empty() {
                self.reject(record, format!("overlaps another occupant of subgrid {}", index));
                continue;
            }

            let child = record.child_subgrid_index;
            let occupant = match (&def.container_grid, child) {
                (_, 0) => occupant,
                (None, _) => {
                    self.reject_link(record, "not a container");
                    occupant
                }
                (Some(_), _) if child == index || self.consumed.contains(&child) => {
                    self.reject_link(record, "child subgrid already in use");
                    occupant
                }
                (Some(_), _) if !self.groups.contains_key(&child) => {
                    self.reject_link(record, "child subgrid has no records");
                    occupant
                }
                (Some(grid), _) => {
                    self.consumed.insert(child);
                    let grid = grid.clone();
                    let subs = self.build_level(child, &grid);
                    occupant.with_sub_occupants(subs)
                }
            };
            level.push(occupant);
        }
        level
    }

    // The record itself is kept; only its child link is dropped.
    fn reject_link(&mut self, record: &FlatOccupantRecord, why: &str) {
        log::warn!(
            "[Compiler] Record '{}' child subgrid {} ignored: {}",
            record.item_instance_id,
            record.child_subgrid_index,
            why
        );
        self.issues.push(InventoryError::MalformedCollectionData {
            instance_id: record.item_instance_id.clone(),
            reason: format!("child subgrid {}: {}", record.child_subgrid_index, why),
        });
    }
}

/// Rebuilds the occupant tree. Bad records are skipped and reported, never
/// aborting the load. Nested grids are sized from each container's definition.
pub fn decompile<R: ItemResolver + ?Sized>(
    collection: &ItemCollection,
    resolver: &R,
    root: &GridConfig,
    ids: &mut OccupantIds,
) -> Decompiled {
    let mut groups: BTreeMap<u32, Vec<&FlatOccupantRecord>> = BTreeMap::new();
    for record in &collection.occupants {
        groups.entry(record.parent_subgrid_index).or_default().push(record);
    }

    let mut decompiler = Decompiler {
        groups,
        consumed: HashSet::from([0]),
        resolver,
        ids,
        issues: Vec::new(),
    };
    let occupants = decompiler.build_level(0, root);

    let orphans: Vec<&FlatOccupantRecord> = decompiler
        .groups
        .iter()
        .filter(|(index, _)| !decompiler.consumed.contains(*index))
        .flat_map(|(_, records)| records.iter().copied())
        .collect();
    for record in orphans {
        decompiler.reject(record, format!("subgrid {} is not attached to any container", record.parent_subgrid_index));
    }

    log::info!(
        "[Compiler] Decompiled {} root occupant(s) from {} record(s), {} issue(s).",
        occupants.len(),
        collection.len(),
        decompiler.issues.len()
    );
    Decompiled { occupants, issues: decompiler.issues }
}

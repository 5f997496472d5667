//! Grid-based inventory engine: item placement on 2D cell grids, stack
//! distribution, nested containers, drag and drop between grids, and a flat
//! persisted form of whole occupant trees.
//!
//! All mutation happens on the caller's thread through [`Inventory`]; the
//! host feeds pointer samples and input intents each tick and drains
//! [`InventoryEvent`]s for its view layer.

mod animation;
mod collection;
mod config;
mod containers;
mod distributor;
mod drag;
mod error;
mod events;
mod geometry;
mod grid;
mod input;
mod inventory;
mod inventory_management; // grab / drop / reset / transfer
mod items;
mod models;
mod occupant;

pub use animation::{Transition, TransitionKind};
pub use collection::{compile, compile_distribution, decompile, Decompiled, FlatOccupantRecord, ItemCollection};
pub use config::{EngineConfig, GridConfig};
pub use distributor::{
    classify_placement, distribute, find_placement, overlapping, AutoAddPlan, Distribution, Placement, PlacementScratch,
    PlannedStack, StackTopOff,
};
pub use drag::{DragSource, DragTransaction};
pub use error::{InventoryError, InventoryResult};
pub use events::{EventQueue, InventoryEvent};
pub use geometry::GridGeometry;
pub use grid::{ContainerLink, GridDragState, GridId, GridInstance};
pub use input::{InputIntent, PointerSample};
pub use inventory::Inventory;
pub use inventory_management::{DropOutcome, ResetOutcome};
pub use items::{calculate_merge_result, InstanceIdGenerator, ItemCatalog, ItemDefinition, ItemResolver, MergeResult};
pub use models::{AutoAddResult, CellHighlight, Coords, EquipSlot, GridPosition, Orientation, PlacementResult};
pub use occupant::{occupying_indices, ContainerContents, GridOccupant, Occupant, OccupantId, OccupantIds, OccupantState};

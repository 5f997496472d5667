/******************************************************************************
 *                                                                            *
 * Occupants: anything covering cells of a grid. Live items and data-only     *
 * staged items share one struct; containers carry their contents as an      *
 * optional payload. The `GridOccupant` trait is the capability set the       *
 * placement engine works against, so trial stubs can reuse the same logic.   *
 *                                                                            *
 ******************************************************************************/

use std::fmt;
use std::sync::Arc;

use crate::geometry::GridGeometry;
use crate::grid::GridId;
use crate::items::ItemDefinition;
use crate::models::{Coords, GridPosition, Orientation};

// --- Handles ---

/// Engine-assigned runtime handle of an occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OccupantId(pub u64);

impl OccupantId {
    /// Reserved for trial placements that never reach a real grid.
    pub const SCRATCH: OccupantId = OccupantId(0);
}

impl fmt::Display for OccupantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out occupant handles. Starts at 1, `SCRATCH` is never issued.
#[derive(Debug)]
pub struct OccupantIds {
    next: u64,
}

impl Default for OccupantIds {
    fn default() -> Self {
        OccupantIds { next: 1 }
    }
}

impl OccupantIds {
    pub fn next_id(&mut self) -> OccupantId {
        let id = OccupantId(self.next);
        self.next += 1;
        id
    }
}

// --- Footprint ---

/// Flattened indices covered by `dimensions` anchored at `coords`, for a grid
/// `grid_width` cells wide. Right/Left swap the axes. Bounds are the caller's job.
pub fn occupying_indices(coords: Coords, dimensions: (u32, u32), orientation: Orientation, grid_width: u32) -> Vec<usize> {
    GridGeometry::strided_footprint(grid_width, coords, dimensions, orientation)
}

// --- Capability set ---

pub trait GridOccupant {
    fn id(&self) -> OccupantId;
    fn definition(&self) -> &Arc<ItemDefinition>;
    fn grid_position(&self) -> GridPosition;
    fn occupying_indices(&self) -> &[usize];
    fn set_stack_count(&mut self, count: u32);

    fn stack_count(&self) -> u32 {
        self.grid_position().stack_count
    }

    fn has_stack_room(&self) -> bool {
        let def = self.definition();
        def.stack_size > 1 && self.stack_count() < def.stack_size
    }

    fn can_stack_with(&self, other: &ItemDefinition) -> bool {
        let def = self.definition();
        def.stack_size > 1 && other.config_id == def.config_id
    }

    fn covers(&self, index: usize) -> bool {
        self.occupying_indices().contains(&index)
    }

    /// Adds up to the remaining room and returns what did not fit.
    fn try_add_to_stack(&mut self, amount: u32) -> u32 {
        if !self.has_stack_room() {
            return amount;
        }
        let room = self.definition().stack_size - self.stack_count();
        let absorbed = amount.min(room);
        let count = self.stack_count() + absorbed;
        self.set_stack_count(count);
        amount - absorbed
    }
}

// --- Occupant ---

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OccupantState {
    /// Data only; waiting for its grid to open.
    Staged,
    /// Materialized in an open grid.
    Live,
}

/// Contents of a container occupant.
#[derive(Clone, Debug, PartialEq)]
pub enum ContainerContents {
    /// Nested grid not spawned yet; the container owns its sub-occupants directly.
    Dormant(Vec<Occupant>),
    /// Sub-occupants live in this registered grid.
    Spawned(GridId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Occupant {
    pub id: OccupantId,
    pub instance_id: String,
    pub definition: Arc<ItemDefinition>,
    position: GridPosition,
    indices: Vec<usize>,
    pub state: OccupantState,
    pub contents: Option<ContainerContents>,
}

impl Occupant {
    pub fn new(
        id: OccupantId,
        instance_id: impl Into<String>,
        definition: Arc<ItemDefinition>,
        position: GridPosition,
        grid_width: u32,
    ) -> Self {
        let contents = definition.is_container().then(|| ContainerContents::Dormant(Vec::new()));
        let indices = occupying_indices(position.coords, definition.dimensions, position.orientation, grid_width);
        Occupant {
            id,
            instance_id: instance_id.into(),
            definition,
            position,
            indices,
            state: OccupantState::Staged,
            contents,
        }
    }

    pub fn with_sub_occupants(mut self, sub_occupants: Vec<Occupant>) -> Self {
        if self.definition.is_container() {
            self.contents = Some(ContainerContents::Dormant(sub_occupants));
        }
        self
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn coords(&self) -> Coords {
        self.position.coords
    }

    pub fn orientation(&self) -> Orientation {
        self.position.orientation
    }

    /// Moves the occupant and recomputes its covered cells for a grid `grid_width` wide.
    pub fn set_position(&mut self, position: GridPosition, grid_width: u32) {
        self.position = position;
        self.indices = occupying_indices(position.coords, self.definition.dimensions, position.orientation, grid_width);
    }

    pub fn is_container(&self) -> bool {
        self.contents.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.state == OccupantState::Live
    }

    pub fn nested_grid(&self) -> Option<GridId> {
        match self.contents {
            Some(ContainerContents::Spawned(grid)) => Some(grid),
            _ => None,
        }
    }

    /// Sub-occupants held directly; empty for spawned or non-container occupants.
    pub fn sub_occupants(&self) -> &[Occupant] {
        match &self.contents {
            Some(ContainerContents::Dormant(subs)) => subs,
            _ => &[],
        }
    }
}

impl GridOccupant for Occupant {
    fn id(&self) -> OccupantId {
        self.id
    }

    fn definition(&self) -> &Arc<ItemDefinition> {
        &self.definition
    }

    fn grid_position(&self) -> GridPosition {
        self.position
    }

    fn occupying_indices(&self) -> &[usize] {
        &self.indices
    }

    fn set_stack_count(&mut self, count: u32) {
        self.position.stack_count = count;
    }
}

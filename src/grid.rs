/******************************************************************************
 *                                                                            *
 * A live grid: its occupants, per-cell highlight state, pointer/hover        *
 * tracking, the local drag state used while an item hovers over it, and the  *
 * open/close lifecycle flags. Nested container grids are ordinary grid       *
 * instances with a back-link to the container occupant that owns them.       *
 *                                                                            *
 ******************************************************************************/

use std::fmt;
use std::time::Duration;

use crate::animation::{Transition, TransitionKind};
use crate::config::GridConfig;
use crate::distributor::Placement;
use crate::geometry::GridGeometry;
use crate::models::{CellHighlight, Coords, Orientation, PlacementResult};
use crate::occupant::{GridOccupant, Occupant, OccupantId, OccupantState};

/// Engine-assigned handle of a registered grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(pub u32);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid {}", self.0)
    }
}

/// Non-owning back-reference from a nested grid to the container it belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContainerLink {
    /// Grid the container occupant rests in.
    pub grid: GridId,
    pub container: OccupantId,
}

/// Where the held item came from in this grid, and how it currently classifies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridDragState {
    pub original_coords: Coords,
    pub original_indices: Vec<usize>,
    pub original_orientation: Orientation,
    pub placement: Placement,
}

#[derive(Debug)]
pub struct GridInstance {
    pub id: GridId,
    pub config: GridConfig,
    pub parent: Option<ContainerLink>,
    geometry: GridGeometry,
    occupants: Vec<Occupant>,
    cells: Vec<CellHighlight>,
    pub(crate) drag_state: Option<GridDragState>,
    pub(crate) pointer_cell: Option<Coords>,
    pub(crate) hovered: Option<OccupantId>,
    /// Container occupant of this grid whose nested grid is currently open.
    pub(crate) open_container: Option<OccupantId>,
    pub(crate) is_open: bool,
    pub(crate) input_enabled: bool,
    pub(crate) pending_input_enable: bool,
    pub(crate) modified: bool,
    transition: Option<Transition>,
    bump: Option<(OccupantId, Transition)>,
}

impl GridInstance {
    pub fn new(id: GridId, config: GridConfig, parent: Option<ContainerLink>) -> Self {
        let geometry = config.geometry();
        GridInstance {
            id,
            config,
            parent,
            geometry,
            occupants: Vec::new(),
            cells: vec![CellHighlight::None; geometry.cell_count()],
            drag_state: None,
            pointer_cell: None,
            hovered: None,
            open_container: None,
            is_open: false,
            input_enabled: false,
            pending_input_enable: false,
            modified: false,
            transition: None,
            bump: None,
        }
    }

    // --- Queries ---

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_container_grid(&self) -> bool {
        self.parent.is_some()
    }

    pub fn pointer_cell(&self) -> Option<Coords> {
        self.pointer_cell
    }

    pub fn hovered(&self) -> Option<OccupantId> {
        self.hovered
    }

    pub fn open_container(&self) -> Option<OccupantId> {
        self.open_container
    }

    pub fn drag_state(&self) -> Option<&GridDragState> {
        self.drag_state.as_ref()
    }

    /// Last classification of the held item over this grid, if it is hovering here.
    pub fn placement_result(&self) -> Option<PlacementResult> {
        self.drag_state.as_ref().map(|s| s.placement.result)
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn occupant(&self, id: OccupantId) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.id == id)
    }

    pub(crate) fn occupant_mut(&mut self, id: OccupantId) -> Option<&mut Occupant> {
        self.occupants.iter_mut().find(|o| o.id == id)
    }

    pub fn staged_occupants(&self) -> impl Iterator<Item = &Occupant> {
        self.occupants.iter().filter(|o| o.state == OccupantState::Staged)
    }

    pub fn occupant_at(&self, coords: Coords) -> Option<&Occupant> {
        self.index_of(coords).and_then(|index| self.occupants.iter().find(|o| o.covers(index)))
    }

    pub fn index_of(&self, coords: Coords) -> Option<usize> {
        self.geometry.is_in_bounds(coords).then(|| self.geometry.flatten_index(coords.x, coords.y))
    }

    pub fn cells(&self) -> &[CellHighlight] {
        &self.cells
    }

    pub fn cell_highlight(&self, coords: Coords) -> Option<CellHighlight> {
        self.index_of(coords).map(|i| self.cells[i])
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Scale/alpha of the grid view: the running transition, or its resting value.
    pub fn visibility(&self) -> f32 {
        match &self.transition {
            Some(t) => t.value(),
            None if self.is_open => 1.0,
            None => 0.0,
        }
    }

    pub fn bump(&self) -> Option<(OccupantId, &Transition)> {
        self.bump.as_ref().map(|(id, t)| (*id, t))
    }

    // --- Membership ---

    pub(crate) fn insert(&mut self, occupant: Occupant) {
        self.occupants.push(occupant);
    }

    pub(crate) fn remove(&mut self, id: OccupantId) -> Option<Occupant> {
        let slot = self.occupants.iter().position(|o| o.id == id)?;
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        Some(self.occupants.remove(slot))
    }

    pub(crate) fn take_all(&mut self) -> Vec<Occupant> {
        self.hovered = None;
        std::mem::take(&mut self.occupants)
    }

    /// Flips every staged occupant to live. Returns the flipped handles.
    pub(crate) fn materialize_staged(&mut self) -> Vec<OccupantId> {
        self.occupants
            .iter_mut()
            .filter(|o| o.state == OccupantState::Staged)
            .map(|o| {
                o.state = OccupantState::Live;
                o.id
            })
            .collect()
    }

    pub(crate) fn stage_all(&mut self) {
        for occupant in &mut self.occupants {
            occupant.state = OccupantState::Staged;
        }
    }

    // --- Highlights ---

    pub(crate) fn clear_highlights(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = CellHighlight::None);
    }

    pub(crate) fn highlight(&mut self, indices: &[usize]) {
        self.clear_highlights();
        for &i in indices {
            if let Some(cell) = self.cells.get_mut(i) {
                *cell = CellHighlight::Hover;
            }
        }
    }

    // --- Animation ---

    /// Starts `kind`, snapping any running transition to its end first.
    pub(crate) fn start_transition(&mut self, kind: TransitionKind, secs: f32) {
        if let Some(previous) = self.transition.as_mut() {
            previous.snap();
        }
        self.transition = Some(Transition::from_secs(kind, secs));
    }

    pub(crate) fn start_bump(&mut self, container: OccupantId, secs: f32) {
        if let Some((_, previous)) = self.bump.as_mut() {
            previous.snap();
        }
        self.bump = Some((container, Transition::from_secs(TransitionKind::Bump, secs)));
    }

    pub(crate) fn advance(&mut self, dt: Duration) {
        if let Some(t) = self.transition.as_mut() {
            if t.tick(dt) {
                self.transition = None;
            }
        }
        if let Some((_, t)) = self.bump.as_mut() {
            if t.tick(dt) {
                self.bump = None;
            }
        }
        if self.pending_input_enable {
            self.pending_input_enable = false;
            self.input_enabled = self.is_open;
        }
    }
}

//! The single in-flight drag and the pointer ownership stack.
//!
//! # Invariants
//!
//! 1. At most one [`DragTransaction`] exists. [`DragSource::begin`] refuses to
//!    start a second one and leaves the first untouched.
//! 2. Pointer ownership is decided by explicit enter/exit notifications: the
//!    most recently entered grid that has not been exited owns the pointer.
//!    Nothing is recomputed from geometry, so two grids never own it at once.

use crate::error::{InventoryError, InventoryResult};
use crate::grid::GridId;
use crate::models::{Coords, Orientation};
use crate::occupant::OccupantId;

/// The occupant being moved. The occupant itself stays in `source`'s list
/// until it lands; every overlap query excludes it by id.
#[derive(Clone, Debug, PartialEq)]
pub struct DragTransaction {
    pub occupant: OccupantId,
    pub grabbed_stack_count: u32,
    pub source: GridId,
    pub current: GridId,
    /// Cell of the item under the pointer, relative to the item's origin.
    pub grab_offset: Coords,
    pub current_drag_position: (f32, f32),
    pub drag_hold_elapsed: f32,
    pub has_moved_in_current_container: bool,
    pub orientation: Orientation,
}

impl DragTransaction {
    pub fn new(occupant: OccupantId, count: u32, source: GridId, orientation: Orientation) -> Self {
        DragTransaction {
            occupant,
            grabbed_stack_count: count,
            source,
            current: source,
            grab_offset: Coords::default(),
            current_drag_position: (0.0, 0.0),
            drag_hold_elapsed: 0.0,
            has_moved_in_current_container: false,
            orientation,
        }
    }

    /// Origin cell of the held item when the pointer sits over `pointer_cell`.
    pub fn origin_for(&self, pointer_cell: Coords) -> Coords {
        pointer_cell.offset(-self.grab_offset.x, -self.grab_offset.y)
    }
}

#[derive(Debug, Default)]
pub struct DragSource {
    active: Option<DragTransaction>,
    pointer_stack: Vec<GridId>,
    last_pointer_position: (f32, f32),
}

impl DragSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn transaction(&self) -> Option<&DragTransaction> {
        self.active.as_ref()
    }

    pub(crate) fn require(&self) -> InventoryResult<&DragTransaction> {
        self.active.as_ref().ok_or(InventoryError::InvalidTransactionState("no active drag"))
    }

    pub(crate) fn require_mut(&mut self) -> InventoryResult<&mut DragTransaction> {
        self.active.as_mut().ok_or(InventoryError::InvalidTransactionState("no active drag"))
    }

    pub(crate) fn begin(&mut self, mut transaction: DragTransaction) -> InventoryResult<()> {
        if let Some(existing) = &self.active {
            log::error!(
                "[Drag] Refusing to grab {} while {} is still held.",
                transaction.occupant,
                existing.occupant
            );
            return Err(InventoryError::InvalidTransactionState("a drag is already active"));
        }
        transaction.current_drag_position = self.last_pointer_position;
        self.active = Some(transaction);
        Ok(())
    }

    pub(crate) fn end(&mut self) -> Option<DragTransaction> {
        self.active.take()
    }

    // --- Pointer ownership ---

    pub fn owner(&self) -> Option<GridId> {
        self.pointer_stack.last().copied()
    }

    pub fn last_pointer_position(&self) -> (f32, f32) {
        self.last_pointer_position
    }

    pub(crate) fn set_pointer_position(&mut self, position: (f32, f32)) {
        self.last_pointer_position = position;
    }

    /// Returns true if the owner changed.
    pub(crate) fn enter(&mut self, grid: GridId) -> bool {
        let before = self.owner();
        self.pointer_stack.retain(|g| *g != grid);
        self.pointer_stack.push(grid);
        before != self.owner()
    }

    /// Returns true if the owner changed.
    pub(crate) fn exit(&mut self, grid: GridId) -> bool {
        let before = self.owner();
        self.pointer_stack.retain(|g| *g != grid);
        before != self.owner()
    }
}

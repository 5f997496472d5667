/******************************************************************************
 *                                                                            *
 * Drag transitions: grabbing (whole or split stacks), hover classification,  *
 * dropping onto clear cells or matching stacks, moving the held item between *
 * grids, rotation, and resetting an item to where it came from. The held     *
 * occupant stays in its source grid's list until it lands somewhere; every   *
 * overlap query excludes it by id.                                           *
 *                                                                            *
 ******************************************************************************/

use std::sync::Arc;

use crate::distributor::{classify_placement, find_placement, Placement};
use crate::drag::DragTransaction;
use crate::error::{InventoryError, InventoryResult};
use crate::events::InventoryEvent;
use crate::grid::{ContainerLink, GridDragState, GridId};
use crate::inventory::Inventory;
use crate::items::{calculate_merge_result, ItemDefinition, ItemResolver};
use crate::models::{Coords, GridPosition, Orientation, PlacementResult};
use crate::occupant::{occupying_indices, GridOccupant, Occupant, OccupantId, OccupantState};

/// What a drop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// The whole held stack landed on a clear footprint.
    Placed { grid: GridId, occupant: OccupantId },
    /// Part of the held stack landed as a new occupant; `remaining` is still held.
    PlacedPartial { grid: GridId, occupant: OccupantId, remaining: u32 },
    /// Units merged into an existing stack; `remaining` > 0 means the drag goes on.
    Stacked { grid: GridId, target: OccupantId, transferred: u32, remaining: u32 },
    /// The target was invalid and the item went back to its source.
    Reset(ResetOutcome),
}

/// Where a reset put the held item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Back at its original coordinates and orientation.
    Restored,
    /// Fully merged into the stack sitting at its original origin.
    Merged { target: OccupantId },
    /// Original footprint blocked; auto-placed elsewhere in the source grid.
    Relocated { coords: Coords, orientation: Orientation },
}

const NO_CELL: Coords = Coords::new(-1, -1);

impl<R: ItemResolver> Inventory<R> {
    // --- Held item helpers ---

    pub(crate) fn held_occupant(&self) -> InventoryResult<&Occupant> {
        let tx = self.drag.require()?;
        self.grid(tx.source)?
            .occupant(tx.occupant)
            .ok_or(InventoryError::UnknownOccupant(tx.occupant.0))
    }

    pub(crate) fn held_definition(&self) -> InventoryResult<Arc<ItemDefinition>> {
        Ok(self.held_occupant()?.definition.clone())
    }

    /// Sets the held stack's count and keeps the transaction in step.
    pub(crate) fn set_held_count(&mut self, count: u32) -> InventoryResult<()> {
        let (source, occupant) = {
            let tx = self.drag.require_mut()?;
            tx.grabbed_stack_count = count;
            (tx.source, tx.occupant)
        };
        if let Some(held) = self.grid_mut(source)?.occupant_mut(occupant) {
            held.set_stack_count(count);
        }
        self.emit(InventoryEvent::StackChanged { grid: source, occupant, count });
        Ok(())
    }

    /// Removes the held occupant from its source grid (it was merged away).
    pub(crate) fn consume_held(&mut self) -> InventoryResult<()> {
        let tx = self.drag.require()?.clone();
        self.grid_mut(tx.source)?.remove(tx.occupant);
        self.emit(InventoryEvent::OccupantRemoved { grid: tx.source, occupant: tx.occupant });
        self.mark_modified(tx.source);
        Ok(())
    }

    pub(crate) fn end_drag(&mut self) -> Option<DragTransaction> {
        for g in self.grids.values_mut() {
            g.drag_state = None;
            g.clear_highlights();
        }
        self.drag.end()
    }

    pub(crate) fn current_origin(&self) -> InventoryResult<Option<Coords>> {
        let tx = self.drag.require()?;
        Ok(self.grid(tx.current)?.pointer_cell.map(|c| tx.origin_for(c)))
    }

    /// Moves an occupant between grids (or within one), rewriting the parent
    /// link of its nested grid if it is a container.
    pub(crate) fn relocate_occupant(
        &mut self,
        from: GridId,
        to: GridId,
        id: OccupantId,
        coords: Coords,
        orientation: Orientation,
    ) -> InventoryResult<()> {
        self.grid(to)?;
        let mut occupant = self.grid_mut(from)?.remove(id).ok_or(InventoryError::UnknownOccupant(id.0))?;
        let target = self.grid_mut(to)?;
        let count = occupant.stack_count();
        occupant.set_position(GridPosition::new(coords, orientation, count), target.config.width);
        occupant.state = if target.is_open { OccupantState::Live } else { OccupantState::Staged };
        let nested = occupant.nested_grid();
        target.insert(occupant);

        if let Some(nested) = nested {
            if let Some(g) = self.grids.get_mut(&nested) {
                g.parent = Some(ContainerLink { grid: to, container: id });
            }
        }
        if from != to {
            if let Some(g) = self.grids.get_mut(&from) {
                if g.open_container == Some(id) {
                    g.open_container = None;
                }
            }
            self.emit(InventoryEvent::OccupantRemoved { grid: from, occupant: id });
            self.mark_modified(from);
        }
        self.mark_modified(to);
        Ok(())
    }

    // --- Grab ---

    /// Starts a drag on `count` units of `occupant` (0 or more than the stack
    /// means the whole stack). A partial grab splits off a new occupant at the
    /// same position and holds that one. Returns the held occupant.
    pub fn grab(&mut self, grid: GridId, occupant: OccupantId, count: u32) -> InventoryResult<OccupantId> {
        if let Some(active) = self.drag.transaction() {
            log::error!("[Grab] {} requested while {} is held.", occupant, active.occupant);
            return Err(InventoryError::InvalidTransactionState("a drag is already active"));
        }
        let (total, position, def, open, nested_open) = {
            let g = self.grid(grid)?;
            let o = g.occupant(occupant).ok_or(InventoryError::UnknownOccupant(occupant.0))?;
            let nested_open = if g.open_container == Some(occupant) { o.nested_grid() } else { None };
            (o.stack_count(), o.position(), o.definition.clone(), g.is_open, nested_open)
        };
        if !open {
            return Err(InventoryError::InvalidTransactionState("grab from a closed grid"));
        }
        if let Some(nested) = nested_open {
            self.close_container(nested)?;
        }
        let count = if count == 0 || count > total { total } else { count };

        let held = if count < total {
            let split_id = self.occupant_ids.next_id();
            let instance_id = self.instance_ids.next_id();
            let g = self.grid_mut(grid)?;
            let width = g.config.width;
            if let Some(source) = g.occupant_mut(occupant) {
                source.set_stack_count(total - count);
            }
            let mut split = Occupant::new(split_id, instance_id, def.clone(), GridPosition { stack_count: count, ..position }, width);
            split.state = OccupantState::Live;
            g.insert(split);
            self.emit(InventoryEvent::StackChanged { grid, occupant, count: total - count });
            split_id
        } else {
            occupant
        };

        let (pointer_cell, width, hovered) = {
            let g = self.grid(grid)?;
            (g.pointer_cell, g.config.width, g.hovered)
        };
        let mut tx = DragTransaction::new(held, count, grid, position.orientation);
        if let Some(cell) = pointer_cell {
            let offset = Coords::new(cell.x - position.coords.x, cell.y - position.coords.y);
            let (fw, fh) = position.orientation.footprint(def.dimensions);
            if offset.x >= 0 && offset.y >= 0 && (offset.x as u32) < fw && (offset.y as u32) < fh {
                tx.grab_offset = offset;
            }
        }
        self.drag.begin(tx)?;

        if hovered == Some(held) {
            self.grid_mut(grid)?.hovered = None;
            self.emit(InventoryEvent::HoverExit { grid, occupant: held });
        }
        let original_indices = occupying_indices(position.coords, def.dimensions, position.orientation, width);
        self.grid_mut(grid)?.drag_state = Some(GridDragState {
            original_coords: position.coords,
            original_indices,
            original_orientation: position.orientation,
            placement: Placement::off_grid(position.coords, position.orientation),
        });
        let origin = self.current_origin()?.or(Some(position.coords));
        self.refresh_drag_placement(grid, origin)?;

        self.emit(InventoryEvent::Grabbed { grid, occupant: held, count });
        log::info!("[Grab] Holding {} x{} '{}' from {}.", held, count, def.config_id, grid);
        Ok(held)
    }

    // --- Hover classification ---

    /// Classifies the held item at `origin` in `grid` and updates that grid's
    /// drag state and cell highlights. A container is never placeable inside
    /// its own nested grid or anything below it.
    pub(crate) fn refresh_drag_placement(&mut self, grid: GridId, origin: Option<Coords>) -> InventoryResult<()> {
        let (held, orientation) = {
            let tx = self.drag.require()?;
            (tx.occupant, tx.orientation)
        };
        let def = self.held_definition()?;
        let inside_held = self.is_inside_occupant(grid, held);
        let g = self.grid_mut(grid)?;
        let placement = match origin {
            Some(origin) if !inside_held => classify_placement(&def, &g.config, g.occupants(), Some(held), origin, orientation),
            _ => Placement::off_grid(origin.unwrap_or(NO_CELL), orientation),
        };
        if placement.result == PlacementResult::Clear {
            g.highlight(&placement.indices);
        } else {
            g.clear_highlights();
        }
        match g.drag_state.as_mut() {
            Some(state) => state.placement = placement,
            None => {
                g.drag_state = Some(GridDragState {
                    original_coords: placement.origin,
                    original_indices: placement.indices.clone(),
                    original_orientation: orientation,
                    placement,
                })
            }
        }
        Ok(())
    }

    /// Classifies the held item again at its last origin over `grid`, for
    /// when the grid changed underneath it. Off-grid stays off-grid.
    pub(crate) fn reclassify_held(&mut self, grid: GridId) -> InventoryResult<Placement> {
        let cached = match self.grid(grid)?.drag_state.as_ref() {
            Some(state) => state.placement.clone(),
            None => return Ok(Placement::off_grid(NO_CELL, self.drag.require()?.orientation)),
        };
        if cached.result == PlacementResult::OffGrid {
            return Ok(cached);
        }
        self.refresh_drag_placement(grid, Some(cached.origin))?;
        Ok(self
            .grid(grid)?
            .drag_state
            .as_ref()
            .map_or(cached, |state| state.placement.clone()))
    }

    // --- Transfer between grids ---

    /// The pointer carried the held item into `grid`.
    pub(crate) fn transfer_dragging_to(&mut self, grid: GridId) -> InventoryResult<()> {
        let (source, held, orientation) = {
            let tx = self.drag.require_mut()?;
            tx.current = grid;
            tx.has_moved_in_current_container = false;
            tx.drag_hold_elapsed = 0.0;
            (tx.source, tx.occupant, tx.orientation)
        };
        if grid != source || self.grid(grid)?.drag_state.is_none() {
            let def = self.held_definition()?;
            let g = self.grid_mut(grid)?;
            let home = find_placement(&def, &g.config, g.occupants(), Some(held));
            let (coords, original_indices) = match home {
                Some((coords, o)) => (coords, occupying_indices(coords, def.dimensions, o, g.config.width)),
                None => (NO_CELL, Vec::new()),
            };
            g.drag_state = Some(GridDragState {
                original_coords: coords,
                original_indices,
                original_orientation: orientation,
                placement: Placement::off_grid(coords, orientation),
            });
        }
        let origin = self.current_origin()?;
        self.refresh_drag_placement(grid, origin)?;
        log::debug!("[Transfer] {} now over {}.", held, grid);
        Ok(())
    }

    /// The pointer carried the held item out of `grid`.
    pub(crate) fn transfer_dragging_from(&mut self, grid: GridId) -> InventoryResult<()> {
        let source = self.drag.require()?.source;
        if let Some(g) = self.grids.get_mut(&grid) {
            g.clear_highlights();
            if grid == source {
                if let Some(state) = g.drag_state.as_mut() {
                    state.placement = Placement::off_grid(state.placement.origin, state.placement.orientation);
                }
            } else {
                g.drag_state = None;
            }
        }
        Ok(())
    }

    // --- Rotation ---

    pub fn rotate(&mut self, left: bool) -> InventoryResult<()> {
        let def = self.held_definition()?;
        if !def.can_rotate {
            log::debug!("[Rotate] '{}' cannot rotate.", def.config_id);
            return Ok(());
        }
        let current = {
            let tx = self.drag.require_mut()?;
            tx.orientation = if left { tx.orientation.rotated_left() } else { tx.orientation.rotated_right() };
            let (fw, fh) = tx.orientation.footprint(def.dimensions);
            tx.grab_offset = Coords::new(tx.grab_offset.x.min(fw as i32 - 1), tx.grab_offset.y.min(fh as i32 - 1));
            tx.current
        };
        let origin = self.current_origin()?;
        self.refresh_drag_placement(current, origin)
    }

    // --- Drop ---

    /// Drops `amount` units of the held stack (0 or more than held means all)
    /// at the last hovered origin over the current grid, classified against
    /// the grid as it is now.
    pub fn drop_item(&mut self, amount: u32) -> InventoryResult<DropOutcome> {
        let tx = match self.drag.transaction() {
            Some(tx) => tx.clone(),
            None => {
                log::error!("[Drop] Drop requested with nothing held.");
                return Err(InventoryError::InvalidTransactionState("drop without an active drag"));
            }
        };
        let held_count = self.held_occupant()?.stack_count();
        let amount = if amount == 0 || amount > held_count { held_count } else { amount };
        let full = amount == held_count;
        let placement = self.reclassify_held(tx.current)?;

        match placement.result {
            PlacementResult::OffGrid | PlacementResult::OverlappingExisting => {
                log::info!("[Drop] {} released over {} ({:?}); resetting.", tx.occupant, tx.current, placement.result);
                self.emit(InventoryEvent::Released { grid: tx.current, occupant: tx.occupant });
                Ok(DropOutcome::Reset(self.reset_to_source()?))
            }
            PlacementResult::Clear if full => {
                self.relocate_occupant(tx.source, tx.current, tx.occupant, placement.origin, tx.orientation)?;
                self.end_drag();
                self.emit(InventoryEvent::Dropped { grid: tx.current, occupant: tx.occupant, full: true });
                log::info!("[Drop] {} placed at {:?} in {}.", tx.occupant, placement.origin, tx.current);
                Ok(DropOutcome::Placed { grid: tx.current, occupant: tx.occupant })
            }
            PlacementResult::Clear => self.drop_partial_onto_clear(&tx, &placement, amount, held_count),
            PlacementResult::OverlappingStackable => match placement.stack_target() {
                Some(target) => self.drop_onto_stack(&tx, target, amount, held_count),
                None => Ok(DropOutcome::Reset(self.reset_to_source()?)),
            },
        }
    }

    fn drop_partial_onto_clear(
        &mut self,
        tx: &DragTransaction,
        placement: &Placement,
        amount: u32,
        held_count: u32,
    ) -> InventoryResult<DropOutcome> {
        let def = self.held_definition()?;
        let id = self.occupant_ids.next_id();
        let instance_id = self.instance_ids.next_id();
        let g = self.grid_mut(tx.current)?;
        let mut split = Occupant::new(id, instance_id, def, GridPosition::new(placement.origin, tx.orientation, amount), g.config.width);
        split.state = if g.is_open { OccupantState::Live } else { OccupantState::Staged };
        g.insert(split);
        self.mark_modified(tx.current);

        let remaining = held_count - amount;
        self.set_held_count(remaining)?;
        self.emit(InventoryEvent::Dropped { grid: tx.current, occupant: id, full: false });
        log::info!("[Drop] Split {} unit(s) onto {:?} in {}; {} still held.", amount, placement.origin, tx.current, remaining);

        let origin = self.current_origin()?;
        self.refresh_drag_placement(tx.current, origin)?;
        Ok(DropOutcome::PlacedPartial { grid: tx.current, occupant: id, remaining })
    }

    fn drop_onto_stack(
        &mut self,
        tx: &DragTransaction,
        target: OccupantId,
        amount: u32,
        held_count: u32,
    ) -> InventoryResult<DropOutcome> {
        let def = self.held_definition()?;
        let target_count = self
            .grid(tx.current)?
            .occupant(target)
            .ok_or(InventoryError::UnknownOccupant(target.0))?
            .stack_count();
        let merge = match calculate_merge_result(&def, held_count, target_count, amount) {
            Ok(merge) => merge,
            Err(msg) => {
                log::warn!("[Drop] Cannot stack onto {}: {}. Resetting.", target, msg);
                self.emit(InventoryEvent::Released { grid: tx.current, occupant: tx.occupant });
                return Ok(DropOutcome::Reset(self.reset_to_source()?));
            }
        };

        if let Some(o) = self.grid_mut(tx.current)?.occupant_mut(target) {
            o.set_stack_count(merge.target_count);
        }
        self.emit(InventoryEvent::StackChanged { grid: tx.current, occupant: target, count: merge.target_count });
        self.mark_modified(tx.current);

        if merge.source_consumed() {
            self.consume_held()?;
            self.end_drag();
            self.emit(InventoryEvent::Dropped { grid: tx.current, occupant: target, full: true });
            log::info!("[Drop] {} merged into {} ({} units).", tx.occupant, target, merge.transferred);
        } else {
            self.set_held_count(merge.source_remaining)?;
            self.emit(InventoryEvent::Dropped { grid: tx.current, occupant: target, full: false });
            log::info!(
                "[Drop] {} unit(s) stacked onto {}; {} still held.",
                merge.transferred,
                target,
                merge.source_remaining
            );
            let origin = self.current_origin()?;
            self.refresh_drag_placement(tx.current, origin)?;
        }
        Ok(DropOutcome::Stacked {
            grid: tx.current,
            target,
            transferred: merge.transferred,
            remaining: merge.source_remaining,
        })
    }

    // --- Reset ---

    pub fn cancel_grab(&mut self) -> InventoryResult<ResetOutcome> {
        log::info!("[Grab] Cancelled.");
        self.reset_to_source()
    }

    /// Returns the held item to its source grid: onto the stack now sitting
    /// at its original origin, else its original footprint, else the first
    /// free slot. If the source grid is full the drag stays active and
    /// `PlacementExhausted` is returned.
    pub fn reset_to_source(&mut self) -> InventoryResult<ResetOutcome> {
        let tx = self.drag.require()?.clone();
        let (def, mut held_count, fallback) = {
            let held = self.held_occupant()?;
            (held.definition.clone(), held.stack_count(), (held.coords(), held.orientation()))
        };
        let (original_coords, original_orientation) = self
            .grid(tx.source)?
            .drag_state
            .as_ref()
            .map(|s| (s.original_coords, s.original_orientation))
            .unwrap_or(fallback);

        let stack_at_origin = self
            .grid(tx.source)?
            .occupants()
            .iter()
            .find(|o| o.id != tx.occupant && o.coords() == original_coords && o.can_stack_with(&def) && o.has_stack_room())
            .map(|o| (o.id, o.stack_count()));
        if let Some((target, target_count)) = stack_at_origin {
            if let Ok(merge) = calculate_merge_result(&def, held_count, target_count, held_count) {
                if let Some(o) = self.grid_mut(tx.source)?.occupant_mut(target) {
                    o.set_stack_count(merge.target_count);
                }
                self.emit(InventoryEvent::StackChanged { grid: tx.source, occupant: target, count: merge.target_count });
                if merge.source_consumed() {
                    self.consume_held()?;
                    return self.finish_reset(&tx, ResetOutcome::Merged { target });
                }
                held_count = merge.source_remaining;
                self.set_held_count(held_count)?;
                self.mark_modified(tx.source);
            }
        }

        let home = {
            let g = self.grid(tx.source)?;
            let original = classify_placement(&def, &g.config, g.occupants(), Some(tx.occupant), original_coords, original_orientation);
            if original.result == PlacementResult::Clear {
                Some((original_coords, original_orientation, ResetOutcome::Restored))
            } else {
                find_placement(&def, &g.config, g.occupants(), Some(tx.occupant))
                    .map(|(coords, orientation)| (coords, orientation, ResetOutcome::Relocated { coords, orientation }))
            }
        };

        match home {
            Some((coords, orientation, outcome)) => {
                let g = self.grid_mut(tx.source)?;
                let width = g.config.width;
                if let Some(held) = g.occupant_mut(tx.occupant) {
                    held.set_position(GridPosition::new(coords, orientation, held_count), width);
                }
                if outcome != ResetOutcome::Restored {
                    self.mark_modified(tx.source);
                }
                self.finish_reset(&tx, outcome)
            }
            None => {
                log::error!(
                    "[Reset] No room left in {} for {} x{} '{}'; the item stays held.",
                    tx.source,
                    tx.occupant,
                    held_count,
                    def.config_id
                );
                self.emit(InventoryEvent::FatalPlacement { grid: tx.source, occupant: tx.occupant });
                Err(InventoryError::PlacementExhausted { config_id: def.config_id.clone(), grid: tx.source.0 })
            }
        }
    }

    fn finish_reset(&mut self, tx: &DragTransaction, outcome: ResetOutcome) -> InventoryResult<ResetOutcome> {
        self.end_drag();
        self.emit(InventoryEvent::Reset { grid: tx.source, occupant: tx.occupant });
        if !self.grid(tx.source)?.is_open {
            if let Some(link) = self.first_visible_ancestor(tx.source) {
                self.bump_container(link)?;
            }
        }
        log::info!("[Reset] {} returned to {}: {:?}", tx.occupant, tx.source, outcome);
        Ok(outcome)
    }
}

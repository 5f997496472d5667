/*
 * src/containers.rs
 *
 * Purpose: Container sequencing. Opening and closing nested grids, moving
 * the held item into or out of a container without opening it, batch
 * auto-add of items into a grid, and the bump pulse shown on a container
 * that received items while its grid was closed.
 *
 * Each grid has one open-container slot. Opening a second container in the
 * same grid closes the first one (and everything open below it) first.
 */

use std::sync::Arc;

use crate::animation::TransitionKind;
use crate::distributor::AutoAddPlan;
use crate::error::{InventoryError, InventoryResult};
use crate::events::InventoryEvent;
use crate::grid::{ContainerLink, GridId};
use crate::inventory::Inventory;
use crate::items::{ItemDefinition, ItemResolver};
use crate::models::{AutoAddResult, GridPosition};
use crate::occupant::{GridOccupant, Occupant, OccupantId, OccupantState};

impl<R: ItemResolver> Inventory<R> {
    // --- Open / close ---

    /// Opens the nested grid of `container` (spawning it on first use) and
    /// materializes its staged contents. Returns the nested grid.
    pub fn open_container(&mut self, grid: GridId, container: OccupantId) -> InventoryResult<GridId> {
        let (is_container, coords, current) = {
            let g = self.grid(grid)?;
            if !g.is_open {
                return Err(InventoryError::InvalidTransactionState("containers open from an open grid"));
            }
            let o = g.occupant(container).ok_or(InventoryError::UnknownOccupant(container.0))?;
            (o.is_container(), o.coords(), g.open_container)
        };
        if !is_container {
            return Err(InventoryError::NotAContainer { coords });
        }
        if self.drag.transaction().map_or(false, |tx| tx.occupant == container) {
            log::error!("[Container] {} cannot open while it is being dragged.", container);
            return Err(InventoryError::InvalidTransactionState("the held container cannot be opened"));
        }

        match current.and_then(|c| self.nested_grid_of(grid, c).map(|n| (c, n))) {
            Some((c, nested)) if c == container && self.grid(nested)?.is_open => return Ok(nested),
            Some((_, other)) => self.close_container(other)?,
            None => {}
        }

        let nested = self.ensure_nested_grid(grid, container)?;
        let open_secs = self.config.container_open_secs;

        let hovered = {
            let parent = self.grid_mut(grid)?;
            parent.open_container = Some(container);
            parent.input_enabled = false;
            parent.pending_input_enable = false;
            parent.clear_highlights();
            parent.hovered.take()
        };
        if let Some(occupant) = hovered {
            self.emit(InventoryEvent::HoverExit { grid, occupant });
        }

        let g = self.grid_mut(nested)?;
        g.is_open = true;
        g.input_enabled = false;
        g.pending_input_enable = true;
        g.start_transition(TransitionKind::Open, open_secs);
        self.materialize(nested)?;

        self.emit(InventoryEvent::ContainerOpened { grid, container, nested });
        log::info!("[Container] Opened {} in {} as {}.", container, grid, nested);
        Ok(nested)
    }

    /// Closes a nested grid and anything open below it. A held item whose
    /// drag was over the closing grid moves to the parent grid. Closing a
    /// root grid closes the whole inventory.
    pub fn close_container(&mut self, nested: GridId) -> InventoryResult<()> {
        let (link, open, inner) = {
            let g = self.grid(nested)?;
            (g.parent, g.is_open, g.open_container)
        };
        let link = match link {
            Some(link) => link,
            None => return self.close_inventory(nested),
        };
        if !open {
            return Ok(());
        }
        if let Some(inner) = inner.and_then(|c| self.nested_grid_of(nested, c)) {
            self.close_container(inner)?;
        }

        let close_secs = self.config.container_close_secs;
        let hovered = {
            let g = self.grid_mut(nested)?;
            g.is_open = false;
            g.input_enabled = false;
            g.pending_input_enable = false;
            g.pointer_cell = None;
            g.open_container = None;
            g.clear_highlights();
            g.stage_all();
            g.start_transition(TransitionKind::Close, close_secs);
            g.hovered.take()
        };
        if let Some(occupant) = hovered {
            self.emit(InventoryEvent::HoverExit { grid: nested, occupant });
        }

        if let Some(parent) = self.grids.get_mut(&link.grid) {
            if parent.open_container == Some(link.container) {
                parent.open_container = None;
            }
            parent.pending_input_enable = true;
        }

        if self.drag.exit(nested) {
            self.on_pointer_owner_changed()?;
        }
        if self.drag.transaction().map_or(false, |tx| tx.current == nested) {
            self.transfer_dragging_from(nested)?;
            self.transfer_dragging_to(link.grid)?;
        }

        self.emit(InventoryEvent::ContainerClosed { grid: link.grid, container: link.container, nested });
        log::info!("[Container] Closed {} ({} in {}).", nested, link.container, link.grid);
        Ok(())
    }

    // --- Auto-drop ---

    /// Puts the held item into a closed container without opening it. Units
    /// that fit are moved in one step; the rest stay held. `NoneFits` leaves
    /// the drag untouched and reports the container as full.
    pub fn auto_drop_into_container(&mut self, grid: GridId, container: OccupantId) -> InventoryResult<AutoAddResult> {
        let held = self.drag.require()?.occupant;
        let (is_container, coords) = {
            let o = self
                .grid(grid)?
                .occupant(container)
                .ok_or(InventoryError::UnknownOccupant(container.0))?;
            (o.is_container(), o.coords())
        };
        if !is_container {
            return Err(InventoryError::NotAContainer { coords });
        }
        if held == container || self.is_inside_occupant(grid, held) {
            self.report_container_full(grid, container)?;
            return Ok(AutoAddResult::NoneFits);
        }

        let nested = self.ensure_nested_grid(grid, container)?;
        let result = self.auto_drop_held_into(nested, true)?;
        match result {
            AutoAddResult::NoneFits => self.report_container_full(grid, container)?,
            _ => self.bump_container(ContainerLink { grid, container })?,
        }
        Ok(result)
    }

    /// Moves the held item out of a container grid into that container's
    /// parent grid. Only a complete fit is applied.
    pub fn auto_drop_out_of_container(&mut self, nested: GridId) -> InventoryResult<AutoAddResult> {
        let held = self.drag.require()?.occupant;
        let link = self
            .grid(nested)?
            .parent
            .ok_or(InventoryError::InvalidTransactionState("auto-drop out of a root grid"))?;
        let result = if self.is_inside_occupant(link.grid, held) {
            AutoAddResult::NoneFits
        } else {
            self.auto_drop_held_into(link.grid, false)?
        };
        if result != AutoAddResult::FullyFits {
            self.report_container_full(link.grid, link.container)?;
        }
        Ok(result)
    }

    /// Plans and applies the held stack into `target` as one step. A held
    /// item that lands whole as a single new stack is moved itself, keeping
    /// its identity and, for containers, its contents.
    fn auto_drop_held_into(&mut self, target: GridId, allow_partial: bool) -> InventoryResult<AutoAddResult> {
        let tx = self.drag.require()?.clone();
        let (def, count) = {
            let held = self.held_occupant()?;
            (held.definition.clone(), held.stack_count())
        };
        let plan = {
            let g = self.grids.get(&target).ok_or(InventoryError::UnknownGrid(target.0))?;
            let exclude = (tx.source == target).then_some(tx.occupant);
            self.scratch.plan(&[(def.clone(), count)], &g.config, g.occupants(), exclude)
        };
        let result = plan.result();
        log::debug!("[Container] Auto-drop of {} x{} into {}: {:?}", tx.occupant, count, target, result);
        if result == AutoAddResult::NoneFits || (!allow_partial && result != AutoAddResult::FullyFits) {
            return Ok(result);
        }

        if plan.top_offs.is_empty() && plan.stacks.len() == 1 && plan.stacks[0].count == count {
            let stack = &plan.stacks[0];
            self.relocate_occupant(tx.source, target, tx.occupant, stack.coords, stack.orientation)?;
            if self.grid(target)?.is_open {
                self.materialize(target)?;
            }
            self.end_drag();
            self.emit(InventoryEvent::Dropped { grid: target, occupant: tx.occupant, full: true });
            return Ok(result);
        }

        self.apply_plan(target, &plan, false)?;
        let remaining = count - plan.placed_units;
        if remaining == 0 {
            self.consume_held()?;
            self.end_drag();
            self.emit(InventoryEvent::Dropped { grid: target, occupant: tx.occupant, full: true });
        } else {
            self.set_held_count(remaining)?;
            self.emit(InventoryEvent::Dropped { grid: target, occupant: tx.occupant, full: false });
            log::info!("[Container] {} unit(s) of {} did not fit in {}; still held.", remaining, tx.occupant, target);
            let current = self.drag.require()?.current;
            let origin = self.current_origin()?;
            self.refresh_drag_placement(current, origin)?;
        }
        Ok(result)
    }

    fn report_container_full(&mut self, grid: GridId, container: OccupantId) -> InventoryResult<()> {
        let held = self.held_definition()?;
        let reason = InventoryError::ContainerFull { container: container.0, config_id: held.config_id.clone() };
        log::warn!("[Container] {} in {}; still held.", reason, grid);
        self.emit(InventoryEvent::ContainerFull { grid, container });
        Ok(())
    }

    // --- Auto-add ---

    /// Applies a plan to `target`: tops off the planned stacks, then creates
    /// the new ones. New occupants are live only when the grid is open and
    /// `as_staged` is false.
    pub(crate) fn apply_plan(&mut self, target: GridId, plan: &AutoAddPlan, as_staged: bool) -> InventoryResult<Vec<OccupantId>> {
        let g = self.grids.get_mut(&target).ok_or(InventoryError::UnknownGrid(target.0))?;
        let live = g.is_open && !as_staged;
        let width = g.config.width;
        let mut events = Vec::new();

        for &(id, added) in &plan.top_offs {
            if let Some(o) = g.occupant_mut(id) {
                let leftover = o.try_add_to_stack(added);
                if leftover > 0 {
                    log::warn!("[AutoAdd] {} overflowed by {} during apply.", id, leftover);
                }
                events.push(InventoryEvent::StackChanged { grid: target, occupant: id, count: o.stack_count() });
            }
        }

        let mut added = Vec::with_capacity(plan.stacks.len());
        for stack in &plan.stacks {
            let id = self.occupant_ids.next_id();
            let position = GridPosition::new(stack.coords, stack.orientation, stack.count);
            let mut occupant = Occupant::new(id, self.instance_ids.next_id(), stack.definition.clone(), position, width);
            occupant.state = if live { OccupantState::Live } else { OccupantState::Staged };
            g.insert(occupant);
            added.push(id);
        }

        for event in events {
            self.emit(event);
        }
        if !plan.top_offs.is_empty() || !added.is_empty() {
            self.mark_modified(target);
        }
        if self.drag.transaction().map_or(false, |tx| tx.current == target) {
            self.reclassify_held(target)?;
        }
        if live {
            let containers: Vec<OccupantId> = self
                .grid(target)?
                .occupants()
                .iter()
                .filter(|o| added.contains(&o.id) && o.is_container())
                .map(|o| o.id)
                .collect();
            for container in containers {
                self.ensure_nested_grid(target, container)?;
            }
        }
        Ok(added)
    }

    fn resolve_batch(&self, batch: &[(&str, u32)]) -> InventoryResult<Vec<(Arc<ItemDefinition>, u32)>> {
        batch
            .iter()
            .map(|(config_id, count)| {
                self.resolver
                    .lookup(config_id)
                    .map(|def| (def, *count))
                    .ok_or_else(|| InventoryError::UnknownItem(config_id.to_string()))
            })
            .collect()
    }

    /// Adds a batch of `(config_id, count)` to `grid`: existing stacks are
    /// topped off first, then whole stacks and the remainder are placed.
    /// Units that find no room are dropped from the batch and logged.
    /// The held item is neither topped off nor treated as blocking its old
    /// cells. Returns the new occupants.
    pub fn auto_add_items(&mut self, grid: GridId, batch: &[(&str, u32)], as_staged: bool) -> InventoryResult<Vec<OccupantId>> {
        let resolved = self.resolve_batch(batch)?;
        let held = self.held_id();
        let plan = {
            let g = self.grids.get(&grid).ok_or(InventoryError::UnknownGrid(grid.0))?;
            self.scratch.plan(&resolved, &g.config, g.occupants(), held)
        };
        if plan.unplaced_units > 0 {
            log::warn!("[AutoAdd] {} unit(s) did not fit in {}.", plan.unplaced_units, grid);
        }
        let added = self.apply_plan(grid, &plan, as_staged)?;
        log::info!(
            "[AutoAdd] {} unit(s) into {}: {} new stack(s), {} topped off.",
            plan.placed_units,
            grid,
            added.len(),
            plan.top_offs.len()
        );
        Ok(added)
    }

    /// Whether a batch would fit in `grid`. Nothing is changed.
    pub fn auto_add_result(&mut self, grid: GridId, batch: &[(&str, u32)]) -> InventoryResult<AutoAddResult> {
        let resolved = self.resolve_batch(batch)?;
        let held = self.held_id();
        let g = self.grids.get(&grid).ok_or(InventoryError::UnknownGrid(grid.0))?;
        Ok(self.scratch.auto_add_result(&resolved, &g.config, g.occupants(), held))
    }

    // --- Bump ---

    pub(crate) fn bump_container(&mut self, link: ContainerLink) -> InventoryResult<()> {
        let secs = self.config.bump_secs;
        self.grid_mut(link.grid)?.start_bump(link.container, secs);
        self.emit(InventoryEvent::ContainerBumped { grid: link.grid, container: link.container });
        Ok(())
    }
}

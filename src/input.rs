//! Host input: pointer samples fed to [`Inventory::tick`] and discrete intents
//! routed to the top-most open grid under the pointer.

use crate::error::InventoryResult;
use crate::grid::GridId;
use crate::inventory::Inventory;
use crate::items::ItemResolver;
use crate::models::{Coords, PlacementResult};
use crate::occupant::{GridOccupant, OccupantId};

/// Pointer state for one tick, already mapped into the owning grid's cells.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerSample {
    /// Host-space pointer position, used for movement and hold detection.
    pub position: (f32, f32),
    /// Cell under the pointer in the owning grid; `None` outside its content area.
    pub cell: Option<Coords>,
}

impl PointerSample {
    pub fn at(position: (f32, f32), cell: Coords) -> Self {
        PointerSample { position, cell: Some(cell) }
    }

    pub fn outside(position: (f32, f32)) -> Self {
        PointerSample { position, cell: None }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputIntent {
    GrabOrDrop,
    RotateLeft,
    RotateRight,
    SplitStack,
    CancelGrab,
}

impl<R: ItemResolver> Inventory<R> {
    /// Grid that receives intents: the pointer owner, or the open nested grid
    /// stacked on top of it. The flag is true when the pointer sits inside
    /// that grid's content area.
    fn input_target(&self) -> Option<(GridId, bool)> {
        let mut grid = self.drag.owner()?;
        let mut inside = self.grids.get(&grid)?.pointer_cell.is_some();
        while let Some(nested) = self
            .grids
            .get(&grid)
            .and_then(|g| g.open_container.and_then(|c| g.occupant(c)))
            .and_then(|o| o.nested_grid())
            .filter(|n| self.grids.get(n).map_or(false, |g| g.is_open))
        {
            grid = nested;
            inside = self.grids.get(&grid).map_or(false, |g| g.pointer_cell.is_some());
        }
        Some((grid, inside))
    }

    pub fn handle_input(&mut self, intent: InputIntent) -> InventoryResult<()> {
        if intent == InputIntent::CancelGrab {
            if self.drag.is_dragging() {
                self.cancel_grab()?;
            }
            return Ok(());
        }
        let (grid, inside) = match self.input_target() {
            Some(target) => target,
            None => return Ok(()),
        };
        if !self.grid(grid)?.input_enabled {
            log::debug!("[Input] {:?} ignored; input on {} is not enabled yet.", intent, grid);
            return Ok(());
        }
        log::debug!("[Input] {:?} on {} (inside: {}).", intent, grid, inside);

        match intent {
            InputIntent::RotateLeft | InputIntent::RotateRight => {
                if self.drag.transaction().map_or(false, |tx| tx.current == grid) {
                    self.rotate(intent == InputIntent::RotateLeft)?;
                }
                Ok(())
            }
            InputIntent::GrabOrDrop => self.grab_or_drop(grid, inside),
            InputIntent::SplitStack => self.split_stack(grid, inside),
            InputIntent::CancelGrab => Ok(()),
        }
    }

    /// Hovered occupant of `grid` that is a container whose nested grid is closed.
    fn hovered_closed_container(&self, grid: GridId) -> Option<OccupantId> {
        let g = self.grids.get(&grid)?;
        let o = g.occupant(g.hovered?)?;
        (o.is_container() && g.open_container != Some(o.id)).then_some(o.id)
    }

    fn grab_or_drop(&mut self, grid: GridId, inside: bool) -> InventoryResult<()> {
        let held_here = self.drag.transaction().map(|tx| tx.current == grid);
        let g = self.grid(grid)?;
        if g.is_container_grid() {
            let leave = match held_here {
                Some(true) => g.placement_result().map_or(true, |r| r == PlacementResult::OffGrid),
                Some(false) => true,
                None => g.hovered.is_none() && !inside,
            };
            if leave {
                return self.close_container(grid);
            }
        }

        match held_here {
            Some(here) => {
                if let Some(container) = self.hovered_closed_container(grid) {
                    self.open_container(grid, container)?;
                } else if here {
                    let count = self.drag.require()?.grabbed_stack_count;
                    self.drop_item(count)?;
                }
                Ok(())
            }
            None => {
                if let Some(hovered) = self.grid(grid)?.hovered {
                    self.grab(grid, hovered, 0)?;
                }
                Ok(())
            }
        }
    }

    fn split_stack(&mut self, grid: GridId, inside: bool) -> InventoryResult<()> {
        let dragging = self.drag.is_dragging();
        if self.grid(grid)?.is_container_grid() && !inside {
            if dragging {
                self.auto_drop_out_of_container(grid)?;
            } else {
                self.close_container(grid)?;
            }
            return Ok(());
        }

        if let Some(container) = self.hovered_closed_container(grid) {
            if dragging {
                self.auto_drop_into_container(grid, container)?;
            } else {
                self.open_container(grid, container)?;
            }
            return Ok(());
        }

        if dragging {
            if self.drag.transaction().map_or(false, |tx| tx.current == grid) {
                self.drop_item(1)?;
            }
            return Ok(());
        }

        let g = self.grid(grid)?;
        let split = g
            .hovered
            .and_then(|id| g.occupant(id))
            .filter(|o| o.stack_count() > 1)
            .map(|o| (o.id, o.stack_count() / 2));
        if let Some((occupant, half)) = split {
            self.grab(grid, occupant, half)?;
        }
        Ok(())
    }
}

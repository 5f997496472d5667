/******************************************************************************
 *                                                                            *
 * The inventory engine: a registry of grids (root inventories and the        *
 * nested grids of containers), the drag coordinator, and the event queue     *
 * for the view layer. This file holds registry, lifecycle, persistence,      *
 * pointer and tick handling. Drag transitions live in inventory_management,  *
 * container sequencing in containers, intent routing in input.               *
 *                                                                            *
 ******************************************************************************/

use std::collections::HashMap;
use std::time::Duration;

use crate::animation::TransitionKind;
use crate::collection::{self, ItemCollection};
use crate::config::{EngineConfig, GridConfig};
use crate::distributor::{classify_placement, find_placement, item_in_cell, PlacementScratch};
use crate::drag::{DragSource, DragTransaction};
use crate::error::{InventoryError, InventoryResult};
use crate::events::{EventQueue, InventoryEvent};
use crate::grid::{ContainerLink, GridId, GridInstance};
use crate::input::PointerSample;
use crate::items::{InstanceIdGenerator, ItemResolver};
use crate::models::{Coords, GridPosition, PlacementResult};
use crate::occupant::{ContainerContents, GridOccupant, Occupant, OccupantId, OccupantIds, OccupantState};

pub struct Inventory<R: ItemResolver> {
    pub(crate) config: EngineConfig,
    pub(crate) resolver: R,
    pub(crate) grids: HashMap<GridId, GridInstance>,
    next_grid: u32,
    pub(crate) occupant_ids: OccupantIds,
    pub(crate) instance_ids: InstanceIdGenerator,
    pub(crate) drag: DragSource,
    pub(crate) events: EventQueue,
    pub(crate) scratch: PlacementScratch,
}

impl<R: ItemResolver> Inventory<R> {
    pub fn new(resolver: R, config: EngineConfig) -> Self {
        Inventory {
            config,
            resolver,
            grids: HashMap::new(),
            next_grid: 1,
            occupant_ids: OccupantIds::default(),
            instance_ids: InstanceIdGenerator,
            drag: DragSource::new(),
            events: EventQueue::default(),
            scratch: PlacementScratch::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    // --- Registry ---

    /// Registers a root inventory grid. It starts closed.
    pub fn create_grid(&mut self, config: GridConfig) -> GridId {
        self.register_grid(config, None)
    }

    pub(crate) fn register_grid(&mut self, config: GridConfig, parent: Option<ContainerLink>) -> GridId {
        let id = GridId(self.next_grid);
        self.next_grid += 1;
        log::debug!("[Registry] Registered {} ({}x{}), parent {:?}", id, config.width, config.height, parent);
        self.grids.insert(id, GridInstance::new(id, config, parent));
        id
    }

    pub fn grid(&self, id: GridId) -> InventoryResult<&GridInstance> {
        self.grids.get(&id).ok_or(InventoryError::UnknownGrid(id.0))
    }

    pub(crate) fn grid_mut(&mut self, id: GridId) -> InventoryResult<&mut GridInstance> {
        self.grids.get_mut(&id).ok_or(InventoryError::UnknownGrid(id.0))
    }

    pub fn grid_ids(&self) -> Vec<GridId> {
        let mut ids: Vec<GridId> = self.grids.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn drag(&self) -> Option<&DragTransaction> {
        self.drag.transaction()
    }

    pub(crate) fn held_id(&self) -> Option<OccupantId> {
        self.drag.transaction().map(|tx| tx.occupant)
    }

    pub fn pointer_owner(&self) -> Option<GridId> {
        self.drag.owner()
    }

    pub fn drain_events(&mut self) -> Vec<InventoryEvent> {
        self.events.drain()
    }

    pub(crate) fn emit(&mut self, event: InventoryEvent) {
        self.events.push(event);
    }

    // --- Hierarchy ---

    /// Links from `grid` up to its root, nearest first.
    pub fn ancestor_links(&self, grid: GridId) -> Vec<ContainerLink> {
        let mut links = Vec::new();
        let mut current = grid;
        while let Some(link) = self.grids.get(&current).and_then(|g| g.parent) {
            if links.len() > self.grids.len() {
                log::error!("[Registry] Parent chain of {} does not terminate.", grid);
                break;
            }
            links.push(link);
            current = link.grid;
        }
        links
    }

    pub fn root_of(&self, grid: GridId) -> InventoryResult<GridId> {
        self.grid(grid)?;
        Ok(self.ancestor_links(grid).last().map_or(grid, |link| link.grid))
    }

    /// True if `grid` is the nested grid of `occupant` or lies anywhere below it.
    pub(crate) fn is_inside_occupant(&self, grid: GridId, occupant: OccupantId) -> bool {
        self.ancestor_links(grid).iter().any(|link| link.container == occupant)
    }

    /// Nearest open ancestor grid of a closed grid, as the link naming the
    /// container occupant that stands for it there.
    pub fn first_visible_ancestor(&self, grid: GridId) -> Option<ContainerLink> {
        self.ancestor_links(grid)
            .into_iter()
            .find(|link| self.grids.get(&link.grid).map_or(false, |g| g.is_open))
    }

    pub(crate) fn nested_grid_of(&self, grid: GridId, container: OccupantId) -> Option<GridId> {
        self.grids.get(&grid)?.occupant(container)?.nested_grid()
    }

    /// Flags `grid` and every grid above it as changed since the last save.
    pub(crate) fn mark_modified(&mut self, grid: GridId) {
        let mut chain = vec![grid];
        chain.extend(self.ancestor_links(grid).iter().map(|link| link.grid));
        for id in chain {
            if let Some(g) = self.grids.get_mut(&id) {
                g.modified = true;
            }
        }
    }

    // --- Nested grids ---

    /// Spawns the nested grid of a container (closed, contents staged) if it
    /// does not exist yet.
    pub(crate) fn ensure_nested_grid(&mut self, grid: GridId, container: OccupantId) -> InventoryResult<GridId> {
        let nested_config = {
            let occupant = self
                .grid(grid)?
                .occupant(container)
                .ok_or(InventoryError::UnknownOccupant(container.0))?;
            if let Some(nested) = occupant.nested_grid() {
                return Ok(nested);
            }
            match (&occupant.contents, &occupant.definition.container_grid) {
                (Some(ContainerContents::Dormant(_)), Some(config)) => config.clone(),
                _ => return Err(InventoryError::NotAContainer { coords: occupant.coords() }),
            }
        };

        let subs = match self.grid_mut(grid)?.occupant_mut(container).and_then(|o| o.contents.take()) {
            Some(ContainerContents::Dormant(subs)) => subs,
            _ => Vec::new(),
        };
        let width = nested_config.width;
        let nested = self.register_grid(nested_config, Some(ContainerLink { grid, container }));
        let nested_grid = self.grid_mut(nested)?;
        for mut sub in subs {
            sub.set_position(sub.position(), width);
            sub.state = OccupantState::Staged;
            nested_grid.insert(sub);
        }
        if let Some(occupant) = self.grid_mut(grid)?.occupant_mut(container) {
            occupant.contents = Some(ContainerContents::Spawned(nested));
        }
        Ok(nested)
    }

    /// Materializes staged occupants and spawns (closed) nested grids for
    /// every container among them.
    pub(crate) fn materialize(&mut self, grid: GridId) -> InventoryResult<()> {
        let flipped = self.grid_mut(grid)?.materialize_staged();
        let dormant: Vec<OccupantId> = self
            .grid(grid)?
            .occupants()
            .iter()
            .filter(|o| matches!(o.contents, Some(ContainerContents::Dormant(_))))
            .map(|o| o.id)
            .collect();
        for container in dormant {
            self.ensure_nested_grid(grid, container)?;
        }
        if !flipped.is_empty() {
            log::debug!("[Registry] Materialized {} occupant(s) in {}.", flipped.len(), grid);
        }
        Ok(())
    }

    /// Folds every nested grid below `grid` back into dormant container
    /// contents and unregisters it.
    pub(crate) fn fold_nested_grids(&mut self, grid: GridId) {
        let nested: Vec<(OccupantId, GridId)> = match self.grids.get(&grid) {
            Some(g) => g.occupants().iter().filter_map(|o| o.nested_grid().map(|n| (o.id, n))).collect(),
            None => return,
        };
        for (container, nested_id) in nested {
            self.fold_nested_grids(nested_id);
            let mut subs = self.grids.remove(&nested_id).map_or_else(Vec::new, |mut g| g.take_all());
            for sub in &mut subs {
                sub.state = OccupantState::Staged;
            }
            self.drag.exit(nested_id);
            if let Some(occupant) = self.grids.get_mut(&grid).and_then(|g| g.occupant_mut(container)) {
                occupant.contents = Some(ContainerContents::Dormant(subs));
            }
        }
        if let Some(g) = self.grids.get_mut(&grid) {
            g.open_container = None;
        }
    }

    // --- Inventory lifecycle ---

    pub fn open_inventory(&mut self, root: GridId) -> InventoryResult<()> {
        let open_secs = self.config.container_open_secs;
        let g = self.grid_mut(root)?;
        if g.parent.is_some() {
            return Err(InventoryError::InvalidTransactionState("nested grids open through their container"));
        }
        if g.is_open {
            return Ok(());
        }
        g.is_open = true;
        g.input_enabled = false;
        g.pending_input_enable = true;
        g.start_transition(TransitionKind::Open, open_secs);
        self.materialize(root)?;
        log::info!("[Inventory] Opened {} with {} occupant(s).", root, self.grid(root)?.occupants().len());
        Ok(())
    }

    /// Closes a root inventory: any drag touching it is reset first, open
    /// containers are closed, a `CompositionModified` event carries the new
    /// collection if anything changed, and nested grids are released.
    /// Closing a nested grid closes that container instead.
    pub fn close_inventory(&mut self, root: GridId) -> InventoryResult<()> {
        let g = self.grid(root)?;
        if g.parent.is_some() {
            return self.close_container(root);
        }
        if !g.is_open {
            return Ok(());
        }

        if let Some(tx) = self.drag.transaction() {
            let (source, current) = (tx.source, tx.current);
            if self.root_of(source)? == root || self.root_of(current)? == root {
                log::info!("[Inventory] Closing {} with an item held; resetting it first.", root);
                self.reset_to_source()?;
            }
        }

        if let Some(nested) = self.grid(root)?.open_container.and_then(|c| self.nested_grid_of(root, c)) {
            self.close_container(nested)?;
        }

        if self.grid(root)?.modified {
            let collection = self.compile_grid(root)?;
            log::info!("[Inventory] Composition of {} changed ({} records).", root, collection.len());
            self.emit(InventoryEvent::CompositionModified { grid: root, collection });
        }

        self.fold_nested_grids(root);
        let close_secs = self.config.container_close_secs;
        let g = self.grid_mut(root)?;
        g.is_open = false;
        g.modified = false;
        g.input_enabled = false;
        g.pending_input_enable = false;
        g.pointer_cell = None;
        g.hovered = None;
        g.drag_state = None;
        g.clear_highlights();
        g.stage_all();
        g.start_transition(TransitionKind::Close, close_secs);
        self.drag.exit(root);
        log::info!("[Inventory] Closed {}.", root);
        Ok(())
    }

    // --- Persistence ---

    /// Replaces a root grid's contents with a decompiled collection. Returns
    /// the records that were skipped or repaired.
    pub fn load_collection(&mut self, root: GridId, collection: &ItemCollection) -> InventoryResult<Vec<InventoryError>> {
        if self.grid(root)?.parent.is_some() {
            return Err(InventoryError::InvalidTransactionState("collections load into root grids"));
        }
        if let Some(tx) = self.drag.transaction() {
            if self.root_of(tx.source)? == root || self.root_of(tx.current)? == root {
                log::error!("[Inventory] Refusing to load into {} while one of its items is held.", root);
                return Err(InventoryError::InvalidTransactionState("load while an item from this inventory is held"));
            }
        }

        self.fold_nested_grids(root);
        let config = self.grid(root)?.config.clone();
        let decompiled = collection::decompile(collection, &self.resolver, &config, &mut self.occupant_ids);

        let g = self.grid_mut(root)?;
        g.take_all();
        g.clear_highlights();
        g.modified = false;
        for occupant in decompiled.occupants {
            g.insert(occupant);
        }
        let open = g.is_open;
        if open {
            self.materialize(root)?;
        }
        log::info!(
            "[Inventory] Loaded {} record(s) into {} ({} issue(s)).",
            collection.len(),
            root,
            decompiled.issues.len()
        );
        Ok(decompiled.issues)
    }

    /// Deep copy of a grid's occupants with every spawned nested grid folded
    /// back into dormant contents, ready for compiling. An item held from
    /// this grid is recorded where a reset would put it.
    pub fn snapshot_tree(&self, grid: GridId) -> InventoryResult<Vec<Occupant>> {
        let g = self.grid(grid)?;
        let held = self.drag.transaction().filter(|tx| tx.source == grid).map(|tx| tx.occupant);
        let mut resting = Vec::with_capacity(g.occupants().len());
        for o in g.occupants().iter().filter(|o| Some(o.id) != held) {
            resting.push(self.snapshot_occupant(o)?);
        }
        if let Some(o) = held.and_then(|id| g.occupant(id)) {
            let copy = self.snapshot_occupant(o)?;
            settle_held_copy(&mut resting, copy, &g.config);
        }
        Ok(resting)
    }

    fn snapshot_occupant(&self, o: &Occupant) -> InventoryResult<Occupant> {
        let mut copy = o.clone();
        if let Some(nested) = o.nested_grid() {
            copy.contents = Some(ContainerContents::Dormant(self.snapshot_tree(nested)?));
        }
        Ok(copy)
    }

    pub fn compile_grid(&self, grid: GridId) -> InventoryResult<ItemCollection> {
        Ok(collection::compile(&self.snapshot_tree(grid)?))
    }

    // --- Pointer ---

    pub fn pointer_enter(&mut self, grid: GridId) -> InventoryResult<()> {
        if !self.grid(grid)?.is_open {
            log::debug!("[Pointer] Ignoring enter on closed {}.", grid);
            return Ok(());
        }
        if self.drag.enter(grid) {
            self.on_pointer_owner_changed()?;
        }
        Ok(())
    }

    pub fn pointer_exit(&mut self, grid: GridId) -> InventoryResult<()> {
        let hovered = match self.grids.get_mut(&grid) {
            Some(g) => {
                g.pointer_cell = None;
                g.hovered.take()
            }
            None => None,
        };
        if let Some(occupant) = hovered {
            self.emit(InventoryEvent::HoverExit { grid, occupant });
        }
        if self.drag.exit(grid) {
            self.on_pointer_owner_changed()?;
        }
        Ok(())
    }

    pub(crate) fn on_pointer_owner_changed(&mut self) -> InventoryResult<()> {
        let current = match self.drag.transaction() {
            Some(tx) => tx.current,
            None => return Ok(()),
        };
        match self.drag.owner() {
            Some(owner) if owner != current => {
                self.transfer_dragging_from(current)?;
                self.transfer_dragging_to(owner)
            }
            Some(_) => Ok(()),
            None => self.transfer_dragging_from(current),
        }
    }

    // --- Tick ---

    /// Advances animations and deferred input enables, then applies the
    /// pointer sample to the grid that owns the pointer.
    pub fn tick(&mut self, dt: Duration, sample: Option<PointerSample>) -> InventoryResult<()> {
        for g in self.grids.values_mut() {
            g.advance(dt);
        }
        let sample = match sample {
            Some(sample) => sample,
            None => return Ok(()),
        };
        let owner = match self.drag.owner() {
            Some(owner) => owner,
            None => {
                self.drag.set_pointer_position(sample.position);
                return Ok(());
            }
        };
        self.update_hover(owner, sample.cell)?;
        if self.drag.is_dragging() {
            self.evaluate_item_drag(owner, dt, sample)?;
        }
        self.drag.set_pointer_position(sample.position);
        Ok(())
    }

    fn update_hover(&mut self, grid: GridId, cell: Option<Coords>) -> InventoryResult<()> {
        let held = self.held_id();
        let g = self.grid_mut(grid)?;
        g.pointer_cell = cell;
        let now = cell
            .and_then(|c| g.index_of(c))
            .and_then(|index| item_in_cell(g.occupants(), index, held))
            .map(|o| o.id);
        let previous = std::mem::replace(&mut g.hovered, now);
        if previous != now {
            if let Some(occupant) = previous {
                self.emit(InventoryEvent::HoverExit { grid, occupant });
            }
            if let Some(occupant) = now {
                self.emit(InventoryEvent::HoverEnter { grid, occupant });
            }
        }
        Ok(())
    }

    fn evaluate_item_drag(&mut self, owner: GridId, dt: Duration, sample: PointerSample) -> InventoryResult<()> {
        let move_threshold = self.config.drag_move_threshold;
        let touch = self.config.touch_controls;
        let (current, origin, hold_fired) = {
            let tx = self.drag.require_mut()?;
            let (dx, dy) = (sample.position.0 - tx.current_drag_position.0, sample.position.1 - tx.current_drag_position.1);
            if (dx * dx + dy * dy).sqrt() >= move_threshold {
                tx.has_moved_in_current_container = true;
                tx.drag_hold_elapsed = 0.0;
            } else {
                tx.drag_hold_elapsed += dt.as_secs_f32();
            }
            tx.current_drag_position = sample.position;
            let hold_threshold = self.config.hold_threshold(tx.has_moved_in_current_container);
            let fired = touch && tx.drag_hold_elapsed >= hold_threshold;
            if fired {
                tx.drag_hold_elapsed = 0.0;
            }
            (tx.current, sample.cell.map(|c| tx.origin_for(c)), fired)
        };
        if current == owner {
            self.refresh_drag_placement(owner, origin)?;
        }
        if hold_fired {
            self.hold_action(owner)?;
        }
        Ok(())
    }

    /// Touch hold: open the hovered closed container, or close the container
    /// grid the pointer has left.
    fn hold_action(&mut self, grid: GridId) -> InventoryResult<()> {
        let g = self.grid(grid)?;
        let hovered_container = g
            .hovered
            .and_then(|id| g.occupant(id))
            .filter(|o| o.is_container() && g.open_container != Some(o.id))
            .map(|o| o.id);
        let leave = g.parent.is_some() && g.pointer_cell.is_none();
        if let Some(container) = hovered_container {
            log::debug!("[Drag] Hold over container {} in {}.", container, grid);
            self.open_container(grid, container)?;
        } else if leave {
            log::debug!("[Drag] Hold outside {}.", grid);
            self.close_container(grid)?;
        }
        Ok(())
    }
}

/// Puts a copy of the held occupant among the resting ones: onto the stack at
/// its origin, else its own footprint, else the first free slot.
fn settle_held_copy(resting: &mut Vec<Occupant>, mut held: Occupant, config: &GridConfig) {
    let mut count = held.stack_count();
    if let Some(stack) = resting
        .iter_mut()
        .find(|o| o.coords() == held.coords() && o.can_stack_with(&held.definition) && o.has_stack_room())
    {
        count = stack.try_add_to_stack(count);
        if count == 0 {
            return;
        }
    }
    let def = held.definition.clone();
    let at_origin = classify_placement(&def, config, resting.as_slice(), None, held.coords(), held.orientation());
    let home = if at_origin.result == PlacementResult::Clear {
        Some((held.coords(), held.orientation()))
    } else {
        find_placement(&def, config, resting.as_slice(), None)
    };
    match home {
        Some((coords, orientation)) => {
            held.set_position(GridPosition::new(coords, orientation, count), config.width);
            resting.push(held);
        }
        None => log::warn!("[Inventory] No room to record held {} x{} in the snapshot.", held.id, count),
    }
}

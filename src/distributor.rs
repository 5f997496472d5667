/******************************************************************************
 *                                                                            *
 * Placement and stack distribution. Everything here is generic over          *
 * `GridOccupant`, so the same search runs against a grid's live occupants    *
 * and against the scratch stubs used for feasibility checks.                 *
 *                                                                            *
 ******************************************************************************/

use std::sync::Arc;

use crate::config::GridConfig;
use crate::items::ItemDefinition;
use crate::models::{AutoAddResult, Coords, GridPosition, Orientation, PlacementResult};
use crate::occupant::{occupying_indices, GridOccupant, OccupantId};

// --- Overlap ---

fn intersects<O: GridOccupant>(occupant: &O, indices: &[usize]) -> bool {
    occupant.occupying_indices().iter().any(|i| indices.contains(i))
}

fn is_excluded<O: GridOccupant>(occupant: &O, exclude: Option<OccupantId>) -> bool {
    exclude.map_or(false, |id| occupant.id() == id)
}

/// Occupants covering any of `target`, skipping `exclude`. Each occupant appears once.
pub fn overlapping<'a, O: GridOccupant>(occupants: &'a [O], exclude: Option<OccupantId>, target: &[usize]) -> Vec<&'a O> {
    occupants
        .iter()
        .filter(|o| !is_excluded(*o, exclude) && intersects(*o, target))
        .collect()
}

pub fn item_in_cell<O: GridOccupant>(occupants: &[O], index: usize, exclude: Option<OccupantId>) -> Option<&O> {
    occupants.iter().find(|o| !is_excluded(*o, exclude) && o.covers(index))
}

fn is_clear<O: GridOccupant>(occupants: &[O], exclude: Option<OccupantId>, target: &[usize]) -> bool {
    !occupants.iter().any(|o| !is_excluded(o, exclude) && intersects(o, target))
}

// --- Placement search ---

/// First clear slot in column-major order, trying `Up` before `Right` at each
/// coordinate. The sideways attempt is skipped for square footprints.
pub fn find_placement<O: GridOccupant>(
    def: &ItemDefinition,
    config: &GridConfig,
    occupants: &[O],
    exclude: Option<OccupantId>,
) -> Option<(Coords, Orientation)> {
    if def.is_container() && !config.can_hold_containers {
        return None;
    }
    let geometry = config.geometry();
    let square = def.dimensions.0 == def.dimensions.1;
    for coords in geometry.scan_coords() {
        for orientation in [Orientation::Up, Orientation::Right] {
            if orientation == Orientation::Right && square {
                continue;
            }
            if let Some(indices) = geometry.footprint_indices(coords, def.dimensions, orientation) {
                if is_clear(occupants, exclude, &indices) {
                    return Some((coords, orientation));
                }
            }
        }
    }
    None
}

/// A classified candidate footprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub result: PlacementResult,
    pub origin: Coords,
    pub orientation: Orientation,
    /// Covered cells; empty when off-grid.
    pub indices: Vec<usize>,
    pub overlapping: Vec<OccupantId>,
}

impl Placement {
    pub fn off_grid(origin: Coords, orientation: Orientation) -> Self {
        Placement {
            result: PlacementResult::OffGrid,
            origin,
            orientation,
            indices: Vec::new(),
            overlapping: Vec::new(),
        }
    }

    /// The stack a drop would merge into.
    pub fn stack_target(&self) -> Option<OccupantId> {
        match self.result {
            PlacementResult::OverlappingStackable => self.overlapping.first().copied(),
            _ => None,
        }
    }
}

pub fn classify_placement<O: GridOccupant>(
    def: &ItemDefinition,
    config: &GridConfig,
    occupants: &[O],
    exclude: Option<OccupantId>,
    origin: Coords,
    orientation: Orientation,
) -> Placement {
    if def.is_container() && !config.can_hold_containers {
        return Placement::off_grid(origin, orientation);
    }
    let indices = match config.geometry().footprint_indices(origin, def.dimensions, orientation) {
        Some(indices) => indices,
        None => return Placement::off_grid(origin, orientation),
    };
    let hits = overlapping(occupants, exclude, &indices);
    let result = match hits.as_slice() {
        [] => PlacementResult::Clear,
        [only] if only.can_stack_with(def) && only.has_stack_room() => PlacementResult::OverlappingStackable,
        _ => PlacementResult::OverlappingExisting,
    };
    let overlapping = hits.iter().map(|o| o.id()).collect();
    Placement { result, origin, orientation, indices, overlapping }
}

// --- Stack distribution ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackTopOff {
    /// Position of the topped-off occupant in the slice handed to `distribute`.
    pub slot: usize,
    pub occupant: OccupantId,
    pub added: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Distribution {
    pub whole_stacks: u32,
    pub remainder: u32,
    pub top_offs: Vec<StackTopOff>,
}

impl Distribution {
    pub fn absorbed(&self) -> u32 {
        self.top_offs.iter().map(|t| t.added).sum()
    }

    /// Counts of the new stacks still to be placed: whole stacks first, then the remainder.
    pub fn new_stack_counts(&self, stack_size: u32) -> impl Iterator<Item = u32> {
        let remainder = (self.remainder > 0).then_some(self.remainder);
        std::iter::repeat(stack_size).take(self.whole_stacks as usize).chain(remainder)
    }
}

/// Tops off existing same-definition stacks in column-major order of their
/// origins, then splits what is left into whole stacks and a remainder.
/// With `apply` false nothing is mutated.
pub fn distribute<O: GridOccupant>(def: &ItemDefinition, occupants: &mut [O], total: u32, apply: bool) -> Distribution {
    if def.stack_size <= 1 {
        return Distribution { whole_stacks: total, remainder: 0, top_offs: Vec::new() };
    }

    let mut order: Vec<usize> = occupants
        .iter()
        .enumerate()
        .filter(|(_, o)| o.can_stack_with(def) && o.has_stack_room())
        .map(|(slot, _)| slot)
        .collect();
    order.sort_by_key(|&slot| {
        let coords = occupants[slot].grid_position().coords;
        (coords.x, coords.y)
    });

    let mut remaining = total;
    let mut top_offs = Vec::new();
    for slot in order {
        if remaining == 0 {
            break;
        }
        let occupant = &mut occupants[slot];
        let room = occupant.definition().stack_size.saturating_sub(occupant.stack_count());
        let added = remaining.min(room);
        if added == 0 {
            continue;
        }
        if apply {
            let leftover = occupant.try_add_to_stack(added);
            debug_assert_eq!(leftover, 0);
        }
        top_offs.push(StackTopOff { slot, occupant: occupant.id(), added });
        remaining -= added;
    }

    log::debug!(
        "[Distribute] '{}' x{}: topped off {} stack(s), {} left over",
        def.config_id,
        total,
        top_offs.len(),
        remaining
    );
    Distribution {
        whole_stacks: remaining / def.stack_size,
        remainder: remaining % def.stack_size,
        top_offs,
    }
}

// --- Feasibility ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StubOrigin {
    Existing(OccupantId),
    Planned(usize),
}

/// Data-only stand-in used while staging trial placements.
#[derive(Clone, Debug)]
pub struct PlacementStub {
    origin: StubOrigin,
    definition: Arc<ItemDefinition>,
    position: GridPosition,
    indices: Vec<usize>,
}

impl GridOccupant for PlacementStub {
    fn id(&self) -> OccupantId {
        match self.origin {
            StubOrigin::Existing(id) => id,
            StubOrigin::Planned(_) => OccupantId::SCRATCH,
        }
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

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedStack {
    pub definition: Arc<ItemDefinition>,
    pub coords: Coords,
    pub orientation: Orientation,
    pub count: u32,
}

/// What an auto-add would do: top-offs of existing stacks plus new stacks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutoAddPlan {
    pub top_offs: Vec<(OccupantId, u32)>,
    pub stacks: Vec<PlannedStack>,
    pub placed_units: u32,
    pub unplaced_units: u32,
}

impl AutoAddPlan {
    pub fn result(&self) -> AutoAddResult {
        if self.unplaced_units == 0 {
            AutoAddResult::FullyFits
        } else if self.placed_units == 0 {
            AutoAddResult::NoneFits
        } else {
            AutoAddResult::PartiallyFits
        }
    }

    fn add_top_off(&mut self, id: OccupantId, added: u32) {
        match self.top_offs.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, total)) => *total += added,
            None => self.top_offs.push((id, added)),
        }
    }
}

/// Reusable buffer for trial placements. Cleared on every call; real
/// occupants are only ever read.
#[derive(Debug, Default)]
pub struct PlacementScratch {
    stubs: Vec<PlacementStub>,
}

impl PlacementScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages distribution and placement for every `(definition, count)` in
    /// order, so later entries see the stacks planned for earlier ones.
    pub fn plan<O: GridOccupant>(
        &mut self,
        batch: &[(Arc<ItemDefinition>, u32)],
        config: &GridConfig,
        occupants: &[O],
        exclude: Option<OccupantId>,
    ) -> AutoAddPlan {
        self.stubs.clear();
        self.stubs.extend(occupants.iter().filter(|o| !is_excluded(*o, exclude)).map(|o| PlacementStub {
            origin: StubOrigin::Existing(o.id()),
            definition: o.definition().clone(),
            position: o.grid_position(),
            indices: o.occupying_indices().to_vec(),
        }));

        let mut plan = AutoAddPlan::default();
        for (def, count) in batch {
            let distribution = distribute(def, &mut self.stubs, *count, true);
            for top in &distribution.top_offs {
                match self.stubs[top.slot].origin {
                    StubOrigin::Existing(id) => plan.add_top_off(id, top.added),
                    StubOrigin::Planned(i) => plan.stacks[i].count += top.added,
                }
            }
            plan.placed_units += distribution.absorbed();

            for stack_count in distribution.new_stack_counts(def.stack_size) {
                match find_placement(def, config, &self.stubs, None) {
                    Some((coords, orientation)) => {
                        self.stubs.push(PlacementStub {
                            origin: StubOrigin::Planned(plan.stacks.len()),
                            definition: def.clone(),
                            position: GridPosition::new(coords, orientation, stack_count),
                            indices: occupying_indices(coords, def.dimensions, orientation, config.width),
                        });
                        plan.stacks.push(PlannedStack { definition: def.clone(), coords, orientation, count: stack_count });
                        plan.placed_units += stack_count;
                    }
                    None => plan.unplaced_units += stack_count,
                }
            }
        }
        self.stubs.clear();
        plan
    }

    pub fn auto_add_result<O: GridOccupant>(
        &mut self,
        batch: &[(Arc<ItemDefinition>, u32)],
        config: &GridConfig,
        occupants: &[O],
        exclude: Option<OccupantId>,
    ) -> AutoAddResult {
        self.plan(batch, config, occupants, exclude).result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupant::Occupant;

    fn def(id: &str, dims: (u32, u32), stack: u32) -> Arc<ItemDefinition> {
        Arc::new(ItemDefinition::new(id, dims, stack))
    }

    fn place(id: u64, def: &Arc<ItemDefinition>, x: i32, y: i32, count: u32, width: u32) -> Occupant {
        let pos = GridPosition::new(Coords::new(x, y), Orientation::Up, count);
        Occupant::new(OccupantId(id), format!("inst-{id}"), def.clone(), pos, width)
    }

    #[test]
    fn scan_fills_columns_before_rows() {
        let config = GridConfig::new(2, 2);
        let pebble = def("pebble", (1, 1), 1);
        let occupants = vec![place(1, &pebble, 0, 0, 1, 2)];
        assert_eq!(find_placement(&pebble, &config, &occupants, None), Some((Coords::new(0, 1), Orientation::Up)));
    }

    #[test]
    fn falls_back_to_sideways_footprint() {
        let config = GridConfig::new(3, 1);
        let rod = def("rod", (1, 2), 1);
        let empty: Vec<Occupant> = Vec::new();
        assert_eq!(find_placement(&rod, &config, &empty, None), Some((Coords::new(0, 0), Orientation::Right)));
    }

    #[test]
    fn excluded_occupant_does_not_block() {
        let config = GridConfig::new(1, 1);
        let gem = def("gem", (1, 1), 1);
        let occupants = vec![place(7, &gem, 0, 0, 1, 1)];
        assert_eq!(find_placement(&gem, &config, &occupants, None), None);
        assert_eq!(find_placement(&gem, &config, &occupants, Some(OccupantId(7))), Some((Coords::new(0, 0), Orientation::Up)));
    }

    #[test]
    fn containers_rejected_by_grids_that_cannot_hold_them() {
        let config = GridConfig::new(4, 4).without_containers();
        let pouch = Arc::new(ItemDefinition::new("pouch", (1, 1), 1).container(GridConfig::new(2, 2)));
        let empty: Vec<Occupant> = Vec::new();
        assert_eq!(find_placement(&pouch, &config, &empty, None), None);
        let placement = classify_placement(&pouch, &config, &empty, None, Coords::new(0, 0), Orientation::Up);
        assert_eq!(placement.result, PlacementResult::OffGrid);
    }

    #[test]
    fn classification_covers_every_outcome() {
        let config = GridConfig::new(3, 3);
        let arrow = def("arrow", (1, 1), 5);
        let shield = def("shield", (2, 2), 1);
        let occupants = vec![place(1, &arrow, 0, 0, 2, 3), place(2, &arrow, 1, 0, 5, 3)];

        let at = |x, y, d: &Arc<ItemDefinition>| classify_placement(d, &config, &occupants, None, Coords::new(x, y), Orientation::Up);

        assert_eq!(at(2, 2, &arrow).result, PlacementResult::Clear);
        let onto = at(0, 0, &arrow);
        assert_eq!(onto.result, PlacementResult::OverlappingStackable);
        assert_eq!(onto.stack_target(), Some(OccupantId(1)));
        // full stack has no room
        assert_eq!(at(1, 0, &arrow).result, PlacementResult::OverlappingExisting);
        // two overlaps never stack
        assert_eq!(at(0, 0, &shield).result, PlacementResult::OverlappingExisting);
        assert_eq!(at(2, 2, &shield).result, PlacementResult::OffGrid);
        assert_eq!(at(-1, 0, &arrow).result, PlacementResult::OffGrid);
    }

    #[test]
    fn overlapping_is_deduplicated() {
        let slab = def("slab", (2, 2), 1);
        let occupants = vec![place(1, &slab, 0, 0, 1, 4)];
        let hits = overlapping(&occupants, None, &[0, 1, 4, 5]);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn distribute_tops_off_before_new_stacks() {
        let coin = def("coin", (1, 1), 5);
        let mut occupants = vec![place(1, &coin, 1, 0, 4, 2), place(2, &coin, 0, 1, 3, 2)];

        let dry = distribute(&coin, &mut occupants, 9, false);
        assert_eq!(occupants[0].stack_count(), 4);
        // column 0 first
        assert_eq!(dry.top_offs[0].occupant, OccupantId(2));
        assert_eq!(dry.absorbed(), 3);
        assert_eq!((dry.whole_stacks, dry.remainder), (1, 1));

        let applied = distribute(&coin, &mut occupants, 9, true);
        assert_eq!(applied, dry);
        assert_eq!(occupants[0].stack_count(), 5);
        assert_eq!(occupants[1].stack_count(), 5);
        assert_eq!(applied.new_stack_counts(5).collect::<Vec<_>>(), vec![5, 1]);
    }

    #[test]
    fn unstackable_distribution_is_one_per_unit() {
        let sword = def("sword", (1, 2), 1);
        let mut empty: Vec<Occupant> = Vec::new();
        let result = distribute(&sword, &mut empty, 3, true);
        assert_eq!((result.whole_stacks, result.remainder), (3, 0));
        assert_eq!(result.new_stack_counts(1).count(), 3);
    }

    #[test]
    fn plan_leaves_real_occupants_untouched() {
        let config = GridConfig::new(2, 1);
        let coin = def("coin", (1, 1), 5);
        let occupants = vec![place(1, &coin, 0, 0, 3, 2)];
        let mut scratch = PlacementScratch::new();

        let plan = scratch.plan(&[(coin.clone(), 4), (coin.clone(), 2)], &config, &occupants, None);
        assert_eq!(plan.top_offs, vec![(OccupantId(1), 2)]);
        assert_eq!(plan.stacks.len(), 1);
        // second batch entry topped off the planned stack
        assert_eq!(plan.stacks[0].count, 4);
        assert_eq!(plan.result(), AutoAddResult::FullyFits);
        assert_eq!(occupants[0].stack_count(), 3);

        let plan = scratch.plan(&[(coin.clone(), 12)], &config, &occupants, None);
        assert_eq!(plan.placed_units, 7);
        assert_eq!(plan.unplaced_units, 5);
        assert_eq!(plan.result(), AutoAddResult::PartiallyFits);

        let full = vec![place(1, &coin, 0, 0, 5, 2), place(2, &coin, 1, 0, 5, 2)];
        assert_eq!(scratch.auto_add_result(&[(coin, 1)], &config, &full, None), AutoAddResult::NoneFits);
    }
}

use std::time::Duration;

use std::collections::HashSet;

use grid_inventory::{
    decompile, Coords, DropOutcome, EngineConfig, GridConfig, GridId, GridOccupant, Inventory, InventoryError,
    InventoryEvent, ItemCatalog, ItemDefinition, OccupantIds, Orientation, PlacementResult, PointerSample, ResetOutcome,
};

const FRAME: Duration = Duration::from_millis(16);

fn catalog() -> ItemCatalog {
    ItemCatalog::from_definitions([
        ItemDefinition::new("arrow", (1, 1), 5),
        ItemDefinition::new("sword", (1, 2), 1).rotatable(),
        ItemDefinition::new("pouch", (1, 1), 1).container(GridConfig::new(2, 2)),
        ItemDefinition::new("bar", (2, 1), 1),
    ])
}

fn open_grid(inv: &mut Inventory<ItemCatalog>, width: u32, height: u32) -> GridId {
    let id = inv.create_grid(GridConfig::new(width, height));
    inv.open_inventory(id).unwrap();
    id
}

fn point(inv: &mut Inventory<ItemCatalog>, x: i32, y: i32) {
    let sample = PointerSample::at((x as f32 * 40.0, y as f32 * 40.0), Coords::new(x, y));
    inv.tick(FRAME, Some(sample)).unwrap();
}

fn move_pointer(inv: &mut Inventory<ItemCatalog>, from: GridId, to: GridId, x: i32, y: i32) {
    inv.pointer_exit(from).unwrap();
    inv.pointer_enter(to).unwrap();
    point(inv, x, y);
}

fn total_arrows(inv: &Inventory<ItemCatalog>, grids: &[GridId]) -> u32 {
    grids
        .iter()
        .flat_map(|g| inv.grid(*g).unwrap().occupants())
        .filter(|o| o.definition.config_id == "arrow")
        .map(|o| o.stack_count())
        .sum()
}

fn assert_no_shared_cells(inv: &Inventory<ItemCatalog>, grid: GridId) {
    let mut seen = HashSet::new();
    for o in inv.grid(grid).unwrap().occupants() {
        for index in o.occupying_indices() {
            assert!(seen.insert(*index), "cell {} claimed twice", index);
        }
    }
}

#[test]
fn partial_stack_transfer_keeps_the_remainder_held() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 2);
    let b = open_grid(&mut inv, 2, 2);
    let source = inv.auto_add_items(a, &[("arrow", 3)], false).unwrap()[0];
    inv.auto_add_items(b, &[("arrow", 4)], false).unwrap();

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 0);
    let held = inv.grab(a, source, 0).unwrap();
    assert_eq!(held, source);

    move_pointer(&mut inv, a, b, 0, 0);
    assert_eq!(inv.drag().map(|tx| tx.current), Some(b));
    assert_eq!(inv.grid(b).unwrap().placement_result(), Some(PlacementResult::OverlappingStackable));
    assert_eq!(inv.grid(a).unwrap().placement_result(), Some(PlacementResult::OffGrid));

    match inv.drop_item(0).unwrap() {
        DropOutcome::Stacked { transferred, remaining, .. } => assert_eq!((transferred, remaining), (1, 2)),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(inv.drag().map(|tx| tx.grabbed_stack_count), Some(2));
    // the target is now full
    assert_eq!(inv.grid(b).unwrap().placement_result(), Some(PlacementResult::OverlappingExisting));
    assert_eq!(total_arrows(&inv, &[a, b]), 7);

    assert_eq!(inv.cancel_grab().unwrap(), ResetOutcome::Restored);
    assert!(inv.drag().is_none());
    let rest = inv.grid(a).unwrap().occupant_at(Coords::new(0, 0)).unwrap();
    assert_eq!(rest.stack_count(), 2);
    assert_eq!(total_arrows(&inv, &[a, b]), 7);
}

#[test]
fn full_drop_moves_the_occupant_between_grids() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 2);
    let b = open_grid(&mut inv, 3, 3);
    let sword = inv.auto_add_items(a, &[("sword", 1)], false).unwrap()[0];
    inv.drain_events();

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 1);
    inv.grab(a, sword, 0).unwrap();
    // grabbed by its lower cell
    assert_eq!(inv.drag().map(|tx| tx.grab_offset), Some(Coords::new(0, 1)));

    move_pointer(&mut inv, a, b, 2, 2);
    assert_eq!(inv.grid(b).unwrap().placement_result(), Some(PlacementResult::Clear));
    assert_eq!(inv.drop_item(0).unwrap(), DropOutcome::Placed { grid: b, occupant: sword });

    assert!(inv.grid(a).unwrap().occupants().is_empty());
    let moved = inv.grid(b).unwrap().occupant(sword).unwrap();
    assert_eq!(moved.coords(), Coords::new(2, 1));
    assert!(moved.is_live());
    assert!(inv.grid(a).unwrap().is_modified());
    assert!(inv.grid(b).unwrap().is_modified());

    let events = inv.drain_events();
    assert!(events.contains(&InventoryEvent::OccupantRemoved { grid: a, occupant: sword }));
    assert!(events.contains(&InventoryEvent::Dropped { grid: b, occupant: sword, full: true }));

    inv.close_inventory(a).unwrap();
    let modified = inv.drain_events().into_iter().find_map(|e| match e {
        InventoryEvent::CompositionModified { grid, collection } => Some((grid, collection)),
        _ => None,
    });
    let (grid, collection) = modified.expect("closing a changed grid reports its composition");
    assert_eq!(grid, a);
    assert!(collection.is_empty());
}

#[test]
fn splitting_onto_a_clear_cell_leaves_the_rest_held() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 3, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 5)], false).unwrap()[0];

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 0);
    let held = inv.grab(a, arrows, 2).unwrap();
    assert_ne!(held, arrows);
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().stack_count(), 3);

    point(&mut inv, 2, 0);
    match inv.drop_item(1).unwrap() {
        DropOutcome::PlacedPartial { remaining, occupant, .. } => {
            assert_eq!(remaining, 1);
            assert_eq!(inv.grid(a).unwrap().occupant(occupant).unwrap().coords(), Coords::new(2, 0));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(total_arrows(&inv, &[a]), 5);

    // back over the source stack: the last unit merges home
    point(&mut inv, 0, 0);
    assert!(matches!(inv.drop_item(0).unwrap(), DropOutcome::Stacked { remaining: 0, .. }));
    assert!(inv.drag().is_none());
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().stack_count(), 4);
    assert_eq!(total_arrows(&inv, &[a]), 5);
}

#[test]
fn cancelled_split_merges_back_into_its_stack() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 4)], false).unwrap()[0];

    inv.grab(a, arrows, 2).unwrap();
    assert_eq!(inv.cancel_grab().unwrap(), ResetOutcome::Merged { target: arrows });
    assert_eq!(inv.grid(a).unwrap().occupants().len(), 1);
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().stack_count(), 4);
}

#[test]
fn blocked_origin_falls_back_to_auto_placement() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 5)], false).unwrap()[0];

    let held = inv.grab(a, arrows, 2).unwrap();
    // refill the stack the split came from
    inv.auto_add_items(a, &[("arrow", 2)], false).unwrap();
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().stack_count(), 5);

    assert_eq!(
        inv.cancel_grab().unwrap(),
        ResetOutcome::Relocated { coords: Coords::new(1, 0), orientation: Orientation::Up }
    );
    assert_eq!(inv.grid(a).unwrap().occupant(held).unwrap().coords(), Coords::new(1, 0));
    assert_eq!(total_arrows(&inv, &[a]), 7);
}

#[test]
fn reset_with_no_room_is_fatal_and_keeps_the_drag() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 1, 1);
    let b = open_grid(&mut inv, 1, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 5)], false).unwrap()[0];

    let held = inv.grab(a, arrows, 2).unwrap();
    inv.auto_add_items(a, &[("arrow", 2)], false).unwrap();
    inv.drain_events();

    let err = inv.reset_to_source().unwrap_err();
    assert_eq!(err, InventoryError::PlacementExhausted { config_id: "arrow".into(), grid: a.0 });
    assert_eq!(inv.drag().map(|tx| tx.occupant), Some(held));
    assert!(inv.drain_events().contains(&InventoryEvent::FatalPlacement { grid: a, occupant: held }));

    // the item can still land somewhere else
    inv.pointer_enter(a).unwrap();
    move_pointer(&mut inv, a, b, 0, 0);
    assert_eq!(inv.drop_item(0).unwrap(), DropOutcome::Placed { grid: b, occupant: held });
}

#[test]
fn second_grab_is_a_contract_violation() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 2);
    let ids = inv.auto_add_items(a, &[("sword", 1), ("arrow", 1)], false).unwrap();
    inv.grab(a, ids[0], 0).unwrap();
    assert!(matches!(inv.grab(a, ids[1], 0), Err(InventoryError::InvalidTransactionState(_))));
    assert_eq!(inv.drag().map(|tx| tx.occupant), Some(ids[0]));
    assert!(inv.drop_item(0).is_ok());
    assert!(matches!(inv.drop_item(0), Err(InventoryError::InvalidTransactionState(_))));
}

#[test]
fn rotation_reclassifies_the_hover() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 2);
    let sword = inv.auto_add_items(a, &[("sword", 1)], false).unwrap()[0];

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 1, 0);
    inv.grab(a, sword, 0).unwrap();
    // pointer outside the footprint: origin follows the pointer
    assert_eq!(inv.grid(a).unwrap().placement_result(), Some(PlacementResult::Clear));

    inv.rotate(false).unwrap();
    assert_eq!(inv.drag().map(|tx| tx.orientation), Some(Orientation::Left));
    assert_eq!(inv.grid(a).unwrap().placement_result(), Some(PlacementResult::OffGrid));

    inv.rotate(true).unwrap();
    inv.rotate(true).unwrap();
    assert_eq!(inv.drag().map(|tx| tx.orientation), Some(Orientation::Right));
    point(&mut inv, 0, 1);
    assert_eq!(inv.drop_item(0).unwrap(), DropOutcome::Placed { grid: a, occupant: sword });
    let placed = inv.grid(a).unwrap().occupant(sword).unwrap();
    assert_eq!(placed.occupying_indices(), &[2, 3]);
}

#[test]
fn reset_into_a_closed_container_bumps_it() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let root = open_grid(&mut inv, 2, 2);
    let pouch = inv.auto_add_items(root, &[("pouch", 1)], false).unwrap()[0];
    let nested = inv.open_container(root, pouch).unwrap();
    let arrows = inv.auto_add_items(nested, &[("arrow", 3)], false).unwrap()[0];

    inv.pointer_enter(nested).unwrap();
    point(&mut inv, 0, 0);
    inv.grab(nested, arrows, 0).unwrap();

    inv.close_container(nested).unwrap();
    assert!(!inv.grid(nested).unwrap().is_open());
    assert_eq!(inv.drag().map(|tx| tx.current), Some(root));
    inv.drain_events();

    assert_eq!(inv.cancel_grab().unwrap(), ResetOutcome::Restored);
    assert!(inv.drain_events().contains(&InventoryEvent::ContainerBumped { grid: root, container: pouch }));
    assert_eq!(inv.grid(root).unwrap().bump().map(|(id, _)| id), Some(pouch));
    assert!(!inv.grid(nested).unwrap().occupant(arrows).unwrap().is_live());
}

#[test]
fn dropping_a_container_keeps_its_contents() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 2);
    let b = open_grid(&mut inv, 2, 2);
    let pouch = inv.auto_add_items(a, &[("pouch", 1)], false).unwrap()[0];
    let nested = inv.open_container(a, pouch).unwrap();
    inv.auto_add_items(nested, &[("arrow", 4)], false).unwrap();

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 0);
    inv.grab(a, pouch, 0).unwrap();
    // grabbing an open container closes it
    assert!(!inv.grid(nested).unwrap().is_open());

    move_pointer(&mut inv, a, b, 1, 1);
    assert_eq!(inv.drop_item(0).unwrap(), DropOutcome::Placed { grid: b, occupant: pouch });
    assert_eq!(inv.grid(nested).unwrap().parent.map(|l| l.grid), Some(b));
    assert_eq!(inv.root_of(nested).unwrap(), b);

    let collection = inv.compile_grid(b).unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.occupants[1].parent_subgrid_index, collection.occupants[0].child_subgrid_index);
}

#[test]
fn auto_add_during_a_drag_leaves_the_held_stack_alone() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 3, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 2)], false).unwrap()[0];

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 0);
    inv.grab(a, arrows, 0).unwrap();

    let added = inv.auto_add_items(a, &[("arrow", 2)], false).unwrap();
    assert_eq!(added.len(), 1);
    assert_ne!(added[0], arrows);
    // the held item's old cells are free for new stacks
    assert_eq!(inv.grid(a).unwrap().occupant(added[0]).unwrap().coords(), Coords::new(0, 0));
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().stack_count(), 2);
    assert_eq!(inv.drag().map(|tx| tx.grabbed_stack_count), Some(2));

    point(&mut inv, 2, 0);
    assert_eq!(inv.drop_item(0).unwrap(), DropOutcome::Placed { grid: a, occupant: arrows });
    assert!(inv.drag().is_none());
    assert_eq!(inv.grid(a).unwrap().occupant(arrows).unwrap().coords(), Coords::new(2, 0));
    assert_eq!(total_arrows(&inv, &[a]), 4);
    assert_no_shared_cells(&inv, a);
}

#[test]
fn drop_rechecks_cells_filled_after_the_last_hover() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 3, 1);
    let arrow = inv.auto_add_items(a, &[("arrow", 1)], false).unwrap()[0];

    inv.pointer_enter(a).unwrap();
    point(&mut inv, 0, 0);
    inv.grab(a, arrow, 0).unwrap();
    point(&mut inv, 1, 0);
    assert_eq!(inv.grid(a).unwrap().placement_result(), Some(PlacementResult::Clear));

    // the bar takes the held arrow's old cell and the hovered one
    let bar = inv.auto_add_items(a, &[("bar", 1)], false).unwrap()[0];
    assert_eq!(inv.grid(a).unwrap().occupant(bar).unwrap().occupying_indices(), &[0, 1]);
    assert_eq!(inv.grid(a).unwrap().placement_result(), Some(PlacementResult::OverlappingExisting));

    assert_eq!(
        inv.drop_item(0).unwrap(),
        DropOutcome::Reset(ResetOutcome::Relocated { coords: Coords::new(2, 0), orientation: Orientation::Up })
    );
    assert_no_shared_cells(&inv, a);
}

#[test]
fn snapshot_during_a_split_keeps_every_unit() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let a = open_grid(&mut inv, 2, 1);
    let arrows = inv.auto_add_items(a, &[("arrow", 5)], false).unwrap()[0];
    inv.grab(a, arrows, 2).unwrap();

    // the split folds back into its stack
    let collection = inv.compile_grid(a).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.occupants[0].grid_position.stack_count, 5);

    // with the source stack refilled, the split gets a cell of its own
    inv.auto_add_items(a, &[("arrow", 2)], false).unwrap();
    let collection = inv.compile_grid(a).unwrap();
    let tree = decompile(&collection, &catalog(), &GridConfig::new(2, 1), &mut OccupantIds::default());
    assert!(tree.issues.is_empty(), "{:?}", tree.issues);
    let units: u32 = tree.occupants.iter().map(|o| o.stack_count()).sum();
    assert_eq!(units, 7);
    assert_eq!(inv.drag().map(|tx| tx.grabbed_stack_count), Some(2));
}

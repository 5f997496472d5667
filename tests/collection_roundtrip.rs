use grid_inventory::{
    compile, decompile, Coords, EngineConfig, FlatOccupantRecord, GridConfig, GridOccupant, GridPosition, Inventory,
    InventoryEvent, ItemCatalog, ItemCollection, ItemDefinition, Occupant, OccupantIds, Orientation,
};

fn catalog() -> ItemCatalog {
    ItemCatalog::from_definitions([
        ItemDefinition::new("ore", (1, 1), 20),
        ItemDefinition::new("pick", (1, 2), 1).rotatable(),
        ItemDefinition::new("satchel", (1, 1), 1).container(GridConfig::new(2, 2)),
        ItemDefinition::new("crate", (2, 2), 1).container(GridConfig::new(3, 3)),
    ])
}

fn record(config: &str, id: &str, x: i32, y: i32, orientation: Orientation, count: u32, parent: u32, child: u32) -> FlatOccupantRecord {
    FlatOccupantRecord {
        item_config_id: config.into(),
        item_instance_id: id.into(),
        grid_position: GridPosition::new(Coords::new(x, y), orientation, count),
        parent_subgrid_index: parent,
        child_subgrid_index: child,
    }
}

/// crate (root) > satchel > ore, plus a sideways pick at the root.
fn nested_collection() -> ItemCollection {
    ItemCollection {
        occupants: vec![
            record("crate", "crate-1", 0, 0, Orientation::Up, 1, 0, 1),
            record("satchel", "satchel-1", 2, 2, Orientation::Up, 1, 1, 2),
            record("ore", "ore-1", 1, 0, Orientation::Up, 17, 2, 0),
            record("ore", "ore-2", 0, 0, Orientation::Up, 3, 1, 0),
            record("pick", "pick-1", 2, 0, Orientation::Right, 1, 0, 0),
        ],
    }
}

/// (config, coords, orientation, count) per level, sorted, with the nested
/// levels flattened beneath their container.
fn shape(occupants: &[Occupant]) -> Vec<String> {
    let mut lines: Vec<String> = occupants
        .iter()
        .map(|o| {
            let inner = shape(o.sub_occupants()).join(",");
            format!(
                "{}@{},{}:{:?}x{}[{}]",
                o.definition.config_id,
                o.coords().x,
                o.coords().y,
                o.orientation(),
                o.stack_count(),
                inner
            )
        })
        .collect();
    lines.sort();
    lines
}

#[test]
fn compile_after_decompile_reproduces_the_records() {
    let cat = catalog();
    let original = nested_collection();
    let mut ids = OccupantIds::default();
    let tree = decompile(&original, &cat, &GridConfig::new(4, 3), &mut ids);
    assert!(tree.issues.is_empty(), "{:?}", tree.issues);
    assert_eq!(tree.occupants.len(), 2);

    let recompiled = compile(&tree.occupants);
    assert_eq!(recompiled, original);

    let again = decompile(&recompiled, &cat, &GridConfig::new(4, 3), &mut ids);
    assert_eq!(shape(&again.occupants), shape(&tree.occupants));
}

#[test]
fn collection_survives_json() {
    let original = nested_collection();
    let json = original.to_json().unwrap();
    assert!(json.starts_with('['));
    assert_eq!(ItemCollection::from_json(&json).unwrap(), original);
}

#[test]
fn loaded_inventory_stays_staged_until_opened() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let root = inv.create_grid(GridConfig::new(4, 3));
    let issues = inv.load_collection(root, &nested_collection()).unwrap();
    assert!(issues.is_empty());

    let grid = inv.grid(root).unwrap();
    assert_eq!(grid.staged_occupants().count(), 2);
    assert_eq!(inv.grid_ids(), vec![root]);

    inv.open_inventory(root).unwrap();
    let grid = inv.grid(root).unwrap();
    assert_eq!(grid.staged_occupants().count(), 0);
    let crate_id = grid.occupant_at(Coords::new(1, 1)).unwrap().id;
    // the crate's grid is spawned closed, its contents staged
    let crate_grid = grid.occupant(crate_id).unwrap().nested_grid().unwrap();
    assert!(!inv.grid(crate_grid).unwrap().is_open());
    assert_eq!(inv.grid(crate_grid).unwrap().staged_occupants().count(), 2);

    let opened = inv.open_container(root, crate_id).unwrap();
    assert_eq!(opened, crate_grid);
    let satchel = inv.grid(crate_grid).unwrap().occupant_at(Coords::new(2, 2)).unwrap();
    assert!(satchel.is_live());
    let satchel_grid = satchel.nested_grid().unwrap();
    assert_eq!(inv.root_of(satchel_grid).unwrap(), root);
    assert_eq!(inv.ancestor_links(satchel_grid).len(), 2);

    // nothing changed, so the snapshot is the loaded collection
    assert_eq!(inv.compile_grid(root).unwrap(), nested_collection());

    inv.drain_events();
    inv.close_inventory(root).unwrap();
    let events = inv.drain_events();
    assert!(!events.iter().any(|e| matches!(e, InventoryEvent::CompositionModified { .. })));
    assert!(events.iter().any(|e| matches!(e, InventoryEvent::ContainerClosed { nested, .. } if *nested == crate_grid)));
    // nested grids are folded back into their containers
    assert_eq!(inv.grid_ids(), vec![root]);
    assert_eq!(inv.compile_grid(root).unwrap(), nested_collection());
}

#[test]
fn changes_inside_a_container_mark_the_root_modified() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let root = inv.create_grid(GridConfig::new(4, 3));
    inv.load_collection(root, &nested_collection()).unwrap();
    inv.open_inventory(root).unwrap();

    let crate_id = inv.grid(root).unwrap().occupant_at(Coords::new(0, 0)).unwrap().id;
    let crate_grid = inv.open_container(root, crate_id).unwrap();
    inv.auto_add_items(crate_grid, &[("ore", 30)], false).unwrap();
    assert!(inv.grid(root).unwrap().is_modified());

    inv.close_inventory(root).unwrap();
    let collection = inv
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            InventoryEvent::CompositionModified { collection, .. } => Some(collection),
            _ => None,
        })
        .expect("modified composition is reported on close");

    let ore_total: u32 = collection
        .occupants
        .iter()
        .filter(|r| r.item_config_id == "ore")
        .map(|r| r.grid_position.stack_count)
        .sum();
    assert_eq!(ore_total, 50);
    // ore-2 (3) was topped off to 20 first
    let ore_2 = collection.occupants.iter().find(|r| r.item_instance_id == "ore-2").unwrap();
    assert_eq!(ore_2.grid_position.stack_count, 20);
}

#[test]
fn bad_records_are_reported_and_the_rest_loads() {
    let mut inv = Inventory::new(catalog(), EngineConfig::default());
    let root = inv.create_grid(GridConfig::new(4, 3));
    let mut collection = nested_collection();
    collection.occupants.push(record("lantern", "lantern-1", 3, 2, Orientation::Up, 1, 0, 0));
    collection.occupants.push(record("ore", "stray", 0, 0, Orientation::Up, 1, 7, 0));

    let issues = inv.load_collection(root, &collection).unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(inv.grid(root).unwrap().occupants().len(), 2);
}

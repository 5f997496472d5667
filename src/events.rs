use std::collections::VecDeque;

use crate::collection::ItemCollection;
use crate::grid::GridId;
use crate::occupant::OccupantId;

/// Notifications for the view layer. The engine never waits on them.
#[derive(Clone, Debug, PartialEq)]
pub enum InventoryEvent {
    HoverEnter { grid: GridId, occupant: OccupantId },
    HoverExit { grid: GridId, occupant: OccupantId },
    Grabbed { grid: GridId, occupant: OccupantId, count: u32 },
    /// The held item was let go without landing (off-grid or blocked drop).
    Released { grid: GridId, occupant: OccupantId },
    Dropped { grid: GridId, occupant: OccupantId, full: bool },
    StackChanged { grid: GridId, occupant: OccupantId, count: u32 },
    Reset { grid: GridId, occupant: OccupantId },
    OccupantRemoved { grid: GridId, occupant: OccupantId },
    ContainerOpened { grid: GridId, container: OccupantId, nested: GridId },
    ContainerClosed { grid: GridId, container: OccupantId, nested: GridId },
    ContainerFull { grid: GridId, container: OccupantId },
    ContainerBumped { grid: GridId, container: OccupantId },
    CompositionModified { grid: GridId, collection: ItemCollection },
    /// A reset found no home for the item. The drag stays active.
    FatalPlacement { grid: GridId, occupant: OccupantId },
}

#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<InventoryEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: InventoryEvent) {
        self.pending.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<InventoryEvent> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

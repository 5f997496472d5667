use serde::{Deserialize, Serialize};

/// Cell coordinates inside a grid, `x` to the right and `y` downwards.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
}

impl Coords {
    pub const fn new(x: i32, y: i32) -> Self {
        Coords { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Coords { x: self.x + dx, y: self.y + dy }
    }
}

/// Four 90-degree rotation states. `Right` and `Left` swap the footprint's axes.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(into = "u8", try_from = "u8")]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub fn is_rotated(self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }

    /// Footprint `(width, height)` of `dimensions` in this orientation.
    pub fn footprint(self, dimensions: (u32, u32)) -> (u32, u32) {
        if self.is_rotated() {
            (dimensions.1, dimensions.0)
        } else {
            dimensions
        }
    }

    pub fn rotated_left(self) -> Self {
        Orientation::from_index((self.index() + 1) % 4)
    }

    pub fn rotated_right(self) -> Self {
        Orientation::from_index((self.index() + 3) % 4)
    }

    pub fn index(self) -> u8 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 1,
            Orientation::Down => 2,
            Orientation::Left => 3,
        }
    }

    fn from_index(i: u8) -> Self {
        match i {
            1 => Orientation::Right,
            2 => Orientation::Down,
            3 => Orientation::Left,
            _ => Orientation::Up,
        }
    }
}

impl From<Orientation> for u8 {
    fn from(o: Orientation) -> u8 {
        o.index()
    }
}

impl TryFrom<u8> for Orientation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 3 {
            return Err(format!("orientation {} out of range 0..3", value));
        }
        Ok(Orientation::from_index(value))
    }
}

/// Where an occupant sits in its grid, and how many units its stack holds.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GridPosition {
    #[serde(flatten)]
    pub coords: Coords,
    pub orientation: Orientation,
    pub stack_count: u32,
}

impl GridPosition {
    pub fn new(coords: Coords, orientation: Orientation, stack_count: u32) -> Self {
        GridPosition { coords, orientation, stack_count }
    }
}

/// Equipment slot an item can be worn in.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    #[default]
    None,
    Head,
    Necklace,
    UpperArmor,
    UpperClothing,
    HandItemLeft,
    HandItemRight,
    HandLeft,
    HandRight,
    RingLeft1,
    RingLeft2,
    RingRight1,
    RingRight2,
    LowerArmor,
    LowerClothing,
    FootLeft,
    FootRight,
}

/// Outcome of testing a candidate footprint against a grid's occupants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlacementResult {
    Clear,
    OffGrid,
    OverlappingExisting,
    OverlappingStackable,
}

/// Feasibility of auto-adding a batch of items.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AutoAddResult {
    FullyFits,
    PartiallyFits,
    NoneFits,
}

/// Highlight of a single cell relative to the item being moved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CellHighlight {
    #[default]
    None,
    Hover,
}

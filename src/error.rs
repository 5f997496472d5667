use thiserror::Error;

use crate::models::Coords;

/// Every failure the engine can report.
///
/// `InvalidTransactionState` is a programming error on the caller's side; every
/// other kind degrades gracefully (the item stays where it was or returns to
/// its previous resting place).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// No coordinate of the grid admits the item.
    #[error("no placement for item '{config_id}' in grid {grid}")]
    PlacementExhausted { config_id: String, grid: u32 },

    #[error("invalid drag transaction state: {0}")]
    InvalidTransactionState(&'static str),

    #[error("malformed collection record '{instance_id}': {reason}")]
    MalformedCollectionData { instance_id: String, reason: String },

    #[error("container {container} cannot hold '{config_id}'")]
    ContainerFull { container: u64, config_id: String },

    #[error("grid {0} is not registered")]
    UnknownGrid(u32),

    #[error("occupant {0} not found")]
    UnknownOccupant(u64),

    #[error("no item definition for config '{0}'")]
    UnknownItem(String),

    #[error("occupant at {coords:?} is not a container")]
    NotAContainer { coords: Coords },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for InventoryError {
    fn from(e: serde_json::Error) -> Self {
        InventoryError::Config(e.to_string())
    }
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

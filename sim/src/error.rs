//! Simulation error types.
//!
//! Host-facing mutators on [`crate::SimWorld`] return [`SimResult`]. Per-tick
//! work uses the same type internally: a failing block is logged and skipped
//! for that tick, it never aborts the schedule.

use glam::IVec3;
use thiserror::Error;

/// Top-level error enum for the reverser simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A host id was used that no grid is registered under.
    #[error("unknown grid id {0}")]
    UnknownGrid(u64),

    /// A host id was used that no block is registered under.
    #[error("unknown block id {0}")]
    UnknownBlock(u64),

    /// The host tried to register an id that is already in use.
    #[error("id {0} is already registered")]
    DuplicateId(u64),

    /// A block footprint overlaps a cell that is already occupied.
    #[error("grid {grid} cell {cell} is already occupied")]
    CellOccupied { grid: u64, cell: IVec3 },

    /// A footprint with a zero or negative extent.
    #[error("invalid block footprint {0}")]
    InvalidFootprint(IVec3),

    /// The door's opening sequence has no usable travel.
    #[error("door max open must be positive, got {0}")]
    InvalidDoorDefinition(f32),

    /// The block is registered but is not of the requested role.
    #[error("block {id} is not a {expected}")]
    WrongBlockKind { id: u64, expected: &'static str },

    /// A block refers to a grid entity that no longer exists.
    #[error("grid entity missing during '{context}'")]
    MissingGrid { context: &'static str },

    /// A block entity lacks a component its role requires.
    #[error("component missing during '{context}'")]
    MissingComponent { context: &'static str },

    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Convenience alias: a `Result` using `SimError` as the error type.
pub type SimResult<T> = Result<T, SimError>;

//! Thrust Reversers - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of thrust reverser blocks:
//! reversers find the thruster behind them, then turn part of its output into
//! a braking force on the grid. Uses `bevy_ecs` for the entity-component-system
//! architecture.

pub mod api;
pub mod compat;
pub mod components;
pub mod config;
pub mod error;
pub mod grid;
pub mod host_bridge;
pub mod systems;
pub mod world;

pub use api::{Footprint, SimWorld};
pub use compat::{ModInfo, ReverserContext, SessionInfo};
pub use components::*;
pub use config::{ReversePolicy, ReverserConfig};
pub use error::{SimError, SimResult};
pub use grid::{CubeGrid, GridPhysics};
pub use systems::*;
pub use world::Snapshot;

//! ECS Systems for the thrust reverser simulation.
//!
//! Systems contain the per-tick logic that operates on components.
//!
//! ## Tick Order
//!
//! One fixed tick runs these in sequence:
//!
//! 1. `clear_forces_system` - empties the previous tick's force buffer
//! 2. `sync_block_transforms_system` - derives block world transforms
//! 3. `linker_system` - drops dead links, probes for new ones
//! 4. `reverse_force_system` - emits redirected thrust per linked pair
//! 5. `flame_system` - flame and light parameters for rendering sessions
//! 6. `removal_system` - despawns blocks the host closed
//!
//! Pairs never read each other's state, so within a step the order of
//! reversers does not matter; forces on one grid simply add up.

pub mod flame;
pub mod linker;
pub mod removal;
pub mod reverse_force;

pub use flame::*;
pub use linker::*;
pub use removal::*;
pub use reverse_force::*;

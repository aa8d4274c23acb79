//! Host Integration Bridge
//!
//! Converts simulation output into flat `f32` buffers the host side can read
//! without knowing anything about the ECS.
//!
//! # Stable Buffer Contract
//!
//! Two buffers are produced from a [`Snapshot`], both with a one-element
//! header holding the record count followed by fixed-stride records.
//!
//! ## Id encoding
//!
//! Host ids are `u64`. Each id takes two slots holding its low and high `u32`
//! halves, bit-cast into `f32` with [`f32::from_bits`]. The host reads those
//! slots as `u32` (or calls [`read_id`]) rather than as numbers; converting
//! them with `as` would lose the id.
//!
//! ## Force buffer (Version 2.0)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ [0] force_count (as f32)                                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For each force i (offset = 1 + i * FORCE_STRIDE):               │
//! │   [+0]  grid_id_lo  - Host grid id, low u32 bits                │
//! │   [+1]  grid_id_hi  - Host grid id, high u32 bits               │
//! │   [+2]  fx          - World force X (newtons)                   │
//! │   [+3]  fy          - World force Y                             │
//! │   [+4]  fz          - World force Z                             │
//! │   [+5]  px          - World application point X                 │
//! │   [+6]  py          - World application point Y                 │
//! │   [+7]  pz          - World application point Z                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host applies each record as a world-space force at the given point
//! with no torque.
//!
//! ## Flame buffer (Version 2.0)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ [0] thruster_count (as f32)                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For each thruster i (offset = 1 + i * FLAME_STRIDE):            │
//! │   [+0]  id_lo       - Host block id, low u32 bits               │
//! │   [+1]  id_hi       - Host block id, high u32 bits              │
//! │   [+2]  visible     - 1.0 when drawn, 0.0 when hidden           │
//! │   [+3]  alpha       - Flame transparency multiplier             │
//! │   [+4]  length                                                  │
//! │   [+5]  thickness                                               │
//! │   [+6..+9]   color rgba                                         │
//! │   [+10..+12] light position xyz                                 │
//! │   [+13] light intensity                                         │
//! │   [+14] light range                                             │
//! │   [+15..+17] jet light position xyz                             │
//! │   [+18] jet light intensity                                     │
//! │   [+19] jet light range                                         │
//! │   [+20] point offset along the flame                            │
//! │   [+21] point size                                              │
//! │   [+22] cone offset along the flame                             │
//! │   [+23] cone height                                             │
//! │   [+24] cone radius                                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Version 1.0 wrote ids as a single `id as f32`, which merged distinct ids
//! above 2^24.
//!
//! # Determinism
//!
//! Given the same `Snapshot`, the output is identical. Forces keep the order
//! they were produced in; thrusters are ordered by id.

use crate::world::Snapshot;

// ============================================================================
// CONSTANTS - STABLE BUFFER CONTRACT
// ============================================================================

/// Number of f32 values in each buffer header.
pub const HEADER_SIZE: usize = 1;

/// Number of f32 slots taken by one host id.
pub const ID_SLOTS: usize = 2;

/// Number of f32 values per force record.
///
/// **Part of the stable contract. Do not change without versioning.**
pub const FORCE_STRIDE: usize = 8;

/// Number of f32 values per flame record.
///
/// **Part of the stable contract. Do not change without versioning.**
pub const FLAME_STRIDE: usize = 25;

// ============================================================================
// IDS
// ============================================================================

/// Split a host id into its low and high halves, bit-cast to `f32`.
#[inline]
pub fn encode_id(id: u64) -> [f32; ID_SLOTS] {
    [f32::from_bits(id as u32), f32::from_bits((id >> 32) as u32)]
}

/// Read an id written by [`encode_id`] starting at `index`.
///
/// Returns `None` if the buffer is too short.
#[inline]
pub fn read_id(buffer: &[f32], index: usize) -> Option<u64> {
    let lo = buffer.get(index)?.to_bits() as u64;
    let hi = buffer.get(index + 1)?.to_bits() as u64;
    Some(hi << 32 | lo)
}

// ============================================================================
// FORCES
// ============================================================================

/// Convert the snapshot's forces to a flat buffer.
///
/// # Example
///
/// ```rust
/// use trv_sim::api::SimWorld;
/// use trv_sim::host_bridge::{forces_to_flatbuffer, FORCE_STRIDE, HEADER_SIZE};
///
/// let mut sim = SimWorld::new();
/// let buffer = forces_to_flatbuffer(&sim.snapshot());
///
/// let count = buffer[0] as usize;
/// assert_eq!(buffer.len(), HEADER_SIZE + count * FORCE_STRIDE);
/// ```
pub fn forces_to_flatbuffer(snapshot: &Snapshot) -> Vec<f32> {
    let count = snapshot.forces.len();
    let buffer_size = force_buffer_size(count);

    let mut buffer = Vec::with_capacity(buffer_size);
    buffer.push(count as f32);

    for force in &snapshot.forces {
        buffer.extend_from_slice(&encode_id(force.grid));
        buffer.extend_from_slice(&force.force);
        buffer.extend_from_slice(&force.at);
    }

    debug_assert_eq!(buffer.len(), buffer_size, "Buffer size mismatch");
    buffer
}

#[inline]
pub fn force_buffer_size(count: usize) -> usize {
    HEADER_SIZE + count * FORCE_STRIDE
}

#[inline]
pub const fn force_offset(index: usize) -> usize {
    HEADER_SIZE + index * FORCE_STRIDE
}

// ============================================================================
// FLAMES
// ============================================================================

/// Convert every thruster's flame state to a flat buffer.
pub fn flames_to_flatbuffer(snapshot: &Snapshot) -> Vec<f32> {
    let count = snapshot.thrusters.len();
    let buffer_size = flame_buffer_size(count);

    let mut buffer = Vec::with_capacity(buffer_size);
    buffer.push(count as f32);

    for thruster in &snapshot.thrusters {
        let flame = &thruster.flame;
        buffer.extend_from_slice(&encode_id(thruster.id));
        buffer.push(if flame.visible { 1.0 } else { 0.0 });
        buffer.push(flame.alpha);
        buffer.push(flame.length);
        buffer.push(flame.thickness);
        buffer.extend_from_slice(&flame.color.to_array());
        buffer.extend_from_slice(&flame.light_position.to_array());
        buffer.push(flame.light_intensity);
        buffer.push(flame.light_range);
        buffer.extend_from_slice(&flame.jet_light_position.to_array());
        buffer.push(flame.jet_light_intensity);
        buffer.push(flame.jet_light_range);
        buffer.push(flame.point_offset);
        buffer.push(flame.point_size);
        buffer.push(flame.cone_offset);
        buffer.push(flame.cone_height);
        buffer.push(flame.cone_radius);
    }

    debug_assert_eq!(buffer.len(), buffer_size, "Buffer size mismatch");
    buffer
}

#[inline]
pub fn flame_buffer_size(count: usize) -> usize {
    HEADER_SIZE + count * FLAME_STRIDE
}

#[inline]
pub const fn flame_offset(index: usize) -> usize {
    HEADER_SIZE + index * FLAME_STRIDE
}

/// Parse the record count from either buffer.
///
/// Returns `None` if the buffer is empty.
#[inline]
pub fn parse_count(buffer: &[f32]) -> Option<usize> {
    buffer.first().map(|c| *c as usize)
}

// ============================================================================
// FIELD OFFSET CONSTANTS
// ============================================================================

/// Force record: host grid id (two slots, see [`read_id`])
pub const FORCE_GRID_ID: usize = 0;
/// Force record: force X (Y and Z follow)
pub const FORCE_X: usize = 2;
/// Force record: application point X (Y and Z follow)
pub const FORCE_AT_X: usize = 5;

/// Flame record: host block id (two slots, see [`read_id`])
pub const FLAME_ID: usize = 0;
pub const FLAME_VISIBLE: usize = 2;
pub const FLAME_ALPHA: usize = 3;
pub const FLAME_LENGTH: usize = 4;
pub const FLAME_THICKNESS: usize = 5;
/// Flame record: color R (G, B, A follow)
pub const FLAME_COLOR: usize = 6;
/// Flame record: light position X (Y and Z follow)
pub const FLAME_LIGHT_POSITION: usize = 10;
pub const FLAME_LIGHT_INTENSITY: usize = 13;
pub const FLAME_LIGHT_RANGE: usize = 14;
/// Flame record: jet light position X (Y and Z follow)
pub const FLAME_JET_POSITION: usize = 15;
pub const FLAME_JET_INTENSITY: usize = 18;
pub const FLAME_JET_RANGE: usize = 19;
pub const FLAME_POINT_OFFSET: usize = 20;
pub const FLAME_POINT_SIZE: usize = 21;
pub const FLAME_CONE_OFFSET: usize = 22;
pub const FLAME_CONE_HEIGHT: usize = 23;
pub const FLAME_CONE_RADIUS: usize = 24;

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Footprint, SimWorld};
    use crate::config::LARGE_BLOCK_LARGE_ATMO;
    use crate::grid::{GridPhysics, LARGE_GRID_SIZE};
    use glam::{IVec3, Quat, Vec3};

    /// Adds a grid with a closed reverser in front of a full-throttle thruster.
    fn add_pushing_pair(sim: &mut SimWorld, grid: u64, thruster: u64, reverser: u64) {
        sim.spawn_grid(grid, LARGE_GRID_SIZE, Vec3::ZERO, Quat::IDENTITY).unwrap();
        sim.set_grid_physics(grid, GridPhysics::dynamic(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        sim.add_thruster(
            thruster,
            grid,
            LARGE_BLOCK_LARGE_ATMO,
            Footprint::single(IVec3::new(0, 0, 1), Quat::IDENTITY),
            200.0,
        )
        .unwrap();
        sim.add_reverser(
            reverser,
            grid,
            "LargeThrustReverser",
            Footprint::single(IVec3::ZERO, Quat::IDENTITY),
            1.0,
        )
        .unwrap();
        sim.set_thrust_strength(thruster, 1.0).unwrap();
        sim.set_door_state(reverser, 0.0, false, true).unwrap();
    }

    fn pushing_world() -> SimWorld {
        let mut sim = SimWorld::new();
        add_pushing_pair(&mut sim, 7, 3, 4);
        sim
    }

    #[test]
    fn test_empty_world_buffers() {
        let mut sim = SimWorld::new();
        let snapshot = sim.snapshot();

        let forces = forces_to_flatbuffer(&snapshot);
        assert_eq!(forces.len(), HEADER_SIZE);
        assert_eq!(parse_count(&forces), Some(0));

        let flames = flames_to_flatbuffer(&snapshot);
        assert_eq!(flames.len(), HEADER_SIZE);
        assert_eq!(parse_count(&[]), None);
    }

    #[test]
    fn test_force_record_layout() {
        let mut sim = pushing_world();
        sim.tick_once();
        let buffer = forces_to_flatbuffer(&sim.snapshot());

        assert_eq!(buffer.len(), force_buffer_size(1));
        let offset = force_offset(0);
        assert_eq!(read_id(&buffer, offset + FORCE_GRID_ID), Some(7));
        assert_eq!(buffer[offset + FORCE_X], 0.0);
        assert!((buffer[offset + FORCE_X + 2] + 350.0).abs() < 1e-3);
        assert_eq!(buffer[offset + FORCE_AT_X + 1], 1.0);
    }

    #[test]
    fn test_flame_record_layout() {
        let mut sim = pushing_world();
        sim.set_door_state(4, 1.0, true, false).unwrap();
        sim.tick_once();
        let buffer = flames_to_flatbuffer(&sim.snapshot());

        assert_eq!(buffer.len(), flame_buffer_size(1));
        let offset = flame_offset(0);
        assert_eq!(read_id(&buffer, offset + FLAME_ID), Some(3));
        assert_eq!(buffer[offset + FLAME_VISIBLE], 1.0);
        assert_eq!(buffer[offset + FLAME_ALPHA], 1.0);
        assert!((buffer[offset + FLAME_LENGTH] - 15.0).abs() < 1e-4);
        assert!((buffer[offset + FLAME_THICKNESS] - 1.6).abs() < 1e-6);
        assert!(buffer[offset + FLAME_JET_RANGE] > 0.0);
        assert!((buffer[offset + FLAME_POINT_SIZE] - 2.08).abs() < 1e-5);
        assert_eq!(buffer[offset + FLAME_CONE_OFFSET], -3.5);
        assert_eq!(buffer[offset + FLAME_CONE_HEIGHT], 18.0);
        assert_eq!(buffer[offset + FLAME_CONE_RADIUS], 2.65);
    }

    #[test]
    fn test_large_ids_survive_encoding() {
        const FIRST: u64 = 72_057_594_037_927_937;
        const SECOND: u64 = 72_057_594_037_927_938;

        let mut sim = SimWorld::new();
        add_pushing_pair(&mut sim, FIRST, FIRST + 10, FIRST + 20);
        add_pushing_pair(&mut sim, SECOND, SECOND + 10, SECOND + 20);
        sim.tick_once();
        let snapshot = sim.snapshot();

        let forces = forces_to_flatbuffer(&snapshot);
        assert_eq!(parse_count(&forces), Some(2));
        let mut grids: Vec<u64> = (0..2)
            .filter_map(|i| read_id(&forces, force_offset(i) + FORCE_GRID_ID))
            .collect();
        grids.sort_unstable();
        assert_eq!(grids, vec![FIRST, SECOND]);

        let flames = flames_to_flatbuffer(&snapshot);
        let thrusters: Vec<u64> = (0..2)
            .filter_map(|i| read_id(&flames, flame_offset(i) + FLAME_ID))
            .collect();
        assert_eq!(thrusters, vec![FIRST + 10, SECOND + 10]);
    }

    #[test]
    fn test_id_encoding_keeps_every_bit() {
        for id in [0, 1, 1 << 24, (1 << 24) + 1, u32::MAX as u64 + 1, u64::MAX] {
            let slots = encode_id(id);
            assert_eq!(read_id(&slots, 0), Some(id));
        }
        assert_eq!(read_id(&[0.0], 0), None);
    }

    #[test]
    fn test_buffers_are_deterministic() {
        let mut sim1 = pushing_world();
        let mut sim2 = pushing_world();
        sim1.tick_once();
        sim2.tick_once();

        let s1 = sim1.snapshot();
        let s2 = sim2.snapshot();
        assert_eq!(forces_to_flatbuffer(&s1), forces_to_flatbuffer(&s2));
        assert_eq!(flames_to_flatbuffer(&s1), flames_to_flatbuffer(&s2));
    }
}

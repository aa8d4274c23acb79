//! Cube grids: the rigid assemblies blocks are mounted on.
//!
//! A grid maps integer cells to the block occupying them, giving O(1) lookup
//! of "what is directly behind this block". Grids are entities carrying a
//! [`CubeGrid`] and, when they have a physics body, a [`GridPhysics`].

use crate::components::{BlockPlacement, BlockTransform};
use bevy_ecs::prelude::*;
use glam::{IVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Edge length of a large-grid cell in metres.
pub const LARGE_GRID_SIZE: f32 = 2.5;
/// Edge length of a small-grid cell in metres.
pub const SMALL_GRID_SIZE: f32 = 0.5;

/// Block occupancy and world placement of a grid.
#[derive(Component, Debug, Clone)]
pub struct CubeGrid {
    /// Cell edge length in world units.
    pub grid_size: f32,
    /// World position of cell (0, 0, 0)'s center.
    pub origin: Vec3,
    pub rotation: Quat,
    /// Map from cell to the block occupying it.
    cells: HashMap<IVec3, Entity>,
    /// Reverse lookup: block to the cells it covers.
    block_cells: HashMap<Entity, Vec<IVec3>>,
}

impl CubeGrid {
    pub fn new(grid_size: f32, origin: Vec3, rotation: Quat) -> Self {
        Self {
            grid_size,
            origin,
            rotation,
            cells: HashMap::new(),
            block_cells: HashMap::new(),
        }
    }

    /// Convert a world position to the nearest grid cell.
    #[inline]
    pub fn world_to_grid_integer(&self, world: Vec3) -> IVec3 {
        let local = self.rotation.inverse() * (world - self.origin) / self.grid_size;
        local.round().as_ivec3()
    }

    /// Convert a grid-local point (in cells) to world space.
    #[inline]
    pub fn grid_to_world(&self, local: Vec3) -> Vec3 {
        self.origin + self.rotation * (local * self.grid_size)
    }

    /// The block occupying `cell`, if any.
    pub fn block_at(&self, cell: IVec3) -> Option<Entity> {
        self.cells.get(&cell).copied()
    }

    /// Register a block's footprint. Fails without side effects if any cell
    /// is already taken; returns the offending cell.
    pub fn insert(&mut self, block: Entity, placement: &BlockPlacement) -> Result<(), IVec3> {
        if let Some(cell) = placement.cells().find(|c| self.cells.contains_key(c)) {
            return Err(cell);
        }
        let covered: Vec<IVec3> = placement.cells().collect();
        for cell in &covered {
            self.cells.insert(*cell, block);
        }
        self.block_cells.insert(block, covered);
        Ok(())
    }

    /// Remove a block from the grid.
    pub fn remove(&mut self, block: Entity) {
        if let Some(cells) = self.block_cells.remove(&block) {
            for cell in cells {
                self.cells.remove(&cell);
            }
        }
    }

    /// World transform of a block placed on this grid.
    pub fn block_transform(&self, placement: &BlockPlacement) -> BlockTransform {
        BlockTransform::new(
            self.rotation * placement.orientation,
            self.grid_to_world(placement.center_local()),
        )
    }

    /// Number of blocks on the grid.
    pub fn block_count(&self) -> usize {
        self.block_cells.len()
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Physics body of a grid as reported by the host.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPhysics {
    pub enabled: bool,
    /// Anchored to a voxel or otherwise immovable.
    pub is_static: bool,
    pub center_of_mass: Vec3,
}

impl GridPhysics {
    pub fn dynamic(center_of_mass: Vec3) -> Self {
        Self {
            enabled: true,
            is_static: false,
            center_of_mass,
        }
    }

    /// Whether forces applied to this body move anything.
    pub fn accepts_force(&self) -> bool {
        self.enabled && !self.is_static
    }
}

/// System that derives block world transforms from their grid placement.
pub fn sync_block_transforms_system(
    grids: Query<&CubeGrid>,
    mut blocks: Query<(&BlockPlacement, &mut BlockTransform)>,
) {
    for (placement, mut transform) in blocks.iter_mut() {
        let Ok(grid) = grids.get(placement.grid) else {
            continue;
        };
        let derived = grid.block_transform(placement);
        if *transform != derived {
            *transform = derived;
        }
    }
}

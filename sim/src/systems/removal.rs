//! Removal system - despawns blocks the host has closed.
//!
//! Runs last in the tick, so every other system sees the removal flag for
//! one tick before the entity handle is invalidated.

use crate::components::*;
use crate::grid::CubeGrid;
use bevy_ecs::prelude::*;

/// Host ids of blocks despawned this tick, drained by the API layer.
#[derive(Resource, Debug, Default)]
pub struct RemovedBlocks {
    pub ids: Vec<u64>,
}

/// System that frees grid cells and despawns removed blocks.
pub fn removal_system(
    mut commands: Commands,
    mut removed_ids: ResMut<RemovedBlocks>,
    removed: Query<(Entity, &BlockId, &BlockPlacement), With<MarkedForRemoval>>,
    mut grids: Query<&mut CubeGrid>,
    mut visuals: Query<&mut ThrusterVisual>,
) {
    for (entity, id, placement) in removed.iter() {
        if let Ok(mut grid) = grids.get_mut(placement.grid) {
            grid.remove(entity);
        }

        for mut visual in visuals.iter_mut() {
            if visual.reverser == Some(entity) {
                visual.reverser = None;
            }
        }

        log::debug!("block {} removed", id.0);
        removed_ids.ids.push(id.0);
        commands.entity(entity).despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::LARGE_GRID_SIZE;
    use glam::{IVec3, Quat, Vec3};

    #[test]
    fn test_marked_block_is_despawned_and_freed() {
        let mut world = World::new();
        world.insert_resource(RemovedBlocks::default());
        let grid = world.spawn(CubeGrid::new(LARGE_GRID_SIZE, Vec3::ZERO, Quat::IDENTITY)).id();
        let placement = BlockPlacement::single(grid, IVec3::ZERO, Quat::IDENTITY);
        let reverser = world.spawn((BlockId(7), placement, MarkedForRemoval)).id();
        world.get_mut::<CubeGrid>(grid).unwrap().insert(reverser, &placement).unwrap();
        let thruster = world
            .spawn(ThrusterVisual {
                reverser: Some(reverser),
            })
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(removal_system);
        schedule.run(&mut world);

        assert!(world.get::<BlockId>(reverser).is_none());
        assert_eq!(world.get::<CubeGrid>(grid).unwrap().block_at(IVec3::ZERO), None);
        assert_eq!(world.get::<ThrusterVisual>(thruster).unwrap().reverser, None);
        assert_eq!(world.resource::<RemovedBlocks>().ids, vec![7]);
    }
}

//! Linker system - pairs each reverser with the thruster directly behind it.
//!
//! While unlinked, a reverser probes the cell one block behind itself every
//! `link_interval_ticks`. A thruster in that cell links when its subtype is
//! allowed and it faces exactly the same way as the reverser. A link that
//! points at a removed thruster is dropped on the very next tick.

use crate::components::*;
use crate::config::ReverserConfig;
use crate::error::{SimError, SimResult};
use crate::grid::{CubeGrid, GridPhysics};
use bevy_ecs::prelude::*;

/// Round to one decimal place, ties to even.
#[inline]
pub fn round_to_tenth(value: f32) -> f64 {
    (value as f64 * 10.0).round_ties_even() / 10.0
}

/// True when the two blocks' backward axes agree to one decimal place.
pub fn is_back_aligned(thruster: &BlockTransform, reverser: &BlockTransform) -> bool {
    round_to_tenth(thruster.backward().dot(reverser.backward())) == 1.0
}

/// The block in the cell one grid step behind `reverser`.
pub fn probe_behind(grid: &CubeGrid, reverser: &BlockTransform) -> Option<Entity> {
    let behind = reverser.translation + reverser.backward() * grid.grid_size;
    grid.block_at(grid.world_to_grid_integer(behind))
}

/// System that drops dead links and establishes new ones.
pub fn linker_system(
    config: Res<ReverserConfig>,
    grids: Query<(&CubeGrid, Option<&GridPhysics>)>,
    mut reversers: Query<
        (
            Entity,
            &BlockId,
            &BlockPlacement,
            &BlockTransform,
            &BlockStatus,
            &mut ReverserLink,
            &mut ReflectedThrust,
        ),
        Without<MarkedForRemoval>,
    >,
    live_reversers: Query<(), (With<ReverserDoor>, Without<MarkedForRemoval>)>,
    thrusters: Query<(&Subtype, &BlockTransform, Has<MarkedForRemoval>), With<Thruster>>,
    mut visuals: Query<&mut ThrusterVisual>,
) {
    for (entity, id, placement, transform, status, mut link, mut reflected) in reversers.iter_mut() {
        if let Some(thruster) = link.linked {
            // A despawned thruster invalidates the handle; a closing one is flagged.
            let removed = thrusters.get(thruster).map_or(true, |(_, _, marked)| marked);
            if removed {
                link.linked = None;
                reflected.0 = 0.0;
                if let Ok(mut visual) = visuals.get_mut(thruster) {
                    if visual.reverser == Some(entity) {
                        visual.reverser = None;
                    }
                }
                log::debug!("reverser {} unlinked: thruster removed", id.0);
            }
            continue;
        }

        if !status.functional {
            continue;
        }

        let candidate = match probe_candidate(&config, &grids, placement, transform, &mut link) {
            Ok(candidate) => candidate,
            Err(e) => {
                log::error!("reverser {}: link probe failed: {}", id.0, e);
                continue;
            }
        };
        let Some(thruster) = candidate else {
            continue;
        };

        let Ok((subtype, thruster_transform, marked)) = thrusters.get(thruster) else {
            continue;
        };
        if marked || !config.is_linkable(&subtype.0) {
            continue;
        }
        if !is_back_aligned(thruster_transform, transform) {
            continue;
        }

        let Ok(mut visual) = visuals.get_mut(thruster) else {
            log::error!(
                "reverser {}: {}",
                id.0,
                SimError::MissingComponent { context: "linking thruster visual" }
            );
            continue;
        };
        if let Some(owner) = visual.reverser {
            if owner != entity && live_reversers.contains(owner) {
                continue;
            }
        }

        visual.reverser = Some(entity);
        link.linked = Some(thruster);
        log::debug!("reverser {} linked to {} thruster", id.0, subtype.0);
    }
}

/// Check the reverser's grid and, when a probe is due, return the occupant
/// of the cell behind it.
fn probe_candidate(
    config: &ReverserConfig,
    grids: &Query<(&CubeGrid, Option<&GridPhysics>)>,
    placement: &BlockPlacement,
    transform: &BlockTransform,
    link: &mut ReverserLink,
) -> SimResult<Option<Entity>> {
    let (grid, physics) = grids
        .get(placement.grid)
        .map_err(|_| SimError::MissingGrid { context: "link probe" })?;

    // Immobile grids take no force, so there is nothing worth linking for.
    if !physics.is_some_and(GridPhysics::accepts_force) {
        return Ok(None);
    }

    if !link.probe_due(config.link_interval_ticks) {
        return Ok(None);
    }

    Ok(probe_behind(grid, transform))
}

//! Reverse force system - turns a linked thruster's output into a redirected
//! force on the grid's physics body.
//!
//! Preconditions are checked in order and short-circuit: reverser functional,
//! grid physics movable, link present, thruster working. Any failure skips
//! this tick without touching the link.

use crate::compat::ReverserContext;
use crate::components::*;
use crate::config::{ReversePolicy, ReverserConfig};
use crate::error::{SimError, SimResult};
use crate::grid::GridPhysics;
use bevy_ecs::prelude::*;
use glam::Vec3;

/// One world-space force for the host physics body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedForce {
    pub grid: Entity,
    /// Reverser that produced the force.
    pub source: Entity,
    pub force: Vec3,
    pub at: Vec3,
    pub torque: Option<Vec3>,
}

/// Receiver of world forces; implemented by the host's physics adapter.
pub trait PhysicsSink {
    fn apply_world_force(&mut self, grid: Entity, force: Vec3, at: Vec3, torque: Option<Vec3>);
}

/// Forces produced during the current tick. Cleared at the start of every tick.
#[derive(Resource, Debug, Default)]
pub struct ForceBuffer {
    pub forces: Vec<AppliedForce>,
}

impl ForceBuffer {
    pub fn clear(&mut self) {
        self.forces.clear();
    }

    /// Record a world force with no torque component.
    pub fn push(&mut self, source: Entity, grid: Entity, force: Vec3, at: Vec3) {
        self.forces.push(AppliedForce {
            grid,
            source,
            force,
            at,
            torque: None,
        });
    }

    /// Forward every buffered force to a host sink.
    pub fn drain_into(&mut self, sink: &mut impl PhysicsSink) {
        for f in self.forces.drain(..) {
            sink.apply_world_force(f.grid, f.force, f.at, f.torque);
        }
    }

    /// Sum of all forces applied to `grid` this tick.
    pub fn total_for(&self, grid: Entity) -> Vec3 {
        self.forces
            .iter()
            .filter(|f| f.grid == grid)
            .map(|f| f.force)
            .sum()
    }
}

/// Fraction of thrust a reverser at `closed_ratio` redirects.
pub fn redirect_ratio(policy: ReversePolicy, closed_ratio: f32, engage_threshold: f32) -> f32 {
    match policy {
        ReversePolicy::DoorReflect => closed_ratio.max(0.0),
        ReversePolicy::ReverseBlock => {
            (closed_ratio - engage_threshold).max(0.0) / (1.0 - engage_threshold)
        }
    }
}

/// Redirected thrust along the thruster's forward axis.
pub fn reverse_force(
    thruster: &impl ThrustSource,
    transform: &impl Positionable,
    efficiency: f32,
    ratio: f32,
) -> Vec3 {
    transform.world_transform().forward() * thruster.output() * efficiency * ratio
}

/// System that clears the previous tick's forces.
pub fn clear_forces_system(mut buffer: ResMut<ForceBuffer>) {
    buffer.clear();
}

/// System that applies reverser forces to grid physics bodies.
pub fn reverse_force_system(
    config: Res<ReverserConfig>,
    ctx: Res<ReverserContext>,
    mut buffer: ResMut<ForceBuffer>,
    grids: Query<&GridPhysics>,
    mut reversers: Query<
        (
            Entity,
            &BlockId,
            &BlockPlacement,
            &BlockStatus,
            &ReverserDoor,
            &ReverserLink,
            &mut ReflectedThrust,
        ),
        Without<MarkedForRemoval>,
    >,
    thrusters: Query<(&Thruster, &BlockTransform, &BlockStatus)>,
) {
    for (entity, id, placement, status, door, link, mut reflected) in reversers.iter_mut() {
        let step = ReverserStep {
            placement,
            status,
            door,
            link,
        };
        match step.run(&config, &ctx, &grids, &thrusters, &mut reflected) {
            Ok(Some((grid, force, at))) => buffer.push(entity, grid, force, at),
            Ok(None) => {}
            Err(e) => log::error!("reverser {}: {}", id.0, e),
        }
    }
}

/// Per-reverser inputs for one tick of the force model.
struct ReverserStep<'a> {
    placement: &'a BlockPlacement,
    status: &'a BlockStatus,
    door: &'a ReverserDoor,
    link: &'a ReverserLink,
}

impl ReverserStep<'_> {
    fn run(
        &self,
        config: &ReverserConfig,
        ctx: &ReverserContext,
        grids: &Query<&GridPhysics>,
        thrusters: &Query<(&Thruster, &BlockTransform, &BlockStatus)>,
        reflected: &mut ReflectedThrust,
    ) -> SimResult<Option<(Entity, Vec3, Vec3)>> {
        if !self.status.functional {
            return Ok(None);
        }

        // No physics body at all is a normal state, not an error.
        let Ok(physics) = grids.get(self.placement.grid) else {
            return Ok(None);
        };
        if !physics.accepts_force() {
            return Ok(None);
        }

        let Some(linked) = self.link.linked else {
            return Ok(None);
        };
        let (thruster, transform, thruster_status) = thrusters
            .get(linked)
            .map_err(|_| SimError::MissingComponent { context: "reverse force thruster" })?;
        if !thruster_status.working {
            return Ok(None);
        }

        let ratio = redirect_ratio(config.policy, self.door.closed_ratio(), config.engage_threshold);
        reflected.0 = match config.policy {
            ReversePolicy::ReverseBlock => ratio,
            ReversePolicy::DoorReflect => 0.0,
        };

        if ratio <= 0.0 || thruster.current_strength <= 0.0 {
            return Ok(None);
        }

        let force = reverse_force(thruster, transform, config.efficiency, ratio);
        let at = if ctx.realistic_thrusters {
            transform.translation
        } else {
            physics.center_of_mass
        };
        Ok(Some((self.placement.grid, force, at)))
    }
}

//! Simulation snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that the host can log, inspect or forward to tooling.

use crate::components::*;
use crate::systems::ForceBuffer;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a thruster block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrusterSnapshot {
    pub id: u64,
    pub subtype: String,
    pub position: [f32; 3],
    pub forward: [f32; 3],
    pub strength: f32,
    pub working: bool,
    /// Id of the reverser covering this thruster.
    pub reverser: Option<u64>,
    pub flame: FlameState,
}

/// Snapshot of a reverser block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverserSnapshot {
    pub id: u64,
    pub subtype: String,
    pub position: [f32; 3],
    pub functional: bool,
    pub closed_ratio: f32,
    pub reflected_thrust: f32,
    /// Id of the linked thruster.
    pub linked: Option<u64>,
}

/// Snapshot of one force applied this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceSnapshot {
    pub grid: u64,
    pub source: u64,
    pub force: [f32; 3],
    pub at: [f32; 3],
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub thrusters: Vec<ThrusterSnapshot>,
    pub reversers: Vec<ReverserSnapshot>,
    /// Forces produced by the last tick.
    pub forces: Vec<ForceSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut block_ids = world.query::<&BlockId>();
        let mut grid_ids = world.query::<&GridId>();
        let mut thruster_query = world.query::<(
            &BlockId,
            &Subtype,
            &BlockTransform,
            &BlockStatus,
            &Thruster,
            &ThrusterVisual,
            &FlameState,
        )>();
        let mut reverser_query = world.query::<(
            &BlockId,
            &Subtype,
            &BlockTransform,
            &BlockStatus,
            &ReverserDoor,
            &ReverserLink,
            &ReflectedThrust,
        )>();
        let world: &World = world;
        let mut block_id = |e: Entity| block_ids.get(world, e).ok().map(|id| id.0);

        let mut thrusters = Vec::new();
        for (id, subtype, transform, status, thruster, visual, flame) in thruster_query.iter(world) {
            thrusters.push(ThrusterSnapshot {
                id: id.0,
                subtype: subtype.0.clone(),
                position: transform.translation.to_array(),
                forward: transform.forward().to_array(),
                strength: thruster.current_strength,
                working: status.working,
                reverser: visual.reverser.and_then(&mut block_id),
                flame: *flame,
            });
        }

        let mut reversers = Vec::new();
        for (id, subtype, transform, status, door, link, reflected) in reverser_query.iter(world) {
            reversers.push(ReverserSnapshot {
                id: id.0,
                subtype: subtype.0.clone(),
                position: transform.translation.to_array(),
                functional: status.functional,
                closed_ratio: door.closed_ratio(),
                reflected_thrust: reflected.0,
                linked: link.linked.and_then(&mut block_id),
            });
        }

        let mut forces = Vec::new();
        if let Some(buffer) = world.get_resource::<ForceBuffer>() {
            for f in &buffer.forces {
                forces.push(ForceSnapshot {
                    grid: grid_ids.get(world, f.grid).map_or(0, |g| g.0),
                    source: block_id(f.source).unwrap_or(0),
                    force: f.force.to_array(),
                    at: f.at.to_array(),
                });
            }
        }

        // Deterministic order regardless of archetype layout.
        thrusters.sort_by_key(|t| t.id);
        reversers.sort_by_key(|r| r.id);

        Self {
            tick,
            time,
            thrusters,
            reversers,
            forces,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Footprint, SimWorld};
    use crate::config::LARGE_BLOCK_LARGE_ATMO;
    use crate::grid::{GridPhysics, LARGE_GRID_SIZE};
    use glam::{IVec3, Quat, Vec3};

    fn braking_world() -> SimWorld {
        let mut sim = SimWorld::new();
        sim.spawn_grid(5, LARGE_GRID_SIZE, Vec3::ZERO, Quat::IDENTITY).unwrap();
        sim.set_grid_physics(5, GridPhysics::dynamic(Vec3::ZERO)).unwrap();
        sim.add_thruster(
            50,
            5,
            LARGE_BLOCK_LARGE_ATMO,
            Footprint::single(IVec3::new(0, 0, 1), Quat::IDENTITY),
            100.0,
        )
        .unwrap();
        sim.add_reverser(
            60,
            5,
            "LargeThrustReverser",
            Footprint::single(IVec3::ZERO, Quat::IDENTITY),
            1.0,
        )
        .unwrap();
        sim.set_thrust_strength(50, 1.0).unwrap();
        sim.set_door_state(60, 0.0, false, true).unwrap();
        sim
    }

    #[test]
    fn test_snapshot_resolves_host_ids() {
        let mut sim = braking_world();
        sim.tick_once();
        let snapshot = sim.snapshot();

        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.thrusters.len(), 1);
        assert_eq!(snapshot.thrusters[0].reverser, Some(60));
        assert_eq!(snapshot.reversers[0].linked, Some(50));
        assert_eq!(snapshot.forces.len(), 1);
        assert_eq!(snapshot.forces[0].grid, 5);
        assert_eq!(snapshot.forces[0].source, 60);
    }

    #[test]
    fn test_json_round_trip() {
        let mut sim = braking_world();
        sim.tick_once();
        let snapshot = sim.snapshot();

        let restored = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(restored.tick, snapshot.tick);
        assert_eq!(restored.time, snapshot.time);
        assert_eq!(restored.thrusters[0].id, 50);
        assert_eq!(restored.thrusters[0].subtype, LARGE_BLOCK_LARGE_ATMO);
        assert_eq!(restored.thrusters[0].flame, snapshot.thrusters[0].flame);
        assert_eq!(restored.reversers[0].linked, Some(50));
        assert_eq!(restored.reversers[0].closed_ratio, 1.0);
        assert_eq!(restored.forces[0].force, snapshot.forces[0].force);
        assert_eq!(restored.forces[0].at, snapshot.forces[0].at);

        let pretty = Snapshot::from_json(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(pretty.forces[0].grid, 5);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(Snapshot::from_json("{\"tick\": \"soon\"}").is_err());
    }
}

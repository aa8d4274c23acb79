//! Public API for the simulation.
//!
//! This module provides the main interface for the host game (or any other
//! client) to drive the reverser simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz, matching
//! the host's physics rate). When `step(dt)` is called, the simulation
//! accumulates time and runs fixed updates as needed.
//!
//! ## Addressing
//!
//! Grids and blocks are addressed by host-supplied `u64` ids. Entity handles
//! returned by `spawn_grid` identify the grid in forces handed to a
//! [`PhysicsSink`].

use crate::compat::{ReverserContext, SessionInfo};
use crate::components::*;
use crate::config::ReverserConfig;
use crate::error::{SimError, SimResult};
use crate::grid::{sync_block_transforms_system, CubeGrid, GridPhysics};
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use glam::{IVec3, Quat, Vec3};
use std::collections::HashMap;

/// Cells a block occupies on its grid, and its rotation relative to the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub min: IVec3,
    pub size: IVec3,
    pub orientation: Quat,
}

impl Footprint {
    pub fn single(cell: IVec3, orientation: Quat) -> Self {
        Self {
            min: cell,
            size: IVec3::ONE,
            orientation,
        }
    }

    pub fn sized(min: IVec3, size: IVec3, orientation: Quat) -> Self {
        Self { min, size, orientation }
    }
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Registering grids and blocks as the host creates them
/// - Forwarding host block state (doors, throttle, functional flags)
/// - Stepping the simulation forward
/// - Reading back forces and extracting state snapshots
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    grids: HashMap<u64, Entity>,
    blocks: HashMap<u64, Entity>,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(ReverserConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    ///
    /// Out-of-range values are replaced with defaults, as when loading TOML.
    pub fn with_config(config: ReverserConfig) -> Self {
        let config = config.sanitized();
        let mut world = World::new();

        world.insert_resource(config);
        world.insert_resource(ReverserContext::default());
        world.insert_resource(ForceBuffer::default());
        world.insert_resource(RemovedBlocks::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                clear_forces_system,
                sync_block_transforms_system,
                linker_system,
                reverse_force_system,
                flame_system,
                removal_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
            grids: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    /// Apply session information from the host: compat detection and
    /// whether this process renders.
    pub fn load_session(&mut self, session: &SessionInfo) {
        let ctx = ReverserContext::from_session(session);
        log::debug!(
            "session loaded (realistic thrusters: {}, player: {})",
            ctx.realistic_thrusters,
            ctx.is_player
        );
        self.world.insert_resource(ctx);
    }

    /// Tear down every grid and block and reset session state.
    pub fn unload(&mut self) {
        let entities: Vec<Entity> = self.world.iter_entities().map(|e| e.id()).collect();
        for entity in entities {
            self.world.despawn(entity);
        }
        self.grids.clear();
        self.blocks.clear();
        self.world.insert_resource(ReverserContext::default());
        self.world.insert_resource(ForceBuffer::default());
        self.world.insert_resource(RemovedBlocks::default());
        self.world.remove_resource::<ViewerPosition>();
        self.time_accumulator = 0.0;
        log::info!("simulation unloaded");
    }

    // ------------------------------------------------------------------------
    // Grids
    // ------------------------------------------------------------------------

    /// Register a grid. The returned entity identifies it in forces passed to
    /// a [`PhysicsSink`].
    pub fn spawn_grid(&mut self, id: u64, grid_size: f32, origin: Vec3, rotation: Quat) -> SimResult<Entity> {
        if self.grids.contains_key(&id) {
            return Err(SimError::DuplicateId(id));
        }
        let entity = self
            .world
            .spawn((GridId(id), CubeGrid::new(grid_size, origin, rotation)))
            .id();
        self.grids.insert(id, entity);
        Ok(entity)
    }

    /// Attach or update the grid's physics body.
    pub fn set_grid_physics(&mut self, id: u64, physics: GridPhysics) -> SimResult<()> {
        let entity = self.grid_entity(id)?;
        self.world.entity_mut(entity).insert(physics);
        Ok(())
    }

    /// Detach the grid's physics body; its reversers stop probing and pushing.
    pub fn remove_grid_physics(&mut self, id: u64) -> SimResult<()> {
        let entity = self.grid_entity(id)?;
        self.world.entity_mut(entity).remove::<GridPhysics>();
        Ok(())
    }

    /// Move a grid. Block transforms follow on the next tick.
    pub fn set_grid_transform(&mut self, id: u64, origin: Vec3, rotation: Quat) -> SimResult<()> {
        let entity = self.grid_entity(id)?;
        let mut grid = self
            .world
            .get_mut::<CubeGrid>(entity)
            .ok_or(SimError::MissingComponent { context: "set_grid_transform" })?;
        grid.origin = origin;
        grid.rotation = rotation;
        Ok(())
    }

    /// Entity of a registered grid.
    pub fn grid_entity(&self, id: u64) -> SimResult<Entity> {
        self.grids.get(&id).copied().ok_or(SimError::UnknownGrid(id))
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    /// Register a thruster block.
    pub fn add_thruster(
        &mut self,
        id: u64,
        grid: u64,
        subtype: &str,
        footprint: Footprint,
        force_magnitude: f32,
    ) -> SimResult<Entity> {
        let placement = self.placement(id, grid, footprint)?;
        self.place_block(id, grid, placement, ThrusterBundle::new(id, subtype, placement, force_magnitude))
    }

    /// Register a reverser block. Its door starts fully open.
    pub fn add_reverser(
        &mut self,
        id: u64,
        grid: u64,
        subtype: &str,
        footprint: Footprint,
        max_open: f32,
    ) -> SimResult<Entity> {
        if !(max_open > 0.0) {
            return Err(SimError::InvalidDoorDefinition(max_open));
        }
        let placement = self.placement(id, grid, footprint)?;
        let door = ReverserDoor::new(max_open);
        self.place_block(id, grid, placement, ReverserBundle::new(id, subtype, placement, door))
    }

    /// Forward the host's door reading for a reverser.
    pub fn set_door_state(&mut self, id: u64, open_ratio: f32, fully_open: bool, fully_closed: bool) -> SimResult<()> {
        let entity = self.block_entity(id)?;
        let mut door = self
            .world
            .get_mut::<ReverserDoor>(entity)
            .ok_or(SimError::WrongBlockKind { id, expected: "reverser" })?;
        door.open_ratio = open_ratio;
        door.fully_open = fully_open;
        door.fully_closed = fully_closed;
        Ok(())
    }

    /// Forward the host's throttle for a thruster.
    pub fn set_thrust_strength(&mut self, id: u64, strength: f32) -> SimResult<()> {
        let entity = self.block_entity(id)?;
        let mut thruster = self
            .world
            .get_mut::<Thruster>(entity)
            .ok_or(SimError::WrongBlockKind { id, expected: "thruster" })?;
        thruster.set_strength(strength);
        Ok(())
    }

    pub fn set_block_status(&mut self, id: u64, functional: bool, working: bool) -> SimResult<()> {
        let entity = self.block_entity(id)?;
        let mut status = self
            .world
            .get_mut::<BlockStatus>(entity)
            .ok_or(SimError::MissingComponent { context: "set_block_status" })?;
        status.functional = functional;
        status.working = working;
        Ok(())
    }

    /// Flag a block as closing. Systems see the flag on the next tick, which
    /// ends with the block despawned and its id released.
    pub fn mark_for_removal(&mut self, id: u64) -> SimResult<()> {
        let entity = self.block_entity(id)?;
        self.world.entity_mut(entity).insert(MarkedForRemoval);
        Ok(())
    }

    /// Despawn a block immediately. Links pointing at it are dropped on the
    /// next tick when the handle fails to resolve.
    pub fn remove_block(&mut self, id: u64) -> SimResult<()> {
        let entity = self.block_entity(id)?;
        if let Some(grid) = self.world.get::<BlockPlacement>(entity).map(|p| p.grid) {
            if let Some(mut grid) = self.world.get_mut::<CubeGrid>(grid) {
                grid.remove(entity);
            }
        }
        self.world.despawn(entity);
        self.blocks.remove(&id);
        log::debug!("block {} removed", id);
        Ok(())
    }

    /// Entity of a registered block.
    pub fn block_entity(&self, id: u64) -> SimResult<Entity> {
        self.blocks.get(&id).copied().ok_or(SimError::UnknownBlock(id))
    }

    /// Camera position used to cull distant flames; `None` shows all.
    pub fn set_viewer(&mut self, position: Option<Vec3>) {
        match position {
            Some(p) => self.world.insert_resource(ViewerPosition(p)),
            None => {
                self.world.remove_resource::<ViewerPosition>();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. Forces of the last tick stay readable through [`Self::forces`].
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.fixed_timestep();
        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Like [`Self::step`], but hands every tick's forces to `sink` as they
    /// are produced. The force buffer is empty afterwards.
    pub fn step_with(&mut self, dt: f32, sink: &mut impl PhysicsSink) {
        let fixed_dt = self.fixed_timestep();
        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            if let Some(mut buffer) = self.world.get_resource_mut::<ForceBuffer>() {
                buffer.drain_into(sink);
            }
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run exactly one fixed tick regardless of accumulated time.
    pub fn tick_once(&mut self) {
        let fixed_dt = self.fixed_timestep();
        self.fixed_update(fixed_dt);
    }

    fn fixed_timestep(&self) -> f32 {
        self.world
            .get_resource::<ReverserConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 60.0)
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        self.schedule.run(&mut self.world);

        // Release ids of blocks the removal system despawned.
        if let Some(mut removed) = self.world.get_resource_mut::<RemovedBlocks>() {
            for id in removed.ids.drain(..) {
                self.blocks.remove(&id);
            }
        }

        self.tick += 1;
        self.time += dt;
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Forces produced by the last tick.
    pub fn forces(&self) -> &[AppliedForce] {
        self.world
            .get_resource::<ForceBuffer>()
            .map(|b| b.forces.as_slice())
            .unwrap_or(&[])
    }

    /// Sum of the last tick's forces on one grid.
    pub fn total_force(&self, grid: u64) -> SimResult<Vec3> {
        let entity = self.grid_entity(grid)?;
        Ok(self
            .world
            .get_resource::<ForceBuffer>()
            .map_or(Vec3::ZERO, |b| b.total_for(entity)))
    }

    /// Id of the thruster a reverser is linked to.
    pub fn linked_thruster(&self, id: u64) -> SimResult<Option<u64>> {
        let entity = self.block_entity(id)?;
        let link = self
            .world
            .get::<ReverserLink>(entity)
            .ok_or(SimError::WrongBlockKind { id, expected: "reverser" })?;
        Ok(link
            .linked
            .and_then(|thruster| self.world.get::<BlockId>(thruster))
            .map(|b| b.0))
    }

    /// Redirected fraction last published by a reverser, for visuals.
    pub fn reflected_thrust(&self, id: u64) -> SimResult<f32> {
        let entity = self.block_entity(id)?;
        self.world
            .get::<ReflectedThrust>(entity)
            .map(|r| r.0)
            .ok_or(SimError::WrongBlockKind { id, expected: "reverser" })
    }

    pub fn flame_state(&self, id: u64) -> SimResult<FlameState> {
        let entity = self.block_entity(id)?;
        self.world
            .get::<FlameState>(entity)
            .copied()
            .ok_or(SimError::WrongBlockKind { id, expected: "thruster" })
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Validate a new block's id and footprint against its grid.
    fn placement(&self, id: u64, grid: u64, footprint: Footprint) -> SimResult<BlockPlacement> {
        if self.blocks.contains_key(&id) {
            return Err(SimError::DuplicateId(id));
        }
        if footprint.size.cmple(IVec3::ZERO).any() {
            return Err(SimError::InvalidFootprint(footprint.size));
        }
        let grid_entity = self.grid_entity(grid)?;
        let placement = BlockPlacement {
            grid: grid_entity,
            min: footprint.min,
            size: footprint.size,
            orientation: footprint.orientation,
        };

        let cube_grid = self
            .world
            .get::<CubeGrid>(grid_entity)
            .ok_or(SimError::MissingGrid { context: "add_block" })?;
        if let Some(cell) = placement.cells().find(|c| cube_grid.block_at(*c).is_some()) {
            return Err(SimError::CellOccupied { grid, cell });
        }
        Ok(placement)
    }

    fn place_block(&mut self, id: u64, grid: u64, placement: BlockPlacement, bundle: impl Bundle) -> SimResult<Entity> {
        let entity = self.world.spawn(bundle).id();

        let inserted = match self.world.get_mut::<CubeGrid>(placement.grid) {
            Some(mut cube_grid) => {
                let transform = cube_grid.block_transform(&placement);
                cube_grid
                    .insert(entity, &placement)
                    .map(|()| transform)
                    .map_err(|cell| SimError::CellOccupied { grid, cell })
            }
            None => Err(SimError::MissingGrid { context: "add_block" }),
        };

        match inserted {
            Ok(transform) => {
                self.world.entity_mut(entity).insert(transform);
                self.blocks.insert(id, entity);
                log::debug!("block {} placed on grid {} at {}", id, grid, placement.min);
                Ok(entity)
            }
            Err(e) => {
                self.world.despawn(entity);
                Err(e)
            }
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

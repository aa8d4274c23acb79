//! Demonstration of a thrust reverser braking a moving grid.
//!
//! Run with: RUST_LOG=debug cargo run --example reverser_demo

use glam::{IVec3, Quat, Vec3};
use trv_sim::config::{LARGE_BLOCK_LARGE_ATMO, LARGE_BLOCK_SMALL_ATMO};
use trv_sim::grid::LARGE_GRID_SIZE;
use trv_sim::host_bridge::{
    forces_to_flatbuffer, force_offset, parse_count, read_id, FORCE_GRID_ID, FORCE_X,
};
use trv_sim::{Footprint, GridPhysics, ModInfo, SessionInfo, SimWorld};

const GRID: u64 = 1;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Thrust Reversers - Simulation Demo ===\n");

    let mut sim = SimWorld::new();
    sim.load_session(&SessionInfo {
        mods: vec![ModInfo::new(1, "Some Other Mod")],
        is_server: true,
        is_dedicated: false,
    });

    if let Err(e) = build_ship(&mut sim) {
        log::error!("failed to build demo ship: {}", e);
        return;
    }

    // Close the doors over two seconds while thrusters run at full power.
    println!("Closing reverser doors over 120 ticks...\n");
    for tick in 0..120u32 {
        let open = 1.0 - (tick as f32 / 119.0);
        for reverser in [20, 21] {
            if let Err(e) = sim.set_door_state(reverser, open, tick == 0, tick == 119) {
                log::warn!("door update failed: {}", e);
            }
        }
        sim.step(1.0 / 60.0);

        if (tick + 1) % 20 == 0 {
            print_forces(&mut sim);
        }
    }

    println!("\n--- Removing thruster 11 ---\n");
    if let Err(e) = sim.mark_for_removal(11) {
        log::warn!("{}", e);
    }
    sim.step(1.0 / 60.0);
    print_forces(&mut sim);

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("snapshot serialization failed: {}", e),
    }
}

/// Two thrusters firing toward -Z, each covered by a reverser.
fn build_ship(sim: &mut SimWorld) -> trv_sim::SimResult<()> {
    sim.spawn_grid(GRID, LARGE_GRID_SIZE, Vec3::ZERO, Quat::IDENTITY)?;
    sim.set_grid_physics(GRID, GridPhysics::dynamic(Vec3::new(0.0, 0.0, 2.0)))?;

    sim.add_thruster(10, GRID, LARGE_BLOCK_LARGE_ATMO, Footprint::single(IVec3::new(0, 0, 1), Quat::IDENTITY), 6_480_000.0)?;
    sim.add_thruster(11, GRID, LARGE_BLOCK_SMALL_ATMO, Footprint::single(IVec3::new(2, 0, 1), Quat::IDENTITY), 648_000.0)?;
    sim.add_reverser(20, GRID, "LargeThrustReverser", Footprint::single(IVec3::ZERO, Quat::IDENTITY), 1.0)?;
    sim.add_reverser(21, GRID, "LargeThrustReverser", Footprint::single(IVec3::new(2, 0, 0), Quat::IDENTITY), 1.0)?;

    sim.set_thrust_strength(10, 1.0)?;
    sim.set_thrust_strength(11, 1.0)?;
    Ok(())
}

fn print_forces(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    let buffer = forces_to_flatbuffer(&snapshot);
    let count = parse_count(&buffer).unwrap_or(0);

    println!("--- Tick {} (t={:.2}s) ---", snapshot.tick, snapshot.time);
    for reverser in &snapshot.reversers {
        println!(
            "  Reverser {}: closed={:.2} reflected={:.2} linked={:?}",
            reverser.id, reverser.closed_ratio, reverser.reflected_thrust, reverser.linked
        );
    }
    for i in 0..count {
        let grid = read_id(&buffer, force_offset(i) + FORCE_GRID_ID).unwrap_or_default();
        let offset = force_offset(i) + FORCE_X;
        println!(
            "  Force {} on grid {}: ({:.0}, {:.0}, {:.0})",
            i,
            grid,
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2]
        );
    }
}

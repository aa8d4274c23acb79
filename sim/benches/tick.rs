//! Tick cost over many linked reverser pairs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{IVec3, Quat, Vec3};
use trv_sim::config::LARGE_BLOCK_LARGE_ATMO;
use trv_sim::grid::LARGE_GRID_SIZE;
use trv_sim::{Footprint, GridPhysics, SimWorld};

const PAIR_COUNTS: &[u64] = &[10, 100, 1000];

/// One grid with `pairs` thruster/reverser pairs laid out along X, every
/// door half closed.
fn build_world(pairs: u64) -> SimWorld {
    let mut sim = SimWorld::new();
    sim.spawn_grid(1, LARGE_GRID_SIZE, Vec3::ZERO, Quat::IDENTITY).unwrap();
    sim.set_grid_physics(1, GridPhysics::dynamic(Vec3::ZERO)).unwrap();

    for i in 0..pairs {
        let x = i as i32;
        let thruster = 2 * i + 10;
        let reverser = thruster + 1;
        sim.add_thruster(
            thruster,
            1,
            LARGE_BLOCK_LARGE_ATMO,
            Footprint::single(IVec3::new(x, 0, 1), Quat::IDENTITY),
            1000.0,
        )
        .unwrap();
        sim.add_reverser(
            reverser,
            1,
            "LargeThrustReverser",
            Footprint::single(IVec3::new(x, 0, 0), Quat::IDENTITY),
            1.0,
        )
        .unwrap();
        sim.set_thrust_strength(thruster, 1.0).unwrap();
        sim.set_door_state(reverser, 0.2, false, false).unwrap();
    }

    // First tick links every pair.
    sim.tick_once();
    sim
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for &pairs in PAIR_COUNTS {
        group.bench_with_input(BenchmarkId::new("linked_pairs", pairs), &pairs, |b, &pairs| {
            let mut sim = build_world(pairs);
            b.iter(|| {
                sim.tick_once();
                black_box(sim.forces().len())
            });
        });
    }
    group.finish();
}

fn bench_probe(c: &mut Criterion) {
    c.bench_function("first_tick_probe_1000", |b| {
        b.iter_batched(
            || {
                let mut sim = build_world(0);
                for i in 0..1000u64 {
                    sim.add_reverser(
                        100 + i,
                        1,
                        "LargeThrustReverser",
                        Footprint::single(IVec3::new(i as i32, 5, 0), Quat::IDENTITY),
                        1.0,
                    )
                    .unwrap();
                }
                sim
            },
            |mut sim| {
                sim.tick_once();
                black_box(sim.current_tick())
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_tick, bench_probe);
criterion_main!(benches);

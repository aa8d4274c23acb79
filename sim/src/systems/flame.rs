//! Flame system - per-thruster flame and light parameters for the renderer.
//!
//! Only runs on sessions that render. The flame shortens and fades as the
//! covering reverser redirects more of the thruster's output.

use crate::compat::ReverserContext;
use crate::components::*;
use crate::config::*;
use bevy_ecs::prelude::*;
use glam::{Vec3, Vec4};

/// Camera position of the local player; flames beyond a thruster's view
/// distance are hidden. Without it every working flame is visible.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct ViewerPosition(pub Vec3);

/// Per-subtype flame dimensions.
///
/// Offsets are measured from a flame's origin along its direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlameProfile {
    pub max_view_distance: f32,
    pub length: f32,
    pub thickness: f32,
    pub light_offset: f32,
    pub light_jet_offset: f32,
    /// Where the glow point billboard sits.
    pub point_offset: f32,
    /// Glow point size as a multiple of the thickness.
    pub point_scale: f32,
    pub cone_offset: f32,
    pub cone_height: f32,
    pub cone_radius: f32,
}

impl FlameProfile {
    pub fn for_subtype(subtype: &str) -> Option<Self> {
        let profile = match subtype {
            LARGE_BLOCK_LARGE_ATMO => Self {
                max_view_distance: 1200.0,
                length: 5.0,
                thickness: 1.6,
                light_offset: 0.75,
                light_jet_offset: 1.75,
                point_offset: 0.0,
                point_scale: 1.3,
                cone_offset: -3.5,
                cone_height: 18.0,
                cone_radius: 2.65,
            },
            LARGE_BLOCK_SMALL_ATMO => Self {
                max_view_distance: 800.0,
                length: 3.0,
                thickness: 0.5,
                light_offset: 0.0,
                light_jet_offset: 1.75,
                point_offset: 0.0,
                point_scale: 1.4,
                cone_offset: -1.75,
                cone_height: 10.0,
                cone_radius: 0.8,
            },
            SMALL_BLOCK_LARGE_ATMO => Self {
                max_view_distance: 500.0,
                length: 1.0,
                thickness: 0.325,
                light_offset: 0.75,
                light_jet_offset: 1.75,
                point_offset: 0.325,
                point_scale: 1.1,
                cone_offset: 0.0,
                cone_height: 2.0,
                cone_radius: 0.4225,
            },
            SMALL_BLOCK_SMALL_ATMO => Self {
                max_view_distance: 300.0,
                length: 0.75,
                thickness: 0.1,
                light_offset: 0.75,
                light_jet_offset: 1.5,
                point_offset: 0.15,
                point_scale: 1.4,
                cone_offset: -0.05,
                cone_height: 1.2,
                cone_radius: 0.15,
            },
            _ => return None,
        };
        Some(profile)
    }
}

const IDLE_COLOR: Vec4 = Vec4::new(0.5 * 0.25, 0.6 * 0.25, 0.25, 0.25);
const FULL_COLOR: Vec4 = Vec4::new(1.0, 0.3, 0.0, 1.0);

/// Compute the next flame state for a working, visible thruster.
pub fn compute_flame(
    profile: &FlameProfile,
    strength: f32,
    transform: &BlockTransform,
    closed_multiplier: f32,
    previous_color_lerp: f32,
) -> FlameState {
    let amount = (strength * 2.0).min(1.0);
    let length = amount.max(0.25) * profile.length * 3.0 * closed_multiplier;
    let color_lerp = previous_color_lerp + (amount - previous_color_lerp) * 0.25;
    let color = IDLE_COLOR.lerp(FULL_COLOR, color_lerp);

    FlameState {
        visible: true,
        alpha: closed_multiplier,
        length,
        thickness: profile.thickness,
        color_lerp,
        color,
        light_position: transform.translation + transform.forward() * profile.light_offset,
        light_intensity: 100.0 * (color.w * 2.0).max(0.5),
        light_range: profile.thickness * 2.0,
        jet_light_position: transform.translation + transform.forward() * profile.light_jet_offset,
        jet_light_intensity: 10.0 * color.w,
        jet_light_range: length * 0.75,
        point_offset: profile.point_offset,
        point_size: profile.thickness * profile.point_scale,
        cone_offset: profile.cone_offset,
        cone_height: profile.cone_height,
        cone_radius: profile.cone_radius,
    }
}

/// System that updates flame parameters of every thruster.
pub fn flame_system(
    ctx: Res<ReverserContext>,
    viewer: Option<Res<ViewerPosition>>,
    reversers: Query<&ReflectedThrust, Without<MarkedForRemoval>>,
    mut thrusters: Query<(
        &Subtype,
        &Thruster,
        &BlockTransform,
        &BlockStatus,
        &mut ThrusterVisual,
        &mut FlameState,
    )>,
) {
    if !ctx.is_player {
        return;
    }

    for (subtype, thruster, transform, status, mut visual, mut flame) in thrusters.iter_mut() {
        let Some(profile) = FlameProfile::for_subtype(&subtype.0) else {
            continue;
        };

        let in_view = viewer.as_ref().map_or(true, |v| {
            v.0.distance_squared(transform.position())
                <= profile.max_view_distance * profile.max_view_distance
        });

        if !status.working || !in_view {
            if flame.visible {
                *flame = FlameState {
                    color_lerp: flame.color_lerp,
                    ..Default::default()
                };
            }
            continue;
        }

        let mut closed_multiplier = 1.0;
        if let Some(reverser) = visual.reverser {
            match reversers.get(reverser) {
                Ok(reflected) => closed_multiplier = 1.0 - reflected.0,
                Err(_) => visual.reverser = None,
            }
        }

        *flame = compute_flame(
            &profile,
            thruster.current_strength,
            transform,
            closed_multiplier,
            flame.color_lerp,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_thruster(world: &mut World, strength: f32) -> Entity {
        world
            .spawn((
                Subtype(LARGE_BLOCK_LARGE_ATMO.to_string()),
                Thruster {
                    force_magnitude: 100.0,
                    current_strength: strength,
                },
                BlockTransform::default(),
                BlockStatus::default(),
                ThrusterVisual::default(),
                FlameState::default(),
            ))
            .id()
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(flame_system);
        schedule.run(world);
    }

    #[test]
    fn test_unknown_subtype_has_no_profile() {
        assert!(FlameProfile::for_subtype("LargeBlockLargeHydrogenThrust").is_none());
        assert!(FlameProfile::for_subtype(SMALL_BLOCK_SMALL_ATMO).is_some());
    }

    #[test]
    fn test_flame_length_follows_throttle() {
        let profile = FlameProfile::for_subtype(LARGE_BLOCK_LARGE_ATMO).unwrap();
        let t = BlockTransform::default();

        // Idle flames keep a quarter length.
        let idle = compute_flame(&profile, 0.0, &t, 1.0, 0.0);
        assert!((idle.length - 0.25 * 5.0 * 3.0).abs() < 1e-5);

        // Half throttle already saturates the flame.
        let half = compute_flame(&profile, 0.5, &t, 1.0, 0.0);
        assert!((half.length - 15.0).abs() < 1e-5);
        assert!((half.jet_light_range - 11.25).abs() < 1e-5);
        assert_eq!(half.light_position, Vec3::new(0.0, 0.0, -0.75));
    }

    #[test]
    fn test_cone_and_point_follow_profile() {
        let t = BlockTransform::default();

        let large = FlameProfile::for_subtype(LARGE_BLOCK_LARGE_ATMO).unwrap();
        let flame = compute_flame(&large, 1.0, &t, 0.5, 0.0);
        assert_eq!(flame.cone_height, 18.0);
        assert_eq!(flame.cone_radius, 2.65);
        assert_eq!(flame.cone_offset, -3.5);
        assert!((flame.point_size - 1.6 * 1.3).abs() < 1e-6);

        let small = FlameProfile::for_subtype(SMALL_BLOCK_SMALL_ATMO).unwrap();
        let flame = compute_flame(&small, 1.0, &t, 1.0, 0.0);
        assert_eq!(flame.point_offset, 0.15);
        assert!((flame.point_size - 0.14).abs() < 1e-6);
        assert_eq!(flame.cone_height, 1.2);
    }

    #[test]
    fn test_color_eases_toward_throttle() {
        let profile = FlameProfile::for_subtype(LARGE_BLOCK_LARGE_ATMO).unwrap();
        let t = BlockTransform::default();
        let first = compute_flame(&profile, 1.0, &t, 1.0, 0.0);
        assert!((first.color_lerp - 0.25).abs() < 1e-6);
        let second = compute_flame(&profile, 1.0, &t, 1.0, first.color_lerp);
        assert!((second.color_lerp - 0.4375).abs() < 1e-6);
    }

    #[test]
    fn test_reverser_dims_flame() {
        let mut world = World::new();
        world.insert_resource(ReverserContext::default());
        let reverser = world.spawn(ReflectedThrust(0.75)).id();
        let thruster = spawn_thruster(&mut world, 1.0);
        world.get_mut::<ThrusterVisual>(thruster).unwrap().reverser = Some(reverser);

        run(&mut world);

        let flame = world.get::<FlameState>(thruster).unwrap();
        assert!(flame.visible);
        assert!((flame.alpha - 0.25).abs() < 1e-6);
        assert!((flame.length - 15.0 * 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_full_reflection_suppresses_flame() {
        let mut world = World::new();
        world.insert_resource(ReverserContext::default());
        let reverser = world.spawn(ReflectedThrust(1.0)).id();
        let thruster = spawn_thruster(&mut world, 1.0);
        world.get_mut::<ThrusterVisual>(thruster).unwrap().reverser = Some(reverser);

        run(&mut world);

        let flame = world.get::<FlameState>(thruster).unwrap();
        assert_eq!(flame.alpha, 0.0);
        assert_eq!(flame.length, 0.0);
    }

    #[test]
    fn test_gone_reverser_is_forgotten() {
        let mut world = World::new();
        world.insert_resource(ReverserContext::default());
        let reverser = world.spawn(ReflectedThrust(1.0)).id();
        let thruster = spawn_thruster(&mut world, 1.0);
        world.get_mut::<ThrusterVisual>(thruster).unwrap().reverser = Some(reverser);
        world.despawn(reverser);

        run(&mut world);

        assert_eq!(world.get::<ThrusterVisual>(thruster).unwrap().reverser, None);
        assert_eq!(world.get::<FlameState>(thruster).unwrap().alpha, 1.0);
    }

    #[test]
    fn test_far_viewer_hides_flame() {
        let mut world = World::new();
        world.insert_resource(ReverserContext::default());
        world.insert_resource(ViewerPosition(Vec3::new(0.0, 0.0, 5000.0)));
        let thruster = spawn_thruster(&mut world, 1.0);

        run(&mut world);
        assert!(!world.get::<FlameState>(thruster).unwrap().visible);

        world.insert_resource(ViewerPosition(Vec3::new(0.0, 0.0, 50.0)));
        run(&mut world);
        assert!(world.get::<FlameState>(thruster).unwrap().visible);
    }

    #[test]
    fn test_dedicated_server_skips_flames() {
        let mut world = World::new();
        world.insert_resource(ReverserContext {
            realistic_thrusters: false,
            is_player: false,
        });
        let thruster = spawn_thruster(&mut world, 1.0);

        run(&mut world);
        assert_eq!(*world.get::<FlameState>(thruster).unwrap(), FlameState::default());
    }
}

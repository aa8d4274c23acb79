//! ECS Components for the thrust reverser simulation.
//!
//! Components are pure data containers attached to block entities.
//! All per-tick logic lives in systems that query these components.
//! The capability traits at the bottom of the file let helpers work on any
//! component playing a role, without caring which entity it sits on.

use bevy_ecs::prelude::*;
use glam::{IVec3, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World-space orientation and position of a block.
///
/// Axes follow the host's convention: forward is -Z, up is +Y.
/// Derived each tick from [`BlockPlacement`] and the owning grid.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockTransform {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Default for BlockTransform {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }
}

impl BlockTransform {
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self { rotation, translation }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn backward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Where a block sits inside its grid.
///
/// The footprint is an axis-aligned box of cells in grid space starting at
/// `min`; `orientation` is the block's rotation relative to the grid.
#[derive(Component, Debug, Clone, Copy)]
pub struct BlockPlacement {
    pub grid: Entity,
    pub min: IVec3,
    pub size: IVec3,
    pub orientation: Quat,
}

impl BlockPlacement {
    pub fn single(grid: Entity, cell: IVec3, orientation: Quat) -> Self {
        Self {
            grid,
            min: cell,
            size: IVec3::ONE,
            orientation,
        }
    }

    /// Every cell covered by the footprint.
    pub fn cells(&self) -> impl Iterator<Item = IVec3> + '_ {
        let max = self.min + self.size;
        (self.min.x..max.x).flat_map(move |x| {
            (self.min.y..max.y).flat_map(move |y| (self.min.z..max.z).map(move |z| IVec3::new(x, y, z)))
        })
    }

    /// Footprint center in grid-local units, before scaling by grid size.
    pub fn center_local(&self) -> Vec3 {
        self.min.as_vec3() + (self.size.as_vec3() - Vec3::ONE) * 0.5
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Host-supplied identifier for a block.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Host-supplied identifier for a grid.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridId(pub u64);

/// Block definition subtype, e.g. `LargeBlockLargeAtmosphericThrust`.
#[derive(Component, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subtype(pub String);

// ============================================================================
// STATUS COMPONENTS
// ============================================================================

/// Health and power state as reported by the host.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatus {
    /// Built to full integrity.
    pub functional: bool,
    /// Functional, enabled and powered.
    pub working: bool,
}

impl Default for BlockStatus {
    fn default() -> Self {
        Self {
            functional: true,
            working: true,
        }
    }
}

/// The host has closed this block or scheduled it for closing.
/// Despawned at the end of the tick it was observed in.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct MarkedForRemoval;

// ============================================================================
// THRUSTER COMPONENTS
// ============================================================================

/// Atmospheric thruster state.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thruster {
    /// Force at full throttle, in newtons.
    pub force_magnitude: f32,
    /// Current throttle in [0, 1].
    pub current_strength: f32,
}

impl Thruster {
    pub fn new(force_magnitude: f32) -> Self {
        Self {
            force_magnitude,
            current_strength: 0.0,
        }
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.current_strength = strength.clamp(0.0, 1.0);
    }
}

/// Visual-side back reference from a thruster to the reverser covering it.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ThrusterVisual {
    pub reverser: Option<Entity>,
}

/// Flame and light parameters for the host renderer, recomputed every tick.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlameState {
    pub visible: bool,
    /// Flame opacity multiplier; 1 minus the reverser's reflected thrust.
    pub alpha: f32,
    pub length: f32,
    pub thickness: f32,
    /// Smoothed throttle driving the trail colour.
    pub color_lerp: f32,
    pub color: Vec4,
    pub light_position: Vec3,
    pub light_intensity: f32,
    pub light_range: f32,
    pub jet_light_position: Vec3,
    pub jet_light_intensity: f32,
    pub jet_light_range: f32,
    /// Glow point distance along the flame direction.
    pub point_offset: f32,
    pub point_size: f32,
    /// Inner cone placement along the flame direction.
    pub cone_offset: f32,
    pub cone_height: f32,
    pub cone_radius: f32,
}

impl Default for FlameState {
    fn default() -> Self {
        Self {
            visible: false,
            alpha: 1.0,
            length: 0.0,
            thickness: 0.0,
            color_lerp: 0.0,
            color: Vec4::ZERO,
            light_position: Vec3::ZERO,
            light_intensity: 0.0,
            light_range: 0.0,
            jet_light_position: Vec3::ZERO,
            jet_light_intensity: 0.0,
            jet_light_range: 0.0,
            point_offset: 0.0,
            point_size: 0.0,
            cone_offset: 0.0,
            cone_height: 0.0,
            cone_radius: 0.0,
        }
    }
}

// ============================================================================
// REVERSER COMPONENTS
// ============================================================================

/// Door-like block that covers a thruster's exhaust.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverserDoor {
    /// Open ratio as reported by the host.
    pub open_ratio: f32,
    /// Travel of the first opening step; the host's open ratio tops out here.
    pub max_open: f32,
    pub fully_open: bool,
    pub fully_closed: bool,
}

impl ReverserDoor {
    /// A door that starts fully open.
    pub fn new(max_open: f32) -> Self {
        Self {
            open_ratio: max_open,
            max_open,
            fully_open: true,
            fully_closed: false,
        }
    }

    pub fn closed(max_open: f32) -> Self {
        Self {
            open_ratio: 0.0,
            max_open,
            fully_open: false,
            fully_closed: true,
        }
    }
}

/// Link state of a reverser. Owned exclusively by the reverser entity.
#[derive(Component, Debug, Clone, Copy)]
pub struct ReverserLink {
    pub linked: Option<Entity>,
    /// Ticks since the last probe. Starts saturated so the first tick probes.
    pub link_skip: u32,
}

impl Default for ReverserLink {
    fn default() -> Self {
        Self {
            linked: None,
            link_skip: u32::MAX,
        }
    }
}

impl ReverserLink {
    /// Advance the probe counter; true when a probe is due this tick.
    pub fn probe_due(&mut self, interval: u32) -> bool {
        self.link_skip = self.link_skip.saturating_add(1);
        if self.link_skip >= interval {
            self.link_skip = 0;
            true
        } else {
            false
        }
    }
}

/// Fraction of the linked thruster's output the reverser currently redirects.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectedThrust(pub f32);

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Anything with a world transform.
pub trait Positionable {
    fn world_transform(&self) -> &BlockTransform;

    fn position(&self) -> Vec3 {
        self.world_transform().translation
    }
}

impl Positionable for BlockTransform {
    fn world_transform(&self) -> &BlockTransform {
        self
    }
}

/// A block that produces thrust.
pub trait ThrustSource {
    fn force_magnitude(&self) -> f32;
    fn current_strength(&self) -> f32;

    /// Force currently produced, in newtons.
    fn output(&self) -> f32 {
        self.force_magnitude() * self.current_strength()
    }
}

impl ThrustSource for Thruster {
    fn force_magnitude(&self) -> f32 {
        self.force_magnitude
    }

    fn current_strength(&self) -> f32 {
        self.current_strength
    }
}

/// A block whose closure can be read as a ratio.
pub trait ReversibleDoor {
    /// 1 when shut, 0 when open.
    fn closed_ratio(&self) -> f32;
}

impl ReversibleDoor for ReverserDoor {
    fn closed_ratio(&self) -> f32 {
        // The host's open ratio does not reach 1 on doors whose opening and
        // closing sequences differ in length, so the flags win and the ratio
        // is rescaled by the first step's travel.
        if self.fully_closed {
            1.0
        } else if self.fully_open {
            0.0
        } else {
            (1.0 - self.open_ratio / self.max_open).clamp(0.0, 1.0)
        }
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a thruster block.
#[derive(Bundle)]
pub struct ThrusterBundle {
    pub id: BlockId,
    pub subtype: Subtype,
    pub placement: BlockPlacement,
    pub transform: BlockTransform,
    pub status: BlockStatus,
    pub thruster: Thruster,
    pub visual: ThrusterVisual,
    pub flame: FlameState,
}

impl ThrusterBundle {
    pub fn new(id: u64, subtype: &str, placement: BlockPlacement, force_magnitude: f32) -> Self {
        Self {
            id: BlockId(id),
            subtype: Subtype(subtype.to_string()),
            placement,
            transform: BlockTransform::default(),
            status: BlockStatus::default(),
            thruster: Thruster::new(force_magnitude),
            visual: ThrusterVisual::default(),
            flame: FlameState::default(),
        }
    }
}

/// Bundle for spawning a reverser block.
#[derive(Bundle)]
pub struct ReverserBundle {
    pub id: BlockId,
    pub subtype: Subtype,
    pub placement: BlockPlacement,
    pub transform: BlockTransform,
    pub status: BlockStatus,
    pub door: ReverserDoor,
    pub link: ReverserLink,
    pub reflected: ReflectedThrust,
}

impl ReverserBundle {
    pub fn new(id: u64, subtype: &str, placement: BlockPlacement, door: ReverserDoor) -> Self {
        Self {
            id: BlockId(id),
            subtype: Subtype(subtype.to_string()),
            placement,
            transform: BlockTransform::default(),
            status: BlockStatus::default(),
            door,
            link: ReverserLink::default(),
            reflected: ReflectedThrust::default(),
        }
    }
}

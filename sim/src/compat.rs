//! Session context shared by every reverser in a world.
//!
//! Built once when a session loads and read-only afterwards. It replaces any
//! process-wide mod state: systems read it as an ECS resource.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Published id of the companion mod that moves thrust to the thruster's
/// own position.
pub const REALISTIC_THRUSTERS_MOD_ID: u64 = 575_893_643;

/// Name the companion mod carries when loaded from a local dev folder.
pub const REALISTIC_THRUSTERS_LOCAL: &str = "ImprovedThrusters.dev";

/// One entry of the host's active mod list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    /// Workshop id, 0 for locally loaded mods.
    pub published_file_id: u64,
    pub name: String,
}

impl ModInfo {
    pub fn new(published_file_id: u64, name: &str) -> Self {
        Self {
            published_file_id,
            name: name.to_string(),
        }
    }
}

/// What the host tells us about the session at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub mods: Vec<ModInfo>,
    pub is_server: bool,
    pub is_dedicated: bool,
}

/// Whether the realistic-thrusters companion mod is in the mod list.
pub fn detect_realistic_thrusters(mods: &[ModInfo]) -> bool {
    mods.iter().any(|m| {
        m.published_file_id == REALISTIC_THRUSTERS_MOD_ID
            || (m.published_file_id == 0 && m.name == REALISTIC_THRUSTERS_LOCAL)
    })
}

/// Context resource read by the force and flame systems.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverserContext {
    /// Apply redirected thrust at the thruster instead of the center of mass.
    pub realistic_thrusters: bool,
    /// The session renders; false on dedicated servers.
    pub is_player: bool,
}

impl Default for ReverserContext {
    fn default() -> Self {
        Self {
            realistic_thrusters: false,
            is_player: true,
        }
    }
}

impl ReverserContext {
    pub fn from_session(session: &SessionInfo) -> Self {
        let realistic_thrusters = detect_realistic_thrusters(&session.mods);
        if realistic_thrusters {
            log::info!("Realistic Thrusters mod found, will adjust the thrust reversers accordingly.");
        }
        Self {
            realistic_thrusters,
            is_player: !(session.is_server && session.is_dedicated),
        }
    }
}

//! Runtime configuration for the reverser simulation.
//!
//! [`ReverserConfig`] is an ECS [`Resource`]. It can be built in code or read
//! from TOML; missing keys fall back to the defaults below, so a file only
//! needs the values it overrides:
//!
//! ```toml
//! policy = "door_reflect"
//! link_interval_ticks = 30
//! ```

use crate::error::SimResult;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Thrust redirected per unit of throttle and closure.
pub const REVERSER_EFFICIENCY: f32 = 1.75;

/// Closure below which the reverse-block policy redirects nothing.
pub const REVERSE_ENGAGE_THRESHOLD: f32 = 0.4;

/// Ticks between link probes of an unlinked reverser.
pub const LINK_INTERVAL_TICKS: u32 = 60;

pub const LARGE_BLOCK_LARGE_ATMO: &str = "LargeBlockLargeAtmosphericThrust";
pub const LARGE_BLOCK_SMALL_ATMO: &str = "LargeBlockSmallAtmosphericThrust";
pub const SMALL_BLOCK_LARGE_ATMO: &str = "SmallBlockLargeAtmosphericThrust";
pub const SMALL_BLOCK_SMALL_ATMO: &str = "SmallBlockSmallAtmosphericThrust";

/// How a closed reverser turns thruster output into force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversePolicy {
    /// Force scales with closure directly, from the first bit of travel.
    DoorReflect,
    /// Force engages past the engage threshold and ramps to full at full
    /// closure. The ratio is reported to the flame so it dims accordingly.
    #[default]
    ReverseBlock,
}

/// Configuration for the reverser simulation.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverserConfig {
    /// Fixed timestep in seconds.
    pub fixed_timestep: f32,
    /// Ticks between link probes while a reverser is unlinked.
    pub link_interval_ticks: u32,
    pub policy: ReversePolicy,
    /// Multiplier applied to redirected thrust.
    pub efficiency: f32,
    /// Closed ratio where the reverse-block policy starts redirecting.
    pub engage_threshold: f32,
    /// Thruster subtypes a reverser may link to.
    pub linkable_thrusters: BTreeSet<String>,
}

impl Default for ReverserConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            link_interval_ticks: LINK_INTERVAL_TICKS,
            policy: ReversePolicy::ReverseBlock,
            efficiency: REVERSER_EFFICIENCY,
            engage_threshold: REVERSE_ENGAGE_THRESHOLD,
            linkable_thrusters: [
                LARGE_BLOCK_LARGE_ATMO,
                LARGE_BLOCK_SMALL_ATMO,
                SMALL_BLOCK_LARGE_ATMO,
                SMALL_BLOCK_SMALL_ATMO,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ReverserConfig {
    /// The earlier standalone behaviour: door-reflect force and no
    /// small-grid small thruster in the allow-list.
    pub fn legacy() -> Self {
        let mut config = Self {
            policy: ReversePolicy::DoorReflect,
            ..Default::default()
        };
        config.linkable_thrusters.remove(SMALL_BLOCK_SMALL_ATMO);
        config
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let config = toml::from_str::<ReverserConfig>(text)?;
        Ok(config.sanitized())
    }

    /// Read a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Read a config file, falling back to defaults on any failure.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn is_linkable(&self, subtype: &str) -> bool {
        self.linkable_thrusters.contains(subtype)
    }

    /// Replace values that would stall the tick loop or produce NaN forces.
    pub(crate) fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.fixed_timestep > 0.0) {
            log::warn!(
                "fixed_timestep {} is not positive; using {}",
                self.fixed_timestep,
                defaults.fixed_timestep
            );
            self.fixed_timestep = defaults.fixed_timestep;
        }
        if !(0.0..1.0).contains(&self.engage_threshold) {
            log::warn!(
                "engage_threshold {} outside [0, 1); using {}",
                self.engage_threshold,
                defaults.engage_threshold
            );
            self.engage_threshold = defaults.engage_threshold;
        }
        if !self.efficiency.is_finite() {
            log::warn!(
                "efficiency {} is not finite; using {}",
                self.efficiency,
                defaults.efficiency
            );
            self.efficiency = defaults.efficiency;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reverse_block_mod() {
        let config = ReverserConfig::default();
        assert_eq!(config.policy, ReversePolicy::ReverseBlock);
        assert_eq!(config.link_interval_ticks, 60);
        assert_eq!(config.efficiency, 1.75);
        assert_eq!(config.linkable_thrusters.len(), 4);
        assert!(config.is_linkable(SMALL_BLOCK_SMALL_ATMO));
    }

    #[test]
    fn test_legacy_preset() {
        let config = ReverserConfig::legacy();
        assert_eq!(config.policy, ReversePolicy::DoorReflect);
        assert_eq!(config.linkable_thrusters.len(), 3);
        assert!(!config.is_linkable(SMALL_BLOCK_SMALL_ATMO));
        assert!(config.is_linkable(LARGE_BLOCK_LARGE_ATMO));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReverserConfig::from_toml_str(
            r#"
            policy = "door_reflect"
            link_interval_ticks = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.policy, ReversePolicy::DoorReflect);
        assert_eq!(config.link_interval_ticks, 30);
        assert_eq!(config.efficiency, 1.75);
        assert_eq!(config.linkable_thrusters.len(), 4);
    }

    #[test]
    fn test_toml_allow_list_override() {
        let config = ReverserConfig::from_toml_str(
            r#"linkable_thrusters = ["LargeBlockLargeAtmosphericThrust"]"#,
        )
        .unwrap();
        assert!(config.is_linkable(LARGE_BLOCK_LARGE_ATMO));
        assert!(!config.is_linkable(LARGE_BLOCK_SMALL_ATMO));
    }

    #[test]
    fn test_bad_values_are_replaced() {
        let config =
            ReverserConfig::from_toml_str("fixed_timestep = 0.0\nengage_threshold = 1.5").unwrap();
        assert!(config.fixed_timestep > 0.0);
        assert_eq!(config.engage_threshold, REVERSE_ENGAGE_THRESHOLD);
    }

    #[test]
    fn test_sanitized_keeps_valid_values() {
        let config = ReverserConfig {
            fixed_timestep: 0.05,
            engage_threshold: 0.0,
            efficiency: 2.0,
            ..Default::default()
        };
        assert_eq!(config.clone().sanitized(), config);

        let bad = ReverserConfig {
            engage_threshold: 1.0,
            efficiency: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(bad.engage_threshold, REVERSE_ENGAGE_THRESHOLD);
        assert_eq!(bad.efficiency, REVERSER_EFFICIENCY);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(ReverserConfig::from_toml_str("policy = 3").is_err());
        let config = ReverserConfig::load_or_default("/nonexistent/reverser.toml");
        assert_eq!(config, ReverserConfig::default());
    }
}

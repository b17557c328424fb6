//! Combat rules configuration with documented constants
//!
//! All tunable numbers are collected here with explanations of their
//! purpose and how they interact with each other.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{CombatError, Result};

/// Configuration for the combat rules pipeline
///
/// These values have been tuned to produce classic stack-combat pacing.
/// Changing them will affect battle length and casualty rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === ROUNDS ===
    /// Hard cap on battle length. A battle that reaches this round count
    /// is force-terminated and scored as a defender win.
    pub max_rounds: u32,

    // === ATTACK / DEFENSE SCALING ===
    /// Damage bonus per point of attack advantage (attacker attack above
    /// defender defense).
    ///
    /// At 0.05, a +10 advantage yields +50% damage.
    pub attack_bonus_per_point: f32,

    /// Cap on the attack advantage that still grants bonus damage.
    ///
    /// At 60 points and 0.05 per point, the multiplier tops out at x4.
    pub attack_diff_cap: i32,

    /// Damage reduction per point of defense advantage.
    ///
    /// Deliberately half the attack rate: defense is calibrated to be
    /// weaker point-for-point than attack.
    pub defense_bonus_per_point: f32,

    /// Cap on the defense advantage that still reduces damage.
    ///
    /// At 28 points and 0.025 per point, reduction tops out at 70%.
    pub defense_diff_cap: i32,

    // === RANGED ===
    /// Hex distance a shooter covers at full damage. Beyond this the
    /// distance penalty multiplier applies.
    pub ranged_full_damage_range: u32,

    /// Damage multiplier past the full-damage range (and through intact
    /// siege walls).
    pub ranged_distance_penalty: f32,

    /// Penalty recovery per archery skill level. Each level claws back
    /// this much of the distance penalty, up to full damage.
    pub archery_bonus_per_level: f32,

    /// Damage multiplier for a shooter forced into melee.
    pub shooter_melee_penalty: f32,

    // === LUCK / MORALE ===
    /// Proc chance by absolute luck value (index 0..=3). Positive luck
    /// rolls for increased damage, negative for halved.
    pub luck_chance: [f64; 4],

    /// Damage multiplier on a lucky strike.
    pub good_luck_multiplier: f32,

    /// Damage multiplier on an unlucky strike.
    pub bad_luck_multiplier: f32,

    /// Proc chance by absolute morale value (index 0..=3). Positive
    /// morale rolls for a bonus action, negative for a lost turn.
    pub morale_chance: [f64; 4],

    // === BUFF MAGNITUDES ===
    /// Damage bonus per Overwhelm stack on the defender.
    pub overwhelm_per_stack: f32,

    /// Damage bonus per Crusade stack on the attacker.
    pub crusade_per_stack: f32,

    /// Damage bonus when striking into a unit's rear arc.
    pub backstab_bonus: f32,

    /// Damage bonus of a Slayer-blessed unit against undead.
    pub slayer_bonus: f32,

    /// Damage bonus per hex traveled for jousting units on a
    /// move-and-attack.
    pub jousting_per_hex: f32,

    // === SPELLS ===
    /// Extra jumps of Chain Lightning after the initial target.
    pub chain_lightning_jumps: u32,

    /// Damage carried to the next Chain Lightning jump.
    pub chain_lightning_decay: f32,

    /// Decay with the storm mastery talent (reduction by 35% instead of
    /// halving).
    pub chain_lightning_decay_talent: f32,

    /// Hit-point fraction restored per prior resurrection of the same
    /// stack. Each completed resurrection makes the next one weaker.
    pub resurrection_penalty: f32,

    // === SIEGE ===
    /// Structural hits a wall segment absorbs before collapsing.
    pub wall_hit_points: i32,

    /// Structural hits the gate absorbs.
    pub gate_hit_points: i32,

    /// Structural hits a turret absorbs.
    pub turret_hit_points: i32,

    /// Per-creature damage range of a defensive turret shot.
    pub turret_damage_min: u32,
    pub turret_damage_max: u32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_rounds: 50,

            // Attack twice as effective as defense, per classic balance
            attack_bonus_per_point: 0.05,
            attack_diff_cap: 60,
            defense_bonus_per_point: 0.025,
            defense_diff_cap: 28,

            ranged_full_damage_range: 10,
            ranged_distance_penalty: 0.5,
            archery_bonus_per_level: 0.15,
            shooter_melee_penalty: 0.5,

            luck_chance: [0.0, 1.0 / 24.0, 1.0 / 12.0, 1.0 / 8.0],
            good_luck_multiplier: 1.5,
            bad_luck_multiplier: 0.5,
            morale_chance: [0.0, 1.0 / 24.0, 1.0 / 12.0, 1.0 / 8.0],

            overwhelm_per_stack: 0.05,
            crusade_per_stack: 0.10,
            backstab_bonus: 0.25,
            slayer_bonus: 0.5,
            jousting_per_hex: 0.05,

            chain_lightning_jumps: 3,
            chain_lightning_decay: 0.5,
            chain_lightning_decay_talent: 0.65,
            resurrection_penalty: 0.2,

            wall_hit_points: 2,
            gate_hit_points: 2,
            turret_hit_points: 1,
            turret_damage_min: 10,
            turret_damage_max: 15,
        }
    }
}

impl CombatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: CombatConfig =
            toml::from_str(&raw).map_err(|e| CombatError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(CombatError::ConfigError("max_rounds must be positive".into()));
        }

        if self.attack_bonus_per_point <= 0.0 || self.defense_bonus_per_point <= 0.0 {
            return Err(CombatError::ConfigError(
                "attack/defense scaling must be positive".into(),
            ));
        }

        // Full defense reduction must stay below 100%
        let max_reduction = self.defense_bonus_per_point * self.defense_diff_cap as f32;
        if max_reduction >= 1.0 {
            return Err(CombatError::ConfigError(format!(
                "defense cap ({max_reduction:.2}) would zero out damage"
            )));
        }

        for table in [&self.luck_chance, &self.morale_chance] {
            if table.iter().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(CombatError::ConfigError(
                    "probability tables must stay within [0, 1]".into(),
                ));
            }
            if table[0] != 0.0 {
                return Err(CombatError::ConfigError(
                    "probability at value 0 must be zero".into(),
                ));
            }
        }

        if self.turret_damage_min > self.turret_damage_max {
            return Err(CombatError::ConfigError(
                "turret_damage_min must be <= turret_damage_max".into(),
            ));
        }

        if self.wall_hit_points <= 0 || self.gate_hit_points <= 0 || self.turret_hit_points <= 0 {
            return Err(CombatError::ConfigError(
                "structural hit points must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(CombatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let config = CombatConfig {
            max_rounds: 0,
            ..CombatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_excessive_defense_cap_rejected() {
        let config = CombatConfig {
            defense_bonus_per_point: 0.05,
            defense_diff_cap: 28,
            ..CombatConfig::default()
        };
        // 0.05 * 28 = 1.4 >= 1.0, would zero out damage
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_probability_table_rejected() {
        let mut config = CombatConfig::default();
        config.luck_chance[2] = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CombatConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed: CombatConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.max_rounds, config.max_rounds);
        assert_eq!(parsed.luck_chance, config.luck_chance);
    }
}

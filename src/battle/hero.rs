//! Read-only hero stat bundle consumed from the progression layer
//!
//! The engine never levels heroes or teaches spells; it only reads the
//! numbers. Mana is the one field mutated during a battle, on the
//! army-owned copy.

use serde::{Deserialize, Serialize};

use crate::battle::spell::SpellSchool;

/// Hero talents that change combat rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Talent {
    /// Manual control of the catapult instead of auto-fire
    Ballistics,
    /// Manual control of turrets and ballistae
    Artillery,
    /// Chain Lightning loses 35% per jump instead of half
    StormMastery,
    /// Every friendly unit retaliates one extra time
    Riposte,
}

/// Static artifact effect definition, supplied by the equipment layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub attack_bonus: i32,
    pub defense_bonus: i32,
    pub power_bonus: i32,
    pub morale_bonus: i32,
    pub luck_bonus: i32,
    /// Per-creature hit-point bonus granted to the whole army
    pub health_bonus: u32,
    pub school_bonus: Option<(SpellSchool, f32)>,
}

/// Everything the engine reads from a hero
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeroSheet {
    pub name: String,
    pub attack: i32,
    pub defense: i32,
    pub power: i32,
    pub mana: u32,
    pub morale: i32,
    pub luck: i32,
    /// 0..=3, reduces the ranged distance penalty
    pub archery_level: u8,
    /// 0..=3, raises undead from enemy casualties after victory
    pub necromancy_level: u8,
    /// 0..=3, flat spell effect bonus per level
    pub sorcery_level: u8,
    pub talents: Vec<Talent>,
    pub artifacts: Vec<Artifact>,
}

impl HeroSheet {
    pub fn has_talent(&self, talent: Talent) -> bool {
        self.talents.contains(&talent)
    }

    /// Attack bonus applied to every unit in the army
    pub fn attack_bonus(&self) -> i32 {
        self.attack + self.artifacts.iter().map(|a| a.attack_bonus).sum::<i32>()
    }

    /// Defense bonus applied to every unit in the army
    pub fn defense_bonus(&self) -> i32 {
        self.defense + self.artifacts.iter().map(|a| a.defense_bonus).sum::<i32>()
    }

    /// Effective spell power including artifacts
    pub fn spell_power(&self) -> i32 {
        self.power + self.artifacts.iter().map(|a| a.power_bonus).sum::<i32>()
    }

    pub fn morale_bonus(&self) -> i32 {
        self.morale + self.artifacts.iter().map(|a| a.morale_bonus).sum::<i32>()
    }

    pub fn luck_bonus(&self) -> i32 {
        self.luck + self.artifacts.iter().map(|a| a.luck_bonus).sum::<i32>()
    }

    /// Per-creature hit-point bonus from equipped artifacts
    pub fn unit_health_bonus(&self) -> u32 {
        self.artifacts.iter().map(|a| a.health_bonus).sum()
    }

    /// Spell effect multiplier: sorcery plus school affinity artifacts
    pub fn spell_multiplier(&self, school: SpellSchool) -> f32 {
        let affinity: f32 = self
            .artifacts
            .iter()
            .filter_map(|a| a.school_bonus)
            .filter(|(s, _)| *s == school)
            .map(|(_, bonus)| bonus)
            .sum();
        1.0 + 0.05 * self.sorcery_level as f32 + affinity
    }
}

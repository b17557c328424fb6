//! Buffs, debuffs, and inherent creature traits
//!
//! One stored instance per kind; re-application refreshes duration and
//! magnitude, except the stacking kinds which accumulate. Inherent kinds
//! come from the creature definition and are unioned in on query, never
//! stored per-instance.

use serde::{Deserialize, Serialize};

/// Every effect kind a unit can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffKind {
    // Positive, spell-applied
    Haste,
    Bless,
    Bloodlust,
    Precision,
    StoneSkin,
    Shield,
    AirShield,
    AntiMagic,
    CounterStrike,
    Frenzy,
    Slayer,
    Mirth,
    Fortune,
    Prayer,
    Defending,

    // Negative, spell- or attack-applied
    Slow,
    Curse,
    Weakness,
    Disrupt,
    Forgetfulness,
    Misfortune,
    Sorrow,
    Blind,
    Berserk,
    Paralyze,
    Freeze,
    Terror,
    Cripple,
    Overwhelm,
    Crusade,

    // Inherent creature traits
    Undead,
    Mechanical,
    FireImmune,
    NoMeleePenalty,
    NoEnemyRetaliation,
    UnlimitedRetaliation,
    DoubleAttack,
    DoubleShot,
    DragonBreath,
    DeathCloudShot,
    FireBlastShot,
    Jouster,
    Thorns,
    OverwhelmStrike,
    Crusader,
}

impl BuffKind {
    /// Kinds that help the bearer (dispellable by Cure, kept by Dispel of
    /// hostile magic)
    pub fn is_positive(&self) -> bool {
        use BuffKind::*;
        matches!(
            self,
            Haste | Bless | Bloodlust | Precision | StoneSkin | Shield | AirShield | AntiMagic
                | CounterStrike | Frenzy | Slayer | Mirth | Fortune | Prayer | Defending
        )
    }

    /// Kinds that prevent the bearer from acting at all
    pub fn is_disabling(&self) -> bool {
        use BuffKind::*;
        matches!(self, Blind | Paralyze | Freeze | Terror)
    }

    /// Mind- and morale-class effects; undead and mechanical units are
    /// immune to these
    pub fn is_morale_class(&self) -> bool {
        use BuffKind::*;
        matches!(self, Mirth | Sorrow | Terror | Berserk)
    }

    /// Kinds whose magnitude accumulates on re-application instead of
    /// being replaced
    pub fn is_stacking(&self) -> bool {
        use BuffKind::*;
        matches!(self, Overwhelm | Crusade)
    }

    /// Kinds that only ever come from the creature definition
    pub fn is_inherent_only(&self) -> bool {
        use BuffKind::*;
        matches!(
            self,
            Undead
                | Mechanical
                | FireImmune
                | NoMeleePenalty
                | NoEnemyRetaliation
                | UnlimitedRetaliation
                | DoubleAttack
                | DoubleShot
                | DragonBreath
                | DeathCloudShot
                | FireBlastShot
                | Jouster
                | Thorns
                | OverwhelmStrike
                | Crusader
        )
    }
}

/// A stored effect instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    pub kind: BuffKind,
    /// Remaining rounds; -1 lasts until removed
    pub duration: i32,
    pub magnitude: f32,
}

impl Buff {
    pub fn new(kind: BuffKind, duration: i32, magnitude: f32) -> Self {
        Self {
            kind,
            duration,
            magnitude,
        }
    }

    pub fn permanent(kind: BuffKind, magnitude: f32) -> Self {
        Self::new(kind, -1, magnitude)
    }
}

/// The unordered small set of effects on one unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuffSet {
    buffs: Vec<Buff>,
}

impl BuffSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an effect: stacking kinds accumulate magnitude, everything
    /// else refreshes in place
    pub fn apply(&mut self, buff: Buff) {
        if let Some(existing) = self.buffs.iter_mut().find(|b| b.kind == buff.kind) {
            if buff.kind.is_stacking() {
                existing.magnitude += buff.magnitude;
                existing.duration = buff.duration;
            } else {
                *existing = buff;
            }
        } else {
            self.buffs.push(buff);
        }
    }

    pub fn has(&self, kind: BuffKind) -> bool {
        self.buffs.iter().any(|b| b.kind == kind)
    }

    pub fn get(&self, kind: BuffKind) -> Option<&Buff> {
        self.buffs.iter().find(|b| b.kind == kind)
    }

    /// Magnitude of the stored effect, 0 when absent
    pub fn magnitude(&self, kind: BuffKind) -> f32 {
        self.get(kind).map_or(0.0, |b| b.magnitude)
    }

    pub fn remove(&mut self, kind: BuffKind) -> bool {
        let before = self.buffs.len();
        self.buffs.retain(|b| b.kind != kind);
        self.buffs.len() != before
    }

    /// Strip hostile effects (Cure)
    pub fn dispel_negative(&mut self) -> Vec<BuffKind> {
        let removed: Vec<BuffKind> = self
            .buffs
            .iter()
            .filter(|b| !b.kind.is_positive())
            .map(|b| b.kind)
            .collect();
        self.buffs.retain(|b| b.kind.is_positive());
        removed
    }

    /// Strip every stored effect (Dispel)
    pub fn dispel_all(&mut self) -> Vec<BuffKind> {
        let removed: Vec<BuffKind> = self.buffs.iter().map(|b| b.kind).collect();
        self.buffs.clear();
        removed
    }

    /// Age every effect by one round; returns the kinds that expired
    pub fn tick_round(&mut self) -> Vec<BuffKind> {
        let mut expired = Vec::new();
        for buff in &mut self.buffs {
            if buff.duration > 0 {
                buff.duration -= 1;
                if buff.duration == 0 {
                    expired.push(buff.kind);
                }
            }
        }
        self.buffs.retain(|b| b.duration != 0);
        expired
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.buffs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }
}

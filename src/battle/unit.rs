//! Combat units: a battlefield stack of identical creatures
//!
//! A stack has one "front" creature absorbing damage; everything behind
//! it is either at full health or dead. Armies are fixed-capacity slot
//! arrays so units are referenced by index, never by pointer.

use serde::{Deserialize, Serialize};

use crate::battle::buff::{Buff, BuffKind, BuffSet};
use crate::battle::constants::{BASE_RETALIATIONS, MAX_ARMY_SLOTS};
use crate::battle::hero::{HeroSheet, Talent};
use crate::battle::hex::{HexCoord, HexDirection};
use crate::core::types::{Side, UnitHandle};

/// War machine kinds with special scheduling rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarMachine {
    Catapult,
    Ballista,
    Turret,
}

/// Static per-creature-type numbers, supplied by the army layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatureStats {
    pub id: u16,
    pub name: String,
    pub health: u32,
    pub attack: i32,
    pub defense: i32,
    pub damage_min: u32,
    pub damage_max: u32,
    pub speed: u32,
    pub initiative: u32,
    pub is_shooter: bool,
    pub is_flyer: bool,
    pub two_hex: bool,
    /// Traits baked into the creature type, unioned with stored buffs
    pub inherent: Vec<BuffKind>,
    /// Worth used by the auto-resolver's target ranking
    pub value: u32,
    /// Set for catapults, ballistae, and turrets
    pub war_machine: Option<WarMachine>,
}

/// A pre-battle troop entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroopEntry {
    pub stats: CreatureStats,
    pub count: u32,
}

/// Result of applying damage to a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub kills: u32,
    pub died: bool,
}

/// Result of restoring hit-points to a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored: u64,
    pub revived: bool,
    pub raised: u32,
}

/// A stack on the battlefield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatUnit {
    pub handle: UnitHandle,
    pub stats: CreatureStats,
    pub side: Side,
    pub count: u32,
    pub original_count: u32,
    /// Hit-points of the front creature
    pub front_health: u32,
    /// Head cell; the trailing cell of a two-hex unit extends away from
    /// the facing
    pub position: HexCoord,
    pub facing: HexDirection,

    // Per-round flags
    pub acted: bool,
    pub defended: bool,
    pub waited: bool,
    pub moraled: bool,
    pub cast_spell: bool,

    pub retaliations_left: u32,
    /// Times this stack has been brought back; each one weakens the next
    pub resurrected_count: u32,
    pub buffs: BuffSet,
}

impl CombatUnit {
    pub fn new(handle: UnitHandle, entry: TroopEntry, position: HexCoord) -> Self {
        let facing = match handle.side {
            Side::Attacker => HexDirection::East,
            Side::Defender => HexDirection::West,
        };
        Self {
            handle,
            count: entry.count,
            original_count: entry.count,
            front_health: entry.stats.health,
            stats: entry.stats,
            side: handle.side,
            position,
            facing,
            acted: false,
            defended: false,
            waited: false,
            moraled: false,
            cast_spell: false,
            retaliations_left: BASE_RETALIATIONS,
            resurrected_count: 0,
            buffs: BuffSet::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.count > 0
    }

    /// Stored buff or inherent creature trait
    pub fn has_trait(&self, kind: BuffKind) -> bool {
        self.buffs.has(kind) || self.stats.inherent.contains(&kind)
    }

    /// Blocked from acting by a stun/freeze/fear-class effect
    pub fn is_disabled(&self) -> bool {
        self.buffs.iter().any(|b| b.kind.is_disabling())
    }

    /// Trailing cell of a two-hex unit
    pub fn tail(&self) -> Option<HexCoord> {
        self.stats
            .two_hex
            .then(|| self.position.adjacent(self.facing.opposite()))
    }

    pub fn occupies(&self, coord: HexCoord) -> bool {
        self.position == coord || self.tail() == Some(coord)
    }

    /// Effective attack including hero and buffs
    pub fn attack_stat(&self, hero: Option<&HeroSheet>) -> i32 {
        let mut attack = self.stats.attack + hero.map_or(0, |h| h.attack_bonus());
        attack += self.buffs.magnitude(BuffKind::Bloodlust) as i32;
        attack += self.buffs.magnitude(BuffKind::Frenzy) as i32;
        attack += self.buffs.magnitude(BuffKind::Prayer) as i32;
        attack -= self.buffs.magnitude(BuffKind::Weakness) as i32;
        attack
    }

    /// Effective defense including hero and buffs
    pub fn defense_stat(&self, hero: Option<&HeroSheet>) -> i32 {
        let mut defense = self.stats.defense + hero.map_or(0, |h| h.defense_bonus());
        defense += self.buffs.magnitude(BuffKind::StoneSkin) as i32;
        defense += self.buffs.magnitude(BuffKind::Defending) as i32;
        defense += self.buffs.magnitude(BuffKind::Prayer) as i32;
        defense -= self.buffs.magnitude(BuffKind::Disrupt) as i32;
        defense
    }

    /// Movement speed in hexes after haste/slow/cripple
    pub fn speed(&self) -> u32 {
        let mut speed = self.stats.speed as i32;
        speed += self.buffs.magnitude(BuffKind::Haste) as i32;
        speed -= self.buffs.magnitude(BuffKind::Slow) as i32;
        speed -= self.buffs.magnitude(BuffKind::Cripple) as i32;
        speed.max(0) as u32
    }

    /// Turn-order initiative; the base stat, untouched by speed buffs
    pub fn initiative(&self) -> u32 {
        self.stats.initiative
    }

    /// Per-creature hit-point ceiling after hero bonuses
    pub fn max_health(&self, hero: Option<&HeroSheet>) -> u32 {
        (self.stats.health + hero.map_or(0, |h| h.unit_health_bonus())).max(1)
    }

    /// Total remaining life of the stack
    pub fn total_health(&self, hero: Option<&HeroSheet>) -> u64 {
        if self.count == 0 {
            return 0;
        }
        (self.count as u64 - 1) * self.max_health(hero) as u64 + self.front_health as u64
    }

    /// Morale value clamped to [-3, 3]; undead and machines feel nothing
    pub fn morale_value(&self, hero: Option<&HeroSheet>) -> i32 {
        if self.has_trait(BuffKind::Undead) || self.has_trait(BuffKind::Mechanical) {
            return 0;
        }
        let mut morale = hero.map_or(0, |h| h.morale_bonus());
        if self.buffs.has(BuffKind::Mirth) {
            morale += self.buffs.magnitude(BuffKind::Mirth) as i32;
        }
        if self.buffs.has(BuffKind::Sorrow) {
            morale -= self.buffs.magnitude(BuffKind::Sorrow) as i32;
        }
        morale.clamp(-3, 3)
    }

    /// Luck value clamped to [-3, 3]
    pub fn luck_value(&self, hero: Option<&HeroSheet>) -> i32 {
        let mut luck = hero.map_or(0, |h| h.luck_bonus());
        if self.buffs.has(BuffKind::Fortune) {
            luck += self.buffs.magnitude(BuffKind::Fortune) as i32;
        }
        if self.buffs.has(BuffKind::Misfortune) {
            luck -= self.buffs.magnitude(BuffKind::Misfortune) as i32;
        }
        luck.clamp(-3, 3)
    }

    pub fn can_retaliate(&self) -> bool {
        (self.retaliations_left > 0 || self.has_trait(BuffKind::UnlimitedRetaliation))
            && !self.is_disabled()
    }

    pub fn spend_retaliation(&mut self) {
        if !self.has_trait(BuffKind::UnlimitedRetaliation) {
            self.retaliations_left = self.retaliations_left.saturating_sub(1);
        }
    }

    /// Reset per-round flags and retaliation budget at a round boundary
    pub fn begin_round(&mut self, hero: Option<&HeroSheet>) {
        self.acted = false;
        self.defended = false;
        self.waited = false;
        self.moraled = false;
        self.cast_spell = false;
        self.buffs.remove(BuffKind::Defending);

        let mut retaliations = BASE_RETALIATIONS;
        if self.buffs.has(BuffKind::CounterStrike) {
            retaliations += self.buffs.magnitude(BuffKind::CounterStrike) as u32;
        }
        if hero.map_or(false, |h| h.has_talent(Talent::Riposte)) {
            retaliations += 1;
        }
        self.retaliations_left = retaliations;
    }

    /// Apply raw damage to the stack; kills are whole creatures
    pub fn apply_damage(&mut self, amount: u64, max_health: u32) -> DamageOutcome {
        debug_assert!(max_health > 0);
        if self.count == 0 {
            return DamageOutcome {
                kills: 0,
                died: false,
            };
        }

        let total = self.total_health_with(max_health);
        if amount >= total {
            let kills = self.count;
            self.count = 0;
            self.front_health = 0;
            return DamageOutcome { kills, died: true };
        }

        if amount < self.front_health as u64 {
            self.front_health -= amount as u32;
            return DamageOutcome {
                kills: 0,
                died: false,
            };
        }

        let beyond = amount - self.front_health as u64;
        let kills = (1 + beyond / max_health as u64) as u32;
        self.front_health = (max_health as u64 - beyond % max_health as u64) as u32;
        // amount < total guarantees kills < count
        self.count -= kills.min(self.count);
        DamageOutcome {
            kills,
            died: false,
        }
    }

    /// Restore hit-points; growth is capped at the current stack unless
    /// `can_resurrect`, then at the original stack
    pub fn restore(&mut self, amount: u64, max_health: u32, can_resurrect: bool) -> RestoreOutcome {
        debug_assert!(max_health > 0);
        let was_dead = self.count == 0;
        if was_dead && !can_resurrect {
            return RestoreOutcome {
                restored: 0,
                revived: false,
                raised: 0,
            };
        }

        let cap_creatures = if can_resurrect {
            self.original_count
        } else {
            self.count
        };
        let before = self.total_health_with(max_health);
        let cap = cap_creatures as u64 * max_health as u64;
        let new_total = (before + amount).min(cap);

        let old_count = self.count;
        if new_total == 0 {
            return RestoreOutcome {
                restored: 0,
                revived: false,
                raised: 0,
            };
        }

        self.count = new_total.div_ceil(max_health as u64) as u32;
        self.front_health = (new_total - (self.count as u64 - 1) * max_health as u64) as u32;

        RestoreOutcome {
            restored: new_total - before,
            revived: was_dead && self.count > 0,
            raised: self.count.saturating_sub(old_count),
        }
    }

    fn total_health_with(&self, max_health: u32) -> u64 {
        if self.count == 0 {
            0
        } else {
            (self.count as u64 - 1) * max_health as u64 + self.front_health as u64
        }
    }

    pub fn apply_buff(&mut self, buff: Buff) {
        self.buffs.apply(buff);
    }
}

/// Fixed-capacity army of up to 16 stacks plus an optional hero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Army {
    pub side: Side,
    pub slots: Vec<CombatUnit>,
    pub hero: Option<HeroSheet>,
    pub hero_cast_this_round: bool,
}

impl Army {
    pub fn new(side: Side, hero: Option<HeroSheet>) -> Self {
        Self {
            side,
            slots: Vec::with_capacity(MAX_ARMY_SLOTS),
            hero,
            hero_cast_this_round: false,
        }
    }

    pub fn push_unit(&mut self, entry: TroopEntry, position: HexCoord) -> Option<UnitHandle> {
        if self.slots.len() >= MAX_ARMY_SLOTS {
            return None;
        }
        let handle = UnitHandle::new(self.side, self.slots.len() as u8);
        self.slots.push(CombatUnit::new(handle, entry, position));
        Some(handle)
    }

    pub fn unit(&self, slot: u8) -> Option<&CombatUnit> {
        self.slots.get(slot as usize)
    }

    pub fn unit_mut(&mut self, slot: u8) -> Option<&mut CombatUnit> {
        self.slots.get_mut(slot as usize)
    }

    pub fn living_units(&self) -> impl Iterator<Item = &CombatUnit> {
        self.slots.iter().filter(|u| u.is_alive())
    }

    pub fn is_defeated(&self) -> bool {
        self.slots.iter().all(|u| !u.is_alive())
    }

    pub fn total_count(&self) -> u32 {
        self.slots.iter().map(|u| u.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn peasant(count: u32) -> TroopEntry {
        TroopEntry {
            stats: CreatureStats {
                id: 1,
                name: "Peasant".into(),
                health: 10,
                attack: 5,
                defense: 2,
                damage_min: 1,
                damage_max: 2,
                speed: 4,
                initiative: 4,
                value: 15,
                ..CreatureStats::default()
            },
            count,
        }
    }

    fn unit(count: u32) -> CombatUnit {
        CombatUnit::new(
            UnitHandle::new(Side::Attacker, 0),
            peasant(count),
            HexCoord::new(0, 0),
        )
    }

    #[test]
    fn test_damage_within_front_creature() {
        let mut u = unit(10);
        let outcome = u.apply_damage(4, 10);
        assert_eq!(outcome.kills, 0);
        assert_eq!(u.front_health, 6);
        assert_eq!(u.count, 10);
    }

    #[test]
    fn test_damage_kills_whole_creatures() {
        let mut u = unit(10);
        // 25 damage: front (10) + one full creature (10) + 5 into the next
        let outcome = u.apply_damage(25, 10);
        assert_eq!(outcome.kills, 2);
        assert_eq!(u.count, 8);
        assert_eq!(u.front_health, 5);
    }

    #[test]
    fn test_damage_exact_creature_boundary() {
        let mut u = unit(10);
        let outcome = u.apply_damage(20, 10);
        assert_eq!(outcome.kills, 2);
        assert_eq!(u.count, 8);
        assert_eq!(u.front_health, 10);
    }

    #[test]
    fn test_overkill_clamps_to_stack() {
        let mut u = unit(3);
        let outcome = u.apply_damage(1_000, 10);
        assert_eq!(outcome.kills, 3);
        assert!(outcome.died);
        assert_eq!(u.count, 0);
        assert_eq!(u.front_health, 0);
    }

    #[test]
    fn test_heal_cannot_raise_count() {
        let mut u = unit(10);
        u.apply_damage(25, 10);
        let outcome = u.restore(100, 10, false);
        assert_eq!(u.count, 8);
        assert_eq!(u.front_health, 10);
        assert_eq!(outcome.raised, 0);
    }

    #[test]
    fn test_resurrect_raises_up_to_original() {
        let mut u = unit(10);
        u.apply_damage(25, 10);
        let outcome = u.restore(25, 10, true);
        assert_eq!(u.count, 10);
        assert_eq!(u.front_health, 10);
        assert_eq!(outcome.raised, 2);
    }

    #[test]
    fn test_resurrect_capped_at_original() {
        let mut u = unit(10);
        u.apply_damage(25, 10);
        let outcome = u.restore(10_000, 10, true);
        assert_eq!(u.count, 10);
        assert_eq!(u.front_health, 10);
        assert_eq!(outcome.restored, 25);
    }

    #[test]
    fn test_revive_from_dead() {
        let mut u = unit(5);
        u.apply_damage(1_000, 10);
        assert!(!u.is_alive());

        let outcome = u.restore(15, 10, true);
        assert!(outcome.revived);
        assert_eq!(u.count, 2);
        assert_eq!(u.front_health, 5);
    }

    #[test]
    fn test_damage_then_full_resurrect_round_trip() {
        let mut u = unit(10);
        let before = u.total_health(None);
        u.apply_damage(37, 10);
        u.restore(37, 10, true);
        let after = u.total_health(None);
        assert!(before.abs_diff(after) < 10);
    }

    #[test]
    fn test_morale_zero_for_undead() {
        let mut u = unit(5);
        u.stats.inherent.push(BuffKind::Undead);
        u.apply_buff(Buff::new(BuffKind::Mirth, 3, 2.0));
        assert_eq!(u.morale_value(None), 0);
    }

    #[test]
    fn test_speed_floors_at_zero() {
        let mut u = unit(5);
        u.apply_buff(Buff::new(BuffKind::Slow, 3, 99.0));
        assert_eq!(u.speed(), 0);
    }

    #[test]
    fn test_army_slot_cap() {
        let mut army = Army::new(Side::Attacker, None);
        for i in 0..MAX_ARMY_SLOTS {
            assert!(army.push_unit(peasant(1), HexCoord::new(0, i as i32 % 11)).is_some());
        }
        assert!(army.push_unit(peasant(1), HexCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_two_hex_tail_extends_away_from_facing() {
        let mut entry = peasant(1);
        entry.stats.two_hex = true;
        let u = CombatUnit::new(
            UnitHandle::new(Side::Attacker, 0),
            entry,
            HexCoord::new(4, 4),
        );
        // Attacker faces east, tail extends west
        assert_eq!(u.tail(), Some(HexCoord::new(3, 4)));
    }
}

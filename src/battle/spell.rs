//! Spell engine: validation and application of combat magic
//!
//! Every spell is a closed enum variant with static data (school, target
//! kind, mana cost) and a pure mapping to zero-or-one buff kind or a
//! damage/heal formula. Application happens through the battlefield so
//! occupancy and the action log stay consistent.

use serde::{Deserialize, Serialize};

use crate::battle::battlefield::{Battlefield, TimeDilation};
use crate::battle::buff::{Buff, BuffKind};
use crate::battle::grid::Footprint;
use crate::battle::hero::Talent;
use crate::battle::hex::HexCoord;
use crate::battle::log::{ActionLogEntry, ActionLogKind};
use crate::battle::siege::WallSegment;
use crate::battle::unit::CombatUnit;
use crate::core::error::{CombatError, Result};
use crate::core::types::{Side, UnitHandle};

/// Magic schools, for hero affinity multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellSchool {
    Air,
    Earth,
    Fire,
    Water,
    Prime,
}

/// What a spell may be aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTargetKind {
    SingleAlly,
    SingleEnemy,
    /// Any single unit of either side
    SingleUnit,
    /// Every unit within the radius of a target hex, center included
    Radius(u8),
    /// The ring at exactly the radius, center excluded
    Ring(u8),
    AllAllies,
    AllEnemies,
    AllUnits,
    /// Siege structures
    Walls,
    /// No target at all
    Battlefield,
}

/// The full spellbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellKind {
    // Direct and area damage
    MagicArrow,
    LightningBolt,
    ChainLightning,
    IceBolt,
    FrostRing,
    Fireball,
    Inferno,
    MeteorShower,
    Implosion,
    DeathRipple,
    DestroyUndead,
    Armageddon,

    // Single-ally blessings
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

    // Single-enemy curses
    Slow,
    Curse,
    Weakness,
    DisruptingRay,
    Forgetfulness,
    Misfortune,
    Sorrow,
    Blind,
    Berserk,
    Paralyze,
    DeepFreeze,
    Terror,
    CrippleLimbs,

    // Healing and resurrection
    Cure,
    Heal,
    Resurrection,
    AnimateDead,

    // Mass and battlefield effects
    Dispel,
    MassDispel,
    MassHaste,
    MassSlow,
    MassBless,
    MassCurse,
    MassShield,
    MassAirShield,
    TimeDilation,
    Earthquake,
}

impl SpellKind {
    pub fn school(&self) -> SpellSchool {
        use SpellKind::*;
        match self {
            LightningBolt | ChainLightning | Haste | MassHaste | Precision | AirShield
            | MassAirShield | CounterStrike | Fortune | DisruptingRay => SpellSchool::Air,
            StoneSkin | Shield | MassShield | Slow | MassSlow | MeteorShower | Implosion
            | Resurrection | AnimateDead | Earthquake | CrippleLimbs => SpellSchool::Earth,
            Fireball | Inferno | Armageddon | Bloodlust | Frenzy | Slayer | Blind | Berserk => {
                SpellSchool::Fire
            }
            IceBolt | FrostRing | Bless | MassBless | Curse | MassCurse | Weakness
            | Forgetfulness | Misfortune | Mirth | Sorrow | Paralyze | DeepFreeze | Cure | Heal
            | Dispel | MassDispel | Prayer => SpellSchool::Water,
            MagicArrow | DeathRipple | DestroyUndead | AntiMagic | Terror | TimeDilation => {
                SpellSchool::Prime
            }
        }
    }

    pub fn target_kind(&self) -> SpellTargetKind {
        use SpellKind::*;
        match self {
            MagicArrow | LightningBolt | ChainLightning | IceBolt | Implosion => {
                SpellTargetKind::SingleEnemy
            }
            FrostRing => SpellTargetKind::Ring(1),
            Fireball | MeteorShower => SpellTargetKind::Radius(1),
            Inferno => SpellTargetKind::Radius(2),
            DeathRipple | DestroyUndead | Armageddon | MassDispel => SpellTargetKind::AllUnits,

            Haste | Bless | Bloodlust | Precision | StoneSkin | Shield | AirShield | AntiMagic
            | CounterStrike | Frenzy | Slayer | Mirth | Fortune | Prayer | Cure | Heal
            | Resurrection | AnimateDead => SpellTargetKind::SingleAlly,

            Slow | Curse | Weakness | DisruptingRay | Forgetfulness | Misfortune | Sorrow
            | Blind | Berserk | Paralyze | DeepFreeze | Terror | CrippleLimbs => {
                SpellTargetKind::SingleEnemy
            }

            Dispel => SpellTargetKind::SingleUnit,
            MassHaste | MassBless | MassShield | MassAirShield => SpellTargetKind::AllAllies,
            MassSlow | MassCurse => SpellTargetKind::AllEnemies,
            TimeDilation => SpellTargetKind::Battlefield,
            Earthquake => SpellTargetKind::Walls,
        }
    }

    pub fn mana_cost(&self) -> u32 {
        use SpellKind::*;
        match self {
            MagicArrow | Bless | Bloodlust | Curse | StoneSkin | Shield | Dispel => 5,
            Heal => 4,
            Haste | Slow | Cure => 6,
            Fortune => 7,
            IceBolt | Weakness | Precision => 8,
            CounterStrike => 9,
            LightningBolt | DisruptingRay | Misfortune | Blind | MassBless | MassCurse
            | CrippleLimbs | DeathRipple => 10,
            FrostRing | Forgetfulness | Frenzy | Mirth | Sorrow | MassHaste | MassSlow
            | MassDispel | AirShield | MassShield => 12,
            Terror => 14,
            Fireball | AntiMagic | DestroyUndead | AnimateDead => 15,
            Inferno | MeteorShower | Slayer | Prayer => 16,
            DeepFreeze => 18,
            Berserk | Paralyze | Resurrection | Earthquake | MassAirShield => 20,
            ChainLightning | Armageddon | TimeDilation => 24,
            Implosion => 30,
        }
    }

    /// Spell-applied buff kind with magnitude and duration; None for
    /// damage, healing, and structural spells
    pub fn buff_effect(&self, power: i32, multiplier: f32) -> Option<Buff> {
        use SpellKind::*;
        let duration = spell_duration(power);
        let scaled = |base: f32| base * multiplier;
        let buff = match self {
            Haste | MassHaste => Buff::new(BuffKind::Haste, duration, scaled(3.0)),
            Bless | MassBless => Buff::new(BuffKind::Bless, duration, 0.0),
            Bloodlust => Buff::new(BuffKind::Bloodlust, duration, scaled(3.0)),
            Precision => Buff::new(BuffKind::Precision, duration, scaled(3.0)),
            StoneSkin => Buff::new(BuffKind::StoneSkin, duration, scaled(3.0)),
            Shield | MassShield => Buff::new(BuffKind::Shield, duration, 0.3),
            AirShield | MassAirShield => Buff::new(BuffKind::AirShield, duration, 0.25),
            AntiMagic => Buff::new(BuffKind::AntiMagic, duration, 0.0),
            CounterStrike => Buff::new(BuffKind::CounterStrike, duration, 1.0),
            Frenzy => Buff::new(BuffKind::Frenzy, duration, scaled(5.0)),
            Slayer => Buff::new(BuffKind::Slayer, duration, 0.0),
            Mirth => Buff::new(BuffKind::Mirth, duration, 1.0),
            Fortune => Buff::new(BuffKind::Fortune, duration, 1.0),
            Prayer => Buff::new(BuffKind::Prayer, duration, scaled(2.0)),

            Slow | MassSlow => Buff::new(BuffKind::Slow, duration, scaled(3.0)),
            Curse | MassCurse => Buff::new(BuffKind::Curse, duration, 0.0),
            Weakness => Buff::new(BuffKind::Weakness, duration, scaled(3.0)),
            DisruptingRay => Buff::new(BuffKind::Disrupt, duration, scaled(3.0)),
            Forgetfulness => Buff::new(BuffKind::Forgetfulness, duration, 0.0),
            Misfortune => Buff::new(BuffKind::Misfortune, duration, 1.0),
            Sorrow => Buff::new(BuffKind::Sorrow, duration, 1.0),
            Blind => Buff::new(BuffKind::Blind, duration, 0.0),
            Berserk => Buff::new(BuffKind::Berserk, duration, 0.0),
            Paralyze => Buff::new(BuffKind::Paralyze, duration, 0.0),
            DeepFreeze => Buff::new(BuffKind::Freeze, duration, 0.0),
            Terror => Buff::new(BuffKind::Terror, duration, 0.0),
            CrippleLimbs => Buff::new(BuffKind::Cripple, duration, 0.25),

            _ => return None,
        };
        Some(buff)
    }

    /// Damage dealt to each affected unit; None for non-damage spells
    pub fn damage_amount(&self, power: i32, multiplier: f32) -> Option<u64> {
        use SpellKind::*;
        let (flat, per_power) = match self {
            MagicArrow => (10, 10),
            LightningBolt => (10, 25),
            ChainLightning => (25, 40),
            IceBolt => (10, 20),
            FrostRing => (15, 10),
            Fireball => (15, 10),
            Inferno => (20, 10),
            MeteorShower => (25, 10),
            Implosion => (100, 75),
            DeathRipple => (10, 5),
            DestroyUndead => (10, 10),
            Armageddon => (30, 50),
            _ => return None,
        };
        let base = flat + per_power * power.max(0) as i64;
        Some((base as f64 * multiplier as f64) as u64)
    }

    /// Hit-points restored; None for non-healing spells
    pub fn heal_amount(&self, power: i32, multiplier: f32) -> Option<u64> {
        use SpellKind::*;
        let (flat, per_power) = match self {
            Cure => (10, 10),
            Heal => (15, 5),
            Resurrection => (40, 50),
            AnimateDead => (30, 50),
            _ => return None,
        };
        let base = flat + per_power * power.max(0) as i64;
        Some((base as f64 * multiplier as f64) as u64)
    }

    /// Healing spells that can raise dead creatures
    pub fn can_resurrect(&self) -> bool {
        matches!(self, SpellKind::Resurrection | SpellKind::AnimateDead)
    }
}

/// Buff/debuff duration in rounds from caster power
pub fn spell_duration(power: i32) -> i32 {
    power.max(1)
}

/// Can this unit be affected by this spell from this caster?
pub fn unit_immune(spell: SpellKind, caster_side: Side, unit: &CombatUnit) -> bool {
    use SpellKind::*;

    // War machines shrug off everything
    if unit.stats.war_machine.is_some() || unit.has_trait(BuffKind::Mechanical) {
        return true;
    }

    // Anti-magic wards off hostile casters entirely
    if unit.has_trait(BuffKind::AntiMagic) && caster_side != unit.side {
        return true;
    }

    let undead = unit.has_trait(BuffKind::Undead);
    match spell {
        DestroyUndead | AnimateDead => return !undead,
        DeathRipple | Resurrection => {
            if undead {
                return true;
            }
        }
        Fireball | Inferno | Armageddon => {
            if unit.has_trait(BuffKind::FireImmune) {
                return true;
            }
        }
        _ => {}
    }

    // Undead feel neither joy nor fear
    if undead {
        if matches!(spell, Bless | MassBless | Curse | MassCurse) {
            return true;
        }
        if let Some(buff) = spell.buff_effect(1, 1.0) {
            if buff.kind.is_morale_class() {
                return true;
            }
        }
    }

    false
}

impl Battlefield {
    /// Cast a spell through the active unit's side's hero
    pub fn cast_spell(
        &mut self,
        handle: UnitHandle,
        spell: SpellKind,
        target: Option<HexCoord>,
    ) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        let side = handle.side;

        let (power, multiplier, cost) = {
            let hero = self.hero(side).ok_or(CombatError::InvalidSpellTarget)?;
            let cost = spell.mana_cost();
            if self.army(side).hero_cast_this_round {
                return Err(CombatError::AlreadyCast);
            }
            if hero.mana < cost {
                return Err(CombatError::InsufficientMana {
                    needed: cost,
                    available: hero.mana,
                });
            }
            (hero.spell_power(), hero.spell_multiplier(spell.school()), cost)
        };

        // Validate fully before mutating anything
        let targets = self.resolve_spell_targets(side, spell, target)?;

        let mut entry = {
            let unit = self.unit(handle).expect("active unit");
            self.new_log_entry(ActionLogKind::SpellCast)
                .with_actor(unit)
                .with_spell(spell)
        };

        if spell == SpellKind::TimeDilation {
            self.apply_time_dilation(side, power);
        } else if spell == SpellKind::Earthquake {
            self.apply_earthquake(&mut entry)?;
        } else if spell == SpellKind::ChainLightning {
            self.apply_chain_lightning(side, targets[0], power, multiplier, &mut entry);
        } else if let Some(amount) = spell.damage_amount(power, multiplier) {
            for target in targets {
                let max_health = match self.unit(target) {
                    Some(unit) => unit.max_health(self.hero(target.side)),
                    None => continue,
                };
                self.apply_strike_damage(target, amount, max_health, &mut entry);
            }
        } else if let Some(amount) = spell.heal_amount(power, multiplier) {
            self.apply_restoration(spell, targets[0], amount, &mut entry)?;
        } else if matches!(spell, SpellKind::Dispel | SpellKind::MassDispel) {
            for target in targets {
                let removed = self
                    .unit_mut(target)
                    .map(|u| u.buffs.dispel_all())
                    .unwrap_or_default();
                if let Some(unit) = self.unit(target) {
                    for kind in removed {
                        entry.push_strike(unit, 0, 0, Some(kind));
                    }
                }
            }
        } else if let Some(buff) = spell.buff_effect(power, multiplier) {
            for target in targets {
                if let Some(unit) = self.unit_mut(target) {
                    unit.apply_buff(buff);
                }
                if let Some(unit) = self.unit(target) {
                    entry.push_strike(unit, 0, 0, Some(buff.kind));
                }
            }
        }

        self.push_log(entry);

        // Spend mana and mark the cast
        if let Some(hero) = self.army_mut(side).hero.as_mut() {
            hero.mana -= cost;
        }
        self.army_mut(side).hero_cast_this_round = true;
        if let Some(unit) = self.unit_mut(handle) {
            unit.cast_spell = true;
        }

        self.check_battle_end();
        self.finish_turn(handle, false, true);
        Ok(self.log_since(mark))
    }

    /// Collect and validate target handles without mutating state
    fn resolve_spell_targets(
        &self,
        side: Side,
        spell: SpellKind,
        target: Option<HexCoord>,
    ) -> Result<Vec<UnitHandle>> {
        let kind = spell.target_kind();
        match kind {
            SpellTargetKind::SingleAlly
            | SpellTargetKind::SingleEnemy
            | SpellTargetKind::SingleUnit => {
                let coord = target.ok_or(CombatError::InvalidSpellTarget)?;
                if !coord.in_bounds() {
                    return Err(CombatError::InvalidCoordinate(coord));
                }
                let handle = self
                    .unit_at(coord)
                    .ok_or(CombatError::InvalidSpellTarget)?;
                let target_side_ok = match kind {
                    SpellTargetKind::SingleAlly => handle.side == side,
                    SpellTargetKind::SingleEnemy => handle.side != side,
                    _ => true,
                };
                if !target_side_ok {
                    return Err(CombatError::InvalidSpellTarget);
                }
                let unit = self.unit(handle).ok_or(CombatError::InvalidUnit(handle))?;
                if unit_immune(spell, side, unit) {
                    return Err(CombatError::TargetImmune);
                }
                Ok(vec![handle])
            }
            SpellTargetKind::Radius(radius) | SpellTargetKind::Ring(radius) => {
                let coord = target.ok_or(CombatError::InvalidSpellTarget)?;
                if !coord.in_bounds() {
                    return Err(CombatError::InvalidCoordinate(coord));
                }
                let include_center = matches!(kind, SpellTargetKind::Radius(_));
                let mut handles = Vec::new();
                for cell in coord.neighbors_in_radius(radius as u32, include_center) {
                    if matches!(kind, SpellTargetKind::Ring(_))
                        && coord.distance(&cell) != radius as u32
                    {
                        continue;
                    }
                    let Some(handle) = self.grid.occupant(cell) else {
                        continue;
                    };
                    if handles.contains(&handle) {
                        continue;
                    }
                    let Some(unit) = self.unit(handle) else {
                        continue;
                    };
                    if unit_immune(spell, side, unit) {
                        continue;
                    }
                    handles.push(handle);
                }
                Ok(handles)
            }
            SpellTargetKind::AllAllies | SpellTargetKind::AllEnemies | SpellTargetKind::AllUnits => {
                let mut handles = Vec::new();
                for army_side in [Side::Attacker, Side::Defender] {
                    let wanted = match kind {
                        SpellTargetKind::AllAllies => army_side == side,
                        SpellTargetKind::AllEnemies => army_side != side,
                        _ => true,
                    };
                    if !wanted {
                        continue;
                    }
                    for unit in self.army(army_side).living_units() {
                        if !unit_immune(spell, side, unit) {
                            handles.push(unit.handle);
                        }
                    }
                }
                Ok(handles)
            }
            SpellTargetKind::Walls => {
                if self.siege.is_none() {
                    return Err(CombatError::InvalidSpellTarget);
                }
                Ok(Vec::new())
            }
            SpellTargetKind::Battlefield => Ok(Vec::new()),
        }
    }

    /// Living occupant at a cell, or a dead stack whose head rested there
    /// (resurrection targets)
    fn unit_at(&self, coord: HexCoord) -> Option<UnitHandle> {
        if let Some(handle) = self.grid.occupant(coord) {
            return Some(handle);
        }
        for army_side in [Side::Attacker, Side::Defender] {
            for unit in &self.army(army_side).slots {
                if !unit.is_alive() && unit.position == coord {
                    return Some(unit.handle);
                }
            }
        }
        None
    }

    /// Shared heal/resurrect routine with occupancy reconciliation
    fn apply_restoration(
        &mut self,
        spell: SpellKind,
        target: UnitHandle,
        amount: u64,
        entry: &mut ActionLogEntry,
    ) -> Result<()> {
        let can_resurrect = spell.can_resurrect();
        let (was_dead, footprint, max_health, penalty_scaled) = {
            let unit = self.unit(target).ok_or(CombatError::InvalidUnit(target))?;
            let max_health = unit.max_health(self.hero(target.side));
            let footprint = Footprint {
                head: unit.position,
                tail: unit.tail(),
            };
            // Each earlier resurrection weakens this one
            let penalty = (1.0
                - unit.resurrected_count as f64 * self.config.resurrection_penalty as f64)
                .max(0.0);
            (
                !unit.is_alive(),
                footprint,
                max_health,
                (amount as f64 * penalty) as u64,
            )
        };

        if was_dead {
            if !can_resurrect {
                return Err(CombatError::InvalidSpellTarget);
            }
            // A stack coming back to life must find its cells empty
            let head_free = self.grid.is_free(footprint.head);
            let tail_free = footprint.tail.map_or(true, |t| self.grid.is_free(t));
            if !head_free || !tail_free {
                return Err(CombatError::InvalidSpellTarget);
            }
        }

        let outcome = {
            let unit = self.unit_mut(target).expect("validated");
            let outcome = unit.restore(penalty_scaled, max_health, can_resurrect);
            if can_resurrect && outcome.restored > 0 {
                unit.resurrected_count += 1;
            }
            outcome
        };

        if outcome.revived {
            self.grid.occupy(footprint, target);
        }

        if spell == SpellKind::Cure {
            if let Some(unit) = self.unit_mut(target) {
                unit.buffs.dispel_negative();
            }
        }

        let unit = self.unit(target).expect("restored unit");
        entry.push_strike(unit, 0, outcome.raised, None);
        Ok(())
    }

    /// Chain Lightning: jump to the nearest unit of either side not yet
    /// hit, with decaying damage
    fn apply_chain_lightning(
        &mut self,
        caster_side: Side,
        first: UnitHandle,
        power: i32,
        multiplier: f32,
        entry: &mut ActionLogEntry,
    ) {
        let decay = if self
            .hero(caster_side)
            .map_or(false, |h| h.has_talent(Talent::StormMastery))
        {
            self.config.chain_lightning_decay_talent
        } else {
            self.config.chain_lightning_decay
        } as f64;

        let mut amount = SpellKind::ChainLightning
            .damage_amount(power, multiplier)
            .expect("damage spell");
        let mut hit = Vec::new();
        let mut current = first;

        for _ in 0..=self.config.chain_lightning_jumps {
            let max_health = match self.unit(current) {
                Some(unit) if unit.is_alive() => unit.max_health(self.hero(current.side)),
                _ => break,
            };
            self.apply_strike_damage(current, amount, max_health, entry);
            hit.push(current);

            amount = (amount as f64 * decay) as u64;
            if amount == 0 {
                break;
            }

            let from = match self.unit(current) {
                Some(unit) => unit.position,
                None => break,
            };
            let next = self.nearest_chain_target(caster_side, from, &hit);
            match next {
                Some(handle) => current = handle,
                None => break,
            }
        }
    }

    /// Deterministic nearest-unit selection over both sides
    fn nearest_chain_target(
        &self,
        caster_side: Side,
        from: HexCoord,
        hit: &[UnitHandle],
    ) -> Option<UnitHandle> {
        let mut best: Option<(u32, i32, UnitHandle)> = None;
        for army_side in [Side::Attacker, Side::Defender] {
            for unit in self.army(army_side).living_units() {
                if hit.contains(&unit.handle) {
                    continue;
                }
                if unit_immune(SpellKind::ChainLightning, caster_side, unit) {
                    continue;
                }
                let key = (from.distance(&unit.position), unit.position.screen_position());
                match best {
                    Some((distance, screen, _)) if (key.0, key.1) >= (distance, screen) => {}
                    _ => best = Some((key.0, key.1, unit.handle)),
                }
            }
        }
        best.map(|(_, _, handle)| handle)
    }

    /// Recast by the owner refreshes; recast by the enemy cancels
    fn apply_time_dilation(&mut self, side: Side, power: i32) {
        let duration = spell_duration(power) as u32;
        match self.time_dilation() {
            Some(active) if active.side != side => {
                self.set_time_dilation(None);
                let expired = self.new_log_entry(ActionLogKind::BuffExpired);
                self.push_log(expired);
            }
            _ => {
                self.set_time_dilation(Some(TimeDilation {
                    side,
                    rounds_left: duration,
                    magnitude: 2.0,
                }));
            }
        }
    }

    /// Earthquake shakes the first standing segments in priority order
    fn apply_earthquake(&mut self, _entry: &mut ActionLogEntry) -> Result<()> {
        let mut hits = 2;
        let mut collapsed = Vec::new();
        if let Some(siege) = self.siege.as_mut() {
            for segment in WallSegment::priority_order() {
                if hits == 0 {
                    break;
                }
                if !siege.is_wall_standing(segment) {
                    continue;
                }
                if siege.damage_wall(segment, &mut self.grid) {
                    collapsed.push(segment);
                }
                hits -= 1;
            }
        } else {
            return Err(CombatError::InvalidSpellTarget);
        }
        for _segment in collapsed {
            let entry = self.new_log_entry(ActionLogKind::WallDestroyed);
            self.push_log(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battlefield::{ArmySetup, Battlefield};
    use crate::battle::hero::HeroSheet;
    use crate::battle::unit::{CreatureStats, TroopEntry};
    use crate::core::config::CombatConfig;
    use crate::core::types::Environment;

    fn caster_hero(power: i32, mana: u32) -> HeroSheet {
        HeroSheet {
            name: "Magus".into(),
            power,
            mana,
            ..HeroSheet::default()
        }
    }

    fn troop(name: &str, count: u32, initiative: u32) -> TroopEntry {
        TroopEntry {
            stats: CreatureStats {
                id: 1,
                name: name.into(),
                health: 30,
                attack: 5,
                defense: 5,
                damage_min: 2,
                damage_max: 3,
                speed: 5,
                initiative,
                value: 20,
                ..CreatureStats::default()
            },
            count,
        }
    }

    fn spell_battle(attacker_hero: Option<HeroSheet>) -> Battlefield {
        Battlefield::new_hero_battle(
            ArmySetup {
                troops: vec![troop("Monk", 10, 9)],
                hero: attacker_hero,
            },
            ArmySetup {
                troops: vec![troop("Ghoul", 10, 1), troop("Bat", 10, 1)],
                hero: None,
            },
            Environment::Grass,
            77,
            CombatConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_spellbook_static_data_consistent() {
        // Every damage spell has an amount, every buff spell a buff
        for spell in [
            SpellKind::MagicArrow,
            SpellKind::LightningBolt,
            SpellKind::Implosion,
            SpellKind::Armageddon,
        ] {
            assert!(spell.damage_amount(5, 1.0).is_some());
            assert!(spell.buff_effect(5, 1.0).is_none());
        }
        for spell in [SpellKind::Haste, SpellKind::Curse, SpellKind::Blind] {
            assert!(spell.buff_effect(5, 1.0).is_some());
            assert!(spell.damage_amount(5, 1.0).is_none());
        }
    }

    #[test]
    fn test_cast_requires_hero() {
        let mut battle = spell_battle(None);
        let active = battle.active_unit().unwrap();
        let err = battle.cast_spell(active, SpellKind::Haste, Some(HexCoord::new(0, 5)));
        assert!(matches!(err, Err(CombatError::InvalidSpellTarget)));
    }

    #[test]
    fn test_cast_requires_mana() {
        let mut battle = spell_battle(Some(caster_hero(5, 3)));
        let active = battle.active_unit().unwrap();
        let target = battle.unit(active).unwrap().position;
        let err = battle.cast_spell(active, SpellKind::Haste, Some(target));
        assert!(matches!(err, Err(CombatError::InsufficientMana { .. })));
    }

    #[test]
    fn test_damage_spell_kills_creatures() {
        let mut battle = spell_battle(Some(caster_hero(4, 30)));
        let active = battle.active_unit().unwrap();
        let target = UnitHandle::new(Side::Defender, 0);
        let target_pos = battle.unit(target).unwrap().position;

        battle
            .cast_spell(active, SpellKind::LightningBolt, Some(target_pos))
            .unwrap();

        // 10 + 25 * 4 = 110 damage into 30-health ghouls: 3 dead, 20 into
        // the fourth
        let unit = battle.unit(target).unwrap();
        assert_eq!(unit.count, 7);
        assert_eq!(unit.front_health, 10);

        // Mana spent, one cast per round enforced
        assert_eq!(battle.hero(Side::Attacker).unwrap().mana, 20);
    }

    #[test]
    fn test_one_cast_per_round() {
        // Two attacker stacks so the side gets two turns in one round
        let mut battle = Battlefield::new_hero_battle(
            ArmySetup {
                troops: vec![troop("Monk", 10, 9), troop("Zealot", 10, 8)],
                hero: Some(caster_hero(4, 30)),
            },
            ArmySetup {
                troops: vec![troop("Ghoul", 10, 1)],
                hero: None,
            },
            Environment::Grass,
            77,
            CombatConfig::default(),
        )
        .unwrap();

        let first = battle.active_unit().unwrap();
        let own_pos = battle.unit(first).unwrap().position;
        battle.cast_spell(first, SpellKind::Haste, Some(own_pos)).unwrap();

        let second = battle.active_unit().unwrap();
        assert_eq!(second.side, Side::Attacker);
        assert_ne!(second, first);
        let second_pos = battle.unit(second).unwrap().position;
        let err = battle.cast_spell(second, SpellKind::Bless, Some(second_pos));
        assert!(matches!(err, Err(CombatError::AlreadyCast)));
    }

    #[test]
    fn test_buff_spell_respects_target_side() {
        let mut battle = spell_battle(Some(caster_hero(4, 30)));
        let active = battle.active_unit().unwrap();
        let enemy_pos = battle.unit(UnitHandle::new(Side::Defender, 0)).unwrap().position;

        let err = battle.cast_spell(active, SpellKind::Haste, Some(enemy_pos));
        assert!(matches!(err, Err(CombatError::InvalidSpellTarget)));
    }

    #[test]
    fn test_undead_immune_to_bless() {
        let mut battle = spell_battle(Some(caster_hero(4, 30)));
        let active = battle.active_unit().unwrap();
        battle
            .unit_mut(active)
            .unwrap()
            .stats
            .inherent
            .push(BuffKind::Undead);
        let own_pos = battle.unit(active).unwrap().position;

        let err = battle.cast_spell(active, SpellKind::Bless, Some(own_pos));
        assert!(matches!(err, Err(CombatError::TargetImmune)));
    }

    #[test]
    fn test_chain_lightning_decays_over_three_stacks() {
        let mut battle = spell_battle(Some(caster_hero(4, 30)));
        let active = battle.active_unit().unwrap();
        let first = UnitHandle::new(Side::Defender, 0);
        let first_pos = battle.unit(first).unwrap().position;

        battle
            .cast_spell(active, SpellKind::ChainLightning, Some(first_pos))
            .unwrap();

        let entry = battle
            .log()
            .iter()
            .find(|e| e.spell == Some(SpellKind::ChainLightning))
            .expect("cast logged");

        // 25 + 40 * 4 = 185, then halved per jump
        let damages: Vec<u64> = entry.strikes.iter().map(|s| s.damage).collect();
        assert!(damages.len() >= 3);
        assert_eq!(damages[0], 185);
        assert_eq!(damages[1], 92);
        assert_eq!(damages[2], 46);

        // Three distinct victims
        let mut victims: Vec<_> = entry.strikes.iter().map(|s| s.target.handle).collect();
        victims.dedup();
        assert_eq!(victims.len(), damages.len());
    }

    #[test]
    fn test_resurrection_restores_and_weakens_on_repeat() {
        let mut battle = spell_battle(Some(caster_hero(2, 60)));
        let active = battle.active_unit().unwrap();
        let own_pos = battle.unit(active).unwrap().position;

        // Hurt the stack: 2 monks dead, front at 10
        {
            let unit = battle.unit_mut(active).unwrap();
            unit.apply_damage(80, 30);
        }

        battle
            .cast_spell(active, SpellKind::Resurrection, Some(own_pos))
            .unwrap();

        // 40 + 50 * 2 = 140 healing against 80 lost: fully restored
        let unit = battle.unit(active).unwrap();
        assert_eq!(unit.count, 10);
        assert_eq!(unit.resurrected_count, 1);
    }

    #[test]
    fn test_time_dilation_refresh_and_cancel() {
        let mut battle = spell_battle(Some(caster_hero(3, 60)));
        // Give the defender a hero so both sides can cast
        battle.army_mut(Side::Defender).hero = Some(caster_hero(3, 60));

        let active = battle.active_unit().unwrap();
        assert_eq!(active.side, Side::Attacker);
        battle.cast_spell(active, SpellKind::TimeDilation, None).unwrap();
        assert!(battle.time_dilation_in_effect());
        assert_eq!(battle.time_dilation().unwrap().side, Side::Attacker);

        // Defender recast cancels outright
        let next = battle.active_unit().unwrap();
        assert_eq!(next.side, Side::Defender);
        battle.cast_spell(next, SpellKind::TimeDilation, None).unwrap();
        assert!(!battle.time_dilation_in_effect());

        let expirations = battle
            .log()
            .iter()
            .filter(|e| e.kind == ActionLogKind::BuffExpired)
            .count();
        assert!(expirations >= 1);
    }

    #[test]
    fn test_mass_spell_hits_own_side_only() {
        let mut battle = spell_battle(Some(caster_hero(3, 60)));
        let active = battle.active_unit().unwrap();
        battle.cast_spell(active, SpellKind::MassHaste, None).unwrap();

        assert!(battle.unit(active).unwrap().buffs.has(BuffKind::Haste));
        for slot in 0..2 {
            let handle = UnitHandle::new(Side::Defender, slot);
            assert!(!battle.unit(handle).unwrap().buffs.has(BuffKind::Haste));
        }
    }
}

//! Action resolver: move, melee, ranged, retaliation, and war machines
//!
//! Each public command validates against the active unit, mutates state,
//! emits log entries, and hands the turn back to the scheduler. Rejected
//! commands never mutate anything.

use crate::battle::battlefield::{BattleResult, Battlefield};
use crate::battle::buff::{Buff, BuffKind};
use crate::battle::damage::{compute_strike_damage, StrikeContext};
use crate::battle::grid::Footprint;
use crate::battle::hex::{HexCoord, HexDirection};
use crate::battle::log::{ActionLogEntry, ActionLogKind};
use crate::battle::siege::SiegeTarget;
use crate::battle::unit::{CombatUnit, WarMachine};
use crate::core::error::{CombatError, Result};
use crate::core::types::UnitHandle;

/// How one strike connects attacker and defender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrikeKind {
    Melee,
    Ranged,
    Retaliation,
}

impl Battlefield {
    /// Head cells the unit can move to this turn
    pub fn movement_range_of(&self, handle: UnitHandle) -> Vec<HexCoord> {
        let Some(unit) = self.unit(handle) else {
            return Vec::new();
        };
        if !unit.is_alive() {
            return Vec::new();
        }
        self.grid.movement_range(
            unit.position,
            self.effective_speed(unit),
            unit.stats.is_flyer,
            unit.facing,
            unit.stats.two_hex,
            handle,
        )
    }

    /// Move the active unit to a destination head cell
    pub fn move_unit(
        &mut self,
        handle: UnitHandle,
        destination: HexCoord,
    ) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        if !destination.in_bounds() {
            return Err(CombatError::InvalidCoordinate(destination));
        }

        self.relocate(handle, destination)?;

        let entry = {
            let unit = self.unit(handle).expect("active unit");
            self.new_log_entry(ActionLogKind::Move)
                .with_actor(unit)
                .with_destination(destination)
        };
        self.push_log(entry);
        self.finish_turn(handle, false, true);
        Ok(self.log_since(mark))
    }

    /// Melee attack, optionally relocating next to the target first
    pub fn attack(
        &mut self,
        handle: UnitHandle,
        target: UnitHandle,
        move_to: Option<HexCoord>,
    ) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        let defender = self.unit(target).ok_or(CombatError::InvalidUnit(target))?;
        if !defender.is_alive() || target == handle {
            return Err(CombatError::InvalidUnit(target));
        }

        // Validate reachability before touching anything
        let hexes_traveled = match move_to {
            Some(destination) => {
                if !destination.in_bounds() {
                    return Err(CombatError::InvalidCoordinate(destination));
                }
                let origin = self.unit(handle).expect("active unit").position;
                self.validate_reachable(handle, destination)?;
                origin.distance(&destination)
            }
            None => 0,
        };

        // Adjacency is checked against the post-move position
        {
            let attacker = self.unit(handle).expect("active unit");
            let defender = self.unit(target).expect("checked above");
            let attack_from = move_to.unwrap_or(attacker.position);
            if !footprints_adjacent(
                probe_footprint(attack_from, attacker),
                unit_footprint(defender),
            ) {
                return Err(CombatError::TargetNotAdjacent);
            }
        }

        if let Some(destination) = move_to {
            self.relocate(handle, destination)?;
        }

        self.resolve_attack_sequence(handle, target, hexes_traveled);
        self.finish_turn(handle, false, true);
        Ok(self.log_since(mark))
    }

    /// Ranged attack from the current position
    pub fn shoot(&mut self, handle: UnitHandle, target: UnitHandle) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        let shooter = self.unit(handle).ok_or(CombatError::InvalidUnit(handle))?;
        if !shooter.stats.is_shooter {
            return Err(CombatError::NotAShooter);
        }
        if shooter.has_trait(BuffKind::Forgetfulness) {
            return Err(CombatError::NotAShooter);
        }
        if self.shooter_engaged(handle) {
            return Err(CombatError::TargetNotAdjacent);
        }
        let defender = self.unit(target).ok_or(CombatError::InvalidUnit(target))?;
        if !defender.is_alive() || target.side == handle.side {
            return Err(CombatError::InvalidUnit(target));
        }

        if self.unit(handle).expect("shooter").stats.war_machine == Some(WarMachine::Turret) {
            self.resolve_turret_shot(handle, target);
        } else {
            self.resolve_shot_sequence(handle, target);
        }
        self.finish_turn(handle, false, true);
        Ok(self.log_since(mark))
    }

    /// Hold position for a defense bonus until next round
    pub fn defend(&mut self, handle: UnitHandle) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();

        let magnitude = {
            let unit = self.unit(handle).expect("active unit");
            (unit.stats.defense as f32 * 0.2).ceil().max(1.0)
        };
        let entry = {
            let unit = self.unit(handle).expect("active unit");
            self.new_log_entry(ActionLogKind::Defend).with_actor(unit)
        };
        self.push_log(entry);

        if let Some(unit) = self.unit_mut(handle) {
            unit.defended = true;
            unit.apply_buff(Buff::new(BuffKind::Defending, 1, magnitude));
        }
        self.finish_turn(handle, false, true);
        Ok(self.log_since(mark))
    }

    /// Defer this unit's turn to the end of the round
    pub fn wait(&mut self, handle: UnitHandle) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        let unit = self.unit(handle).ok_or(CombatError::InvalidUnit(handle))?;
        if unit.waited {
            return Err(CombatError::NotYourTurn(handle));
        }

        let entry = {
            let unit = self.unit(handle).expect("active unit");
            self.new_log_entry(ActionLogKind::Wait).with_actor(unit)
        };
        self.push_log(entry);
        self.finish_turn(handle, true, false);
        Ok(self.log_since(mark))
    }

    /// Manual catapult shot (requires the ballistics talent to be offered)
    pub fn fire_catapult(
        &mut self,
        handle: UnitHandle,
        target: Option<SiegeTarget>,
    ) -> Result<Vec<ActionLogEntry>> {
        self.require_active(handle)?;
        let mark = self.log_mark();
        let unit = self.unit(handle).ok_or(CombatError::InvalidUnit(handle))?;
        if unit.stats.war_machine != Some(WarMachine::Catapult) {
            return Err(CombatError::NoCatapult);
        }
        let siege = self.siege.as_ref().ok_or(CombatError::NoCatapult)?;

        let target = match target.or_else(|| siege.catapult_target()) {
            Some(target) => target,
            None => return Err(CombatError::InvalidSpellTarget),
        };
        let standing = match target {
            SiegeTarget::Wall(segment) => siege.is_wall_standing(segment),
            SiegeTarget::Gate => siege.is_gate_standing(),
        };
        if !standing {
            return Err(CombatError::InvalidSpellTarget);
        }

        self.resolve_catapult_shot(handle, target);
        self.finish_turn(handle, false, false);
        Ok(self.log_since(mark))
    }

    // === Internal resolution ===

    pub(crate) fn validate_reachable(&self, handle: UnitHandle, destination: HexCoord) -> Result<()> {
        let unit = self.unit(handle).ok_or(CombatError::InvalidUnit(handle))?;
        if self
            .grid
            .resolve_destination(destination, unit.facing, unit.stats.two_hex, handle)
            .is_none()
        {
            return Err(CombatError::OccupiedDestination(destination));
        }
        if !self.movement_range_of(handle).contains(&destination) {
            return Err(CombatError::UnreachableDestination(destination));
        }
        Ok(())
    }

    /// Update grid occupancy and unit position for a validated move
    pub(crate) fn relocate(&mut self, handle: UnitHandle, destination: HexCoord) -> Result<()> {
        self.validate_reachable(handle, destination)?;
        let (facing, two_hex) = {
            let unit = self.unit(handle).expect("validated");
            (unit.facing, unit.stats.two_hex)
        };
        let footprint = self
            .grid
            .resolve_destination(destination, facing, two_hex, handle)
            .expect("validated");

        self.grid.vacate(handle);
        self.grid.occupy(footprint, handle);
        if let Some(unit) = self.unit_mut(handle) {
            unit.position = footprint.head;
        }
        Ok(())
    }

    /// Are two units' footprints in contact?
    pub(crate) fn units_adjacent(&self, a: UnitHandle, b: UnitHandle) -> bool {
        match (self.unit(a), self.unit(b)) {
            (Some(unit_a), Some(unit_b)) => {
                footprints_adjacent(unit_footprint(unit_a), unit_footprint(unit_b))
            }
            _ => false,
        }
    }

    /// Is an enemy standing next to this shooter?
    pub(crate) fn shooter_engaged(&self, handle: UnitHandle) -> bool {
        let Some(shooter) = self.unit(handle) else {
            return false;
        };
        let cells = [shooter.position, shooter.tail().unwrap_or(shooter.position)];
        for cell in cells {
            for neighbor in cell.neighbors() {
                if let Some(other) = self.grid.occupant(neighbor) {
                    if other.side != handle.side {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Full melee exchange: strike, breath, retaliation, double attack
    fn resolve_attack_sequence(&mut self, attacker: UnitHandle, defender: UnitHandle, hexes_traveled: u32) {
        let mut entry = {
            let unit = self.unit(attacker).expect("attacker");
            self.new_log_entry(ActionLogKind::MeleeAttack).with_actor(unit)
        };
        self.resolve_strike(attacker, defender, StrikeKind::Melee, hexes_traveled, &mut entry);
        self.resolve_breath(attacker, defender, &mut entry);
        self.push_log(entry);
        self.check_battle_end();
        if self.result() != BattleResult::InProgress {
            return;
        }

        // Retaliation
        let retaliates = {
            let attacker_unit = self.unit(attacker);
            let defender_unit = self.unit(defender);
            match (attacker_unit, defender_unit) {
                (Some(a), Some(d)) => {
                    a.is_alive()
                        && d.is_alive()
                        && d.can_retaliate()
                        && !a.has_trait(BuffKind::NoEnemyRetaliation)
                }
                _ => false,
            }
        };
        if retaliates {
            if let Some(unit) = self.unit_mut(defender) {
                unit.spend_retaliation();
            }
            let mut entry = {
                let unit = self.unit(defender).expect("retaliator");
                self.new_log_entry(ActionLogKind::Retaliation).with_actor(unit)
            };
            self.resolve_strike(defender, attacker, StrikeKind::Retaliation, 0, &mut entry);
            self.push_log(entry);
            self.check_battle_end();
            if self.result() != BattleResult::InProgress {
                return;
            }
        }

        // Second strike of double-attack creatures
        let doubles = {
            let attacker_unit = self.unit(attacker);
            let defender_unit = self.unit(defender);
            match (attacker_unit, defender_unit) {
                (Some(a), Some(d)) => {
                    a.is_alive() && d.is_alive() && a.has_trait(BuffKind::DoubleAttack)
                }
                _ => false,
            }
        };
        if doubles {
            let mut entry = {
                let unit = self.unit(attacker).expect("attacker");
                self.new_log_entry(ActionLogKind::MeleeAttack).with_actor(unit)
            };
            self.resolve_strike(attacker, defender, StrikeKind::Melee, 0, &mut entry);
            self.push_log(entry);
            self.check_battle_end();
        }

        // A crusader brands its victim, stacking up over the battle
        self.apply_on_hit_marks(attacker, defender);
    }

    /// Full ranged exchange: shot, area effects, multi-shot
    fn resolve_shot_sequence(&mut self, shooter: UnitHandle, target: UnitHandle) {
        let mut entry = {
            let unit = self.unit(shooter).expect("shooter");
            self.new_log_entry(ActionLogKind::RangedAttack).with_actor(unit)
        };
        let mut already_hit = vec![target];
        self.resolve_strike(shooter, target, StrikeKind::Ranged, 0, &mut entry);
        self.resolve_area_shot(shooter, target, &mut already_hit, &mut entry);
        self.push_log(entry);
        self.check_battle_end();
        if self.result() != BattleResult::InProgress {
            return;
        }

        let doubles = {
            let shooter_unit = self.unit(shooter);
            let target_unit = self.unit(target);
            match (shooter_unit, target_unit) {
                (Some(s), Some(t)) => {
                    s.is_alive() && t.is_alive() && s.has_trait(BuffKind::DoubleShot)
                }
                _ => false,
            }
        };
        if doubles {
            let mut entry = {
                let unit = self.unit(shooter).expect("shooter");
                self.new_log_entry(ActionLogKind::RangedAttack).with_actor(unit)
            };
            self.resolve_strike(shooter, target, StrikeKind::Ranged, 0, &mut entry);
            self.push_log(entry);
            self.check_battle_end();
        }

        self.apply_on_hit_marks(shooter, target);
    }

    /// One strike through the damage pipeline, applied to the defender
    fn resolve_strike(
        &mut self,
        attacker: UnitHandle,
        defender: UnitHandle,
        kind: StrikeKind,
        hexes_traveled: u32,
        entry: &mut ActionLogEntry,
    ) {
        let attacker_unit = match self.unit(attacker) {
            Some(u) if u.is_alive() => u.clone(),
            _ => return,
        };
        let defender_unit = match self.unit(defender) {
            Some(u) if u.is_alive() => u.clone(),
            _ => return,
        };
        let attacker_hero = self.hero(attacker.side).cloned();
        let defender_hero = self.hero(defender.side).cloned();

        let context = StrikeContext {
            ranged: kind == StrikeKind::Ranged,
            distance: attacker_unit.position.distance(&defender_unit.position),
            through_wall: self.siege.as_ref().map_or(false, |s| {
                kind == StrikeKind::Ranged
                    && s.shot_crosses_walls(attacker_unit.position, defender_unit.position)
            }),
            retaliation: kind == StrikeKind::Retaliation,
            from_behind: struck_from_behind(&attacker_unit, &defender_unit),
            hexes_traveled,
        };
        let roll = compute_strike_damage(
            &mut self.rng,
            &attacker_unit,
            &defender_unit,
            attacker_hero.as_ref(),
            defender_hero.as_ref(),
            context,
            &self.config,
        );
        let max_health = defender_unit.max_health(defender_hero.as_ref());

        self.apply_strike_damage(defender, roll.amount, max_health, entry);
    }

    pub(crate) fn apply_strike_damage(
        &mut self,
        defender: UnitHandle,
        amount: u64,
        max_health: u32,
        entry: &mut ActionLogEntry,
    ) {
        let outcome = match self.unit_mut(defender) {
            Some(unit) => unit.apply_damage(amount, max_health),
            None => return,
        };
        if outcome.died {
            self.grid.vacate(defender);
        }
        let defender_unit = self.unit(defender).expect("struck unit");
        entry.push_strike(defender_unit, amount, outcome.kills, None);
    }

    /// Dragon breath: the cell behind the primary target along the
    /// attack line
    fn resolve_breath(&mut self, attacker: UnitHandle, defender: UnitHandle, entry: &mut ActionLogEntry) {
        let breath_cell = {
            let attacker_unit = match self.unit(attacker) {
                Some(u) if u.has_trait(BuffKind::DragonBreath) => u,
                _ => return,
            };
            let defender_unit = match self.unit(defender) {
                Some(u) if u.is_alive() => u,
                _ => return,
            };
            breath_target_cell(attacker_unit.position, defender_unit.position)
        };
        let Some(cell) = breath_cell else {
            return;
        };
        let Some(victim) = self.grid.occupant(cell) else {
            return;
        };
        if victim == attacker || victim == defender {
            return;
        }
        self.resolve_strike(attacker, victim, StrikeKind::Melee, 0, entry);
    }

    /// Cloud and blast shots spread to the neighborhood of the impact,
    /// skipping already-hit and type-immune units
    fn resolve_area_shot(
        &mut self,
        shooter: UnitHandle,
        target: UnitHandle,
        already_hit: &mut Vec<UnitHandle>,
        entry: &mut ActionLogEntry,
    ) {
        let (center, immunity) = {
            let shooter_unit = match self.unit(shooter) {
                Some(u) => u,
                None => return,
            };
            let immunity = if shooter_unit.has_trait(BuffKind::DeathCloudShot) {
                Some(BuffKind::Undead)
            } else if shooter_unit.has_trait(BuffKind::FireBlastShot) {
                Some(BuffKind::FireImmune)
            } else {
                return;
            };
            let target_unit = match self.unit(target) {
                Some(u) => u,
                None => return,
            };
            (target_unit.position, immunity)
        };

        for cell in center.neighbors_in_radius(1, false) {
            let Some(victim) = self.grid.occupant(cell) else {
                continue;
            };
            if victim == shooter || already_hit.contains(&victim) {
                continue;
            }
            let immune = immunity
                .map_or(false, |kind| self.unit(victim).map_or(true, |u| u.has_trait(kind)));
            if immune {
                continue;
            }
            already_hit.push(victim);
            self.resolve_strike(shooter, victim, StrikeKind::Ranged, 0, entry);
        }
    }

    /// Stacking marks left by crusader- and overwhelm-trait attackers
    fn apply_on_hit_marks(&mut self, attacker: UnitHandle, defender: UnitHandle) {
        let marks = {
            let attacker_unit = match self.unit(attacker) {
                Some(u) if u.is_alive() => u,
                _ => return,
            };
            (
                attacker_unit.has_trait(BuffKind::Crusader),
                attacker_unit.has_trait(BuffKind::OverwhelmStrike),
            )
        };
        let Some(defender_unit) = self.unit_mut(defender) else {
            return;
        };
        if !defender_unit.is_alive() {
            return;
        }
        if marks.0 {
            defender_unit.apply_buff(Buff::permanent(BuffKind::Crusade, 1.0));
        }
        if marks.1 {
            defender_unit.apply_buff(Buff::permanent(BuffKind::Overwhelm, 1.0));
        }
    }

    // === War machine auto-resolution ===

    pub(crate) fn auto_fire_catapult(&mut self, handle: UnitHandle) {
        let Some(target) = self.siege.as_ref().and_then(|s| s.catapult_target()) else {
            return;
        };
        self.resolve_catapult_shot(handle, target);
        if let Some(unit) = self.unit_mut(handle) {
            unit.acted = true;
        }
    }

    fn resolve_catapult_shot(&mut self, handle: UnitHandle, target: SiegeTarget) {
        let mut destroyed_kind = None;
        if let Some(siege) = self.siege.as_mut() {
            // Split borrow: siege and grid are separate fields
            let grid = &mut self.grid;
            let destroyed = match target {
                SiegeTarget::Wall(segment) => siege.damage_wall(segment, grid),
                SiegeTarget::Gate => siege.damage_gate(grid),
            };
            if destroyed {
                destroyed_kind = Some(match target {
                    SiegeTarget::Wall(_) => ActionLogKind::WallDestroyed,
                    SiegeTarget::Gate => ActionLogKind::GateDestroyed,
                });
            }
        }

        let entry = {
            let unit = self.unit(handle).expect("catapult");
            self.new_log_entry(ActionLogKind::CatapultShot).with_actor(unit)
        };
        self.push_log(entry);
        if let Some(kind) = destroyed_kind {
            let entry = self.new_log_entry(kind);
            self.push_log(entry);
        }
    }

    pub(crate) fn auto_fire_turret(&mut self, handle: UnitHandle) {
        // First living enemy in slot order
        let target = self
            .army(handle.side.opposite())
            .living_units()
            .map(|u| u.handle)
            .next();
        if let Some(target) = target {
            self.resolve_turret_shot(handle, target);
        }
        if let Some(unit) = self.unit_mut(handle) {
            unit.acted = true;
        }
        self.check_battle_end();
    }

    fn resolve_turret_shot(&mut self, handle: UnitHandle, target: UnitHandle) {
        use rand::Rng;
        let amount = self
            .rng
            .gen_range(self.config.turret_damage_min..=self.config.turret_damage_max)
            as u64;
        let max_health = match self.unit(target) {
            Some(unit) => unit.max_health(self.hero(target.side)),
            None => return,
        };
        let mut entry = {
            let unit = self.unit(handle).expect("turret");
            self.new_log_entry(ActionLogKind::TurretShot).with_actor(unit)
        };
        self.apply_strike_damage(target, amount, max_health, &mut entry);
        self.push_log(entry);
    }
}

/// Attack lands in the defender's rear arc
fn struck_from_behind(attacker: &CombatUnit, defender: &CombatUnit) -> bool {
    match defender.facing {
        HexDirection::East => attacker.position.x < defender.position.x,
        HexDirection::West => attacker.position.x > defender.position.x,
        _ => false,
    }
}

/// The cell one step past the defender along the attack line
fn breath_target_cell(attacker: HexCoord, defender: HexCoord) -> Option<HexCoord> {
    for direction in HexDirection::all() {
        if attacker.adjacent(direction) == defender {
            let behind = defender.adjacent(direction);
            return behind.in_bounds().then_some(behind);
        }
    }
    None
}

fn probe_footprint(head: HexCoord, unit: &CombatUnit) -> Footprint {
    Footprint {
        head,
        tail: unit
            .stats
            .two_hex
            .then(|| head.adjacent(unit.facing.opposite())),
    }
}

fn unit_footprint(unit: &CombatUnit) -> Footprint {
    Footprint {
        head: unit.position,
        tail: unit.tail(),
    }
}

/// Any cell of one footprint adjacent to any cell of the other
fn footprints_adjacent(a: Footprint, b: Footprint) -> bool {
    let a_cells = [Some(a.head), a.tail];
    let b_cells = [Some(b.head), b.tail];
    for a_cell in a_cells.into_iter().flatten() {
        for b_cell in b_cells.into_iter().flatten() {
            if a_cell.distance(&b_cell) == 1 {
                return true;
            }
        }
    }
    false
}

//! Battlefield state and the turn-by-turn lifecycle
//!
//! The battlefield owns every piece of combat state: grid, armies, siege
//! structures, the forward move-queue, the seeded RNG, and the action
//! log. Callers drive it through discrete commands and read the log.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::battle::constants::{GRID_HEIGHT, GRID_WIDTH};
use crate::battle::damage::{roll_morale, MoraleOutcome};
use crate::battle::grid::{Footprint, HexGrid};
use crate::battle::hero::{Artifact, HeroSheet, Talent};
use crate::battle::hex::HexCoord;
use crate::battle::log::{ActionLogEntry, ActionLogKind};
use crate::battle::scheduler::{QueueEntry, QueueUnit, SchedulerState, TurnQueue};
use crate::battle::siege::{self, SiegeState};
use crate::battle::unit::{Army, CombatUnit, CreatureStats, TroopEntry, WarMachine};
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::types::{BattleId, Environment, Round, Side, UnitHandle};

/// Terminal state of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BattleResult {
    #[default]
    InProgress,
    AttackerWins,
    DefenderWins,
    BothLose,
}

/// The four battle kinds exposed to the adventure layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleKind {
    HeroVsHero,
    Siege,
    WanderingMonster,
    TreasureGuard,
}

/// Battlefield-wide time dilation effect
#[derive(Debug, Clone, Copy)]
pub struct TimeDilation {
    pub side: Side,
    pub rounds_left: u32,
    pub magnitude: f32,
}

/// Pre-battle army description
#[derive(Debug, Clone)]
pub struct ArmySetup {
    pub troops: Vec<TroopEntry>,
    pub hero: Option<HeroSheet>,
}

/// The complete battle state
#[derive(Debug)]
pub struct Battlefield {
    pub id: BattleId,
    pub kind: BattleKind,
    pub environment: Environment,
    pub grid: HexGrid,
    armies: [Army; 2],
    pub siege: Option<SiegeState>,
    round: Round,
    actions_this_round: u32,
    queue: TurnQueue,
    last_acted: Side,
    /// Unit currently offered to the caller, already past its gates
    pending: Option<UnitHandle>,
    time_dilation: Option<TimeDilation>,
    result: BattleResult,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) config: CombatConfig,
    log: Vec<ActionLogEntry>,
    log_enabled: bool,
}

impl Battlefield {
    /// Open-field battle between two heroes
    pub fn new_hero_battle(
        attacker: ArmySetup,
        defender: ArmySetup,
        environment: Environment,
        seed: u64,
        config: CombatConfig,
    ) -> Result<Self> {
        Self::with_kind(BattleKind::HeroVsHero, attacker, defender, environment, seed, config)
    }

    /// Siege of a town: walls, gate, turrets, and an attacker catapult
    pub fn new_siege_battle(
        attacker: ArmySetup,
        defender: ArmySetup,
        environment: Environment,
        seed: u64,
        config: CombatConfig,
    ) -> Result<Self> {
        Self::with_kind(BattleKind::Siege, attacker, defender, environment, seed, config)
    }

    /// Hero against a wandering monster army (no defending hero)
    pub fn new_monster_battle(
        attacker: ArmySetup,
        mut defender: ArmySetup,
        environment: Environment,
        seed: u64,
        config: CombatConfig,
    ) -> Result<Self> {
        defender.hero = None;
        Self::with_kind(
            BattleKind::WanderingMonster,
            attacker,
            defender,
            environment,
            seed,
            config,
        )
    }

    /// Hero against the guardians of a treasure site
    pub fn new_treasure_guard_battle(
        attacker: ArmySetup,
        mut defender: ArmySetup,
        environment: Environment,
        seed: u64,
        config: CombatConfig,
    ) -> Result<Self> {
        defender.hero = None;
        Self::with_kind(
            BattleKind::TreasureGuard,
            attacker,
            defender,
            environment,
            seed,
            config,
        )
    }

    fn with_kind(
        kind: BattleKind,
        attacker: ArmySetup,
        defender: ArmySetup,
        environment: Environment,
        seed: u64,
        config: CombatConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut battlefield = Self {
            id: BattleId::new(),
            kind,
            environment,
            grid: HexGrid::new(),
            armies: [
                Army::new(Side::Attacker, attacker.hero),
                Army::new(Side::Defender, defender.hero),
            ],
            siege: None,
            round: 1,
            actions_this_round: 0,
            queue: TurnQueue::new(),
            last_acted: Side::Defender,
            pending: None,
            time_dilation: None,
            result: BattleResult::InProgress,
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
            log: Vec::new(),
            log_enabled: true,
        };

        if kind == BattleKind::Siege {
            let siege_state = SiegeState::new(&battlefield.config);
            siege_state.apply_to_grid(&mut battlefield.grid);
            battlefield.siege = Some(siege_state);
        }

        battlefield.deploy_army(Side::Attacker, attacker.troops)?;
        battlefield.deploy_army(Side::Defender, defender.troops)?;

        if kind == BattleKind::Siege {
            battlefield.deploy_war_machines()?;
        }

        for side in [Side::Attacker, Side::Defender] {
            let hero = battlefield.army(side).hero.clone();
            for unit in &mut battlefield.armies[side_index(side)].slots {
                unit.begin_round(hero.as_ref());
            }
        }

        battlefield.rebuild_queue();
        tracing::debug!(battle = ?battlefield.id, ?kind, "battle initialized");
        Ok(battlefield)
    }

    fn deploy_army(&mut self, side: Side, troops: Vec<TroopEntry>) -> Result<()> {
        for entry in troops {
            self.deploy_unit(side, entry)?;
        }
        Ok(())
    }

    fn deploy_unit(&mut self, side: Side, entry: TroopEntry) -> Result<UnitHandle> {
        let position = self
            .find_deploy_position(side, entry.stats.two_hex)
            .ok_or(CombatError::OccupiedDestination(HexCoord::new(0, 0)))?;

        let army = &mut self.armies[side_index(side)];
        let handle = army
            .push_unit(entry, position)
            .ok_or(CombatError::InvalidUnit(UnitHandle::new(side, u8::MAX)))?;

        let unit = army.unit(handle.slot).expect("just pushed");
        let footprint = Footprint {
            head: unit.position,
            tail: unit.tail(),
        };
        self.grid.occupy(footprint, handle);
        Ok(handle)
    }

    /// Center-out deployment scan along the army's edge columns
    fn find_deploy_position(&self, side: Side, two_hex: bool) -> Option<HexCoord> {
        let columns: [i32; 2] = match side {
            // Two-hex tails extend toward the own edge, so heads start one
            // column in
            Side::Attacker if two_hex => [1, 2],
            Side::Attacker => [0, 1],
            Side::Defender if two_hex => [GRID_WIDTH - 2, GRID_WIDTH - 3],
            Side::Defender => [GRID_WIDTH - 1, GRID_WIDTH - 2],
        };

        let mid = GRID_HEIGHT / 2;
        let mut rows = vec![mid];
        for offset in 1..=mid {
            rows.push(mid - offset);
            rows.push(mid + offset);
        }

        for &x in &columns {
            for &y in &rows {
                let head = HexCoord::new(x, y);
                if !head.in_bounds() {
                    continue;
                }
                if !self.grid.is_free(head) {
                    continue;
                }
                if two_hex {
                    let tail = match side {
                        Side::Attacker => HexCoord::new(x - 1, y),
                        Side::Defender => HexCoord::new(x + 1, y),
                    };
                    if !self.grid.is_free(tail) {
                        continue;
                    }
                }
                return Some(head);
            }
        }
        None
    }

    fn deploy_war_machines(&mut self) -> Result<()> {
        // Attacker catapult, falling back to the deployment scan when its
        // spot is taken by a troop
        if self.armies[0].slots.len() < crate::battle::constants::MAX_ARMY_SLOTS {
            let preferred = siege::catapult_position();
            let position = if self.grid.is_free(preferred) {
                Some(preferred)
            } else {
                self.find_deploy_position(Side::Attacker, false)
            };
            if let Some(position) = position {
                let army = &mut self.armies[0];
                if let Some(handle) = army.push_unit(siege::catapult_entry(), position) {
                    self.grid.occupy(Footprint::single(position), handle);
                }
            }
        }

        // Defender turrets
        for (index, position) in siege::turret_positions().into_iter().enumerate() {
            if self.armies[1].slots.len() >= crate::battle::constants::MAX_ARMY_SLOTS {
                break;
            }
            if !self.grid.is_free(position) {
                continue;
            }
            let army = &mut self.armies[1];
            if let Some(handle) = army.push_unit(siege::turret_entry(index), position) {
                self.grid.occupy(Footprint::single(position), handle);
            }
        }
        Ok(())
    }

    // === Accessors ===

    pub fn army(&self, side: Side) -> &Army {
        &self.armies[side_index(side)]
    }

    pub(crate) fn army_mut(&mut self, side: Side) -> &mut Army {
        &mut self.armies[side_index(side)]
    }

    pub fn unit(&self, handle: UnitHandle) -> Option<&CombatUnit> {
        self.armies[side_index(handle.side)].unit(handle.slot)
    }

    pub(crate) fn unit_mut(&mut self, handle: UnitHandle) -> Option<&mut CombatUnit> {
        self.armies[side_index(handle.side)].unit_mut(handle.slot)
    }

    pub fn hero(&self, side: Side) -> Option<&HeroSheet> {
        self.armies[side_index(side)].hero.as_ref()
    }

    pub fn result(&self) -> BattleResult {
        self.result
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn actions_this_round(&self) -> u32 {
        self.actions_this_round
    }

    pub fn time_dilation(&self) -> Option<TimeDilation> {
        self.time_dilation
    }

    pub fn time_dilation_in_effect(&self) -> bool {
        self.time_dilation.is_some()
    }

    pub(crate) fn set_time_dilation(&mut self, dilation: Option<TimeDilation>) {
        self.time_dilation = dilation;
    }

    pub fn log(&self) -> &[ActionLogEntry] {
        &self.log
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.queue.state()
    }

    /// The currently offered unit, without advancing the scheduler
    pub fn active_handle(&self) -> Option<UnitHandle> {
        self.pending
    }

    /// Suppress or restore action-log emission (quick combat)
    pub(crate) fn set_log_enabled(&mut self, enabled: bool) {
        self.log_enabled = enabled;
    }

    pub(crate) fn push_log(&mut self, entry: ActionLogEntry) -> Option<&ActionLogEntry> {
        if self.log_enabled {
            self.log.push(entry);
            self.log.last()
        } else {
            None
        }
    }

    pub(crate) fn new_log_entry(&self, kind: ActionLogKind) -> ActionLogEntry {
        ActionLogEntry::new(self.round, kind)
    }

    /// Cursor into the log, taken before a command resolves
    pub(crate) fn log_mark(&self) -> usize {
        self.log.len()
    }

    /// The entries a command appended past its starting cursor
    pub(crate) fn log_since(&self, mark: usize) -> Vec<ActionLogEntry> {
        self.log[mark.min(self.log.len())..].to_vec()
    }

    /// Every living unit of both sides, attacker slots first
    pub fn living_handles(&self) -> Vec<UnitHandle> {
        let mut handles = Vec::new();
        for army in &self.armies {
            for unit in army.living_units() {
                handles.push(unit.handle);
            }
        }
        handles
    }

    /// Initiative after battlefield-wide effects
    pub(crate) fn effective_initiative(&self, unit: &CombatUnit) -> u32 {
        let mut initiative = unit.initiative() as i32;
        if let Some(dilation) = self.time_dilation {
            if unit.side != dilation.side {
                initiative -= dilation.magnitude as i32;
            }
        }
        initiative.max(0) as u32
    }

    /// Movement speed after battlefield-wide effects
    pub fn effective_speed(&self, unit: &CombatUnit) -> u32 {
        let mut speed = unit.speed() as i32;
        if let Some(dilation) = self.time_dilation {
            if unit.side != dilation.side {
                speed -= dilation.magnitude as i32;
            }
        }
        speed.max(0) as u32
    }

    // === Scheduling ===

    /// Rebuild the forward queue from current eligibility
    pub(crate) fn rebuild_queue(&mut self) {
        let mut units = Vec::new();
        for army in &self.armies {
            for unit in army.living_units() {
                if unit.is_disabled() {
                    continue;
                }
                units.push(QueueUnit {
                    handle: unit.handle,
                    initiative: self.effective_initiative(unit),
                    speed: unit.speed(),
                    screen_position: unit.position.screen_position(),
                    waited: unit.waited,
                    acted: unit.acted,
                });
            }
        }
        self.queue.rebuild(&units, self.last_acted);
    }

    /// The unit whose turn it is, auto-resolving war machines and
    /// mismorale along the way. Returns None once the battle is over.
    pub fn active_unit(&mut self) -> Option<UnitHandle> {
        loop {
            if self.result != BattleResult::InProgress {
                return None;
            }
            if let Some(handle) = self.pending {
                return Some(handle);
            }
            match self.queue.front() {
                None => {
                    self.rebuild_queue();
                    if self.queue.is_empty() {
                        // Nothing can act (mass disable): advance the round
                        // anyway so durations tick and the cap applies
                        let anyone_alive =
                            !self.armies[0].is_defeated() && !self.armies[1].is_defeated();
                        if anyone_alive {
                            self.end_round();
                            continue;
                        }
                        return None;
                    }
                }
                Some(QueueEntry::RoundBoundary) => {
                    self.queue.pop();
                    self.end_round();
                }
                Some(QueueEntry::Unit(handle)) => {
                    self.queue.pop();
                    if !self.offerable(handle) {
                        continue;
                    }
                    match self.gate_unit(handle) {
                        Some(handle) => {
                            self.pending = Some(handle);
                            return Some(handle);
                        }
                        None => continue,
                    }
                }
            }
        }
    }

    fn offerable(&self, handle: UnitHandle) -> bool {
        match self.unit(handle) {
            Some(unit) => unit.is_alive() && !unit.is_disabled() && !unit.acted,
            None => false,
        }
    }

    /// Auto-fire war machines and run the mismorale gate. Returns the
    /// handle when the caller should take control.
    fn gate_unit(&mut self, handle: UnitHandle) -> Option<UnitHandle> {
        let (machine, berserk, morale) = {
            let unit = self.unit(handle)?;
            let hero = self.hero(handle.side);
            (
                unit.stats.war_machine,
                unit.has_trait(crate::battle::buff::BuffKind::Berserk),
                unit.morale_value(hero),
            )
        };

        match machine {
            Some(WarMachine::Catapult) => {
                let manual = self
                    .hero(handle.side)
                    .map_or(false, |h| h.has_talent(Talent::Ballistics));
                if manual {
                    return Some(handle);
                }
                // No target left: skipped without consuming a real turn
                if self.siege.as_ref().and_then(|s| s.catapult_target()).is_none() {
                    return None;
                }
                self.auto_fire_catapult(handle);
                return None;
            }
            Some(WarMachine::Turret) | Some(WarMachine::Ballista) => {
                let manual = self
                    .hero(handle.side)
                    .map_or(false, |h| h.has_talent(Talent::Artillery));
                if manual {
                    return Some(handle);
                }
                self.auto_fire_turret(handle);
                return None;
            }
            None => {}
        }

        // Berserked units are never handed to the caller
        if berserk {
            self.pending = Some(handle);
            self.auto_move(handle);
            return None;
        }

        // Mismorale: one independent check before the unit may act
        if morale < 0 {
            let outcome = roll_morale(&mut self.rng, morale, &self.config);
            if outcome == MoraleOutcome::Lost {
                let entry = {
                    let unit = self.unit(handle).expect("gated unit");
                    self.new_log_entry(ActionLogKind::Mismorale).with_actor(unit)
                };
                self.push_log(entry);
                if let Some(unit) = self.unit_mut(handle) {
                    unit.acted = true;
                }
                self.last_acted = handle.side;
                self.actions_this_round += 1;
                self.rebuild_queue();
                return None;
            }
        }

        Some(handle)
    }

    /// Called by every command after it resolves. Rolls the
    /// morale-triggered bonus action, advances bookkeeping, and
    /// recomputes the queue.
    pub(crate) fn finish_turn(&mut self, handle: UnitHandle, deferred: bool, allow_morale: bool) {
        self.pending = None;
        self.last_acted = handle.side;
        self.actions_this_round += 1;

        if deferred {
            if let Some(unit) = self.unit_mut(handle) {
                unit.waited = true;
            }
            self.rebuild_queue();
            return;
        }

        if let Some(unit) = self.unit_mut(handle) {
            unit.acted = true;
        }

        if allow_morale && self.result == BattleResult::InProgress {
            let (morale, already) = match self.unit(handle) {
                Some(unit) if !unit.has_trait(crate::battle::buff::BuffKind::Berserk) => {
                    (unit.morale_value(self.hero(handle.side)), unit.moraled)
                }
                _ => (0, true),
            };
            if morale > 0 && !already {
                let outcome = roll_morale(&mut self.rng, morale, &self.config);
                if outcome == MoraleOutcome::Bonus {
                    let entry = {
                        let unit = self.unit(handle).expect("alive for morale");
                        self.new_log_entry(ActionLogKind::MoraleBonus).with_actor(unit)
                    };
                    self.push_log(entry);
                    if let Some(unit) = self.unit_mut(handle) {
                        unit.moraled = true;
                        unit.acted = false;
                    }
                    // The unit acts again immediately
                    self.pending = Some(handle);
                }
            }
        }

        self.rebuild_queue();
    }

    /// Round-boundary processing: age buffs, reset flags, enforce the
    /// round cap
    fn end_round(&mut self) {
        let mut expirations = Vec::new();
        for army in &mut self.armies {
            for unit in &mut army.slots {
                if !unit.is_alive() {
                    continue;
                }
                for kind in unit.buffs.tick_round() {
                    expirations.push((unit.handle, kind));
                }
            }
        }
        for (handle, kind) in expirations {
            let entry = {
                let unit = self.unit(handle).expect("expired on living unit");
                let mut entry = self.new_log_entry(ActionLogKind::BuffExpired).with_actor(unit);
                entry.push_strike(unit, 0, 0, Some(kind));
                entry
            };
            self.push_log(entry);
        }

        if let Some(mut dilation) = self.time_dilation {
            dilation.rounds_left = dilation.rounds_left.saturating_sub(1);
            if dilation.rounds_left == 0 {
                self.time_dilation = None;
                let entry = self.new_log_entry(ActionLogKind::BuffExpired);
                self.push_log(entry);
            } else {
                self.time_dilation = Some(dilation);
            }
        }

        for side in [Side::Attacker, Side::Defender] {
            let hero = self.army(side).hero.clone();
            let army = self.army_mut(side);
            army.hero_cast_this_round = false;
            for unit in &mut army.slots {
                if unit.is_alive() {
                    unit.begin_round(hero.as_ref());
                }
            }
        }

        self.round += 1;
        self.actions_this_round = 0;
        tracing::debug!(round = self.round, "round boundary");

        if self.round > self.config.max_rounds {
            // Deliberate policy: an endless battle scores for the defender
            self.set_result(BattleResult::DefenderWins);
            return;
        }

        self.rebuild_queue();
    }

    /// Check both armies for a terminal state after any mutation batch
    pub(crate) fn check_battle_end(&mut self) {
        if self.result != BattleResult::InProgress {
            return;
        }
        let attacker_dead = self.armies[0].is_defeated();
        let defender_dead = self.armies[1].is_defeated();
        let outcome = match (attacker_dead, defender_dead) {
            (true, true) => BattleResult::BothLose,
            (true, false) => BattleResult::DefenderWins,
            (false, true) => BattleResult::AttackerWins,
            (false, false) => return,
        };
        self.set_result(outcome);
    }

    fn set_result(&mut self, result: BattleResult) {
        if self.result != BattleResult::InProgress {
            return;
        }
        self.result = result;
        self.pending = None;
        self.queue.clear();
        let entry = self.new_log_entry(ActionLogKind::BattleEnded);
        self.push_log(entry);
        tracing::info!(?result, round = self.round, "battle ended");
    }

    /// Reject commands unless `handle` is the unit currently offered
    pub(crate) fn require_active(&self, handle: UnitHandle) -> Result<()> {
        if self.result != BattleResult::InProgress {
            return Err(CombatError::BattleOver);
        }
        if self.pending != Some(handle) {
            return Err(CombatError::NotYourTurn(handle));
        }
        Ok(())
    }

    // === End-of-battle queries ===

    /// Troops still standing on one side
    pub fn survivors(&self, side: Side) -> Vec<(CreatureStats, u32)> {
        self.army(side)
            .living_units()
            .map(|u| (u.stats.clone(), u.count))
            .collect()
    }

    /// Experience for the winner: total health of slain enemy creatures
    pub fn experience_for_winner(&self) -> u64 {
        let loser = match self.result {
            BattleResult::AttackerWins => Side::Defender,
            BattleResult::DefenderWins => Side::Attacker,
            _ => return 0,
        };
        self.army(loser)
            .slots
            .iter()
            .map(|u| (u.original_count.saturating_sub(u.count)) as u64 * u.stats.health as u64)
            .sum()
    }

    /// Undead raised by the winner's necromancy after victory
    pub fn raised_undead(&self) -> u32 {
        let (winner, loser) = match self.result {
            BattleResult::AttackerWins => (Side::Attacker, Side::Defender),
            BattleResult::DefenderWins => (Side::Defender, Side::Attacker),
            _ => return 0,
        };
        let level = match self.hero(winner) {
            Some(hero) => hero.necromancy_level,
            None => return 0,
        };
        if level == 0 {
            return 0;
        }
        let slain: u32 = self
            .army(loser)
            .slots
            .iter()
            .filter(|u| u.stats.war_machine.is_none())
            .map(|u| u.original_count.saturating_sub(u.count))
            .sum();
        slain * level as u32 / 10
    }

    /// Artifacts taken from a defeated hero
    pub fn captured_artifacts(&self) -> Vec<Artifact> {
        let loser = match self.result {
            BattleResult::AttackerWins => Side::Defender,
            BattleResult::DefenderWins => Side::Attacker,
            _ => return Vec::new(),
        };
        match (self.hero(loser), self.hero(loser.opposite())) {
            (Some(defeated), Some(_)) => defeated.artifacts.clone(),
            _ => Vec::new(),
        }
    }
}

pub(crate) fn side_index(side: Side) -> usize {
    match side {
        Side::Attacker => 0,
        Side::Defender => 1,
    }
}

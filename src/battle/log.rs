//! Action log: flat serializable records of every resolved effect
//!
//! The log is the engine's only output channel. Entries hold value-type
//! snapshots and primitive fields, never live references; the engine
//! never reads them back.

use serde::{Deserialize, Serialize};

use crate::battle::buff::BuffKind;
use crate::battle::hex::HexCoord;
use crate::battle::spell::SpellKind;
use crate::battle::unit::CombatUnit;
use crate::core::types::{Round, Side, UnitHandle};

/// Value-type snapshot of a unit at log time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub handle: UnitHandle,
    pub side: Side,
    pub creature_id: u16,
    pub name: String,
    pub count: u32,
    pub position: HexCoord,
}

impl UnitSnapshot {
    pub fn of(unit: &CombatUnit) -> Self {
        Self {
            handle: unit.handle,
            side: unit.side,
            creature_id: unit.stats.id,
            name: unit.stats.name.clone(),
            count: unit.count,
            position: unit.position,
        }
    }
}

/// One target hit by an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub target: UnitSnapshot,
    pub damage: u64,
    pub kills: u32,
    pub buff: Option<BuffKind>,
}

/// What kind of effect a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionLogKind {
    Move,
    MeleeAttack,
    RangedAttack,
    Retaliation,
    Defend,
    Wait,
    MoraleBonus,
    Mismorale,
    SpellCast,
    BuffApplied,
    BuffExpired,
    CatapultShot,
    TurretShot,
    WallDestroyed,
    GateDestroyed,
    BattleEnded,
}

/// An immutable record of one resolved effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub round: Round,
    pub kind: ActionLogKind,
    pub actor: Option<UnitSnapshot>,
    pub strikes: Vec<StrikeRecord>,
    pub destination: Option<HexCoord>,
    pub spell: Option<SpellKind>,
    /// Presentation attribution: talent or artifact name behind the effect
    pub attribution: Option<String>,
}

impl ActionLogEntry {
    pub fn new(round: Round, kind: ActionLogKind) -> Self {
        Self {
            round,
            kind,
            actor: None,
            strikes: Vec::new(),
            destination: None,
            spell: None,
            attribution: None,
        }
    }

    pub fn with_actor(mut self, unit: &CombatUnit) -> Self {
        self.actor = Some(UnitSnapshot::of(unit));
        self
    }

    pub fn with_destination(mut self, destination: HexCoord) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_spell(mut self, spell: SpellKind) -> Self {
        self.spell = Some(spell);
        self
    }

    pub fn push_strike(&mut self, target: &CombatUnit, damage: u64, kills: u32, buff: Option<BuffKind>) {
        self.strikes.push(StrikeRecord {
            target: UnitSnapshot::of(target),
            damage,
            kills,
            buff,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::unit::{CreatureStats, TroopEntry};

    fn sample_unit() -> CombatUnit {
        CombatUnit::new(
            UnitHandle::new(Side::Attacker, 2),
            TroopEntry {
                stats: CreatureStats {
                    id: 7,
                    name: "Archer".into(),
                    health: 10,
                    ..CreatureStats::default()
                },
                count: 12,
            },
            HexCoord::new(1, 2),
        )
    }

    #[test]
    fn test_snapshot_captures_state_at_log_time() {
        let mut unit = sample_unit();
        let snap = UnitSnapshot::of(&unit);
        unit.count = 1;
        assert_eq!(snap.count, 12);
        assert_eq!(snap.creature_id, 7);
    }

    #[test]
    fn test_entry_serializes_flat() {
        let unit = sample_unit();
        let mut entry = ActionLogEntry::new(3, ActionLogKind::MeleeAttack).with_actor(&unit);
        entry.push_strike(&unit, 42, 4, None);

        let json = serde_json::to_string(&entry).unwrap();
        let back: ActionLogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.round, 3);
        assert_eq!(back.strikes.len(), 1);
        assert_eq!(back.strikes[0].damage, 42);
    }
}

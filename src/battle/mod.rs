//! Tactical combat engine - a single battle on a 17x11 hex battlefield
//!
//! Two armies of creature stacks fight under initiative-based turn order
//! with melee, ranged fire, retaliation, spellcasting, morale and luck
//! procs, and siege structures. The same resolution code drives stepwise
//! play and quick combat; callers issue discrete commands and read the
//! action log.

pub mod actions;
pub mod auto;
pub mod battlefield;
pub mod buff;
pub mod constants;
pub mod damage;
pub mod grid;
pub mod hero;
pub mod hex;
pub mod log;
pub mod scheduler;
pub mod siege;
pub mod spell;
pub mod unit;

// Re-exports for convenient access
pub use battlefield::{ArmySetup, BattleKind, BattleResult, Battlefield, TimeDilation};
pub use buff::{Buff, BuffKind, BuffSet};
pub use constants::*;
pub use damage::{
    attack_defense_multiplier, compute_strike_damage, ranged_distance_multiplier, roll_luck,
    roll_morale, DamageRoll, LuckOutcome, MoraleOutcome, StrikeContext,
};
pub use grid::{Footprint, HexCell, HexGrid};
pub use hero::{Artifact, HeroSheet, Talent};
pub use hex::{HexCoord, HexDirection};
pub use log::{ActionLogEntry, ActionLogKind, StrikeRecord, UnitSnapshot};
pub use scheduler::{QueueEntry, QueueUnit, SchedulerState, TurnQueue};
pub use siege::{SiegeState, SiegeTarget, WallSegment};
pub use spell::{unit_immune, SpellKind, SpellSchool, SpellTargetKind};
pub use unit::{Army, CombatUnit, CreatureStats, TroopEntry, WarMachine};

use thiserror::Error;

use crate::battle::hex::HexCoord;
use crate::core::types::UnitHandle;

#[derive(Error, Debug)]
pub enum CombatError {
    #[error("Coordinate out of bounds: {0:?}")]
    InvalidCoordinate(HexCoord),

    #[error("No living unit at handle: {0:?}")]
    InvalidUnit(UnitHandle),

    #[error("Unit is not the active unit: {0:?}")]
    NotYourTurn(UnitHandle),

    #[error("Destination unreachable: {0:?}")]
    UnreachableDestination(HexCoord),

    #[error("Destination occupied or impassable: {0:?}")]
    OccupiedDestination(HexCoord),

    #[error("Target not adjacent and unit cannot shoot")]
    TargetNotAdjacent,

    #[error("Unit cannot shoot")]
    NotAShooter,

    #[error("Not enough mana: need {needed}, have {available}")]
    InsufficientMana { needed: u32, available: u32 },

    #[error("Invalid spell target")]
    InvalidSpellTarget,

    #[error("Target is immune to this spell")]
    TargetImmune,

    #[error("Spell already cast this round")]
    AlreadyCast,

    #[error("No catapult in this battle")]
    NoCatapult,

    #[error("Battle is already over")]
    BattleOver,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CombatError>;

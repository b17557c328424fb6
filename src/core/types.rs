//! Core type definitions used throughout the engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which army a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Index-based reference to a unit: the owning side plus its army slot.
///
/// Handles stay valid for the whole battle; a dead stack keeps its slot
/// (resurrection can bring it back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitHandle {
    pub side: Side,
    pub slot: u8,
}

impl UnitHandle {
    pub fn new(side: Side, slot: u8) -> Self {
        Self { side, slot }
    }
}

/// Battle round counter (1-based once the battle starts)
pub type Round = u32;

/// Battlefield environment, carried for presentation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Grass,
    Dirt,
    Sand,
    Snow,
    Swamp,
    Lava,
    ShipDeck,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Attacker.opposite(), Side::Defender);
        assert_eq!(Side::Defender.opposite(), Side::Attacker);
    }

    #[test]
    fn test_unit_handle_equality() {
        let a = UnitHandle::new(Side::Attacker, 3);
        let b = UnitHandle::new(Side::Attacker, 3);
        assert_eq!(a, b);
        assert_ne!(a, UnitHandle::new(Side::Defender, 3));
    }
}

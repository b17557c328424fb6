//! Siege structures: walls, gate, turrets, and catapult targeting
//!
//! Eight independent structural hit-point counters gate hex passability.
//! Destroying a wall segment flips its guarded cells passable; the gate
//! blocks attackers only.

use serde::{Deserialize, Serialize};

use crate::battle::buff::BuffKind;
use crate::battle::constants::{GATE_ROW, WALL_COLUMN};
use crate::battle::grid::HexGrid;
use crate::battle::hex::HexCoord;
use crate::battle::unit::{CreatureStats, TroopEntry, WarMachine};
use crate::core::config::CombatConfig;

/// The four wall segments, in catapult priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSegment {
    BottomInner,
    BottomOuter,
    TopInner,
    TopOuter,
}

impl WallSegment {
    /// Catapult auto-targeting priority
    pub fn priority_order() -> [WallSegment; 4] {
        [
            WallSegment::BottomInner,
            WallSegment::BottomOuter,
            WallSegment::TopInner,
            WallSegment::TopOuter,
        ]
    }

    fn index(&self) -> usize {
        match self {
            WallSegment::BottomInner => 0,
            WallSegment::BottomOuter => 1,
            WallSegment::TopInner => 2,
            WallSegment::TopOuter => 3,
        }
    }

    /// Cells this segment keeps impassable while standing
    pub fn guarded_hexes(&self) -> &'static [HexCoord] {
        const TOP_OUTER: [HexCoord; 2] = [
            HexCoord { x: WALL_COLUMN, y: 0 },
            HexCoord { x: WALL_COLUMN, y: 1 },
        ];
        const TOP_INNER: [HexCoord; 3] = [
            HexCoord { x: WALL_COLUMN, y: 2 },
            HexCoord { x: WALL_COLUMN, y: 3 },
            HexCoord { x: WALL_COLUMN, y: 4 },
        ];
        const BOTTOM_INNER: [HexCoord; 2] = [
            HexCoord { x: WALL_COLUMN, y: 6 },
            HexCoord { x: WALL_COLUMN, y: 7 },
        ];
        const BOTTOM_OUTER: [HexCoord; 3] = [
            HexCoord { x: WALL_COLUMN, y: 8 },
            HexCoord { x: WALL_COLUMN, y: 9 },
            HexCoord { x: WALL_COLUMN, y: 10 },
        ];
        match self {
            WallSegment::TopOuter => &TOP_OUTER,
            WallSegment::TopInner => &TOP_INNER,
            WallSegment::BottomInner => &BOTTOM_INNER,
            WallSegment::BottomOuter => &BOTTOM_OUTER,
        }
    }
}

/// What a catapult shot can aim at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiegeTarget {
    Wall(WallSegment),
    Gate,
}

/// Structural state of the besieged castle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiegeState {
    wall_hp: [i32; 4],
    gate_hp: i32,
    turret_hp: [i32; 2],
}

impl SiegeState {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            wall_hp: [config.wall_hit_points; 4],
            gate_hp: config.gate_hit_points,
            turret_hp: [config.turret_hit_points; 2],
        }
    }

    /// Mark every standing structure on the grid at battle setup
    pub fn apply_to_grid(&self, grid: &mut HexGrid) {
        for segment in WallSegment::priority_order() {
            if self.is_wall_standing(segment) {
                for &hex in segment.guarded_hexes() {
                    grid.set_passable(hex, false);
                }
            }
        }
        if self.is_gate_standing() {
            grid.set_gate_block(Some(gate_hex()));
        }
    }

    pub fn wall_hit_points(&self, segment: WallSegment) -> i32 {
        self.wall_hp[segment.index()]
    }

    pub fn is_wall_standing(&self, segment: WallSegment) -> bool {
        self.wall_hp[segment.index()] > 0
    }

    pub fn are_any_walls_remaining(&self) -> bool {
        WallSegment::priority_order()
            .iter()
            .any(|s| self.is_wall_standing(*s))
    }

    pub fn is_gate_standing(&self) -> bool {
        self.gate_hp > 0
    }

    pub fn is_turret_standing(&self, index: usize) -> bool {
        self.turret_hp.get(index).copied().unwrap_or(0) > 0
    }

    /// Apply one structural hit to a wall; opens its hexes on collapse.
    /// Returns true when the segment came down.
    pub fn damage_wall(&mut self, segment: WallSegment, grid: &mut HexGrid) -> bool {
        if !self.is_wall_standing(segment) {
            return false;
        }
        self.wall_hp[segment.index()] -= 1;
        if self.is_wall_standing(segment) {
            return false;
        }
        for &hex in segment.guarded_hexes() {
            grid.set_passable(hex, true);
        }
        true
    }

    /// Apply one structural hit to the gate. Returns true on collapse.
    pub fn damage_gate(&mut self, grid: &mut HexGrid) -> bool {
        if !self.is_gate_standing() {
            return false;
        }
        self.gate_hp -= 1;
        if self.is_gate_standing() {
            return false;
        }
        grid.set_gate_block(None);
        true
    }

    pub fn damage_turret(&mut self, index: usize) {
        if let Some(hp) = self.turret_hp.get_mut(index) {
            *hp = (*hp - 1).max(0);
        }
    }

    /// Catapult auto-targeting: the first standing wall in priority
    /// order, then the gate
    pub fn catapult_target(&self) -> Option<SiegeTarget> {
        for segment in WallSegment::priority_order() {
            if self.is_wall_standing(segment) {
                return Some(SiegeTarget::Wall(segment));
            }
        }
        self.is_gate_standing().then_some(SiegeTarget::Gate)
    }

    /// Does a shot between these cells cross the wall line while any
    /// structure still stands?
    pub fn shot_crosses_walls(&self, from: HexCoord, to: HexCoord) -> bool {
        let crosses =
            (from.x < WALL_COLUMN) != (to.x < WALL_COLUMN) || to.x == WALL_COLUMN;
        crosses && self.are_any_walls_remaining()
    }
}

/// Cell blocked by the gate while it stands
pub fn gate_hex() -> HexCoord {
    HexCoord::new(WALL_COLUMN, GATE_ROW)
}

/// Attacker's catapult troop entry for siege battles
pub fn catapult_entry() -> TroopEntry {
    TroopEntry {
        stats: CreatureStats {
            id: u16::MAX,
            name: "Catapult".into(),
            health: 60,
            attack: 10,
            defense: 10,
            damage_min: 0,
            damage_max: 0,
            speed: 0,
            initiative: 1,
            inherent: vec![BuffKind::Mechanical],
            value: 100,
            war_machine: Some(WarMachine::Catapult),
            ..CreatureStats::default()
        },
        count: 1,
    }
}

/// Defender's turret troop entry for siege battles
pub fn turret_entry(index: usize) -> TroopEntry {
    TroopEntry {
        stats: CreatureStats {
            id: u16::MAX - 1 - index as u16,
            name: format!("Turret {}", index + 1),
            health: 80,
            attack: 10,
            defense: 10,
            damage_min: 0,
            damage_max: 0,
            speed: 0,
            initiative: 1,
            is_shooter: true,
            inherent: vec![BuffKind::Mechanical],
            value: 120,
            war_machine: Some(WarMachine::Turret),
            ..CreatureStats::default()
        },
        count: 1,
    }
}

/// Catapult and turret battlefield positions
pub fn catapult_position() -> HexCoord {
    HexCoord::new(0, GATE_ROW)
}

pub fn turret_positions() -> [HexCoord; 2] {
    [
        HexCoord::new(WALL_COLUMN + 1, 1),
        HexCoord::new(WALL_COLUMN + 1, GRID_LAST_ROW - 1),
    ]
}

const GRID_LAST_ROW: i32 = crate::battle::constants::GRID_HEIGHT - 1;

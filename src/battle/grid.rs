//! Battlefield grid: fixed 17x11 hex cells with passability and occupancy
//!
//! Cells are allocated once per battle. Walls and obstacles flip
//! passability; units are referenced by handle, never by pointer.

use serde::{Deserialize, Serialize};

use crate::battle::constants::{GRID_HEIGHT, GRID_WIDTH};
use crate::battle::hex::{HexCoord, HexDirection};
use crate::core::types::{Side, UnitHandle};

/// A single cell of the battlefield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexCell {
    pub coord: HexCoord,
    pub passable: bool,
    pub occupant: Option<UnitHandle>,
}

impl HexCell {
    pub fn new(coord: HexCoord) -> Self {
        Self {
            coord,
            passable: true,
            occupant: None,
        }
    }
}

/// Head and trailing cell of a placed unit. Single-hex units have no tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub head: HexCoord,
    pub tail: Option<HexCoord>,
}

impl Footprint {
    pub fn single(head: HexCoord) -> Self {
        Self { head, tail: None }
    }

    pub fn covers(&self, coord: HexCoord) -> bool {
        self.head == coord || self.tail == Some(coord)
    }
}

/// The full battlefield grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexGrid {
    cells: Vec<HexCell>,
    /// Gate cell that blocks attackers while the gate stands; defenders
    /// pass freely
    gate_block: Option<HexCoord>,
}

impl Default for HexGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl HexGrid {
    /// Create an open grid with every cell passable and empty
    pub fn new() -> Self {
        let mut cells = Vec::with_capacity((GRID_WIDTH * GRID_HEIGHT) as usize);
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH {
                cells.push(HexCell::new(HexCoord::new(x, y)));
            }
        }
        Self {
            cells,
            gate_block: None,
        }
    }

    /// Set or clear the attacker-blocking gate cell
    pub fn set_gate_block(&mut self, coord: Option<HexCoord>) {
        self.gate_block = coord;
    }

    fn index(coord: HexCoord) -> usize {
        (coord.y * GRID_WIDTH + coord.x) as usize
    }

    pub fn cell(&self, coord: HexCoord) -> Option<&HexCell> {
        if coord.in_bounds() {
            Some(&self.cells[Self::index(coord)])
        } else {
            None
        }
    }

    pub fn cell_mut(&mut self, coord: HexCoord) -> Option<&mut HexCell> {
        if coord.in_bounds() {
            Some(&mut self.cells[Self::index(coord)])
        } else {
            None
        }
    }

    pub fn occupant(&self, coord: HexCoord) -> Option<UnitHandle> {
        self.cell(coord).and_then(|c| c.occupant)
    }

    pub fn set_passable(&mut self, coord: HexCoord, passable: bool) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.passable = passable;
        }
    }

    /// Can `mover` stand on this cell? Its own cells count as free.
    pub fn is_free_for(&self, coord: HexCoord, mover: UnitHandle) -> bool {
        if self.gate_block == Some(coord) && mover.side == Side::Attacker {
            return false;
        }
        match self.cell(coord) {
            Some(cell) => cell.passable && cell.occupant.map_or(true, |h| h == mover),
            None => false,
        }
    }

    /// Is this cell passable and empty?
    pub fn is_free(&self, coord: HexCoord) -> bool {
        self.cell(coord)
            .map_or(false, |c| c.passable && c.occupant.is_none())
    }

    /// Does the whole footprint fit for `mover`?
    pub fn footprint_fits(&self, footprint: Footprint, mover: UnitHandle) -> bool {
        let head_ok = self.is_free_for(footprint.head, mover);
        let tail_ok = footprint
            .tail
            .map_or(true, |t| self.is_free_for(t, mover));
        head_ok && tail_ok
    }

    /// Mark the footprint cells as occupied by `handle`
    pub fn occupy(&mut self, footprint: Footprint, handle: UnitHandle) {
        if let Some(cell) = self.cell_mut(footprint.head) {
            cell.occupant = Some(handle);
        }
        if let Some(tail) = footprint.tail {
            if let Some(cell) = self.cell_mut(tail) {
                cell.occupant = Some(handle);
            }
        }
    }

    /// Clear every cell occupied by `handle`
    pub fn vacate(&mut self, handle: UnitHandle) {
        for cell in &mut self.cells {
            if cell.occupant == Some(handle) {
                cell.occupant = None;
            }
        }
    }

    /// Resolve a requested destination into a placed footprint.
    ///
    /// For a two-hex unit the trailing cell extends away from the enemy
    /// (opposite `facing`). When that cell is blocked the head shifts one
    /// hex so the requested cell becomes the trailing cell; only then is
    /// the destination rejected.
    pub fn resolve_destination(
        &self,
        dest: HexCoord,
        facing: HexDirection,
        two_hex: bool,
        mover: UnitHandle,
    ) -> Option<Footprint> {
        if !two_hex {
            let footprint = Footprint::single(dest);
            return self.footprint_fits(footprint, mover).then_some(footprint);
        }

        let direct = Footprint {
            head: dest,
            tail: Some(dest.adjacent(facing.opposite())),
        };
        if self.footprint_fits(direct, mover) {
            return Some(direct);
        }

        let shifted = Footprint {
            head: dest.adjacent(facing),
            tail: Some(dest),
        };
        self.footprint_fits(shifted, mover).then_some(shifted)
    }

    /// All head positions a unit can move to this turn.
    ///
    /// Walkers breadth-first search outward one fringe per hex of speed,
    /// never passing through blocked or occupied cells. Flyers ignore
    /// everything in between but still need the landing footprint free.
    pub fn movement_range(
        &self,
        from: HexCoord,
        radius: u32,
        is_flyer: bool,
        facing: HexDirection,
        two_hex: bool,
        mover: UnitHandle,
    ) -> Vec<HexCoord> {
        if is_flyer {
            return from
                .neighbors_in_radius(radius, false)
                .into_iter()
                .filter(|c| self.resolve_destination(*c, facing, two_hex, mover).is_some())
                .collect();
        }

        let mut visited = vec![false; (GRID_WIDTH * GRID_HEIGHT) as usize];
        visited[Self::index(from)] = true;
        let mut fringe = vec![from];
        let mut reachable = Vec::new();

        for _ in 0..radius {
            let mut next_fringe = Vec::new();
            for cell in &fringe {
                for neighbor in cell.neighbors() {
                    if !neighbor.in_bounds() || visited[Self::index(neighbor)] {
                        continue;
                    }
                    visited[Self::index(neighbor)] = true;

                    let fits = if two_hex {
                        self.resolve_destination(neighbor, facing, true, mover)
                            .is_some()
                    } else {
                        self.is_free_for(neighbor, mover)
                    };
                    if !fits {
                        continue;
                    }

                    reachable.push(neighbor);
                    next_fringe.push(neighbor);
                }
            }
            if next_fringe.is_empty() {
                break;
            }
            fringe = next_fringe;
        }

        reachable
    }
}

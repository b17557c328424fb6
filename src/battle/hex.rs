//! Hex coordinate system for the battlefield (offset coordinates)
//!
//! Uses odd-row offset coordinates (x, y): odd rows are shifted half a
//! hex to the right. Distance goes through an axial conversion.

use serde::{Deserialize, Serialize};

use crate::battle::constants::{GRID_HEIGHT, GRID_WIDTH, HEX_PIXEL_ROW_HEIGHT, HEX_PIXEL_WIDTH};

/// Offset hex coordinate on the battlefield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HexCoord {
    pub x: i32,
    pub y: i32,
}

impl HexCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Is this coordinate on the battlefield?
    pub fn in_bounds(&self) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < GRID_WIDTH && self.y < GRID_HEIGHT
    }

    /// Axial q coordinate (r is the row itself)
    pub fn axial_q(&self) -> i32 {
        self.x - (self.y - (self.y & 1)) / 2
    }

    /// Hex distance via axial conversion
    pub fn distance(&self, other: &Self) -> u32 {
        let q1 = self.axial_q();
        let q2 = other.axial_q();
        let r1 = self.y;
        let r2 = other.y;

        let dq = (q1 - q2).abs();
        let dr = (r1 - r2).abs();
        let ds = ((-q1 - r1) - (-q2 - r2)).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Neighbor in the given direction; offsets depend on row parity
    pub fn adjacent(&self, direction: HexDirection) -> Self {
        let odd = self.y & 1;
        let (dx, dy) = match direction {
            HexDirection::East => (1, 0),
            HexDirection::West => (-1, 0),
            HexDirection::NorthEast => (odd, -1),
            HexDirection::NorthWest => (odd - 1, -1),
            HexDirection::SouthEast => (odd, 1),
            HexDirection::SouthWest => (odd - 1, 1),
        };
        HexCoord::new(self.x + dx, self.y + dy)
    }

    /// All 6 neighboring coordinates (may be out of bounds)
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            self.adjacent(HexDirection::East),
            self.adjacent(HexDirection::NorthEast),
            self.adjacent(HexDirection::NorthWest),
            self.adjacent(HexDirection::West),
            self.adjacent(HexDirection::SouthWest),
            self.adjacent(HexDirection::SouthEast),
        ]
    }

    /// All in-bounds hexes within `radius` of this one, in scan order
    pub fn neighbors_in_radius(&self, radius: u32, include_center: bool) -> Vec<HexCoord> {
        let mut results = Vec::new();
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH {
                let coord = HexCoord::new(x, y);
                let d = self.distance(&coord);
                if d > radius {
                    continue;
                }
                if d == 0 && !include_center {
                    continue;
                }
                results.push(coord);
            }
        }
        results
    }

    /// Screen-order index used as the final turn-order tie-break
    pub fn screen_position(&self) -> i32 {
        self.y * GRID_WIDTH + self.x
    }

    /// Pixel center for presentation (odd rows shifted half a hex right)
    pub fn pixel_position(&self) -> (f32, f32) {
        let shift = if self.y & 1 == 1 { 0.5 } else { 0.0 };
        (
            HEX_PIXEL_WIDTH * (self.x as f32 + shift),
            HEX_PIXEL_ROW_HEIGHT * self.y as f32,
        )
    }
}

/// Direction enum for hex facing and adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HexDirection {
    #[default]
    East,
    NorthEast,
    NorthWest,
    West,
    SouthWest,
    SouthEast,
}

impl HexDirection {
    /// Get opposite direction
    pub fn opposite(&self) -> Self {
        match self {
            HexDirection::East => HexDirection::West,
            HexDirection::NorthEast => HexDirection::SouthWest,
            HexDirection::NorthWest => HexDirection::SouthEast,
            HexDirection::West => HexDirection::East,
            HexDirection::SouthWest => HexDirection::NorthEast,
            HexDirection::SouthEast => HexDirection::NorthWest,
        }
    }

    /// All directions
    pub fn all() -> [HexDirection; 6] {
        [
            HexDirection::East,
            HexDirection::NorthEast,
            HexDirection::NorthWest,
            HexDirection::West,
            HexDirection::SouthWest,
            HexDirection::SouthEast,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_coord_creation() {
        let coord = HexCoord::new(5, 10);
        assert_eq!(coord.x, 5);
        assert_eq!(coord.y, 10);
    }

    #[test]
    fn test_bounds() {
        assert!(HexCoord::new(0, 0).in_bounds());
        assert!(HexCoord::new(16, 10).in_bounds());
        assert!(!HexCoord::new(17, 10).in_bounds());
        assert!(!HexCoord::new(0, 11).in_bounds());
        assert!(!HexCoord::new(-1, 0).in_bounds());
    }

    #[test]
    fn test_hex_distance_same() {
        let a = HexCoord::new(4, 4);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_hex_distance_adjacent() {
        let a = HexCoord::new(4, 4);
        for dir in HexDirection::all() {
            assert_eq!(a.distance(&a.adjacent(dir)), 1, "direction {dir:?}");
        }
    }

    #[test]
    fn test_adjacency_parity() {
        // Even row: north-east keeps the same column
        assert_eq!(
            HexCoord::new(4, 4).adjacent(HexDirection::NorthEast),
            HexCoord::new(4, 3)
        );
        // Odd row: north-east shifts one column right
        assert_eq!(
            HexCoord::new(4, 5).adjacent(HexDirection::NorthEast),
            HexCoord::new(5, 4)
        );
    }

    #[test]
    fn test_adjacent_round_trip() {
        let start = HexCoord::new(8, 5);
        for dir in HexDirection::all() {
            assert_eq!(start.adjacent(dir).adjacent(dir.opposite()), start);
        }
    }

    #[test]
    fn test_neighbors_count() {
        assert_eq!(HexCoord::new(8, 5).neighbors().len(), 6);
    }

    #[test]
    fn test_neighbors_in_radius_one() {
        // Interior hex: center + 6 neighbors
        let hexes = HexCoord::new(8, 5).neighbors_in_radius(1, true);
        assert_eq!(hexes.len(), 7);

        let without_center = HexCoord::new(8, 5).neighbors_in_radius(1, false);
        assert_eq!(without_center.len(), 6);
    }

    #[test]
    fn test_neighbors_in_radius_clipped_at_edge() {
        let hexes = HexCoord::new(0, 0).neighbors_in_radius(1, true);
        assert!(hexes.len() < 7);
        assert!(hexes.iter().all(|c| c.in_bounds()));
    }

    #[test]
    fn test_screen_position_ordering() {
        assert!(HexCoord::new(0, 0).screen_position() < HexCoord::new(1, 0).screen_position());
        assert!(HexCoord::new(16, 0).screen_position() < HexCoord::new(0, 1).screen_position());
    }

    #[test]
    fn test_pixel_row_shift() {
        let (even_x, _) = HexCoord::new(3, 2).pixel_position();
        let (odd_x, _) = HexCoord::new(3, 3).pixel_position();
        assert!(odd_x > even_x);
    }
}

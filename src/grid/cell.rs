//! Cells, coordinates and terrain

use serde::{Deserialize, Serialize};

use crate::core::types::{RegionId, Side, UnitId};

/// Grid coordinate (row, column).
///
/// Signed so that neighbours of edge cells can be formed and then rejected
/// by lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The 4 orthogonal neighbours (north, south, west, east).
    ///
    /// The whole engine uses this 4-neighbourhood.
    pub fn neighbors(&self) -> [Coord; 4] {
        [
            Coord::new(self.row - 1, self.col),
            Coord::new(self.row + 1, self.col),
            Coord::new(self.row, self.col - 1),
            Coord::new(self.row, self.col + 1),
        ]
    }

    /// Manhattan distance, the step count under 4-adjacency
    pub fn distance(&self, other: &Coord) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Cells on the straight line from `self` to `other`, both ends included.
    ///
    /// Bresenham's algorithm, so the result is symmetric in length and
    /// deterministic.
    pub fn line_to(&self, other: &Coord) -> Vec<Coord> {
        let mut line = Vec::new();

        let dr = (other.row - self.row).abs();
        let dc = (other.col - self.col).abs();
        let step_r = if other.row >= self.row { 1 } else { -1 };
        let step_c = if other.col >= self.col { 1 } else { -1 };

        let mut row = self.row;
        let mut col = self.col;
        let mut err = dc - dr;

        loop {
            line.push(Coord::new(row, col));
            if row == other.row && col == other.col {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dr {
                err -= dr;
                col += step_c;
            }
            if e2 < dc {
                err += dc;
                row += step_r;
            }
        }

        line
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Terrain types affecting movement, sight and defence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Open,
    /// Impassable; attenuates sight lines that cross it
    Blocking,
    /// Passable; hides units from detection
    Cover,
}

impl Terrain {
    /// Defensive bonus contributed to the containing region
    pub fn defense_bonus(&self) -> f64 {
        match self {
            Self::Open => 0.0,
            Self::Blocking => 1.0, // Walls and ridges
            Self::Cover => 0.5,
        }
    }

    pub fn is_passable(&self) -> bool {
        !matches!(self, Self::Blocking)
    }

    /// Does this terrain attenuate a sight line passing through it?
    pub fn blocks_sight(&self) -> bool {
        matches!(self, Self::Blocking)
    }
}

/// Weak reference from a cell to the unit standing on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub unit: UnitId,
    pub side: Side,
}

/// A single grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub coord: Coord,
    pub terrain: Terrain,
    pub region: RegionId,
    pub occupant: Option<Occupant>,
}

impl Cell {
    pub fn new(coord: Coord, terrain: Terrain, region: RegionId) -> Self {
        Self {
            coord,
            terrain,
            region,
            occupant: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none() && self.terrain.is_passable()
    }

    /// Is this cell held by a unit of the other side?
    pub fn is_enemy_of(&self, side: Side) -> bool {
        self.occupant.is_some_and(|o| o.side != side)
    }
}

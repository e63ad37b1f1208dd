//! Regions - named, contiguous groups of cells
//!
//! Regions are the unit of ownership and of combat. Their neighbour lists
//! and defensive modifiers are derived from the cells they contain.

use serde::{Deserialize, Serialize};

use super::cell::Coord;
use crate::core::config::{GridSize, RegionLayout};
use crate::core::error::{MatchError, Result};
use crate::core::types::{RegionId, Side};

/// A strategic region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    /// Member cells in row-major order
    pub cells: Vec<Coord>,
    /// `None` while neutral
    pub owner: Option<Side>,
    /// Mean terrain defence bonus over the member cells
    pub defense_modifier: f64,
    /// Regions sharing at least one cell edge with this one, ascending
    pub neighbors: Vec<RegionId>,
}

impl Region {
    pub fn new(id: RegionId, name: String) -> Self {
        Self {
            id,
            name,
            cells: Vec::new(),
            owner: None,
            defense_modifier: 0.0,
            neighbors: Vec::new(),
        }
    }

    pub fn contains(&self, coord: &Coord) -> bool {
        self.cells.contains(coord)
    }

    pub fn is_owned_by(&self, side: Side) -> bool {
        self.owner == Some(side)
    }

    pub fn is_adjacent_to(&self, other: RegionId) -> bool {
        self.neighbors.binary_search(&other).is_ok()
    }
}

/// Cell-to-region assignment produced from a layout
#[derive(Debug, Clone)]
pub(crate) struct RegionPlan {
    /// Region index for every cell, row-major
    pub assignment: Vec<u32>,
    pub names: Vec<String>,
    pub owners: Vec<Option<Side>>,
}

/// Resolve a layout into a per-cell region assignment.
///
/// Explicit layouts are checked for coverage, overlap and contiguity.
pub(crate) fn plan_regions(size: GridSize, layout: &RegionLayout) -> Result<RegionPlan> {
    let rows = size.rows as i32;
    let cols = size.cols as i32;
    let index = |c: Coord| (c.row * cols + c.col) as usize;

    let plan = match layout {
        RegionLayout::Single => RegionPlan {
            assignment: vec![0; size.cell_count()],
            names: vec!["Field".to_string()],
            owners: vec![None],
        },
        RegionLayout::Bands { count } => {
            let count = (*count).min(size.rows).max(1);
            let assignment = (0..rows)
                .flat_map(|r| {
                    let band = (r as u64 * u64::from(count) / size.rows as u64) as u32;
                    std::iter::repeat(band).take(cols as usize)
                })
                .collect();
            RegionPlan {
                assignment,
                names: (0..count).map(|b| format!("Band {}", b + 1)).collect(),
                owners: vec![None; count as usize],
            }
        }
        RegionLayout::Blocks { rows: block_rows, cols: block_cols } => {
            let block_rows = (*block_rows).max(1) as i32;
            let block_cols = (*block_cols).max(1) as i32;
            let across = (cols + block_cols - 1) / block_cols;
            let down = (rows + block_rows - 1) / block_rows;

            let mut assignment = vec![0; size.cell_count()];
            for r in 0..rows {
                for c in 0..cols {
                    let block = (r / block_rows) * across + (c / block_cols);
                    assignment[index(Coord::new(r, c))] = block as u32;
                }
            }

            let mut names = Vec::new();
            for br in 0..down {
                for bc in 0..across {
                    names.push(format!("Sector {}-{}", br, bc));
                }
            }
            let owners = vec![None; names.len()];
            RegionPlan { assignment, names, owners }
        }
        RegionLayout::Explicit { regions } => {
            let mut assignment: Vec<Option<u32>> = vec![None; size.cell_count()];

            for (i, spec) in regions.iter().enumerate() {
                if spec.cells.is_empty() {
                    return Err(MatchError::config(format!("region '{}' has no cells", spec.name)));
                }
                for &[r, c] in &spec.cells {
                    let coord = Coord::new(r, c);
                    if r < 0 || c < 0 || r >= rows || c >= cols {
                        return Err(MatchError::config(format!(
                            "region '{}' lists off-grid cell {}",
                            spec.name, coord
                        )));
                    }
                    let slot = &mut assignment[index(coord)];
                    if let Some(previous) = slot {
                        return Err(MatchError::config(format!(
                            "cell {} is claimed by both '{}' and '{}'",
                            coord, regions[*previous as usize].name, spec.name
                        )));
                    }
                    *slot = Some(i as u32);
                }

                if !is_contiguous(&spec.cells) {
                    return Err(MatchError::config(format!("region '{}' is not contiguous", spec.name)));
                }
            }

            let mut complete = Vec::with_capacity(assignment.len());
            for (i, slot) in assignment.into_iter().enumerate() {
                match slot {
                    Some(region) => complete.push(region),
                    None => {
                        let coord = Coord::new(i as i32 / cols, i as i32 % cols);
                        return Err(MatchError::config(format!("cell {} belongs to no region", coord)));
                    }
                }
            }

            RegionPlan {
                assignment: complete,
                names: regions.iter().map(|r| r.name.clone()).collect(),
                owners: regions.iter().map(|r| r.owner).collect(),
            }
        }
    };

    Ok(plan)
}

/// Flood fill from the first cell and check every cell was reached
fn is_contiguous(cells: &[[i32; 2]]) -> bool {
    let members: ahash::AHashSet<Coord> = cells.iter().map(|&[r, c]| Coord::new(r, c)).collect();
    let Some(&start) = members.iter().min() else {
        return true;
    };

    let mut seen = ahash::AHashSet::new();
    let mut frontier = vec![start];
    seen.insert(start);

    while let Some(current) = frontier.pop() {
        for next in current.neighbors() {
            if members.contains(&next) && seen.insert(next) {
                frontier.push(next);
            }
        }
    }

    seen.len() == members.len()
}

//! The match grid - cells, regions and checked movement
//!
//! Cells are stored row-major. Each cell names its region and weakly
//! references its occupant; units themselves live in the match state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use super::cell::{Cell, Coord, Occupant, Terrain};
use super::region::{plan_regions, Region};
use crate::core::config::{GridSize, RegionLayout, TerrainPatch};
use crate::core::error::{MatchError, Result};
use crate::core::types::{RegionId, Side};
use crate::forces::Unit;

/// The grid with its regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
    cells: Vec<Cell>,
    regions: Vec<Region>,
}

impl Grid {
    /// Build a grid from its size, region layout and terrain patches
    pub fn new(size: GridSize, layout: &RegionLayout, terrain: &[TerrainPatch]) -> Result<Self> {
        let plan = plan_regions(size, layout)?;
        let rows = size.rows as i32;
        let cols = size.cols as i32;

        let mut cells = Vec::with_capacity(size.cell_count());
        for r in 0..rows {
            for c in 0..cols {
                let idx = (r * cols + c) as usize;
                cells.push(Cell::new(Coord::new(r, c), Terrain::Open, RegionId(plan.assignment[idx])));
            }
        }

        let regions = plan
            .names
            .into_iter()
            .zip(plan.owners)
            .enumerate()
            .map(|(i, (name, owner))| {
                let mut region = Region::new(RegionId(i as u32), name);
                region.owner = owner;
                region
            })
            .collect();

        let mut grid = Self { rows, cols, cells, regions };

        for patch in terrain {
            grid.apply_patch(patch)?;
        }

        grid.derive_regions()?;
        Ok(grid)
    }

    fn apply_patch(&mut self, patch: &TerrainPatch) -> Result<()> {
        for r in patch.row..patch.row + patch.rows as i32 {
            for c in patch.col..patch.col + patch.cols as i32 {
                let coord = Coord::new(r, c);
                let Some(cell) = self.cell_at_mut(coord) else {
                    return Err(MatchError::config(format!("terrain patch covers off-grid cell {}", coord)));
                };
                cell.terrain = patch.kind;
            }
        }
        Ok(())
    }

    /// Fill in member cells, neighbour lists and defensive modifiers
    fn derive_regions(&mut self) -> Result<()> {
        let mut neighbor_sets: Vec<BTreeSet<RegionId>> = vec![BTreeSet::new(); self.regions.len()];

        for region in &mut self.regions {
            region.cells.clear();
        }

        for cell in &self.cells {
            let region = &mut self.regions[cell.region.0 as usize];
            region.cells.push(cell.coord);

            for n in cell.coord.neighbors() {
                if let Some(other) = self.cell_at(n) {
                    if other.region != cell.region {
                        neighbor_sets[cell.region.0 as usize].insert(other.region);
                    }
                }
            }
        }

        for (region, neighbors) in self.regions.iter_mut().zip(neighbor_sets) {
            if region.cells.is_empty() {
                return Err(MatchError::config(format!("region '{}' has no cells", region.name)));
            }
            region.neighbors = neighbors.into_iter().collect();
        }

        for i in 0..self.regions.len() {
            let total: f64 = self.regions[i]
                .cells
                .iter()
                .filter_map(|c| self.cell_at(*c))
                .map(|c| c.terrain.defense_bonus())
                .sum();
            let region = &mut self.regions[i];
            region.defense_modifier = total / region.cells.len() as f64;
        }

        Ok(())
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.row * self.cols + coord.col) as usize)
        } else {
            None
        }
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.row >= 0 && coord.col >= 0 && coord.row < self.rows && coord.col < self.cols
    }

    /// Cell at a coordinate; `None` when off-grid
    pub fn cell_at(&self, coord: Coord) -> Option<&Cell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    fn cell_at_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        self.index(coord).map(move |i| &mut self.cells[i])
    }

    /// All cells, row-major
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// On-grid orthogonal neighbours of a coordinate
    pub fn adjacent(&self, coord: Coord) -> Vec<&Cell> {
        coord
            .neighbors()
            .into_iter()
            .filter_map(|n| self.cell_at(n))
            .collect()
    }

    /// Region containing a coordinate; `None` when off-grid
    pub fn region_of(&self, coord: Coord) -> Option<&Region> {
        self.cell_at(coord).map(|c| &self.regions[c.region.0 as usize])
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0 as usize)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Regions currently owned by a side
    pub fn regions_owned_by(&self, side: Side) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.is_owned_by(side))
    }

    /// Owned regions that border a region with a different owner.
    ///
    /// Depends only on which regions `side` itself owns, so it is safe to
    /// hand to that side.
    pub fn frontline(&self, side: Side) -> Vec<RegionId> {
        self.regions_owned_by(side)
            .filter(|r| {
                r.neighbors
                    .iter()
                    .filter_map(|n| self.region(*n))
                    .any(|n| n.owner != r.owner)
            })
            .map(|r| r.id)
            .collect()
    }

    /// Can a unit standing at `from` strike the region `target`?
    ///
    /// True when `from` is inside the region or orthogonally adjacent to one
    /// of its cells.
    pub fn can_reach_region(&self, from: Coord, target: RegionId) -> bool {
        let Some(cell) = self.cell_at(from) else {
            return false;
        };
        cell.region == target || self.adjacent(from).iter().any(|c| c.region == target)
    }

    /// Step count of the shortest path from `from` to `to` for `side`.
    ///
    /// Paths run over passable cells and may cross friendly units but not
    /// enemy units. Search stops once `limit` steps are exhausted.
    pub fn path_length(&self, from: Coord, to: Coord, side: Side, limit: u32) -> Option<u32> {
        if from == to {
            return Some(0);
        }

        let mut seen = ahash::AHashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(from);
        queue.push_back((from, 0u32));

        while let Some((current, steps)) = queue.pop_front() {
            if steps >= limit {
                continue;
            }
            for next in self.adjacent(current) {
                if !next.terrain.is_passable() || next.is_enemy_of(side) {
                    continue;
                }
                if next.coord == to {
                    return Some(steps + 1);
                }
                if seen.insert(next.coord) {
                    queue.push_back((next.coord, steps + 1));
                }
            }
        }

        None
    }

    /// Check a move without performing it
    pub fn check_move(&self, unit: &Unit, destination: Coord) -> Result<()> {
        let Some(cell) = self.cell_at(destination) else {
            return Err(MatchError::invalid_order(format!(
                "{} cannot move to off-grid cell {}",
                unit.id, destination
            )));
        };

        if destination == unit.position {
            return Err(MatchError::invalid_order(format!(
                "{} is already at {}; issue a hold instead",
                unit.id, destination
            )));
        }

        if !cell.terrain.is_passable() {
            return Err(MatchError::invalid_order(format!(
                "{} cannot enter blocking terrain at {}",
                unit.id, destination
            )));
        }

        if let Some(occupant) = cell.occupant {
            if occupant.side != unit.side {
                return Err(MatchError::invalid_order(format!(
                    "{} is held by an enemy unit; issue an attack instead of a move",
                    destination
                )));
            }
            return Err(MatchError::invalid_order(format!(
                "{} is already occupied by {}",
                destination, occupant.unit
            )));
        }

        if self.path_length(unit.position, destination, unit.side, unit.movement).is_none() {
            return Err(MatchError::invalid_order(format!(
                "{} cannot reach {} from {} with movement {}",
                unit.id, destination, unit.position, unit.movement
            )));
        }

        Ok(())
    }

    /// Move a unit after checking the move is legal
    pub fn move_unit(&mut self, unit: &mut Unit, destination: Coord) -> Result<()> {
        self.check_move(unit, destination)?;
        self.relocate(unit, destination);
        Ok(())
    }

    /// Move a unit without legality checks.
    ///
    /// The turn pipeline validates every move against the pre-turn snapshot
    /// first and then commits them all through this.
    pub(crate) fn relocate(&mut self, unit: &mut Unit, destination: Coord) {
        if let Some(origin) = self.cell_at_mut(unit.position) {
            if origin.occupant.is_some_and(|o| o.unit == unit.id) {
                origin.occupant = None;
            }
        }
        if let Some(target) = self.cell_at_mut(destination) {
            target.occupant = Some(Occupant { unit: unit.id, side: unit.side });
        }
        unit.position = destination;
    }

    /// Put a unit on its current cell (match setup)
    pub(crate) fn place(&mut self, unit: &Unit) -> Result<()> {
        let Some(cell) = self.cell_at_mut(unit.position) else {
            return Err(MatchError::config(format!("{} starts off-grid at {}", unit.id, unit.position)));
        };
        if !cell.terrain.is_passable() {
            return Err(MatchError::config(format!(
                "{} starts on blocking terrain at {}",
                unit.id, unit.position
            )));
        }
        if let Some(occupant) = cell.occupant {
            return Err(MatchError::config(format!(
                "{} and {} both start at {}",
                occupant.unit, unit.id, unit.position
            )));
        }
        cell.occupant = Some(Occupant { unit: unit.id, side: unit.side });
        Ok(())
    }

    /// Remove a unit's occupancy marker (elimination)
    pub(crate) fn clear(&mut self, unit: &Unit) {
        if let Some(cell) = self.cell_at_mut(unit.position) {
            if cell.occupant.is_some_and(|o| o.unit == unit.id) {
                cell.occupant = None;
            }
        }
    }

    /// Change a region's owner. Only combat resolution and match setup call
    /// this.
    pub(crate) fn set_owner(&mut self, region: RegionId, owner: Option<Side>) {
        if let Some(r) = self.regions.get_mut(region.0 as usize) {
            r.owner = owner;
        }
    }

    /// Verify the cell/region partition.
    ///
    /// Every cell must name an existing region that lists it, and every
    /// region's member list must match exactly.
    pub fn check_partition(&self) -> Result<()> {
        let mut counted = 0usize;
        for cell in &self.cells {
            let Some(region) = self.region(cell.region) else {
                return Err(MatchError::InternalInvariantViolation(format!(
                    "cell {} names missing {}",
                    cell.coord, cell.region
                )));
            };
            if !region.contains(&cell.coord) {
                return Err(MatchError::InternalInvariantViolation(format!(
                    "cell {} is not listed by {}",
                    cell.coord, region.id
                )));
            }
        }
        for region in &self.regions {
            counted += region.cells.len();
        }
        if counted != self.cells.len() {
            return Err(MatchError::InternalInvariantViolation(format!(
                "regions list {} cells but the grid has {}",
                counted,
                self.cells.len()
            )));
        }
        Ok(())
    }

    /// Static map knowledge: terrain and region layout without occupants or
    /// owners
    pub fn terrain_view(&self) -> TerrainView {
        TerrainView {
            rows: self.rows,
            cols: self.cols,
            terrain: self.cells.iter().map(|c| c.terrain).collect(),
            region_of: self.cells.iter().map(|c| c.region).collect(),
            region_cells: self.regions.iter().map(|r| r.cells.clone()).collect(),
            region_neighbors: self.regions.iter().map(|r| r.neighbors.clone()).collect(),
            region_defense: self.regions.iter().map(|r| r.defense_modifier).collect(),
        }
    }
}

/// The part of the grid every side knows from the outset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainView {
    pub rows: i32,
    pub cols: i32,
    terrain: Vec<Terrain>,
    region_of: Vec<RegionId>,
    region_cells: Vec<Vec<Coord>>,
    region_neighbors: Vec<Vec<RegionId>>,
    region_defense: Vec<f64>,
}

impl TerrainView {
    fn index(&self, coord: Coord) -> Option<usize> {
        if coord.row >= 0 && coord.col >= 0 && coord.row < self.rows && coord.col < self.cols {
            Some((coord.row * self.cols + coord.col) as usize)
        } else {
            None
        }
    }

    pub fn terrain_at(&self, coord: Coord) -> Option<Terrain> {
        self.index(coord).map(|i| self.terrain[i])
    }

    pub fn region_at(&self, coord: Coord) -> Option<RegionId> {
        self.index(coord).map(|i| self.region_of[i])
    }

    pub fn region_count(&self) -> usize {
        self.region_cells.len()
    }

    pub fn region_cells(&self, region: RegionId) -> &[Coord] {
        self.region_cells.get(region.0 as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn region_neighbors(&self, region: RegionId) -> &[RegionId] {
        self.region_neighbors.get(region.0 as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn region_defense(&self, region: RegionId) -> f64 {
        self.region_defense.get(region.0 as usize).copied().unwrap_or(0.0)
    }

    pub fn is_passable(&self, coord: Coord) -> bool {
        self.terrain_at(coord).is_some_and(|t| t.is_passable())
    }

    /// Same test as `Grid::can_reach_region`, on static knowledge only
    pub fn can_reach_region(&self, from: Coord, target: RegionId) -> bool {
        self.region_at(from) == Some(target)
            || from.neighbors().into_iter().any(|n| self.region_at(n) == Some(target))
    }

    /// Cells within `allowance` steps over passable terrain, avoiding
    /// `blocked` cells, excluding the start
    pub fn reachable_cells(&self, from: Coord, allowance: u32, blocked: &ahash::AHashSet<Coord>) -> Vec<Coord> {
        let mut seen = ahash::AHashSet::new();
        let mut queue = VecDeque::new();
        let mut reached = Vec::new();
        seen.insert(from);
        queue.push_back((from, 0u32));

        while let Some((current, steps)) = queue.pop_front() {
            if steps >= allowance {
                continue;
            }
            for next in current.neighbors() {
                if !self.is_passable(next) || blocked.contains(&next) {
                    continue;
                }
                if seen.insert(next) {
                    reached.push(next);
                    queue.push_back((next, steps + 1));
                }
            }
        }

        reached.sort();
        reached
    }
}

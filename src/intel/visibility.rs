//! Per-side visibility (fog of war)
//!
//! A side sees the union of its living units' sight areas. Sight is measured
//! in Manhattan steps; every blocking cell a sight line crosses adds the
//! configured attenuation to the effective distance.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::types::Side;
use crate::forces::Unit;
use crate::grid::{Coord, Grid, Region, Terrain};

/// Cells a side can currently see
#[derive(Debug, Clone, Default)]
pub struct SideVisibility {
    visible: ahash::AHashSet<Coord>,
}

impl SideVisibility {
    /// Compute visibility for `side` from its living units
    pub fn calculate<'a>(
        grid: &Grid,
        side: Side,
        units: impl IntoIterator<Item = &'a Unit>,
        blocking_attenuation: u32,
    ) -> Self {
        let mut visible = ahash::AHashSet::new();

        for unit in units.into_iter().filter(|u| u.side == side && u.is_alive()) {
            visible.extend(unit_sight(grid, unit, blocking_attenuation));
        }

        Self { visible }
    }

    pub fn is_visible(&self, coord: Coord) -> bool {
        self.visible.contains(&coord)
    }

    /// Is any cell of the region in sight?
    pub fn sees_region(&self, region: &Region) -> bool {
        region.cells.iter().any(|c| self.visible.contains(c))
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}

/// Cells within one unit's sight
pub fn unit_sight(grid: &Grid, unit: &Unit, blocking_attenuation: u32) -> Vec<Coord> {
    let radius = unit.visibility as i32;
    let origin = unit.position;
    let mut seen = vec![origin];

    for dr in -radius..=radius {
        let span = radius - dr.abs();
        for dc in -span..=span {
            let target = Coord::new(origin.row + dr, origin.col + dc);
            if target == origin || !grid.in_bounds(target) {
                continue;
            }
            if sight_cost(grid, origin, target, blocking_attenuation) <= unit.visibility {
                seen.push(target);
            }
        }
    }

    seen
}

/// Effective distance of a sight line: Manhattan distance plus the
/// attenuation of every blocking cell strictly between the endpoints
pub fn sight_cost(grid: &Grid, from: Coord, to: Coord, blocking_attenuation: u32) -> u32 {
    let line = from.line_to(&to);
    let interior = line.len().saturating_sub(2);
    let blocking = line
        .iter()
        .skip(1)
        .take(interior)
        .filter(|c| grid.cell_at(**c).is_some_and(|cell| cell.terrain.blocks_sight()))
        .count() as u32;

    from.distance(&to) + blocking * blocking_attenuation
}

/// Is a unit standing on a visible cell actually spotted?
///
/// Units in the open always are; units in cover only with probability
/// `cover_detection`, rolled on the supplied stream.
pub fn is_detected(terrain: Terrain, cover_detection: f64, rng: &mut ChaCha8Rng) -> bool {
    match terrain {
        Terrain::Cover => rng.gen_bool(cover_detection),
        Terrain::Open | Terrain::Blocking => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GridSize, RegionLayout, TerrainPatch};
    use crate::core::types::UnitId;
    use rand::SeedableRng;

    fn scout(row: i32, col: i32, visibility: u32) -> Unit {
        Unit::new(UnitId(1), Side::Player, Coord::new(row, col), 5, 1, visibility)
    }

    #[test]
    fn test_open_sight_is_a_diamond() {
        let grid = Grid::new(GridSize::new(7, 7), &RegionLayout::Single, &[]).unwrap();
        let unit = scout(3, 3, 2);
        let vis = SideVisibility::calculate(&grid, Side::Player, [&unit], 2);

        // 1 + 4 + 8 cells within Manhattan distance 2
        assert_eq!(vis.len(), 13);
        assert!(vis.is_visible(Coord::new(3, 3)));
        assert!(vis.is_visible(Coord::new(1, 3)));
        assert!(!vis.is_visible(Coord::new(1, 2)));
    }

    #[test]
    fn test_sight_clipped_at_edges() {
        let grid = Grid::new(GridSize::new(3, 3), &RegionLayout::Single, &[]).unwrap();
        let unit = scout(0, 0, 1);
        let vis = SideVisibility::calculate(&grid, Side::Player, [&unit], 2);
        assert_eq!(vis.len(), 3);
    }

    #[test]
    fn test_blocking_attenuates_sight() {
        let wall = [TerrainPatch { kind: Terrain::Blocking, row: 0, col: 1, rows: 1, cols: 1 }];
        let grid = Grid::new(GridSize::new(1, 5), &RegionLayout::Single, &wall).unwrap();
        let unit = scout(0, 0, 3);

        assert_eq!(sight_cost(&grid, Coord::new(0, 0), Coord::new(0, 2), 2), 4);
        // The wall itself is an endpoint, so it is not charged
        assert_eq!(sight_cost(&grid, Coord::new(0, 0), Coord::new(0, 1), 2), 1);

        let vis = SideVisibility::calculate(&grid, Side::Player, [&unit], 2);
        assert!(vis.is_visible(Coord::new(0, 1)));
        assert!(!vis.is_visible(Coord::new(0, 2)));
        assert!(!vis.is_visible(Coord::new(0, 3)));

        let clear = SideVisibility::calculate(&grid, Side::Player, [&unit], 0);
        assert!(clear.is_visible(Coord::new(0, 3)));
    }

    #[test]
    fn test_other_side_and_dead_units_ignored() {
        let grid = Grid::new(GridSize::new(3, 3), &RegionLayout::Single, &[]).unwrap();
        let mut dead = scout(1, 1, 1);
        dead.strength = 0;
        let enemy = Unit::new(UnitId(2), Side::Enemy, Coord::new(0, 0), 5, 1, 1);

        let vis = SideVisibility::calculate(&grid, Side::Player, [&dead, &enemy], 2);
        assert!(vis.is_empty());
    }

    #[test]
    fn test_cover_detection_probability() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(is_detected(Terrain::Open, 0.0, &mut rng));
        assert!(!is_detected(Terrain::Cover, 0.0, &mut rng));
        assert!(is_detected(Terrain::Cover, 1.0, &mut rng));
    }
}

//! Engagement detection - which regions fight this turn, and who is on
//! which side of the fight
//!
//! A region is contested when an accepted attack targets it or when units
//! of both sides stand in it after movement. Every unit fights in at most
//! one engagement: a unit standing in a contested region is pinned there,
//! otherwise an attacking unit fights at its target.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::{RegionId, Side, UnitId};
use crate::forces::Unit;
use crate::grid::Grid;

/// One region's fight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub region: RegionId,
    pub attacker: Side,
    pub defender: Side,
    /// Attacking units in id order
    pub attackers: Vec<UnitId>,
    /// Defending units in id order; may be empty when the region is taken
    /// unopposed
    pub defenders: Vec<UnitId>,
}

/// Units gathered at one contested region
#[derive(Debug, Default)]
struct Muster {
    /// Units per side
    forces: [Vec<UnitId>; 2],
    /// Sides with at least one unit attacking this region
    attacking: [bool; 2],
}

/// Find every engagement for the turn.
///
/// `units` is the state after movement; `attacks` lists accepted attack
/// orders. Engagements come back in region order.
pub fn detect_engagements(
    grid: &Grid,
    units: &BTreeMap<UnitId, Unit>,
    attacks: &BTreeMap<UnitId, RegionId>,
) -> Vec<Engagement> {
    let live = || units.values().filter(|u| u.is_alive());
    let location = |unit: &Unit| grid.cell_at(unit.position).map(|c| c.region);

    let mut present: BTreeMap<RegionId, [bool; 2]> = BTreeMap::new();
    for unit in live() {
        if let Some(region) = location(unit) {
            present.entry(region).or_default()[unit.side.index()] = true;
        }
    }

    let mut contested: BTreeSet<RegionId> = attacks.values().copied().collect();
    contested.extend(present.iter().filter(|(_, sides)| sides[0] && sides[1]).map(|(r, _)| *r));

    let mut musters: BTreeMap<RegionId, Muster> = BTreeMap::new();
    for unit in live() {
        let here = location(unit).filter(|r| contested.contains(r));
        let target = attacks.get(&unit.id).copied();

        let (region, attacking) = match (here, target) {
            (Some(here), target) => (here, target == Some(here)),
            (None, Some(target)) => (target, true),
            (None, None) => continue,
        };

        let muster = musters.entry(region).or_default();
        muster.forces[unit.side.index()].push(unit.id);
        if attacking {
            muster.attacking[unit.side.index()] = true;
        }
    }

    let mut engagements = Vec::new();
    for (region, muster) in musters {
        let both_present = !muster.forces[0].is_empty() && !muster.forces[1].is_empty();
        if !muster.attacking.iter().any(|a| *a) && !both_present {
            continue;
        }

        let defender = assign_defender(grid, units, region, &muster);
        let attacker = defender.opponent();
        let attackers = muster.forces[attacker.index()].clone();
        if attackers.is_empty() {
            continue;
        }

        engagements.push(Engagement {
            region,
            attacker,
            defender,
            attackers,
            defenders: muster.forces[defender.index()].clone(),
        });
    }

    engagements
}

/// Decide who defends a contested region.
///
/// A lone attacking side makes the other side the defender. Otherwise the
/// owner defends; in a neutral region the side that stood there when the
/// turn began; failing that the weaker side; on an exact tie the player.
fn assign_defender(grid: &Grid, units: &BTreeMap<UnitId, Unit>, region: RegionId, muster: &Muster) -> Side {
    match muster.attacking {
        [true, false] => return Side::Enemy,
        [false, true] => return Side::Player,
        _ => {}
    }

    if let Some(owner) = grid.region(region).and_then(|r| r.owner) {
        return owner;
    }

    let mut held_at_start = [false; 2];
    for side in Side::ALL {
        held_at_start[side.index()] = muster.forces[side.index()]
            .iter()
            .filter_map(|id| units.get(id))
            .any(|u| grid.cell_at(u.origin).is_some_and(|c| c.region == region));
    }
    match held_at_start {
        [true, false] => return Side::Player,
        [false, true] => return Side::Enemy,
        _ => {}
    }

    let strength = |side: Side| -> u64 {
        muster.forces[side.index()]
            .iter()
            .filter_map(|id| units.get(id))
            .map(|u| u64::from(u.strength))
            .sum()
    };
    if strength(Side::Enemy) < strength(Side::Player) {
        Side::Enemy
    } else {
        Side::Player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GridSize, RegionLayout};
    use crate::grid::Coord;

    fn setup(layout: RegionLayout, placements: &[(u32, Side, i32, i32, u32)]) -> (Grid, BTreeMap<UnitId, Unit>) {
        let mut grid = Grid::new(GridSize::new(5, 5), &layout, &[]).unwrap();
        let mut units = BTreeMap::new();
        for &(id, side, row, col, strength) in placements {
            let unit = Unit::new(UnitId(id), side, Coord::new(row, col), strength, 1, 2);
            grid.place(&unit).unwrap();
            units.insert(unit.id, unit);
        }
        (grid, units)
    }

    #[test]
    fn test_colocated_forces_engage_without_orders() {
        let (grid, units) = setup(
            RegionLayout::Single,
            &[(1, Side::Player, 2, 2, 10), (2, Side::Enemy, 2, 3, 4)],
        );
        let engagements = detect_engagements(&grid, &units, &BTreeMap::new());

        assert_eq!(engagements.len(), 1);
        // Neutral, both present from the start: the weaker side defends
        assert_eq!(engagements[0].defender, Side::Enemy);
        assert_eq!(engagements[0].attackers, vec![UnitId(1)]);
        assert_eq!(engagements[0].defenders, vec![UnitId(2)]);
    }

    #[test]
    fn test_equal_strength_tie_goes_to_player_defending() {
        let (grid, units) = setup(
            RegionLayout::Single,
            &[(1, Side::Player, 2, 2, 5), (2, Side::Enemy, 2, 3, 5)],
        );
        let engagements = detect_engagements(&grid, &units, &BTreeMap::new());
        assert_eq!(engagements[0].defender, Side::Player);
    }

    #[test]
    fn test_lone_attacker_takes_the_attacking_role() {
        let (grid, units) = setup(
            RegionLayout::Single,
            &[(1, Side::Player, 2, 2, 3), (2, Side::Enemy, 2, 3, 9)],
        );
        let attacks = BTreeMap::from([(UnitId(1), RegionId(0))]);
        let engagements = detect_engagements(&grid, &units, &attacks);
        assert_eq!(engagements[0].attacker, Side::Player);
    }

    #[test]
    fn test_owner_defends_when_both_attack() {
        let (mut grid, units) = setup(
            RegionLayout::Blocks { rows: 1, cols: 1 },
            &[(1, Side::Player, 2, 1, 3), (2, Side::Enemy, 2, 3, 9)],
        );
        grid.set_owner(RegionId(12), Some(Side::Player));
        let attacks = BTreeMap::from([(UnitId(1), RegionId(12)), (UnitId(2), RegionId(12))]);
        let engagements = detect_engagements(&grid, &units, &attacks);

        assert_eq!(engagements.len(), 1);
        assert_eq!(engagements[0].defender, Side::Player);
        assert_eq!(engagements[0].defenders, vec![UnitId(1)]);
    }

    #[test]
    fn test_unopposed_attack_has_no_defenders() {
        let (grid, units) = setup(RegionLayout::Blocks { rows: 1, cols: 1 }, &[(1, Side::Player, 4, 2, 3)]);
        let attacks = BTreeMap::from([(UnitId(1), RegionId(17))]);
        let engagements = detect_engagements(&grid, &units, &attacks);

        assert_eq!(engagements.len(), 1);
        assert_eq!(engagements[0].attacker, Side::Player);
        assert!(engagements[0].defenders.is_empty());
    }

    #[test]
    fn test_units_in_contested_regions_are_pinned() {
        // Player unit 1 at (2,2) attacks (2,3); enemy unit 2 at (1,2) attacks (2,2)
        let (grid, units) = setup(
            RegionLayout::Blocks { rows: 1, cols: 1 },
            &[(1, Side::Player, 2, 2, 6), (2, Side::Enemy, 1, 2, 6)],
        );
        let attacks = BTreeMap::from([(UnitId(1), RegionId(13)), (UnitId(2), RegionId(12))]);
        let engagements = detect_engagements(&grid, &units, &attacks);

        // Unit 1 has to defend (2,2); its own attack finds nobody to make it
        assert_eq!(engagements.len(), 1);
        assert_eq!(engagements[0].region, RegionId(12));
        assert_eq!(engagements[0].defenders, vec![UnitId(1)]);
        assert_eq!(engagements[0].attackers, vec![UnitId(2)]);
    }
}

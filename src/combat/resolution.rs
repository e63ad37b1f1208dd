//! Combat resolution
//!
//! Deterministic strength-ratio model with an optional seeded roll:
//!
//! - `a = sum(attacker strength) * roll`
//! - `d = sum(defender strength) * (1 + region defence modifier)`
//!
//! The attacker wins above `d * (1 + margin)` and is repelled below
//! `d * (1 - margin)`. Everything in between is a stalemate, which always
//! includes exact equality, and the defender holds.
//!
//! Engagements are resolved against a shared snapshot and never see each
//! other's results, so they can run in any order (or in parallel).

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::engagement::Engagement;
use crate::core::config::{weighted_split, CombatConfig};
use crate::core::rng::{MatchRng, Stream};
use crate::core::types::{RegionId, Side, Turn, UnitId};
use crate::forces::Unit;
use crate::grid::{Coord, Grid};

/// How an engagement ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatResult {
    /// Defenders destroyed; the region changes hands
    AttackerVictory,
    /// Attackers repelled with losses
    DefenderHolds,
    /// Inside the draw band; both sides bleed and the defender holds
    Stalemate,
}

/// Result of one engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatOutcome {
    pub region: RegionId,
    pub attacker: Side,
    pub defender: Side,
    pub attack_value: f64,
    pub defense_value: f64,
    pub result: CombatResult,
    /// Strength lost per unit
    pub losses: BTreeMap<UnitId, u32>,
    /// Units wiped out by the result itself
    pub destroyed: Vec<UnitId>,
    /// Attackers sent back to their turn-start cell
    pub repelled: Vec<UnitId>,
    /// Attackers moving into the captured region
    pub advances: Vec<(UnitId, Coord)>,
}

impl CombatOutcome {
    /// Did the defending side keep the region?
    pub fn defender_holds(&self) -> bool {
        self.result != CombatResult::AttackerVictory
    }

    /// New owner of the region, if it changed hands
    pub fn captured_by(&self) -> Option<Side> {
        (self.result == CombatResult::AttackerVictory).then_some(self.attacker)
    }
}

/// Read-only inputs shared by every engagement of a turn
pub struct CombatContext<'a> {
    pub grid: &'a Grid,
    pub units: &'a BTreeMap<UnitId, Unit>,
    pub config: &'a CombatConfig,
    pub rng: MatchRng,
    pub turn: Turn,
}

impl<'a> CombatContext<'a> {
    fn unit(&self, id: &UnitId) -> Option<&'a Unit> {
        self.units.get(id).filter(|u| u.is_alive())
    }

    fn total_strength(&self, ids: &[UnitId]) -> u32 {
        ids.iter().filter_map(|id| self.unit(id)).map(|u| u.strength).sum()
    }

    /// Attacker multiplier for one region this turn
    fn roll(&self, region: RegionId) -> f64 {
        let variance = self.config.variance;
        if variance <= 0.0 {
            return 1.0;
        }
        let mut rng = self.rng.stream(Stream::Combat, self.turn, u64::from(region.0));
        rng.gen_range((1.0 - variance)..=(1.0 + variance))
    }
}

/// Resolve every engagement.
///
/// Runs on the rayon pool when there are at least `parallel_threshold`
/// engagements. Outcomes come back in the order of `engagements` either way.
pub fn resolve_all(engagements: &[Engagement], ctx: &CombatContext) -> Vec<CombatOutcome> {
    if engagements.len() >= ctx.config.parallel_threshold.max(1) {
        tracing::debug!("Resolving {} engagements in parallel", engagements.len());
        engagements.par_iter().map(|e| resolve(e, ctx)).collect()
    } else {
        engagements.iter().map(|e| resolve(e, ctx)).collect()
    }
}

/// Resolve one engagement against the snapshot
pub fn resolve(engagement: &Engagement, ctx: &CombatContext) -> CombatOutcome {
    let modifier = ctx.grid.region(engagement.region).map_or(0.0, |r| r.defense_modifier);
    let attack_strength = ctx.total_strength(&engagement.attackers);
    let defense_strength = ctx.total_strength(&engagement.defenders);

    let a = f64::from(attack_strength) * ctx.roll(engagement.region);
    let d = f64::from(defense_strength) * (1.0 + modifier);
    let margin = ctx.config.margin;

    let result = if a > d * (1.0 + margin) {
        CombatResult::AttackerVictory
    } else if a < d * (1.0 - margin) {
        CombatResult::DefenderHolds
    } else {
        CombatResult::Stalemate
    };

    let mut outcome = CombatOutcome {
        region: engagement.region,
        attacker: engagement.attacker,
        defender: engagement.defender,
        attack_value: a,
        defense_value: d,
        result,
        losses: BTreeMap::new(),
        destroyed: Vec::new(),
        repelled: Vec::new(),
        advances: Vec::new(),
    };

    match result {
        CombatResult::AttackerVictory => {
            for unit in engagement.defenders.iter().filter_map(|id| ctx.unit(id)) {
                outcome.losses.insert(unit.id, unit.strength);
                outcome.destroyed.push(unit.id);
            }
            let loss = if d <= 0.0 { 0 } else { ((d * d / a).floor() as u32).max(1) };
            spread_losses(&mut outcome.losses, &engagement.attackers, loss, ctx);
            outcome.advances = plan_advance(engagement, ctx);
        }
        CombatResult::DefenderHolds => {
            let share = d / (a + d);
            for unit in engagement.attackers.iter().filter_map(|id| ctx.unit(id)) {
                let loss = (f64::from(unit.strength) * share).ceil() as u32;
                outcome.losses.insert(unit.id, loss.min(unit.strength));

                let inside = ctx.grid.cell_at(unit.position).is_some_and(|c| c.region == engagement.region);
                let came_from_outside = ctx.grid.cell_at(unit.origin).is_some_and(|c| c.region != engagement.region);
                if inside && came_from_outside && loss < unit.strength {
                    outcome.repelled.push(unit.id);
                }
            }
            let loss = ((a * a / d).floor() as u32).max(1);
            spread_losses(&mut outcome.losses, &engagement.defenders, loss, ctx);
        }
        CombatResult::Stalemate => {
            let rate = ctx.config.draw_loss_rate;
            for unit in engagement
                .attackers
                .iter()
                .chain(&engagement.defenders)
                .filter_map(|id| ctx.unit(id))
            {
                let loss = (f64::from(unit.strength) * rate).ceil() as u32;
                outcome.losses.insert(unit.id, loss.min(unit.strength));
            }
        }
    }

    tracing::debug!(
        "Combat in {}: {} {:.1} vs {} {:.1} -> {:?}",
        engagement.region,
        engagement.attacker,
        a,
        engagement.defender,
        d,
        result
    );

    outcome
}

/// Spread a side's total loss over its units in proportion to strength,
/// never wiping the whole side out
fn spread_losses(losses: &mut BTreeMap<UnitId, u32>, ids: &[UnitId], total: u32, ctx: &CombatContext) {
    let units: Vec<&Unit> = ids.iter().filter_map(|id| ctx.unit(id)).collect();
    let strength: u32 = units.iter().map(|u| u.strength).sum();
    let total = total.min(strength.saturating_sub(1));
    if total == 0 {
        return;
    }

    let weights: Vec<u32> = units.iter().map(|u| u.strength).collect();
    for (unit, share) in units.iter().zip(weighted_split(total, &weights)) {
        if share > 0 {
            *losses.entry(unit.id).or_insert(0) += share;
        }
    }
}

/// Cells the winning attackers move into.
///
/// Attackers outside the region take the nearest usable cells, in id
/// order. A cell is usable when it is passable, is nobody's turn-start
/// cell, and is empty or held by a defender who is being destroyed.
fn plan_advance(engagement: &Engagement, ctx: &CombatContext) -> Vec<(UnitId, Coord)> {
    let Some(region) = ctx.grid.region(engagement.region) else {
        return Vec::new();
    };

    let losing: ahash::AHashSet<UnitId> = engagement.defenders.iter().copied().collect();
    // Turn-start cells stay free for units repelled elsewhere
    let origins: ahash::AHashSet<Coord> =
        ctx.units.values().filter(|u| !losing.contains(&u.id)).map(|u| u.origin).collect();

    let mut open: Vec<Coord> = region
        .cells
        .iter()
        .copied()
        .filter(|c| !origins.contains(c))
        .filter(|c| {
            ctx.grid.cell_at(*c).is_some_and(|cell| {
                cell.terrain.is_passable() && cell.occupant.map_or(true, |o| losing.contains(&o.unit))
            })
        })
        .collect();

    let mut advances = Vec::new();
    for unit in engagement.attackers.iter().filter_map(|id| ctx.unit(id)) {
        if region.contains(&unit.position) {
            continue;
        }
        let nearest = open
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| (c.distance(&unit.position), **c))
            .map(|(i, _)| i);
        let Some(index) = nearest else {
            break;
        };
        advances.push((unit.id, open.remove(index)));
    }

    advances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GridSize, RegionLayout, TerrainPatch};
    use crate::grid::Terrain;

    struct Field {
        grid: Grid,
        units: BTreeMap<UnitId, Unit>,
        config: CombatConfig,
    }

    impl Field {
        fn new(layout: RegionLayout, terrain: &[TerrainPatch]) -> Self {
            Self {
                grid: Grid::new(GridSize::new(5, 5), &layout, terrain).unwrap(),
                units: BTreeMap::new(),
                config: CombatConfig::default(),
            }
        }

        fn add(&mut self, id: u32, side: Side, row: i32, col: i32, strength: u32) {
            let unit = Unit::new(UnitId(id), side, Coord::new(row, col), strength, 1, 2);
            self.grid.place(&unit).unwrap();
            self.units.insert(unit.id, unit);
        }

        fn ctx(&self, seed: u64) -> CombatContext<'_> {
            CombatContext {
                grid: &self.grid,
                units: &self.units,
                config: &self.config,
                rng: MatchRng::new(seed),
                turn: 1,
            }
        }
    }

    fn engagement(region: u32, attacker: Side, attackers: &[u32], defenders: &[u32]) -> Engagement {
        Engagement {
            region: RegionId(region),
            attacker,
            defender: attacker.opponent(),
            attackers: attackers.iter().map(|i| UnitId(*i)).collect(),
            defenders: defenders.iter().map(|i| UnitId(*i)).collect(),
        }
    }

    #[test]
    fn test_overwhelming_attack_destroys_defender() {
        let mut field = Field::new(RegionLayout::Single, &[]);
        field.add(1, Side::Player, 2, 2, 10);
        field.add(2, Side::Enemy, 2, 3, 4);

        let outcome = resolve(&engagement(0, Side::Player, &[1], &[2]), &field.ctx(42));
        assert_eq!(outcome.result, CombatResult::AttackerVictory);
        assert_eq!(outcome.captured_by(), Some(Side::Player));
        assert_eq!(outcome.destroyed, vec![UnitId(2)]);
        // floor(16 / 10) = 1
        assert_eq!(outcome.losses[&UnitId(1)], 1);
    }

    #[test]
    fn test_equal_strength_defender_holds() {
        let mut field = Field::new(RegionLayout::Single, &[]);
        field.add(1, Side::Player, 2, 2, 5);
        field.add(2, Side::Enemy, 2, 3, 5);

        for _ in 0..3 {
            let outcome = resolve(&engagement(0, Side::Enemy, &[2], &[1]), &field.ctx(7));
            assert_eq!(outcome.result, CombatResult::Stalemate);
            assert!(outcome.defender_holds());
            assert_eq!(outcome.captured_by(), None);
            assert_eq!(outcome.losses[&UnitId(1)], 1);
            assert_eq!(outcome.losses[&UnitId(2)], 1);
        }
    }

    #[test]
    fn test_terrain_favours_defender() {
        let cover = [TerrainPatch { kind: Terrain::Cover, row: 0, col: 0, rows: 5, cols: 5 }];
        let mut field = Field::new(RegionLayout::Single, &cover);
        field.add(1, Side::Player, 2, 2, 7);
        field.add(2, Side::Enemy, 2, 3, 5);

        // 7 against 5 * 1.5 = 7.5 falls inside the draw band
        let outcome = resolve(&engagement(0, Side::Player, &[1], &[2]), &field.ctx(1));
        assert_eq!(outcome.defense_value, 7.5);
        assert_eq!(outcome.result, CombatResult::Stalemate);
    }

    #[test]
    fn test_repulse_can_wipe_out_weak_attackers() {
        let mut field = Field::new(RegionLayout::Single, &[]);
        field.add(1, Side::Player, 2, 2, 3);
        field.add(2, Side::Enemy, 2, 3, 9);
        if let Some(unit) = field.units.get_mut(&UnitId(1)) {
            unit.origin = Coord::new(2, 1);
        }
        let outcome = resolve(&engagement(0, Side::Player, &[1], &[2]), &field.ctx(1));
        assert_eq!(outcome.result, CombatResult::DefenderHolds);
        // ceil(3 * 9 / 12) = 3 wipes the unit out, so there is nobody to repel
        assert_eq!(outcome.losses[&UnitId(1)], 3);
        assert!(outcome.repelled.is_empty());
        // floor(9 / 9) = 1
        assert_eq!(outcome.losses[&UnitId(2)], 1);
    }

    #[test]
    fn test_repelled_survivor_listed() {
        let mut field = Field::new(RegionLayout::Bands { count: 5 }, &[]);
        field.add(1, Side::Player, 2, 1, 6);
        field.add(2, Side::Enemy, 2, 3, 20);
        if let Some(unit) = field.units.get_mut(&UnitId(1)) {
            unit.origin = Coord::new(3, 1);
        }

        let outcome = resolve(&engagement(2, Side::Player, &[1], &[2]), &field.ctx(1));
        assert_eq!(outcome.result, CombatResult::DefenderHolds);
        // ceil(6 * 20 / 26) = 5, leaving 1
        assert_eq!(outcome.losses[&UnitId(1)], 5);
        assert_eq!(outcome.repelled, vec![UnitId(1)]);
    }

    #[test]
    fn test_advance_picks_nearest_free_cells() {
        let mut field = Field::new(RegionLayout::Bands { count: 5 }, &[]);
        field.add(1, Side::Player, 3, 2, 10);
        field.add(2, Side::Player, 3, 3, 10);
        field.add(3, Side::Enemy, 2, 0, 2);

        let outcome = resolve(&engagement(2, Side::Player, &[1, 2], &[3]), &field.ctx(1));
        assert_eq!(outcome.result, CombatResult::AttackerVictory);
        assert_eq!(outcome.advances, vec![(UnitId(1), Coord::new(2, 2)), (UnitId(2), Coord::new(2, 3))]);
    }

    #[test]
    fn test_losses_never_wipe_out_the_winner() {
        let mut field = Field::new(RegionLayout::Single, &[]);
        field.add(1, Side::Player, 2, 2, 1);
        field.add(2, Side::Player, 2, 1, 1);
        field.add(3, Side::Enemy, 2, 3, 1);

        // a = 2 beats d * 1.25 = 1.25; loss max(1, floor(1/2)) = 1 of a total of 2
        let outcome = resolve(&engagement(0, Side::Player, &[1, 2], &[3]), &field.ctx(1));
        assert_eq!(outcome.result, CombatResult::AttackerVictory);
        let attacker_losses: u32 = [UnitId(1), UnitId(2)].iter().filter_map(|id| outcome.losses.get(id)).sum();
        assert_eq!(attacker_losses, 1);
    }

    #[test]
    fn test_variance_is_seeded() {
        let mut field = Field::new(RegionLayout::Single, &[]);
        field.config.variance = 0.3;
        field.add(1, Side::Player, 2, 2, 6);
        field.add(2, Side::Enemy, 2, 3, 5);
        let e = engagement(0, Side::Player, &[1], &[2]);

        let first = resolve(&e, &field.ctx(99));
        let second = resolve(&e, &field.ctx(99));
        assert_eq!(first, second);
        assert!(first.attack_value >= 6.0 * 0.7 && first.attack_value <= 6.0 * 1.3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut field = Field::new(RegionLayout::Blocks { rows: 1, cols: 1 }, &[]);
        let mut engagements = Vec::new();
        for col in 0..5 {
            field.add(col as u32 * 2 + 1, Side::Player, 3, col, 4 + col as u32);
            field.add(col as u32 * 2 + 2, Side::Enemy, 2, col, 6);
            engagements.push(engagement(10 + col as u32, Side::Player, &[col as u32 * 2 + 1], &[col as u32 * 2 + 2]));
        }

        field.config.parallel_threshold = usize::MAX;
        let sequential = resolve_all(&engagements, &field.ctx(3));
        field.config.parallel_threshold = 1;
        let parallel = resolve_all(&engagements, &field.ctx(3));
        assert_eq!(sequential, parallel);

        let mut reversed = engagements.clone();
        reversed.reverse();
        let mut backwards = resolve_all(&reversed, &field.ctx(3));
        backwards.reverse();
        assert_eq!(sequential, backwards);
    }
}

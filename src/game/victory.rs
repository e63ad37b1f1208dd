//! Terminal conditions and the winner
//!
//! A side loses when it has no living units or fails one of its
//! objectives. If both lose at once the match is drawn. Otherwise, once
//! `turn_limit` turns have been played, the side owning more regions wins
//! and equal counts draw.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::state::MatchState;
use crate::core::config::{MatchConfig, Objective};
use crate::core::types::{Side, UnitId};
use crate::forces::Unit;
use crate::grid::{Coord, Grid};

/// Where the match stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    #[default]
    Ongoing,
    Victory(Side),
    Draw,
}

impl MatchOutcome {
    pub fn is_over(&self) -> bool {
        *self != Self::Ongoing
    }

    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Victory(side) => Some(*side),
            Self::Ongoing | Self::Draw => None,
        }
    }
}

/// Evaluate the match after `turns_played` completed turns
pub fn evaluate(config: &MatchConfig, grid: &Grid, units: &BTreeMap<UnitId, Unit>, turns_played: u32) -> MatchOutcome {
    let defeated: Vec<Side> = Side::ALL
        .into_iter()
        .filter(|side| !has_living_units(units, *side) || fails_objective(config, grid, *side))
        .collect();

    match defeated.as_slice() {
        [loser] => return MatchOutcome::Victory(loser.opponent()),
        [_, _] => return MatchOutcome::Draw,
        _ => {}
    }

    if turns_played < config.turn_limit {
        return MatchOutcome::Ongoing;
    }

    let player = grid.regions_owned_by(Side::Player).count();
    let enemy = grid.regions_owned_by(Side::Enemy).count();
    match player.cmp(&enemy) {
        std::cmp::Ordering::Greater => MatchOutcome::Victory(Side::Player),
        std::cmp::Ordering::Less => MatchOutcome::Victory(Side::Enemy),
        std::cmp::Ordering::Equal => MatchOutcome::Draw,
    }
}

fn has_living_units(units: &BTreeMap<UnitId, Unit>, side: Side) -> bool {
    units.values().any(|u| u.side == side && u.is_alive())
}

fn fails_objective(config: &MatchConfig, grid: &Grid, side: Side) -> bool {
    config.objectives.iter().filter(|o| o.side() == side).any(|objective| match objective {
        Objective::HoldRegionAt { row, col, .. } => grid
            .region_of(Coord::new(*row, *col))
            .is_some_and(|r| r.is_owned_by(side.opponent())),
        Objective::HoldAtLeast { regions, .. } => grid.regions_owned_by(side).count() < *regions as usize,
    })
}

/// Has the match ended?
pub fn is_terminal(state: &MatchState) -> bool {
    state.outcome().is_over()
}

/// Winning side of a finished match; `None` while ongoing or on a draw
pub fn winner(state: &MatchState) -> Option<Side> {
    state.outcome().winner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GridSize, RegionLayout};
    use crate::core::types::RegionId;

    fn strip() -> Grid {
        Grid::new(GridSize::new(1, 4), &RegionLayout::Blocks { rows: 1, cols: 1 }, &[]).unwrap()
    }

    fn forces(sides: &[Side]) -> BTreeMap<UnitId, Unit> {
        sides
            .iter()
            .enumerate()
            .map(|(i, side)| {
                let id = UnitId(i as u32 + 1);
                (id, Unit::new(id, *side, Coord::new(0, i as i32), 5, 1, 2))
            })
            .collect()
    }

    #[test]
    fn test_elimination_ends_match() {
        let config = MatchConfig::blank(1, 4);
        let outcome = evaluate(&config, &strip(), &forces(&[Side::Player]), 1);
        assert_eq!(outcome, MatchOutcome::Victory(Side::Player));
        assert_eq!(outcome.winner(), Some(Side::Player));
    }

    #[test]
    fn test_ongoing_before_limit() {
        let config = MatchConfig::blank(1, 4).with_turn_limit(5);
        let outcome = evaluate(&config, &strip(), &forces(&[Side::Player, Side::Enemy]), 4);
        assert_eq!(outcome, MatchOutcome::Ongoing);
        assert!(!outcome.is_over());
    }

    #[test]
    fn test_turn_limit_counts_regions() {
        let config = MatchConfig::blank(1, 4).with_turn_limit(5);
        let units = forces(&[Side::Player, Side::Enemy]);
        let mut grid = strip();

        assert_eq!(evaluate(&config, &grid, &units, 5), MatchOutcome::Draw);

        grid.set_owner(RegionId(0), Some(Side::Enemy));
        assert_eq!(evaluate(&config, &grid, &units, 5), MatchOutcome::Victory(Side::Enemy));
    }

    #[test]
    fn test_lost_objective_region() {
        let config = MatchConfig::blank(1, 4).with_objective(Objective::HoldRegionAt {
            side: Side::Player,
            row: 0,
            col: 2,
        });
        let units = forces(&[Side::Player, Side::Enemy]);
        let mut grid = strip();
        assert_eq!(evaluate(&config, &grid, &units, 1), MatchOutcome::Ongoing);

        // Neutral is fine, only the opponent holding it loses
        grid.set_owner(RegionId(2), Some(Side::Enemy));
        assert_eq!(evaluate(&config, &grid, &units, 1), MatchOutcome::Victory(Side::Enemy));
    }

    #[test]
    fn test_both_sides_failing_is_a_draw() {
        let config = MatchConfig::blank(1, 4)
            .with_objective(Objective::HoldAtLeast { side: Side::Player, regions: 1 })
            .with_objective(Objective::HoldAtLeast { side: Side::Enemy, regions: 1 });
        let outcome = evaluate(&config, &strip(), &forces(&[Side::Player, Side::Enemy]), 1);
        assert_eq!(outcome, MatchOutcome::Draw);
        assert_eq!(outcome.winner(), None);
    }
}

//! Match state and setup

use std::collections::BTreeMap;

use super::victory::{self, MatchOutcome};
use crate::core::config::{MatchConfig, Objective};
use crate::core::error::{MatchError, Result};
use crate::core::rng::MatchRng;
use crate::core::types::{Controller, Side, Turn, UnitId};
use crate::forces::{Order, OrderValidator, Unit};
use crate::grid::{Coord, Grid, TerrainView};
use crate::intel::{IntelEngine, IntelLedger, Signal};

/// Everything about a running match.
///
/// Created by [`new_match`] and changed only by the turn pipeline.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub(super) config: MatchConfig,
    pub(super) grid: Grid,
    pub(super) terrain: TerrainView,
    pub(super) units: BTreeMap<UnitId, Unit>,
    /// The turn about to be played
    pub(super) turn: Turn,
    pub(super) rng: MatchRng,
    pub(super) ledgers: [IntelLedger; 2],
    /// Signals to be acted on this turn, indexed by `Side::index`
    pub(super) briefings: [Vec<Signal>; 2],
    pub(super) outcome: MatchOutcome,
}

/// Create a match from a configuration
pub fn new_match(config: MatchConfig) -> Result<MatchState> {
    MatchState::new(config)
}

impl MatchState {
    pub fn new(config: MatchConfig) -> Result<Self> {
        config.validate()?;
        let mut grid = Grid::new(config.grid_size, &config.regions, &config.terrain)?;

        for objective in &config.objectives {
            if let Objective::HoldRegionAt { row, col, .. } = objective {
                let coord = Coord::new(*row, *col);
                if !grid.in_bounds(coord) {
                    return Err(MatchError::config(format!("objective cell {} is off the grid", coord)));
                }
            }
        }

        let mut units = BTreeMap::new();
        let mut next_id = 1;
        for side_config in &config.sides {
            for spec in &side_config.units {
                let unit = Unit::new(
                    UnitId(next_id),
                    side_config.side,
                    Coord::new(spec.row, spec.col),
                    spec.strength,
                    spec.movement,
                    spec.visibility,
                );
                grid.place(&unit)?;
                units.insert(unit.id, unit);
                next_id += 1;
            }
        }

        claim_occupied_regions(&mut grid, &units);

        let mut state = Self {
            terrain: grid.terrain_view(),
            rng: MatchRng::new(config.seed),
            config,
            grid,
            units,
            turn: 1,
            ledgers: [IntelLedger::new(Side::Player), IntelLedger::new(Side::Enemy)],
            briefings: [Vec::new(), Vec::new()],
            outcome: MatchOutcome::Ongoing,
        };
        state.outcome = victory::evaluate(&state.config, &state.grid, &state.units, 0);
        state.refresh_briefings();

        tracing::info!(
            seed = state.rng.seed(),
            units = state.units.len(),
            regions = state.grid.regions().len(),
            "match created"
        );
        Ok(state)
    }

    /// Produce every side's briefing for the current turn
    pub(super) fn refresh_briefings(&mut self) {
        let engine = IntelEngine::new(&self.grid, &self.units, &self.config, self.rng, self.turn);
        for side in Side::ALL {
            self.briefings[side.index()] = engine.briefing(side, &mut self.ledgers[side.index()]);
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Static map knowledge shared by both sides
    pub fn terrain(&self) -> &TerrainView {
        &self.terrain
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn outcome(&self) -> MatchOutcome {
        self.outcome
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Living units of one side in id order
    pub fn units_of(&self, side: Side) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |u| u.side == side && u.is_alive())
    }

    /// Signals currently delivered to `side`
    pub fn briefing(&self, side: Side) -> &[Signal] {
        &self.briefings[side.index()]
    }

    pub fn controller(&self, side: Side) -> Controller {
        self.config.side(side).map(|s| s.controller).unwrap_or_default()
    }

    /// Strength `side` may add to its units this turn
    pub fn reinforcement_budget(&self, side: Side) -> u32 {
        self.config.side(side).map_or(0, |s| s.reinforcements)
    }

    /// Check one order against the current state, as the turn pipeline
    /// would if it were submitted alone
    pub fn validate_order(&self, order: &Order) -> Result<()> {
        if self.outcome.is_over() {
            return Err(MatchError::MatchConcluded);
        }
        if self.controller(order.side) == Controller::Ai {
            return Err(MatchError::invalid_order(format!("{} is commanded by the engine", order.side)));
        }
        let budget = Side::ALL.map(|s| self.reinforcement_budget(s));
        OrderValidator::new(&self.grid, &self.units, budget).check(order)
    }
}

/// Give each neutral region holding units of exactly one side to that side
fn claim_occupied_regions(grid: &mut Grid, units: &BTreeMap<UnitId, Unit>) {
    let mut present: BTreeMap<_, [bool; 2]> = BTreeMap::new();
    for unit in units.values() {
        if let Some(region) = grid.region_of(unit.position) {
            present.entry(region.id).or_default()[unit.side.index()] = true;
        }
    }

    for (region, sides) in present {
        let owner = match sides {
            [true, false] => Side::Player,
            [false, true] => Side::Enemy,
            _ => continue,
        };
        if grid.region(region).is_some_and(|r| r.owner.is_none()) {
            grid.set_owner(region, Some(owner));
        }
    }
}

//! The turn pipeline
//!
//! briefing -> orders -> validation -> reinforcements -> moves -> combat ->
//! invariants -> victory -> next briefing

use serde::Serialize;
use std::collections::BTreeMap;

use super::state::MatchState;
use super::victory;
use crate::ai::{Commander, HeuristicCommander, IntelView};
use crate::combat::{detect_engagements, resolve_all, CombatContext, CombatEffects, CombatOutcome};
use crate::core::error::{MatchError, Result};
use crate::core::types::{Controller, RegionId, Side, Turn, UnitId};
use crate::forces::{Order, OrderAction, OrderOutcome, OrderValidator, Unit};
use crate::intel::Signal;

/// Everything that happened in one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: Turn,
    /// Briefings the sides acted on
    pub signals: BTreeMap<Side, Vec<Signal>>,
    /// Every submitted order, Player's first, in submission order; orders
    /// resubmitted after a rejection follow the first round
    pub orders: Vec<OrderOutcome>,
    pub combat: Vec<CombatOutcome>,
    pub eliminated: Vec<UnitId>,
    pub terminal: bool,
    pub winner: Option<Side>,
}

impl TurnReport {
    pub fn rejected(&self) -> impl Iterator<Item = &OrderOutcome> {
        self.orders.iter().filter(|o| !o.is_executed())
    }
}

impl MatchState {
    /// Play one turn. Engine-controlled sides are commanded by a
    /// `HeuristicCommander` with their configured personality.
    pub fn step_turn(&mut self, human_orders: Vec<Order>) -> Result<TurnReport> {
        let commanders = Side::ALL.map(|side| {
            let personality = self.config.side(side).map(|s| s.personality.clone()).unwrap_or_default();
            HeuristicCommander::new(personality)
        });
        let [player, enemy] = &commanders;
        self.run_turn(human_orders, [player, enemy])
    }

    /// Play one turn with `commander` deciding for every engine-controlled
    /// side
    pub fn step_turn_with(&mut self, human_orders: Vec<Order>, commander: &dyn Commander) -> Result<TurnReport> {
        self.run_turn(human_orders, [commander, commander])
    }

    fn run_turn(&mut self, human_orders: Vec<Order>, commanders: [&dyn Commander; 2]) -> Result<TurnReport> {
        if self.outcome.is_over() {
            return Err(MatchError::MatchConcluded);
        }
        let turn = self.turn;
        let signals: BTreeMap<Side, Vec<Signal>> =
            Side::ALL.into_iter().map(|side| (side, self.briefings[side.index()].clone())).collect();

        let mut outcomes = Vec::new();
        let mut submitted = Vec::new();
        for order in human_orders {
            if self.controller(order.side) == Controller::Ai {
                let err = MatchError::invalid_order(format!("{} is commanded by the engine", order.side));
                outcomes.push(OrderOutcome::rejected(order, &err));
            } else {
                submitted.push(order);
            }
        }

        let mut views: [Option<IntelView>; 2] = [None, None];
        for side in Side::ALL {
            if self.controller(side) != Controller::Ai {
                continue;
            }
            let view = IntelView::new(side, signals.get(&side).cloned().unwrap_or_default(), self);
            for order in commanders[side.index()].generate_orders(&view) {
                match commanded_by(side, order) {
                    Ok(order) => submitted.push(order),
                    Err(err) => outcomes.push(OrderOutcome::rejected(order, &err)),
                }
            }
            views[side.index()] = Some(view);
        }

        // Stable: each side keeps its own submission order
        submitted.sort_by_key(|o| o.side.index());

        for unit in self.units.values_mut() {
            unit.begin_turn();
        }

        let budget = Side::ALL.map(|s| self.reinforcement_budget(s));
        let mut accepted = Vec::new();
        let mut bounced: [Vec<OrderOutcome>; 2] = [Vec::new(), Vec::new()];
        let mut validator = OrderValidator::new(&self.grid, &self.units, budget);
        for order in submitted {
            let outcome = settle(&mut validator, order, &mut accepted);
            if !outcome.is_executed() && views[order.side.index()].is_some() {
                bounced[order.side.index()].push(outcome.clone());
            }
            outcomes.push(outcome);
        }

        // One retry round: commanders replace what was rejected, against
        // the reservations already made
        for side in Side::ALL {
            let (Some(view), rejected) = (&views[side.index()], &bounced[side.index()]) else {
                continue;
            };
            if rejected.is_empty() {
                continue;
            }
            for order in commanders[side.index()].revise(view, rejected) {
                let outcome = match commanded_by(side, order) {
                    Ok(order) => settle(&mut validator, order, &mut accepted),
                    Err(err) => OrderOutcome::rejected(order, &err),
                };
                outcomes.push(outcome);
            }
        }

        let attacks = self.commit(&accepted)?;

        let engagements = detect_engagements(&self.grid, &self.units, &attacks);
        let combat = {
            let ctx = CombatContext {
                grid: &self.grid,
                units: &self.units,
                config: &self.config.combat,
                rng: self.rng,
                turn,
            };
            resolve_all(&engagements, &ctx)
        };
        let effects = CombatEffects::merge(&combat);
        let eliminated = effects.apply(&mut self.grid, &mut self.units);

        self.check_invariants(&combat)?;

        self.turn += 1;
        self.outcome = victory::evaluate(&self.config, &self.grid, &self.units, turn);
        self.refresh_briefings();

        tracing::info!(
            turn,
            orders = outcomes.len(),
            rejected = outcomes.iter().filter(|o| !o.is_executed()).count(),
            engagements = combat.len(),
            eliminated = eliminated.len(),
            outcome = ?self.outcome,
            "turn resolved"
        );

        Ok(TurnReport {
            turn,
            signals,
            orders: outcomes,
            combat,
            eliminated,
            terminal: self.outcome.is_over(),
            winner: self.outcome.winner(),
        })
    }

    /// Apply accepted reinforcements, then moves. Returns the attack
    /// targets.
    fn commit(&mut self, accepted: &[Order]) -> Result<BTreeMap<UnitId, RegionId>> {
        let mut attacks = BTreeMap::new();

        for order in accepted {
            if let OrderAction::Reinforce(amount) = order.action {
                self.unit_mut(order.unit)?.reinforce(amount);
            }
        }

        for order in accepted {
            match order.action {
                OrderAction::MoveTo(destination) => {
                    let unit = self.units.get_mut(&order.unit).ok_or_else(|| missing_unit(order.unit))?;
                    // Legality was settled against the turn-start snapshot
                    self.grid.relocate(unit, destination);
                }
                OrderAction::Attack(region) => {
                    attacks.insert(order.unit, region);
                }
                OrderAction::Hold | OrderAction::Reinforce(_) => {}
            }
        }

        Ok(attacks)
    }

    fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units.get_mut(&id).ok_or_else(|| missing_unit(id))
    }

    /// Post-combat consistency checks
    fn check_invariants(&self, combat: &[CombatOutcome]) -> Result<()> {
        self.grid.check_partition()?;

        for unit in self.units.values() {
            if !unit.is_alive() {
                return Err(MatchError::InternalInvariantViolation(format!(
                    "{} survived combat with no strength",
                    unit.id
                )));
            }
            let marked = self.grid.cell_at(unit.position).and_then(|c| c.occupant);
            if marked.map(|o| o.unit) != Some(unit.id) {
                return Err(MatchError::InternalInvariantViolation(format!(
                    "{} stands at {} but the cell does not reference it",
                    unit.id, unit.position
                )));
            }
        }

        for cell in self.grid.cells() {
            if let Some(occupant) = cell.occupant {
                let consistent = self.units.get(&occupant.unit).is_some_and(|u| u.position == cell.coord);
                if !consistent {
                    return Err(MatchError::InternalInvariantViolation(format!(
                        "cell {} references {} which is not there",
                        cell.coord, occupant.unit
                    )));
                }
            }
        }

        for outcome in combat {
            let Some(captor) = outcome.captured_by() else {
                continue;
            };
            let Some(region) = self.grid.region(outcome.region) else {
                continue;
            };
            let holdout = self
                .units
                .values()
                .find(|u| u.side == captor.opponent() && region.contains(&u.position));
            if let Some(unit) = holdout {
                return Err(MatchError::InternalInvariantViolation(format!(
                    "{} remains in {} after it was captured",
                    unit.id, region.id
                )));
            }
        }

        Ok(())
    }
}

/// Validate one order, recording it when accepted
fn settle(validator: &mut OrderValidator, order: Order, accepted: &mut Vec<Order>) -> OrderOutcome {
    match validator.accept(&order) {
        Ok(()) => {
            accepted.push(order);
            OrderOutcome::executed(order)
        }
        Err(err) => {
            tracing::debug!(unit = %order.unit, side = %order.side, "order rejected: {}", err);
            OrderOutcome::rejected(order, &err)
        }
    }
}

/// A commander may only order its own side's units
fn commanded_by(side: Side, order: Order) -> Result<Order> {
    if order.side == side {
        Ok(order)
    } else {
        Err(MatchError::invalid_order(format!("{} commander cannot order {} units", side, order.side)))
    }
}

fn missing_unit(id: UnitId) -> MatchError {
    MatchError::InternalInvariantViolation(format!("accepted order names missing {}", id))
}

//! Orders and their validation against the pre-turn snapshot
//!
//! Every order of a turn is checked against the state as it stood when the
//! turn began, in submission order. Accepted moves reserve their destination
//! so two units can never be committed to the same cell, and because a
//! destination must have been empty at turn start, no unit can ever move
//! onto another unit's fallback cell.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::unit::Unit;
use crate::core::error::{MatchError, Result};
use crate::core::types::{RegionId, Side, UnitId};
use crate::grid::{Coord, Grid};

/// What a unit is told to do this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    MoveTo(Coord),
    Attack(RegionId),
    Hold,
    /// Spend part of the side's per-turn reinforcement budget on this unit
    Reinforce(u32),
}

/// An order for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub side: Side,
    pub unit: UnitId,
    pub action: OrderAction,
}

impl Order {
    pub fn new(side: Side, unit: UnitId, action: OrderAction) -> Self {
        Self { side, unit, action }
    }

    pub fn move_to(side: Side, unit: UnitId, destination: Coord) -> Self {
        Self::new(side, unit, OrderAction::MoveTo(destination))
    }

    pub fn attack(side: Side, unit: UnitId, region: RegionId) -> Self {
        Self::new(side, unit, OrderAction::Attack(region))
    }

    pub fn hold(side: Side, unit: UnitId) -> Self {
        Self::new(side, unit, OrderAction::Hold)
    }

    pub fn reinforce(side: Side, unit: UnitId, amount: u32) -> Self {
        Self::new(side, unit, OrderAction::Reinforce(amount))
    }
}

/// Whether an order was carried out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
    Executed,
    Rejected { reason: String },
}

/// An order together with what became of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub order: Order,
    pub status: OrderStatus,
}

impl OrderOutcome {
    pub fn executed(order: Order) -> Self {
        Self {
            order,
            status: OrderStatus::Executed,
        }
    }

    pub fn rejected(order: Order, error: &MatchError) -> Self {
        let reason = match error {
            MatchError::InvalidOrder(reason) => reason.clone(),
            other => other.to_string(),
        };
        Self {
            order,
            status: OrderStatus::Rejected { reason },
        }
    }

    pub fn is_executed(&self) -> bool {
        self.status == OrderStatus::Executed
    }
}

/// Checks a turn's orders against the pre-turn snapshot.
///
/// Holds the bookkeeping that makes one order depend on the ones accepted
/// before it: reserved destinations, units already ordered, and what is left
/// of each side's reinforcement budget.
#[derive(Debug)]
pub struct OrderValidator<'a> {
    grid: &'a Grid,
    units: &'a BTreeMap<UnitId, Unit>,
    reserved: ahash::AHashSet<Coord>,
    ordered: ahash::AHashSet<UnitId>,
    budget: [u32; 2],
}

impl<'a> OrderValidator<'a> {
    /// `budget` is each side's reinforcement allowance for the turn, indexed
    /// by `Side::index`
    pub fn new(grid: &'a Grid, units: &'a BTreeMap<UnitId, Unit>, budget: [u32; 2]) -> Self {
        Self {
            grid,
            units,
            reserved: ahash::AHashSet::new(),
            ordered: ahash::AHashSet::new(),
            budget,
        }
    }

    /// Reinforcement still available to a side
    pub fn remaining_budget(&self, side: Side) -> u32 {
        self.budget[side.index()]
    }

    /// Check an order without recording it
    pub fn check(&self, order: &Order) -> Result<()> {
        let unit = self.commanded_unit(order)?;

        if self.ordered.contains(&unit.id) {
            return Err(MatchError::invalid_order(format!("{} already has an order this turn", unit.id)));
        }

        match order.action {
            OrderAction::Hold => Ok(()),
            OrderAction::MoveTo(destination) => self.check_move(unit, destination),
            OrderAction::Attack(region) => self.check_attack(unit, region),
            OrderAction::Reinforce(amount) => self.check_reinforce(unit, amount),
        }
    }

    /// Check an order and, if it is legal, record its reservations
    pub fn accept(&mut self, order: &Order) -> Result<()> {
        self.check(order)?;

        self.ordered.insert(order.unit);
        match order.action {
            OrderAction::MoveTo(destination) => {
                self.reserved.insert(destination);
            }
            OrderAction::Reinforce(amount) => {
                self.budget[order.side.index()] -= amount;
            }
            OrderAction::Attack(_) | OrderAction::Hold => {}
        }
        Ok(())
    }

    fn commanded_unit(&self, order: &Order) -> Result<&'a Unit> {
        let Some(unit) = self.units.get(&order.unit).filter(|u| u.is_alive()) else {
            return Err(MatchError::invalid_order(format!("{} does not exist", order.unit)));
        };
        if unit.side != order.side {
            return Err(MatchError::invalid_order(format!("{} is not commanded by {}", unit.id, order.side)));
        }
        Ok(unit)
    }

    fn check_move(&self, unit: &Unit, destination: Coord) -> Result<()> {
        self.grid.check_move(unit, destination)?;

        if self.reserved.contains(&destination) {
            return Err(MatchError::invalid_order(format!(
                "{} is already the destination of another unit",
                destination
            )));
        }

        Ok(())
    }

    fn check_attack(&self, unit: &Unit, target: RegionId) -> Result<()> {
        let Some(region) = self.grid.region(target) else {
            return Err(MatchError::invalid_order(format!("{} does not exist", target)));
        };

        if !self.grid.can_reach_region(unit.position, target) {
            return Err(MatchError::invalid_order(format!(
                "{} at {} is neither in nor adjacent to {}",
                unit.id, unit.position, target
            )));
        }

        let enemy_present = region
            .cells
            .iter()
            .any(|c| self.grid.cell_at(*c).is_some_and(|cell| cell.is_enemy_of(unit.side)));
        if !enemy_present && region.is_owned_by(unit.side) {
            return Err(MatchError::invalid_order(format!(
                "{} is already held by {} and has no enemy to attack",
                target, unit.side
            )));
        }

        Ok(())
    }

    fn check_reinforce(&self, unit: &Unit, amount: u32) -> Result<()> {
        if amount == 0 {
            return Err(MatchError::invalid_order("reinforcement amount must be positive"));
        }

        let Some(region) = self.grid.region_of(unit.position) else {
            return Err(MatchError::invalid_order(format!("{} is off the grid", unit.id)));
        };
        let supplied = region.is_owned_by(unit.side)
            || region
                .neighbors
                .iter()
                .filter_map(|n| self.grid.region(*n))
                .any(|n| n.is_owned_by(unit.side));
        if !supplied {
            return Err(MatchError::invalid_order(format!(
                "{} is cut off from {} territory and cannot be reinforced",
                unit.id, unit.side
            )));
        }

        let remaining = self.remaining_budget(unit.side);
        if amount > remaining {
            return Err(MatchError::invalid_order(format!(
                "{} requested {} reinforcements but only {} remain this turn",
                unit.side, amount, remaining
            )));
        }

        Ok(())
    }
}

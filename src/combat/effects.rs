//! Merging combat outcomes and applying them to the match
//!
//! The merge is commutative: losses add up, and when two outcomes disagree
//! about a unit's fate the more severe one wins (destroyed over repelled
//! over advancing). The order outcomes are merged in never matters.

use std::collections::BTreeMap;

use super::resolution::CombatOutcome;
use crate::core::types::{RegionId, Side, UnitId};
use crate::forces::Unit;
use crate::grid::{Coord, Grid};

/// What happens to a unit after the fighting, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Fate {
    #[default]
    Stays,
    Advances(Coord),
    Repelled,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitEffect {
    pub losses: u32,
    pub fate: Fate,
}

/// Combined effect of every outcome of a turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatEffects {
    pub units: BTreeMap<UnitId, UnitEffect>,
    pub captures: BTreeMap<RegionId, Side>,
}

impl CombatEffects {
    pub fn merge<'a>(outcomes: impl IntoIterator<Item = &'a CombatOutcome>) -> Self {
        let mut effects = Self::default();
        for outcome in outcomes {
            effects.absorb(outcome);
        }
        effects
    }

    fn absorb(&mut self, outcome: &CombatOutcome) {
        for (id, loss) in &outcome.losses {
            self.units.entry(*id).or_default().losses += loss;
        }
        for id in &outcome.destroyed {
            self.escalate(*id, Fate::Destroyed);
        }
        for id in &outcome.repelled {
            self.escalate(*id, Fate::Repelled);
        }
        for (id, cell) in &outcome.advances {
            self.escalate(*id, Fate::Advances(*cell));
        }
        if let Some(side) = outcome.captured_by() {
            self.captures.insert(outcome.region, side);
        }
    }

    fn escalate(&mut self, id: UnitId, fate: Fate) {
        let effect = self.units.entry(id).or_default();
        effect.fate = effect.fate.max(fate);
    }

    /// Apply to the match state, returning the units eliminated.
    ///
    /// Losses and removals go first so that advancing units can step into
    /// cells vacated by destroyed defenders.
    pub fn apply(&self, grid: &mut Grid, units: &mut BTreeMap<UnitId, Unit>) -> Vec<UnitId> {
        let mut eliminated = Vec::new();

        for (id, effect) in &self.units {
            let Some(unit) = units.get_mut(id) else {
                continue;
            };
            let dead = unit.take_losses(effect.losses) || effect.fate == Fate::Destroyed;
            if dead {
                unit.strength = 0;
                grid.clear(unit);
                eliminated.push(*id);
            }
        }
        for id in &eliminated {
            units.remove(id);
        }

        for (id, effect) in &self.units {
            let Some(unit) = units.get_mut(id) else {
                continue;
            };
            match effect.fate {
                Fate::Advances(cell) => grid.relocate(unit, cell),
                Fate::Repelled => {
                    // A unit whose fallback cell was just lost to the enemy
                    // stays where it is
                    let origin = unit.origin;
                    let cut_off = grid
                        .region_of(origin)
                        .and_then(|r| self.captures.get(&r.id))
                        .is_some_and(|captor| *captor != unit.side);
                    if !cut_off {
                        grid.relocate(unit, origin);
                    }
                }
                Fate::Stays | Fate::Destroyed => {}
            }
        }

        for (region, side) in &self.captures {
            grid.set_owner(*region, Some(*side));
        }

        eliminated
    }
}

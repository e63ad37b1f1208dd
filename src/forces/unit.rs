//! Units - the pieces each side moves and fights with

use serde::{Deserialize, Serialize};

use crate::core::types::{Side, UnitId};
use crate::grid::Coord;

/// A fighting unit on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub side: Side,
    /// Removed from the match when this reaches zero
    pub strength: u32,
    pub position: Coord,
    /// Cells per turn
    pub movement: u32,
    /// Sight radius in cells
    pub visibility: u32,
    /// Where the unit stood when the current turn began; repelled attackers
    /// fall back here
    pub origin: Coord,
}

impl Unit {
    pub fn new(id: UnitId, side: Side, position: Coord, strength: u32, movement: u32, visibility: u32) -> Self {
        Self {
            id,
            side,
            strength,
            position,
            movement,
            visibility,
            origin: position,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.strength > 0
    }

    /// Subtract losses, returning true if the unit was eliminated
    pub fn take_losses(&mut self, losses: u32) -> bool {
        self.strength = self.strength.saturating_sub(losses);
        !self.is_alive()
    }

    pub fn reinforce(&mut self, amount: u32) {
        self.strength = self.strength.saturating_add(amount);
    }

    /// Mark the current position as this turn's fallback cell
    pub(crate) fn begin_turn(&mut self) {
        self.origin = self.position;
    }
}

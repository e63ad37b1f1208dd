//! A commander's view of the match
//!
//! Holds the full truth about the side's own units and regions, the static
//! map, and the signals delivered to the side. Nothing else about the enemy
//! is in here.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::types::{ContactId, RegionId, Side, Turn};
use crate::forces::Unit;
use crate::game::MatchState;
use crate::grid::{Coord, TerrainView};
use crate::intel::{Payload, Signal, Subject};

/// Fog-filtered decision context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelView {
    pub side: Side,
    pub turn: Turn,
    /// Own living units in id order
    pub units: Vec<Unit>,
    /// Regions owned by this side, ascending
    pub regions: Vec<RegionId>,
    /// Owned regions bordering territory this side does not own
    pub frontline: Vec<RegionId>,
    /// Reinforcement budget for the turn
    pub reinforcements: u32,
    pub terrain: TerrainView,
    pub signals: Vec<Signal>,
}

/// Newest report of each kind about one contact
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactPicture {
    pub position: Option<(Coord, Turn)>,
    pub strength: Option<(u32, Turn)>,
}

impl IntelView {
    /// Build `side`'s view from its briefing and its own share of the state
    pub fn new(side: Side, signals: Vec<Signal>, state: &MatchState) -> Self {
        Self {
            side,
            turn: state.turn(),
            units: state.units_of(side).cloned().collect(),
            regions: state.grid().regions_owned_by(side).map(|r| r.id).collect(),
            frontline: state.grid().frontline(side),
            reinforcements: state.reinforcement_budget(side),
            terrain: state.terrain().clone(),
            signals,
        }
    }

    pub fn owns(&self, region: RegionId) -> bool {
        self.regions.binary_search(&region).is_ok()
    }

    pub fn on_frontline(&self, region: RegionId) -> bool {
        self.frontline.binary_search(&region).is_ok()
    }

    pub fn own_unit_at(&self, coord: Coord) -> bool {
        self.units.iter().any(|u| u.position == coord)
    }

    /// Newest position and strength report per contact
    pub fn contacts(&self) -> BTreeMap<ContactId, ContactPicture> {
        let mut contacts: BTreeMap<ContactId, ContactPicture> = BTreeMap::new();

        for signal in &self.signals {
            let Subject::Contact(contact) = signal.subject() else {
                continue;
            };
            let entry = contacts.entry(contact).or_default();
            let turn = signal.observed_turn();
            match signal.payload() {
                Payload::Position(coord) => {
                    if entry.position.map_or(true, |(_, seen)| turn >= seen) {
                        entry.position = Some((coord, turn));
                    }
                }
                Payload::Strength(strength) => {
                    if entry.strength.map_or(true, |(_, seen)| turn >= seen) {
                        entry.strength = Some((strength, turn));
                    }
                }
                Payload::Ownership(_) => {}
            }
        }

        contacts
    }

    /// Newest ownership report per region
    pub fn region_reports(&self) -> BTreeMap<RegionId, (Option<Side>, Turn)> {
        let mut reports: BTreeMap<RegionId, (Option<Side>, Turn)> = BTreeMap::new();

        for signal in &self.signals {
            if let (Subject::Region(region), Payload::Ownership(owner)) = (signal.subject(), signal.payload()) {
                let turn = signal.observed_turn();
                let newer = reports.get(&region).map_or(true, |(_, seen)| turn >= *seen);
                if newer {
                    reports.insert(region, (owner, turn));
                }
            }
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MatchConfig, RegionLayout, SideConfig, UnitSpec};
    use crate::core::types::Controller;
    use crate::game::new_match;

    #[test]
    fn test_view_holds_own_side_only() {
        let config = MatchConfig::blank(4, 3)
            .with_regions(RegionLayout::Bands { count: 4 })
            .with_side(SideConfig::new(Side::Player, Controller::Human).with_unit(UnitSpec::new(3, 1, 6)))
            .with_side(
                SideConfig::new(Side::Enemy, Controller::Ai)
                    .with_unit(UnitSpec::new(0, 0, 4))
                    .with_unit(UnitSpec::new(1, 2, 4)),
            );
        let state = new_match(config).unwrap();
        let view = IntelView::new(Side::Enemy, state.briefing(Side::Enemy).to_vec(), &state);

        assert_eq!(view.units.iter().map(|u| u.id.0).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(view.regions, vec![RegionId(0), RegionId(1)]);
        assert_eq!(view.frontline, vec![RegionId(1)]);
        assert!(view.on_frontline(RegionId(1)));
        assert!(!view.on_frontline(RegionId(0)));
        assert!(view.own_unit_at(Coord::new(1, 2)));
        assert!(!view.own_unit_at(Coord::new(3, 1)));
    }
}

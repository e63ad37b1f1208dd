//! Heuristic commander
//!
//! Turns an `IntelView` into one order per unit. Each unit, in id order,
//! considers in turn:
//!
//! 1. attacking the weakest region it can strike, if the units already
//!    committed there plus itself meet the personality's required strength;
//! 2. holding, if nearby reported contacts make it feel threatened;
//! 3. stepping toward the nearest region its side does not own;
//! 4. holding.
//!
//! Reinforcements then go to the most threatened holding unit that is still
//! supplied, frontline units first when the need is equal.

use ahash::AHashSet;
use std::collections::{BTreeMap, BTreeSet};

use super::personality::AiPersonality;
use super::view::IntelView;
use crate::core::types::{RegionId, Side};
use crate::forces::{Order, OrderAction, OrderOutcome, Unit};
use crate::grid::Coord;

/// Contacts within this many cells count toward a unit's threat
const THREAT_RADIUS: u32 = 2;

/// Anything that can command a side from its intel view
pub trait Commander {
    fn generate_orders(&self, view: &IntelView) -> Vec<Order>;

    /// Replacement orders for the ones the engine rejected this turn.
    ///
    /// Called at most once per turn, with the rejection reasons. The
    /// default stands the affected units down.
    fn revise(&self, view: &IntelView, rejected: &[OrderOutcome]) -> Vec<Order> {
        rejected.iter().map(|outcome| Order::hold(view.side, outcome.order.unit)).collect()
    }
}

/// Personality-driven commander. Stateless: the same view always yields the
/// same orders.
#[derive(Debug, Clone, Default)]
pub struct HeuristicCommander {
    personality: AiPersonality,
}

/// Where the commander believes enemy strength is
struct Picture {
    /// Weighted strength per reported contact position
    contacts: Vec<(Coord, f64)>,
    /// Summed weighted contact strength per region
    region_strength: BTreeMap<RegionId, f64>,
    /// Newest reported owner per region
    owners: BTreeMap<RegionId, Option<Side>>,
}

impl Picture {
    fn build(view: &IntelView, personality: &AiPersonality) -> Self {
        let reports = view.contacts();
        let known: Vec<f64> = reports.values().filter_map(|c| c.strength).map(|(s, _)| s as f64).collect();
        let typical = if known.is_empty() {
            personality.unknown_region_strength
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };

        let mut contacts = Vec::new();
        let mut region_strength = BTreeMap::new();
        for report in reports.values() {
            let Some((position, _)) = report.position else {
                continue;
            };
            let weighted = match report.strength {
                Some((strength, seen)) => strength as f64 * personality.report_weight(view.turn.saturating_sub(seen)),
                None => typical,
            };
            contacts.push((position, weighted));
            if let Some(region) = view.terrain.region_at(position) {
                *region_strength.entry(region).or_insert(0.0) += weighted;
            }
        }

        let owners = view.region_reports().into_iter().map(|(r, (owner, _))| (r, owner)).collect();

        Self { contacts, region_strength, owners }
    }

    /// Estimated defence of `region`, terrain included
    fn defense(&self, view: &IntelView, region: RegionId, personality: &AiPersonality) -> f64 {
        let strength = match self.region_strength.get(&region) {
            Some(strength) => *strength,
            None => match self.owners.get(&region) {
                Some(None) => 0.0,
                Some(Some(owner)) if *owner == view.side => 0.0,
                _ => personality.unknown_region_strength,
            },
        };
        strength * (1.0 + view.terrain.region_defense(region))
    }

    fn threat_near(&self, coord: Coord) -> f64 {
        self.contacts
            .iter()
            .filter(|(position, _)| position.distance(&coord) <= THREAT_RADIUS)
            .map(|(_, strength)| strength)
            .sum()
    }

    fn has_contacts(&self, region: RegionId) -> bool {
        self.region_strength.contains_key(&region)
    }
}

impl HeuristicCommander {
    pub fn new(personality: AiPersonality) -> Self {
        Self { personality }
    }

    pub fn personality(&self) -> &AiPersonality {
        &self.personality
    }

    /// Regions `unit` could legally be ordered to attack, as far as it knows
    fn targets(&self, view: &IntelView, picture: &Picture, unit: &Unit) -> BTreeSet<RegionId> {
        std::iter::once(unit.position)
            .chain(unit.position.neighbors())
            .filter_map(|c| view.terrain.region_at(c))
            .filter(|r| !view.owns(*r) || picture.has_contacts(*r))
            .filter(|r| view.terrain.can_reach_region(unit.position, *r))
            .collect()
    }

    fn choose_attack(
        &self,
        view: &IntelView,
        picture: &Picture,
        unit: &Unit,
        committed: &BTreeMap<RegionId, f64>,
    ) -> Option<RegionId> {
        let mut candidates: Vec<(f64, RegionId)> = self
            .targets(view, picture, unit)
            .into_iter()
            .map(|r| (picture.defense(view, r, &self.personality), r))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        candidates.into_iter().find_map(|(defense, region)| {
            let force = committed.get(&region).copied().unwrap_or(0.0) + unit.strength as f64;
            (force >= self.personality.required_strength(defense)).then_some(region)
        })
    }

    /// Best single move toward unowned territory, if any step gets closer
    fn choose_advance(
        &self,
        view: &IntelView,
        picture: &Picture,
        unit: &Unit,
        reserved: &AHashSet<Coord>,
    ) -> Option<Coord> {
        let goals: Vec<Coord> = (0..view.terrain.region_count() as u32)
            .map(RegionId)
            .filter(|r| !view.owns(*r))
            .flat_map(|r| view.terrain.region_cells(r).iter().copied())
            .filter(|c| view.terrain.is_passable(*c))
            .collect();
        let gap = |from: Coord| goals.iter().map(|g| g.distance(&from)).min();
        let current = gap(unit.position)?;

        let blocked: AHashSet<Coord> = picture.contacts.iter().map(|(c, _)| *c).collect();
        view.terrain
            .reachable_cells(unit.position, unit.movement, &blocked)
            .into_iter()
            .filter(|c| !reserved.contains(c) && !view.own_unit_at(*c))
            .filter(|c| view.terrain.region_at(*c).is_some_and(|r| !picture.has_contacts(r)))
            .filter_map(|c| gap(c).map(|d| (d, c)))
            .filter(|(d, _)| *d < current)
            .min()
            .map(|(_, c)| c)
    }

    /// Is the unit's region owned, or next to an owned region?
    fn is_supplied(&self, view: &IntelView, unit: &Unit) -> bool {
        view.terrain.region_at(unit.position).is_some_and(|region| {
            view.owns(region) || view.terrain.region_neighbors(region).iter().any(|n| view.owns(*n))
        })
    }
}

impl Commander for HeuristicCommander {
    fn generate_orders(&self, view: &IntelView) -> Vec<Order> {
        let picture = Picture::build(view, &self.personality);
        let mut committed: BTreeMap<RegionId, f64> = BTreeMap::new();
        let mut reserved: AHashSet<Coord> = AHashSet::new();
        let mut orders = Vec::with_capacity(view.units.len());

        for unit in &view.units {
            let threat = picture.threat_near(unit.position);

            let action = if let Some(region) = self.choose_attack(view, &picture, unit, &committed) {
                *committed.entry(region).or_insert(0.0) += unit.strength as f64;
                OrderAction::Attack(region)
            } else if self.personality.feels_threatened(unit.strength as f64, threat) {
                OrderAction::Hold
            } else if let Some(destination) = self.choose_advance(view, &picture, unit, &reserved) {
                reserved.insert(destination);
                OrderAction::MoveTo(destination)
            } else {
                OrderAction::Hold
            };

            orders.push(Order::new(view.side, unit.id, action));
        }

        if view.reinforcements > 0 {
            let neediest = view
                .units
                .iter()
                .zip(&orders)
                .enumerate()
                .filter(|(_, (unit, order))| order.action == OrderAction::Hold && self.is_supplied(view, unit))
                .map(|(index, (unit, _))| {
                    let need = picture.threat_near(unit.position) - unit.strength as f64;
                    let front = view.terrain.region_at(unit.position).is_some_and(|r| view.on_frontline(r));
                    (need, front, index)
                })
                .max_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(b.2.cmp(&a.2)));

            if let Some((_, _, index)) = neediest {
                orders[index].action = OrderAction::Reinforce(view.reinforcements);
            }
        }

        tracing::debug!(side = %view.side, turn = view.turn, orders = orders.len(), "commander issued orders");
        orders
    }
}

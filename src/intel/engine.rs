//! Signal synthesis
//!
//! Produces each side's briefing from the state at the start of a turn.
//! Enemy units and regions in sight yield accurate reports and refresh the
//! ledger. Everything else is an eligible report: it may be fabricated
//! (with the opponent's deception rate), otherwise it falls back to the
//! last-known sighting while that is within the staleness window, and
//! otherwise it produces nothing.
//!
//! Out-of-sight unit reports cover only contacts the observer remembers,
//! plus up to `phantom_contacts` invented ones. The true roster of hidden
//! units never decides how many contacts appear. Fabricated payloads are
//! built only from what the observer already knows: its ledger, its own
//! forces and the static map.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};

use super::ledger::{IntelLedger, UnitSighting};
use super::signal::{Payload, Report, Signal, Subject};
use super::visibility::{is_detected, SideVisibility};
use crate::core::config::MatchConfig;
use crate::core::rng::{MatchRng, Stream};
use crate::core::types::{ContactId, Side, Turn, UnitId};
use crate::forces::Unit;
use crate::grid::{Coord, Grid};

/// Fabricated positions stay this close to the last-known one when there is
/// one
const FABRICATION_DRIFT: u32 = 2;

/// Fabricated strengths vary by up to this fraction around their base
const FABRICATION_SPREAD: f64 = 0.5;

/// Strength assumed for a fabricated contact when nothing better is known
const FALLBACK_STRENGTH: f64 = 10.0;

const UNIT_SUBJECT: u64 = 1;
const REGION_SUBJECT: u64 = 2;
const PHANTOM_SUBJECT: u64 = 3;

/// Briefing generator for one turn
pub struct IntelEngine<'a> {
    grid: &'a Grid,
    units: &'a BTreeMap<UnitId, Unit>,
    config: &'a MatchConfig,
    rng: MatchRng,
    turn: Turn,
}

/// Facts the observer may draw on when making things up
struct OwnKnowledge {
    /// Passable cells outside the observer's sight and not held by its own
    /// units
    decoy_cells: Vec<Coord>,
    /// Every passable cell is in sight, so nothing can hide
    fully_observed: bool,
    mean_own_strength: f64,
}

#[derive(Debug, Default)]
struct Tally {
    accurate: usize,
    stale: usize,
    fabricated: usize,
}

impl Tally {
    fn count(&mut self, signals: &[Signal]) {
        for signal in signals {
            if signal.is_fabricated() {
                self.fabricated += 1;
            } else if signal.is_stale() {
                self.stale += 1;
            } else {
                self.accurate += 1;
            }
        }
    }
}

impl<'a> IntelEngine<'a> {
    /// `turn` is the turn the briefing is for; accurate reports carry it
    pub fn new(
        grid: &'a Grid,
        units: &'a BTreeMap<UnitId, Unit>,
        config: &'a MatchConfig,
        rng: MatchRng,
        turn: Turn,
    ) -> Self {
        Self {
            grid,
            units,
            config,
            rng,
            turn,
        }
    }

    /// Build `observer`'s briefing, updating its ledger
    pub fn briefing(&self, observer: Side, ledger: &mut IntelLedger) -> Vec<Signal> {
        let window = self.config.staleness_window;
        let purged = ledger.purge(self.turn, window);

        let visibility = SideVisibility::calculate(
            self.grid,
            observer,
            self.units.values(),
            self.config.intel.blocking_attenuation,
        );
        let own = self.own_knowledge(observer, &visibility);

        let mut signals = Vec::new();
        self.unit_reports(observer, &visibility, &own, ledger, &mut signals);
        self.region_reports(observer, &visibility, ledger, &mut signals);

        let mut tally = Tally::default();
        tally.count(&signals);
        tracing::debug!(
            "Briefing for {} on turn {}: {} accurate, {} stale, {} fabricated ({} ledger entries expired)",
            observer,
            self.turn,
            tally.accurate,
            tally.stale,
            tally.fabricated,
            purged
        );

        signals
    }

    fn own_knowledge(&self, observer: Side, visibility: &SideVisibility) -> OwnKnowledge {
        let own: Vec<&Unit> = self
            .units
            .values()
            .filter(|u| u.side == observer && u.is_alive())
            .collect();
        let own_cells: ahash::AHashSet<Coord> = own.iter().map(|u| u.position).collect();

        let passable = || {
            self.grid
                .cells()
                .iter()
                .filter(|c| c.terrain.is_passable() && !own_cells.contains(&c.coord))
                .map(|c| c.coord)
        };
        let mut decoy_cells: Vec<Coord> = passable().filter(|c| !visibility.is_visible(*c)).collect();
        let fully_observed = decoy_cells.is_empty();
        if fully_observed {
            decoy_cells = passable().collect();
        }

        let mean_own_strength = if own.is_empty() {
            FALLBACK_STRENGTH
        } else {
            own.iter().map(|u| f64::from(u.strength)).sum::<f64>() / own.len() as f64
        };

        OwnKnowledge {
            decoy_cells,
            fully_observed,
            mean_own_strength,
        }
    }

    fn unit_reports(
        &self,
        observer: Side,
        visibility: &SideVisibility,
        own: &OwnKnowledge,
        ledger: &mut IntelLedger,
        signals: &mut Vec<Signal>,
    ) {
        let enemy = observer.opponent();
        let rate = self.config.deception_against(observer);
        let window = self.config.staleness_window;

        let mut sighted = BTreeSet::new();
        for unit in self.units.values().filter(|u| u.side == enemy && u.is_alive()) {
            if visibility.is_visible(unit.position) && self.detect(observer, unit) {
                let sighting = ledger.record_unit(unit.id, unit.position, unit.strength, self.turn);
                let subject = Subject::Contact(sighting.contact);
                signals.push(Signal::accurate(self.report(subject, Payload::Position(unit.position))));
                signals.push(Signal::accurate(self.report(subject, Payload::Strength(unit.strength))));
                sighted.insert(unit.id);
            }
        }

        // Out of sight, only remembered contacts and invented ones are
        // reported on. Whether a remembered unit still lives plays no part.
        let remembered: Vec<UnitId> = ledger.remembered().filter(|id| !sighted.contains(id)).collect();
        for id in remembered {
            let Some(last) = ledger.last_unit(id).copied() else {
                continue;
            };

            // Looking at the remembered spot and finding nothing ends the trail
            let trail_cold = last.seen < self.turn && visibility.is_visible(last.position);
            if trail_cold {
                ledger.forget_unit(id);
            }

            let mut rng = self.rng.stream(
                Stream::Deception,
                self.turn,
                subject_key(observer, UNIT_SUBJECT, last.contact.0),
            );
            if rng.gen_bool(rate) {
                let anchor = (!trail_cold).then_some(last);
                self.fabricate_contact(last.contact, anchor, own, ledger, &mut rng, signals);
            } else if !trail_cold && self.turn.saturating_sub(last.seen) <= window {
                let subject = Subject::Contact(last.contact);
                signals.push(Signal::stale(Report {
                    subject,
                    payload: Payload::Position(last.position),
                    observed_turn: last.seen,
                }));
                signals.push(Signal::stale(Report {
                    subject,
                    payload: Payload::Strength(last.strength),
                    observed_turn: last.seen,
                }));
            }
        }

        if own.fully_observed {
            return;
        }
        for slot in 0..self.config.intel.phantom_contacts {
            let mut rng = self.rng.stream(Stream::Deception, self.turn, subject_key(observer, PHANTOM_SUBJECT, slot));
            if rng.gen_bool(rate) {
                let contact = ledger.phantom_contact(slot);
                self.fabricate_contact(contact, None, own, ledger, &mut rng, signals);
            }
        }
    }

    /// Invent a position and strength for `contact`, near its last sighting
    /// when there is one
    fn fabricate_contact(
        &self,
        contact: ContactId,
        anchor: Option<UnitSighting>,
        own: &OwnKnowledge,
        ledger: &IntelLedger,
        rng: &mut ChaCha8Rng,
        signals: &mut Vec<Signal>,
    ) {
        let position = self.fabricate_position(anchor.map(|s| s.position), own, rng);
        let base = anchor
            .map(|s| f64::from(s.strength))
            .or_else(|| ledger.mean_known_strength())
            .unwrap_or(own.mean_own_strength);
        let strength = fabricate_strength(base, rng);
        let observed_turn = self.plausible_turn(rng);

        let subject = Subject::Contact(contact);
        if let Some(position) = position {
            signals.push(Signal::fabricated(Report {
                subject,
                payload: Payload::Position(position),
                observed_turn,
            }));
        }
        signals.push(Signal::fabricated(Report {
            subject,
            payload: Payload::Strength(strength),
            observed_turn,
        }));
    }

    fn region_reports(
        &self,
        observer: Side,
        visibility: &SideVisibility,
        ledger: &mut IntelLedger,
        signals: &mut Vec<Signal>,
    ) {
        let rate = self.config.deception_against(observer);
        let window = self.config.staleness_window;

        for region in self.grid.regions().iter().filter(|r| !r.is_owned_by(observer)) {
            let subject = Subject::Region(region.id);

            if visibility.sees_region(region) {
                ledger.record_region(region.id, region.owner, self.turn);
                signals.push(Signal::accurate(self.report(subject, Payload::Ownership(region.owner))));
                continue;
            }

            let mut rng = self.rng.stream(
                Stream::Deception,
                self.turn,
                subject_key(observer, REGION_SUBJECT, region.id.0),
            );
            if rng.gen_bool(rate) {
                let remembered = ledger.last_region(region.id).map(|s| s.owner);
                let owner = fabricate_owner(observer, remembered, &mut rng);
                let observed_turn = self.plausible_turn(&mut rng);
                signals.push(Signal::fabricated(Report {
                    subject,
                    payload: Payload::Ownership(owner),
                    observed_turn,
                }));
            } else if let Some(last) = ledger.last_region(region.id) {
                if self.turn.saturating_sub(last.seen) <= window {
                    signals.push(Signal::stale(Report {
                        subject,
                        payload: Payload::Ownership(last.owner),
                        observed_turn: last.seen,
                    }));
                }
            }
        }
    }

    fn detect(&self, observer: Side, unit: &Unit) -> bool {
        let Some(cell) = self.grid.cell_at(unit.position) else {
            return false;
        };
        let mut rng = self
            .rng
            .stream(Stream::Detection, self.turn, subject_key(observer, UNIT_SUBJECT, unit.id.0));
        is_detected(cell.terrain, self.config.intel.cover_detection, &mut rng)
    }

    fn report(&self, subject: Subject, payload: Payload) -> Report {
        Report {
            subject,
            payload,
            observed_turn: self.turn,
        }
    }

    /// A timestamp somewhere inside the staleness window
    fn plausible_turn(&self, rng: &mut ChaCha8Rng) -> Turn {
        let earliest = self.turn.saturating_sub(self.config.staleness_window).max(1).min(self.turn);
        rng.gen_range(earliest..=self.turn)
    }

    fn fabricate_position(&self, last: Option<Coord>, own: &OwnKnowledge, rng: &mut ChaCha8Rng) -> Option<Coord> {
        if let Some(anchor) = last {
            let nearby: Vec<Coord> = own
                .decoy_cells
                .iter()
                .copied()
                .filter(|c| *c != anchor && c.distance(&anchor) <= FABRICATION_DRIFT)
                .collect();
            if let Some(position) = nearby.choose(rng) {
                return Some(*position);
            }
        }
        own.decoy_cells.choose(rng).copied()
    }
}

fn fabricate_strength(base: f64, rng: &mut ChaCha8Rng) -> u32 {
    let factor = rng.gen_range((1.0 - FABRICATION_SPREAD)..=(1.0 + FABRICATION_SPREAD));
    ((base * factor).round() as u32).max(1)
}

/// An owner the observer does not hold, preferring one that contradicts
/// what it last saw
fn fabricate_owner(observer: Side, remembered: Option<Option<Side>>, rng: &mut ChaCha8Rng) -> Option<Side> {
    let candidates = [None, Some(observer.opponent())];
    match remembered {
        Some(seen) => candidates.into_iter().find(|c| *c != seen).unwrap_or(None),
        None => candidates[rng.gen_range(0..candidates.len())],
    }
}

/// Stream key for one (observer, subject) pair
fn subject_key(observer: Side, kind: u64, id: u32) -> u64 {
    ((observer.index() as u64) << 40) | (kind << 32) | u64::from(id)
}

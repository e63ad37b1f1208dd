//! Last-known intel kept by each side
//!
//! The ledger remembers the most recent confirmed sighting of every enemy
//! unit and region a side has observed. Entries older than the staleness
//! window are purged; after that the subject decays into silence until it
//! is seen again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{ContactId, RegionId, Side, Turn, UnitId};
use crate::grid::Coord;

/// Confirmed sighting of an enemy unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSighting {
    pub contact: ContactId,
    pub position: Coord,
    pub strength: u32,
    pub seen: Turn,
}

/// Confirmed observation of a region's owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSighting {
    pub owner: Option<Side>,
    pub seen: Turn,
}

/// One side's memory of the enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelLedger {
    pub observer: Side,
    /// Real unit id to this observer's tracking number. Never leaves the
    /// engine.
    contacts: BTreeMap<UnitId, ContactId>,
    /// Tracking numbers handed to invented contacts, by slot
    phantoms: BTreeMap<u32, ContactId>,
    next_contact: u32,
    units: BTreeMap<UnitId, UnitSighting>,
    regions: BTreeMap<RegionId, RegionSighting>,
}

impl IntelLedger {
    pub fn new(observer: Side) -> Self {
        Self {
            observer,
            contacts: BTreeMap::new(),
            phantoms: BTreeMap::new(),
            next_contact: 1,
            units: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }

    /// Tracking number for an enemy unit, assigned on first mention
    pub fn contact_for(&mut self, unit: UnitId) -> ContactId {
        if let Some(contact) = self.contacts.get(&unit) {
            return *contact;
        }
        let contact = ContactId(self.next_contact);
        self.next_contact += 1;
        self.contacts.insert(unit, contact);
        contact
    }

    /// Tracking number for invented contact `slot`, drawn from the same
    /// sequence as real ones so the two cannot be told apart
    pub fn phantom_contact(&mut self, slot: u32) -> ContactId {
        if let Some(contact) = self.phantoms.get(&slot) {
            return *contact;
        }
        let contact = ContactId(self.next_contact);
        self.next_contact += 1;
        self.phantoms.insert(slot, contact);
        contact
    }

    pub fn record_unit(&mut self, unit: UnitId, position: Coord, strength: u32, seen: Turn) -> UnitSighting {
        let contact = self.contact_for(unit);
        let sighting = UnitSighting {
            contact,
            position,
            strength,
            seen,
        };
        self.units.insert(unit, sighting);
        sighting
    }

    pub fn record_region(&mut self, region: RegionId, owner: Option<Side>, seen: Turn) {
        self.regions.insert(region, RegionSighting { owner, seen });
    }

    pub fn last_unit(&self, unit: UnitId) -> Option<&UnitSighting> {
        self.units.get(&unit)
    }

    pub fn last_region(&self, region: RegionId) -> Option<&RegionSighting> {
        self.regions.get(&region)
    }

    /// Units with a sighting on file, in id order
    pub fn remembered(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.keys().copied()
    }

    /// Drop the sighting of a unit known to be gone
    pub fn forget_unit(&mut self, unit: UnitId) {
        self.units.remove(&unit);
    }

    /// Mean remembered enemy strength, if anything is remembered
    pub fn mean_known_strength(&self) -> Option<f64> {
        if self.units.is_empty() {
            return None;
        }
        let total: u64 = self.units.values().map(|s| u64::from(s.strength)).sum();
        Some(total as f64 / self.units.len() as f64)
    }

    /// Remove every entry more than `window` turns older than `now`
    pub fn purge(&mut self, now: Turn, window: u32) -> usize {
        let before = self.units.len() + self.regions.len();
        self.units.retain(|_, s| now.saturating_sub(s.seen) <= window);
        self.regions.retain(|_, s| now.saturating_sub(s.seen) <= window);
        before - (self.units.len() + self.regions.len())
    }
}

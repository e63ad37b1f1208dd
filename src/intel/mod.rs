//! Fog of war and intelligence
//!
//! Each side sees only what its units can see. Everything else reaches it
//! as signals, which may be accurate, stale or fabricated. Which of the
//! three a signal is stays inside this module.

pub mod engine;
pub mod ledger;
pub mod signal;
pub mod visibility;

pub use engine::IntelEngine;
pub use ledger::{IntelLedger, RegionSighting, UnitSighting};
pub use signal::{Payload, Report, Signal, SignalKind, Subject};
pub use visibility::{sight_cost, SideVisibility};

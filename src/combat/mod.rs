//! Combat: finding contested regions, resolving them, applying results

pub mod effects;
pub mod engagement;
pub mod resolution;

pub use effects::{CombatEffects, Fate, UnitEffect};
pub use engagement::{detect_engagements, Engagement};
pub use resolution::{resolve, resolve_all, CombatContext, CombatOutcome, CombatResult};

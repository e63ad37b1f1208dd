//! Enemy AI: commanders that decide from signals alone
//!
//! Architecture: Trait + Data hybrid
//! - `Commander` trait defines the interface for swappable implementations
//! - `AiPersonality` holds TOML-loaded weights
//! - `IntelView` provides the fog-of-war-filtered match state

pub mod commander;
pub mod personality;
pub mod view;

pub use commander::{Commander, HeuristicCommander};
pub use personality::{load_personality, AiPersonality};
pub use view::{ContactPicture, IntelView};

use crate::core::types::Side;
use crate::forces::Order;
use crate::game::MatchState;
use crate::intel::Signal;

/// Orders for `side` from its configured personality.
///
/// `state` contributes only `side`'s own units, regions and budget plus the
/// static map; everything known about the opponent comes from `signals`.
pub fn generate_orders(side: Side, signals: &[Signal], state: &MatchState) -> Vec<Order> {
    let view = IntelView::new(side, signals.to_vec(), state);
    let personality = state.config().side(side).map(|s| s.personality.clone()).unwrap_or_default();
    HeuristicCommander::new(personality).generate_orders(&view)
}

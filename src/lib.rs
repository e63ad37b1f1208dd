//! Signal Front - fog-of-war tactical rules engine
//!
//! Two sides fight over a grid of regions. Each side sees only what its
//! units can see; everything else reaches it as signals that may be
//! accurate, stale or fabricated. The engine covers the grid, intel
//! generation, combat resolution, an AI that reads the same signals a
//! player would, and the turn pipeline tying them together.

pub mod ai;
pub mod combat;
pub mod core;
pub mod forces;
pub mod game;
pub mod grid;
pub mod intel;

pub use crate::ai::{generate_orders, AiPersonality, Commander, HeuristicCommander, IntelView};
pub use crate::core::{
    Controller, GridSize, MatchConfig, MatchError, Objective, RegionId, RegionLayout, Result, Side, SideConfig,
    TerrainPatch, UnitId, UnitSpec,
};
pub use crate::forces::{Order, OrderAction, OrderOutcome, OrderStatus};
pub use crate::game::{is_terminal, new_match, winner, MatchOutcome, MatchState, TurnReport};
pub use crate::intel::{Payload, Signal, SignalKind, Subject};

pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use config::{
    CombatConfig, GridSize, IntelConfig, MatchConfig, Objective, RegionLayout, RegionSpec, SideConfig,
    TerrainPatch, UnitSpec,
};
pub use error::{MatchError, Result};
pub use rng::{MatchRng, Stream};
pub use types::{ContactId, Controller, RegionId, Side, Turn, UnitId};

//! Match configuration with documented defaults
//!
//! A match is fully described by a `MatchConfig`: grid size, region layout,
//! terrain, both sides' starting forces, the intel/deception policy, combat
//! tuning and the seed. Configs deserialize from TOML; every field except
//! `sides` has a default so small files stay small.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::{MatchError, Result};
use super::types::{Controller, Side};
use crate::ai::AiPersonality;
use crate::grid::Terrain;

/// Grid dimensions in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// How cells are grouped into regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum RegionLayout {
    /// The whole grid is one region
    Single,
    /// `count` horizontal bands of (nearly) equal height
    Bands { count: u32 },
    /// Rectangular tiles of `rows` x `cols` cells; 1x1 gives a region per cell
    Blocks { rows: u32, cols: u32 },
    /// Named regions listed cell by cell
    Explicit { regions: Vec<RegionSpec> },
}

/// One region of an explicit layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    /// `[row, col]` pairs; must be contiguous under 4-adjacency
    pub cells: Vec<[i32; 2]>,
    /// Starting owner; when absent ownership follows the starting units
    #[serde(default)]
    pub owner: Option<Side>,
}

/// Rectangle of non-default terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainPatch {
    pub kind: Terrain,
    pub row: i32,
    pub col: i32,
    #[serde(default = "one")]
    pub rows: u32,
    #[serde(default = "one")]
    pub cols: u32,
}

fn one() -> u32 {
    1
}

/// Starting unit placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub row: i32,
    pub col: i32,
    pub strength: u32,
    /// Cells per turn
    #[serde(default = "default_movement")]
    pub movement: u32,
    /// Sight radius in cells
    #[serde(default = "default_visibility")]
    pub visibility: u32,
}

fn default_movement() -> u32 {
    1
}

fn default_visibility() -> u32 {
    2
}

impl UnitSpec {
    pub fn new(row: i32, col: i32, strength: u32) -> Self {
        Self {
            row,
            col,
            strength,
            movement: default_movement(),
            visibility: default_visibility(),
        }
    }

    pub fn with_movement(mut self, movement: u32) -> Self {
        self.movement = movement;
        self
    }

    pub fn with_visibility(mut self, visibility: u32) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Per-side setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideConfig {
    pub side: Side,
    #[serde(default)]
    pub controller: Controller,
    /// Strength this side may add to its units each turn
    #[serde(default)]
    pub reinforcements: u32,
    /// This side's deception capability: the fabrication rate applied to
    /// the reports its opponent receives. Falls back to the match-wide rate.
    #[serde(default)]
    pub deception_rate: Option<f64>,
    /// Commander personality, used when `controller` is `Ai`
    #[serde(default)]
    pub personality: AiPersonality,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
}

impl SideConfig {
    pub fn new(side: Side, controller: Controller) -> Self {
        Self {
            side,
            controller,
            reinforcements: 0,
            deception_rate: None,
            personality: AiPersonality::default(),
            units: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: UnitSpec) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_reinforcements(mut self, per_turn: u32) -> Self {
        self.reinforcements = per_turn;
        self
    }

    pub fn with_deception_rate(mut self, rate: f64) -> Self {
        self.deception_rate = Some(rate);
        self
    }

    pub fn with_personality(mut self, personality: AiPersonality) -> Self {
        self.personality = personality;
        self
    }
}

/// Conditions a side must keep satisfied; failing one loses the match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Objective {
    /// Lost when the opponent owns the region containing this cell
    HoldRegionAt { side: Side, row: i32, col: i32 },
    /// Lost when the side owns fewer than `regions` regions
    HoldAtLeast { side: Side, regions: u32 },
}

impl Objective {
    pub fn side(&self) -> Side {
        match self {
            Self::HoldRegionAt { side, .. } | Self::HoldAtLeast { side, .. } => *side,
        }
    }
}

/// Sight and detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelConfig {
    /// Extra distance charged for every blocking cell a sight line crosses
    pub blocking_attenuation: u32,
    /// Probability that a visible enemy standing in cover is detected
    pub cover_detection: f64,
    /// Invented contacts a briefing may carry on top of the remembered
    /// ones; each slot is filled with the deception rate
    pub phantom_contacts: u32,
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            blocking_attenuation: 2,
            cover_detection: 0.5,
            phantom_contacts: 2,
        }
    }
}

/// Combat resolution tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Relative half-width of the draw band around equal strength
    ///
    /// The attacker wins above `d * (1 + margin)`, the defender repels below
    /// `d * (1 - margin)`; everything in between (equality included) is a
    /// stalemate in which the defender holds.
    pub margin: f64,
    /// Fraction of each unit's strength lost in a stalemate (rounded up)
    pub draw_loss_rate: f64,
    /// Half-width of the seeded attacker roll; 0.0 makes combat fully
    /// deterministic
    pub variance: f64,
    /// Minimum engagement count before resolution runs on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            margin: 0.25,
            draw_loss_rate: 0.2,
            variance: 0.0,
            parallel_threshold: 8,
        }
    }
}

/// Complete match configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub grid_size: GridSize,
    pub regions: RegionLayout,
    pub terrain: Vec<TerrainPatch>,
    pub sides: Vec<SideConfig>,
    /// Probability of fabricating each eligible out-of-sight report
    pub deception_rate: f64,
    /// Turns a last-known report stays deliverable before it is suppressed
    pub staleness_window: u32,
    pub seed: u64,
    /// Turns played before the match ends on region count
    pub turn_limit: u32,
    pub objectives: Vec<Objective>,
    pub intel: IntelConfig,
    pub combat: CombatConfig,
}

/// Grid edge length of the default skirmish
const DEFAULT_SIZE: u32 = 5;
const DEFAULT_ENEMY_TOTAL: u32 = 100;
const DEFAULT_PLAYER_TOTAL: u32 = 80;
const DEFAULT_REINFORCEMENTS: u32 = 10;

impl Default for MatchConfig {
    /// The classic skirmish: a 5x5 grid with one region per cell, the enemy
    /// along the top row, the player along the bottom row, forces weighted
    /// toward the flanks, and the player defending the centre.
    fn default() -> Self {
        let size = DEFAULT_SIZE;
        let center = (size / 2) as i32;
        let weights: Vec<u32> = (0..size as i32).map(|col| 1 + (col - center).unsigned_abs()).collect();

        let deploy = |row: i32, total: u32| -> Vec<UnitSpec> {
            weighted_split(total, &weights)
                .into_iter()
                .enumerate()
                .filter(|(_, strength)| *strength > 0)
                .map(|(col, strength)| UnitSpec::new(row, col as i32, strength))
                .collect()
        };

        let mut enemy = SideConfig::new(Side::Enemy, Controller::Ai)
            .with_reinforcements(DEFAULT_REINFORCEMENTS);
        enemy.units = deploy(0, DEFAULT_ENEMY_TOTAL);

        let mut player = SideConfig::new(Side::Player, Controller::Human)
            .with_reinforcements(DEFAULT_REINFORCEMENTS);
        player.units = deploy(size as i32 - 1, DEFAULT_PLAYER_TOTAL);

        Self {
            grid_size: GridSize::new(size, size),
            regions: RegionLayout::Blocks { rows: 1, cols: 1 },
            terrain: Vec::new(),
            sides: vec![player, enemy],
            deception_rate: 0.2,
            staleness_window: 3,
            seed: 42,
            turn_limit: 20,
            objectives: vec![
                Objective::HoldRegionAt { side: Side::Player, row: center, col: center },
                Objective::HoldAtLeast { side: Side::Player, regions: 4 },
            ],
            intel: IntelConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Create the default skirmish configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty single-region grid with no forces and no objectives.
    ///
    /// Starting point for hand-built scenarios.
    pub fn blank(rows: u32, cols: u32) -> Self {
        Self {
            grid_size: GridSize::new(rows, cols),
            regions: RegionLayout::Single,
            terrain: Vec::new(),
            sides: vec![
                SideConfig::new(Side::Player, Controller::Human),
                SideConfig::new(Side::Enemy, Controller::Human),
            ],
            objectives: Vec::new(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: MatchConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_regions(mut self, layout: RegionLayout) -> Self {
        self.regions = layout;
        self
    }

    pub fn with_terrain(mut self, patch: TerrainPatch) -> Self {
        self.terrain.push(patch);
        self
    }

    pub fn with_deception_rate(mut self, rate: f64) -> Self {
        self.deception_rate = rate;
        self
    }

    pub fn with_staleness_window(mut self, turns: u32) -> Self {
        self.staleness_window = turns;
        self
    }

    pub fn with_turn_limit(mut self, turns: u32) -> Self {
        self.turn_limit = turns;
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objectives.push(objective);
        self
    }

    /// Replace the setup of one side
    pub fn with_side(mut self, side_config: SideConfig) -> Self {
        self.sides.retain(|s| s.side != side_config.side);
        self.sides.push(side_config);
        self.sides.sort_by_key(|s| s.side);
        self
    }

    /// Setup of one side
    pub fn side(&self, side: Side) -> Option<&SideConfig> {
        self.sides.iter().find(|s| s.side == side)
    }

    /// Fabrication rate for reports delivered to `observer`
    pub fn deception_against(&self, observer: Side) -> f64 {
        self.side(observer.opponent())
            .and_then(|s| s.deception_rate)
            .unwrap_or(self.deception_rate)
    }

    /// Validate scalar settings and side setup.
    ///
    /// Spatial checks (layout coverage, terrain bounds, unit placement) are
    /// made when the grid is built, still before any turn runs.
    pub fn validate(&self) -> Result<()> {
        let GridSize { rows, cols } = self.grid_size;
        if rows == 0 || cols == 0 {
            return Err(MatchError::config(format!("grid_size must be positive, got {}x{}", rows, cols)));
        }

        check_probability("deception_rate", self.deception_rate)?;
        check_probability("intel.cover_detection", self.intel.cover_detection)?;
        check_probability("combat.draw_loss_rate", self.combat.draw_loss_rate)?;

        if !(0.0..1.0).contains(&self.combat.margin) {
            return Err(MatchError::config(format!(
                "combat.margin must be in [0, 1), got {}",
                self.combat.margin
            )));
        }
        if !(0.0..1.0).contains(&self.combat.variance) {
            return Err(MatchError::config(format!(
                "combat.variance must be in [0, 1), got {}",
                self.combat.variance
            )));
        }

        if self.turn_limit == 0 {
            return Err(MatchError::config("turn_limit must be at least 1"));
        }

        match &self.regions {
            RegionLayout::Bands { count } if *count == 0 || *count > rows => {
                return Err(MatchError::config(format!(
                    "bands layout needs 1..={} bands, got {}",
                    rows, count
                )));
            }
            RegionLayout::Blocks { rows: r, cols: c } if *r == 0 || *c == 0 => {
                return Err(MatchError::config("blocks layout needs non-zero block size"));
            }
            RegionLayout::Explicit { regions } if regions.is_empty() => {
                return Err(MatchError::config("explicit layout lists no regions"));
            }
            _ => {}
        }

        for side in Side::ALL {
            let count = self.sides.iter().filter(|s| s.side == side).count();
            if count != 1 {
                return Err(MatchError::config(format!(
                    "expected exactly one setup for side {}, found {}",
                    side, count
                )));
            }
        }

        for side_config in &self.sides {
            if let Some(rate) = side_config.deception_rate {
                check_probability(&format!("{}.deception_rate", side_config.side), rate)?;
            }
            for (i, unit) in side_config.units.iter().enumerate() {
                if unit.strength == 0 {
                    return Err(MatchError::config(format!(
                        "{} unit #{} has zero strength",
                        side_config.side, i
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MatchError::config(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

/// Split `total` proportionally to `weights`.
///
/// Floors every share, then hands out the remainder one at a time to the
/// heaviest weights first (lowest index on ties), so the split is exact and
/// reproducible.
pub fn weighted_split(total: u32, weights: &[u32]) -> Vec<u32> {
    let weight_sum: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }

    let mut shares: Vec<u32> = weights
        .iter()
        .map(|&w| (u64::from(total) * u64::from(w) / weight_sum) as u32)
        .collect();

    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0).collect();
    order.sort_by(|&a, &b| weights[b].cmp(&weights[a]).then(a.cmp(&b)));

    let mut remainder = total - shares.iter().sum::<u32>();
    for &i in order.iter().cycle() {
        if remainder == 0 {
            break;
        }
        shares[i] += 1;
        remainder -= 1;
    }

    shares
}

//! Spatial model: cells, terrain and regions
//!
//! The grid uses a 4-neighbourhood throughout. Movement, region adjacency,
//! attack reach and sight distances are all measured in orthogonal steps.

pub mod cell;
pub mod map;
pub mod region;

pub use cell::{Cell, Coord, Occupant, Terrain};
pub use map::{Grid, TerrainView};
pub use region::Region;

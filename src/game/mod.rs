//! Match lifecycle: setup, the turn pipeline, and victory

pub mod state;
pub mod turn;
pub mod victory;

pub use state::{new_match, MatchState};
pub use turn::TurnReport;
pub use victory::{is_terminal, winner, MatchOutcome};

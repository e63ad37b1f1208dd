//! Units and the orders that move them

pub mod orders;
pub mod unit;

pub use orders::{Order, OrderAction, OrderOutcome, OrderStatus, OrderValidator};
pub use unit::Unit;

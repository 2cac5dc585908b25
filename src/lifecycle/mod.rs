pub mod engine;
pub mod stats;

pub use engine::{OpenRejection, PositionEngine};
pub use stats::TradingStats;

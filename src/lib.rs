pub mod analysis;
pub mod binance;
pub mod composer;
pub mod config;
pub mod error;
pub mod event;
pub mod indicator;
pub mod lifecycle;
pub mod model;
pub mod pattern;
pub mod runtime;
pub mod sizing;

pub mod candle;
pub mod depth;
pub mod pattern;
pub mod position;
pub mod signal;

pub mod atr;
pub mod ema;
pub mod sma;

/// A closed OHLCV candle for one symbol and interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_time: u64,
    pub close_time: u64,
}

impl Candle {
    /// Midpoint of the candle's range, used as the volume-binning price.
    pub fn mid_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// True range against the previous close (or the plain range without one).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        let range = self.high - self.low;
        match prev_close {
            Some(pc) => range.max((self.high - pc).abs()).max((self.low - pc).abs()),
            None => range,
        }
    }
}

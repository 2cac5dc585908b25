use crate::model::candle::Candle;

/// Wilder-smoothed average true range over the whole window.
///
/// Needs `period + 1` candles so every true range in the seed has a previous close.
pub fn wilder_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].true_range(Some(w[0].close)))
        .collect();
    let seed = ranges[..period].iter().sum::<f64>() / period as f64;
    let atr = ranges[period..]
        .iter()
        .fold(seed, |prev, tr| (prev * (period as f64 - 1.0) + tr) / period as f64);
    Some(atr)
}

use crate::model::candle::Candle;
use crate::model::pattern::{ExtremumKind, PriceExtremum};

/// Local highs and lows that dominate `lookback` candles on both sides.
///
/// Comparison is strict: a neighbour with an equal high (or low) disqualifies the
/// candidate. Outside bars that qualify as both HIGH and LOW are skipped. Returns
/// extrema in window order; empty when the window holds fewer than `2 * lookback + 1`
/// candles.
pub fn find_extrema(candles: &[Candle], lookback: usize) -> Vec<PriceExtremum> {
    let mut out = Vec::new();
    if lookback == 0 || candles.len() < 2 * lookback + 1 {
        return out;
    }

    for i in lookback..candles.len() - lookback {
        let c = &candles[i];
        let neighbours = candles[i - lookback..=i + lookback]
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != lookback);

        let mut is_high = true;
        let mut is_low = true;
        for (_, n) in neighbours {
            if n.high >= c.high {
                is_high = false;
            }
            if n.low <= c.low {
                is_low = false;
            }
            if !is_high && !is_low {
                break;
            }
        }

        let kind = match (is_high, is_low) {
            (true, false) => ExtremumKind::High,
            (false, true) => ExtremumKind::Low,
            _ => continue,
        };
        out.push(PriceExtremum {
            price: match kind {
                ExtremumKind::High => c.high,
                ExtremumKind::Low => c.low,
            },
            timestamp_ms: c.close_time,
            kind,
            index: i,
        });
    }
    out
}

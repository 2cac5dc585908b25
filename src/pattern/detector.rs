use std::collections::HashMap;

use crate::config::{PatternConfig, PatternMode};
use crate::model::candle::Candle;
use crate::model::pattern::{
    CompletedPattern, ExtremumKind, NextLevels, PatternState, PatternStatus, PriceExtremum,
    SidewaysPath, SidewaysPattern, TrendDirection, TrendPattern,
};

use super::extrema::find_extrema;

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    Completed(CompletedPattern),
    /// Pattern dropped without completing; the state was cleared.
    Abandoned { reason: String },
}

#[derive(Debug, Default)]
struct SymbolTrack {
    state: Option<PatternState>,
    /// Close time of the newest extremum already considered for this symbol.
    watermark_ms: u64,
    awaiting_candles: usize,
}

/// Per-symbol extremum tracking and pattern state machine.
#[derive(Debug)]
pub struct PatternDetector {
    settings: PatternConfig,
    tracks: HashMap<String, SymbolTrack>,
}

impl PatternDetector {
    pub fn new(settings: PatternConfig) -> Self {
        Self {
            settings,
            tracks: HashMap::new(),
        }
    }

    pub fn state(&self, symbol: &str) -> Option<&PatternState> {
        self.tracks.get(symbol).and_then(|t| t.state.as_ref())
    }

    /// Drop the live pattern for `symbol`. Already-seen extrema stay consumed.
    pub fn reset(&mut self, symbol: &str) {
        if let Some(track) = self.tracks.get_mut(symbol) {
            track.state = None;
            track.awaiting_candles = 0;
        }
    }

    /// Advance the symbol's pattern with the latest window (oldest first, newest last).
    pub fn on_window(&mut self, symbol: &str, window: &[Candle]) -> Option<DetectorOutcome> {
        let lookback = self.settings.lookback;
        if window.len() < 2 * lookback + 1 {
            return None;
        }
        let last = window.last()?;
        let current = last.close;
        let now_ms = last.close_time;

        let track = self.tracks.entry(symbol.to_string()).or_default();
        let fresh: Vec<PriceExtremum> = find_extrema(window, lookback)
            .into_iter()
            .filter(|e| e.timestamp_ms > track.watermark_ms)
            .collect();

        let mut outcome = None;
        for ext in &fresh {
            let Some(state) = track.state.as_mut() else {
                // Seed from the newest extremum only.
                let seed = fresh[fresh.len() - 1];
                tracing::debug!(symbol, price = seed.price, kind = ?seed.kind, "Pattern seeded");
                track.state = Some(PatternState::seed(seed));
                break;
            };
            if outcome.is_some() || state.status == PatternStatus::AwaitingReturn {
                continue;
            }
            match accept_point(&self.settings, state, *ext) {
                Accept::Discarded => {}
                Accept::Appended => {
                    if state.points.len() == 3 {
                        let points = [state.points[0], state.points[1], state.points[2]];
                        track.state = None;
                        outcome = Some(complete_trend(
                            &self.settings,
                            symbol,
                            points,
                            current,
                            now_ms,
                        ));
                    }
                }
            }
        }
        if let Some(last_fresh) = fresh.last() {
            track.watermark_ms = last_fresh.timestamp_ms;
        }
        if outcome.is_some() {
            return outcome;
        }

        let Some(state) = track.state.as_ref() else {
            track.awaiting_candles = 0;
            return None;
        };
        if state.status != PatternStatus::AwaitingReturn {
            track.awaiting_candles = 0;
            return None;
        }
        let (first, second) = (state.points[0], state.points[1]);

        let tolerance = first.price * self.settings.return_tolerance_percent / 100.0;
        if (current - first.price).abs() > tolerance {
            track.awaiting_candles += 1;
            let expiry = self.settings.return_expiry_candles;
            if expiry > 0 && track.awaiting_candles >= expiry {
                track.state = None;
                track.awaiting_candles = 0;
                return Some(DetectorOutcome::Abandoned {
                    reason: format!("no return to {:.6} within {expiry} candles", first.price),
                });
            }
            return None;
        }
        track.state = None;
        track.awaiting_candles = 0;
        let high = first.price.max(second.price);
        let low = first.price.min(second.price);
        // Width is measured against the first point, the level price must return to.
        let width_percent = (high - low) / first.price * 100.0;
        let path = match first.kind {
            ExtremumKind::High => SidewaysPath::HighLowHigh,
            ExtremumKind::Low => SidewaysPath::LowHighLow,
        };
        Some(DetectorOutcome::Completed(CompletedPattern::Sideways(
            SidewaysPattern {
                symbol: symbol.to_string(),
                first,
                second,
                current_price: current,
                channel_high: high,
                channel_low: low,
                width_percent,
                path,
                completed_at_ms: now_ms,
            },
        )))
    }
}

enum Accept {
    Appended,
    Discarded,
}

fn accept_point(settings: &PatternConfig, state: &mut PatternState, ext: PriceExtremum) -> Accept {
    let Some(last) = state.last_point() else {
        state.points.push(ext);
        return Accept::Appended;
    };
    if last.kind == ext.kind {
        return Accept::Discarded;
    }
    if state.points.len() == 1 {
        let high = last.price.max(ext.price);
        let low = last.price.min(ext.price);
        // Same basis as the completed channel: relative to the first point.
        let width_percent = (high - low) / last.price * 100.0;
        if width_percent < settings.min_channel_width_percent {
            tracing::debug!(
                price = ext.price,
                width_percent,
                "Second point discarded: channel too narrow"
            );
            return Accept::Discarded;
        }
        state.status = match settings.mode {
            PatternMode::Sideways => PatternStatus::AwaitingReturn,
            PatternMode::Trend => PatternStatus::AwaitingThird,
        };
    }
    state.points.push(ext);
    Accept::Appended
}

fn complete_trend(
    settings: &PatternConfig,
    symbol: &str,
    points: [PriceExtremum; 3],
    current: f64,
    now_ms: u64,
) -> DetectorOutcome {
    let (p1, p3) = (points[0].price, points[2].price);
    let direction = if p3 > p1 {
        TrendDirection::Uptrend
    } else if p3 < p1 {
        TrendDirection::Downtrend
    } else {
        return DetectorOutcome::Abandoned {
            reason: "third point equals first point".to_string(),
        };
    };

    let step_size = (p3 - p1).abs();
    let step_percent = step_size / p1 * 100.0;
    if step_percent < settings.min_trend_step_percent
        || step_percent > settings.max_trend_step_percent
    {
        return DetectorOutcome::Abandoned {
            reason: format!(
                "trend step {:.3}% outside [{:.3}%, {:.3}%]",
                step_percent, settings.min_trend_step_percent, settings.max_trend_step_percent
            ),
        };
    }

    let next_levels = match direction {
        TrendDirection::Uptrend => NextLevels {
            long: current - step_size,
            short: current + step_size,
        },
        TrendDirection::Downtrend => NextLevels {
            long: current + step_size,
            short: current - step_size,
        },
    };
    DetectorOutcome::Completed(CompletedPattern::Trend(TrendPattern {
        symbol: symbol.to_string(),
        points,
        current_price: current,
        direction,
        step_size,
        step_percent,
        next_levels,
        completed_at_ms: now_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| Candle {
                symbol: "XUSDT".to_string(),
                open: *p,
                high: *p,
                low: *p,
                close: *p,
                volume: 1.0,
                open_time: i as u64 * 60_000,
                close_time: (i as u64 + 1) * 60_000,
            })
            .collect()
    }

    fn settings(mode: PatternMode) -> PatternConfig {
        PatternConfig {
            mode,
            lookback: 2,
            ..PatternConfig::default()
        }
    }

    /// Feed the series candle by candle, returning every outcome.
    fn run(detector: &mut PatternDetector, prices: &[f64]) -> Vec<DetectorOutcome> {
        let candles = flat(prices);
        (1..=candles.len())
            .filter_map(|n| detector.on_window("XUSDT", &candles[..n]))
            .collect()
    }

    #[test]
    fn sideways_completes_on_return_to_first_point() {
        let mut detector = PatternDetector::new(settings(PatternMode::Sideways));
        let prices = [
            97.0, 98.0, 100.0, 98.0, 97.0, 96.0, 95.0, 96.0, 97.0, 98.0, 99.0, 100.05,
        ];
        let outcomes = run(&mut detector, &prices);
        assert_eq!(outcomes.len(), 1);
        let DetectorOutcome::Completed(CompletedPattern::Sideways(p)) = &outcomes[0] else {
            panic!("expected sideways completion, got {:?}", outcomes[0]);
        };
        assert_eq!(p.path, SidewaysPath::HighLowHigh);
        assert!((p.channel_high - 100.0).abs() < f64::EPSILON);
        assert!((p.channel_low - 95.0).abs() < f64::EPSILON);
        assert!(p.width_percent >= 2.0);
        assert!((p.current_price - p.first.price).abs() <= p.first.price * 0.001);
        assert!(detector.state("XUSDT").is_none());
    }

    #[test]
    fn narrow_channel_never_completes() {
        let mut detector = PatternDetector::new(settings(PatternMode::Sideways));
        let prices = [
            99.0, 99.5, 100.0, 99.5, 99.2, 99.0, 98.8, 99.0, 99.3, 99.6, 99.8, 100.0,
        ];
        assert!(run(&mut detector, &prices).is_empty());
        let state = detector.state("XUSDT").expect("seed stays live");
        assert_eq!(state.points.len(), 1);
        assert_eq!(state.status, PatternStatus::SeekingOpposite);
    }

    #[test]
    fn short_history_is_a_no_op() {
        let mut detector = PatternDetector::new(settings(PatternMode::Sideways));
        let candles = flat(&[1.0, 2.0, 3.0, 2.0]);
        assert_eq!(detector.on_window("XUSDT", &candles), None);
        assert!(detector.state("XUSDT").is_none());
    }

    #[test]
    fn points_alternate_in_kind() {
        let mut detector = PatternDetector::new(settings(PatternMode::Trend));
        // HIGH 100, a dip to 98.5 too narrow to record, then HIGH 101.
        let prices = [97.0, 98.0, 100.0, 99.0, 98.5, 99.5, 101.0, 100.0, 99.0];
        run(&mut detector, &prices);
        let state = detector.state("XUSDT").expect("state");
        assert_eq!(state.points.len(), 1);
        assert!((state.points[0].price - 100.0).abs() < f64::EPSILON);
        for pair in state.points.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
        }
    }

    #[test]
    fn uptrend_step_sets_next_levels() {
        let mut detector = PatternDetector::new(settings(PatternMode::Trend));
        // LOW 100 -> HIGH 106 -> LOW 103.
        let prices = [
            102.0, 101.0, 100.0, 101.0, 103.0, 104.0, 106.0, 105.0, 104.5, 104.0, 103.0, 103.6,
            104.2,
        ];
        let outcomes = run(&mut detector, &prices);
        assert_eq!(outcomes.len(), 1);
        let DetectorOutcome::Completed(CompletedPattern::Trend(p)) = &outcomes[0] else {
            panic!("expected trend completion, got {:?}", outcomes[0]);
        };
        assert_eq!(p.direction, TrendDirection::Uptrend);
        assert!((p.step_size - 3.0).abs() < 1e-9);
        assert!((p.step_percent - 3.0).abs() < 1e-9);
        assert!((p.next_levels.long - (p.current_price - 3.0)).abs() < 1e-9);
        assert!((p.next_levels.short - (p.current_price + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn trend_step_outside_band_is_abandoned() {
        let mut detector = PatternDetector::new(PatternConfig {
            max_trend_step_percent: 2.0,
            ..settings(PatternMode::Trend)
        });
        let prices = [
            102.0, 101.0, 100.0, 101.0, 103.0, 104.0, 106.0, 105.0, 104.5, 104.0, 103.0, 103.6,
            104.2,
        ];
        let outcomes = run(&mut detector, &prices);
        assert!(matches!(
            outcomes.as_slice(),
            [DetectorOutcome::Abandoned { .. }]
        ));
        assert!(detector.state("XUSDT").is_none());
    }

    #[test]
    fn channel_without_return_expires() {
        let mut detector = PatternDetector::new(PatternConfig {
            return_expiry_candles: 5,
            ..settings(PatternMode::Sideways)
        });
        // HIGH 100, LOW 95, then a breakout that never comes back to 100.
        let prices = [
            97.0, 98.0, 100.0, 98.0, 97.0, 96.0, 95.0, 96.0, 97.0, 98.0, 99.0, 101.0, 103.0,
            105.0,
        ];
        let outcomes = run(&mut detector, &prices);
        let [DetectorOutcome::Abandoned { reason }] = outcomes.as_slice() else {
            panic!("expected a single abandonment, got {outcomes:?}");
        };
        assert!(reason.contains("within 5 candles"), "{reason}");
        assert!(detector.state("XUSDT").is_none());
    }

    #[test]
    fn reset_clears_live_state() {
        let mut detector = PatternDetector::new(settings(PatternMode::Sideways));
        run(&mut detector, &[97.0, 98.0, 100.0, 98.0, 97.0]);
        assert!(detector.state("XUSDT").is_some());
        detector.reset("XUSDT");
        assert!(detector.state("XUSDT").is_none());
    }
}

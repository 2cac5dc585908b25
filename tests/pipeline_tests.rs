use std::sync::Arc;

use swing_quant::analysis::{CandleHistory, DepthSource};
use swing_quant::config::{Config, PatternConfig, PatternMode};
use swing_quant::error::AppError;
use swing_quant::event::CoreEvent;
use swing_quant::model::candle::Candle;
use swing_quant::model::depth::DepthBook;
use swing_quant::model::position::CloseReason;
use swing_quant::model::signal::Direction;
use swing_quant::runtime::Pipeline;

struct Offline;

impl CandleHistory for Offline {
    fn recent_candles(&self, symbol: &str, _: u64, _: &str) -> Result<Vec<Candle>, AppError> {
        Err(AppError::Unavailable {
            source_name: "klines",
            symbol: symbol.to_string(),
            msg: "offline".to_string(),
        })
    }
}

impl DepthSource for Offline {
    fn depth(&self, symbol: &str, _: usize) -> Result<DepthBook, AppError> {
        Err(AppError::Unavailable {
            source_name: "depth",
            symbol: symbol.to_string(),
            msg: "offline".to_string(),
        })
    }
}

fn candle(symbol: &str, close: f64, i: u64) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        open_time: i * 60_000,
        close_time: i * 60_000 + 59_999,
    }
}

fn pipeline() -> Pipeline {
    let config = Config {
        pattern: PatternConfig {
            lookback: 2,
            ..PatternConfig::default()
        },
        ..Config::default()
    };
    Pipeline::new(&config, Arc::new(Offline), Arc::new(Offline))
}

fn feed(p: &mut Pipeline, closes: &[f64], start: u64) -> Vec<Vec<CoreEvent>> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| p.on_closed_candle(candle("ETHUSDT", *close, start + i as u64)))
        .collect()
}

// LOW 100, HIGH 105, return to 100.05; the doubled close keeps the return
// candle from becoming the next seed.
const LONG_SETUP: [f64; 14] = [
    102.0, 101.0, 100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 104.0, 103.0, 102.0, 101.0, 100.05,
    100.05,
];

// HIGH 101.5, LOW 99.3 (2.17%), return to 101.45. Stays inside the long's
// 99.05 stop and 102.05 target.
const SHORT_SETUP: [f64; 13] = [
    100.6, 101.2, 101.5, 101.0, 100.5, 100.0, 99.6, 99.3, 99.6, 100.0, 100.5, 101.0, 101.45,
];

#[test]
fn channel_rebound_opens_then_reverses() {
    let mut p = pipeline();
    let long_events = feed(&mut p, &LONG_SETUP, 0);

    let completed_at = long_events
        .iter()
        .position(|events| {
            events
                .iter()
                .any(|e| matches!(e, CoreEvent::PatternCompleted(_)))
        })
        .unwrap();
    assert_eq!(completed_at, 12);
    let opened: Vec<_> = long_events[12]
        .iter()
        .filter_map(|e| match e {
            CoreEvent::PositionOpened(pos) => Some(pos.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].direction, Direction::Long);
    assert!((opened[0].entry_price - 100.05).abs() < 1e-9);
    // Warming trend, short regime window and offline sources all fail open.
    assert!(long_events[12].iter().any(|e| matches!(
        e,
        CoreEvent::SignalAccepted(s) if !s.confirmation.overall_confirmed
    )));

    let short_events = feed(&mut p, &SHORT_SETUP, LONG_SETUP.len() as u64);
    let last = short_events.last().unwrap();
    let closed_idx = last
        .iter()
        .position(|e| {
            matches!(e, CoreEvent::PositionClosed(pos) if pos.close_reason == Some(CloseReason::Reversal))
        })
        .unwrap();
    let opened_idx = last
        .iter()
        .position(|e| matches!(e, CoreEvent::PositionOpened(pos) if pos.direction == Direction::Short))
        .unwrap();
    assert!(closed_idx < opened_idx);
    assert!(short_events[..short_events.len() - 1]
        .iter()
        .flatten()
        .all(|e| !matches!(e, CoreEvent::PositionClosed(_))));

    let stats = p.engine().stats();
    assert_eq!(stats.closed_trades, 1);
    assert_eq!(stats.reversal_closes, 1);
    assert_eq!(stats.win_trades, 1);
    assert_eq!(p.engine().open_count(), 1);
}

#[test]
fn open_short_closes_at_take_profit() {
    let mut p = pipeline();
    feed(&mut p, &LONG_SETUP, 0);
    feed(&mut p, &SHORT_SETUP, LONG_SETUP.len() as u64);
    let start = (LONG_SETUP.len() + SHORT_SETUP.len()) as u64;

    // Short entered at 101.45 targets 99.421.
    let events = p.on_closed_candle(candle("ETHUSDT", 99.3, start));
    let closed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::PositionClosed(pos) => Some(pos),
            _ => None,
        })
        .collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].close_reason, Some(CloseReason::TakeProfit));
    assert!(closed[0].realized_pnl_percent.unwrap() > 0.0);
    assert_eq!(p.engine().stats().closed_trades, 2);
    assert_eq!(p.engine().stats().take_profit_closes, 1);
    assert_eq!(p.engine().open_count(), 0);
}

#[test]
fn bearish_reference_blocks_the_long() {
    let mut p = pipeline();
    for i in 0..60u64 {
        p.on_closed_candle(candle("BTCUSDT", 60_000.0 - i as f64 * 50.0, i));
    }
    let events: Vec<CoreEvent> = feed(&mut p, &LONG_SETUP, 100)
        .into_iter()
        .flatten()
        .collect();
    let rejection = events
        .iter()
        .find_map(|e| match e {
            CoreEvent::SignalRejected(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(rejection.direction, Some(Direction::Long));
    assert!(rejection.reason.starts_with("trend failed"));
    assert!(events
        .iter()
        .all(|e| !matches!(e, CoreEvent::PositionOpened(_))));
    assert_eq!(p.engine().stats().total_trades, 0);
}

fn trend_pipeline() -> Pipeline {
    let config = Config {
        pattern: PatternConfig {
            mode: PatternMode::Trend,
            lookback: 2,
            trend_level_expiry_candles: 3,
            ..PatternConfig::default()
        },
        ..Config::default()
    };
    Pipeline::new(&config, Arc::new(Offline), Arc::new(Offline))
}

// LOW 100, HIGH 103, LOW 101: a 1% up-step completing at 102 with levels 101 / 103.
const UP_STEP: [f64; 11] = [
    102.0, 101.0, 100.0, 101.0, 102.0, 103.0, 102.0, 101.5, 101.0, 101.5, 102.0,
];

#[test]
fn trend_pattern_waits_then_expires() {
    let mut p = trend_pipeline();
    let events = feed(&mut p, &UP_STEP, 0);
    assert!(events[10]
        .iter()
        .any(|e| matches!(e, CoreEvent::PatternCompleted(_))));
    assert!(events
        .iter()
        .flatten()
        .all(|e| !matches!(e, CoreEvent::SignalAccepted(_))));
    assert!(p.has_pending_trend("ETHUSDT"));

    let later = feed(&mut p, &[102.5, 102.3, 102.4], UP_STEP.len() as u64);
    assert!(!p.has_pending_trend("ETHUSDT"));
    let rejection = later[2]
        .iter()
        .find_map(|e| match e {
            CoreEvent::SignalRejected(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(rejection.pattern_kind, "trend");
    assert!(rejection.reason.contains("not reached within 3 candles"));
    assert!(later[..2]
        .iter()
        .flatten()
        .all(|e| !matches!(e, CoreEvent::SignalRejected(_))));
}

#[test]
fn trend_pattern_enters_at_next_level() {
    let mut p = trend_pipeline();
    feed(&mut p, &UP_STEP, 0);
    assert!(p.has_pending_trend("ETHUSDT"));

    let events = p.on_closed_candle(candle("ETHUSDT", 103.05, UP_STEP.len() as u64));
    assert!(!p.has_pending_trend("ETHUSDT"));
    let opened = events
        .iter()
        .find_map(|e| match e {
            CoreEvent::PositionOpened(pos) => Some(pos),
            _ => None,
        })
        .unwrap();
    assert_eq!(opened.direction, Direction::Short);
    assert!((opened.entry_price - 103.05).abs() < 1e-9);
}

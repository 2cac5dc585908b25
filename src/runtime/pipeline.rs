use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::analysis::{
    CandleHistory, DepthSource, MarketRegimeFilter, OrderFlowAnalyzer, SharedTrend,
    TrendEstimate, TrendEstimator, VolumeProfileAnalyzer,
};
use crate::composer::{Composition, Rejection, SignalComposer};
use crate::config::Config;
use crate::event::CoreEvent;
use crate::lifecycle::PositionEngine;
use crate::model::candle::Candle;
use crate::model::pattern::CompletedPattern;
use crate::pattern::{DetectorOutcome, PatternDetector};
use crate::runtime::router::SymbolRouter;

struct PendingTrend {
    pattern: CompletedPattern,
    candles_waited: usize,
}

/// Drives one closed candle at a time through detection, confirmation and
/// the position engine. Owns every per-symbol map; callers serialize access.
pub struct Pipeline {
    router: SymbolRouter,
    buffer_len: usize,
    buffers: HashMap<String, VecDeque<Candle>>,
    detector: PatternDetector,
    composer: SignalComposer,
    engine: PositionEngine,
    trend: SharedTrend,
    last_reference_close_ms: Option<u64>,
    pending: HashMap<String, PendingTrend>,
    trend_level_expiry_candles: usize,
    stats_interval_ms: u64,
    last_stats_ms: Option<u64>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        history: Arc<dyn CandleHistory>,
        depth: Arc<dyn DepthSource>,
    ) -> Self {
        let trend = SharedTrend::new(TrendEstimator::new(&config.trend));
        let composer = SignalComposer::new(
            config.confirmation.clone(),
            config.sizing.clone(),
            config.pattern.level_tolerance_percent,
            trend.clone(),
            VolumeProfileAnalyzer::new(history, config.volume_profile.clone()),
            OrderFlowAnalyzer::new(depth, config.order_flow.clone()),
            MarketRegimeFilter::new(config.regime.clone()),
        );
        Self {
            router: SymbolRouter::new(
                &config.binance.reference_symbol,
                &config.binance.symbols,
            ),
            buffer_len: config.pattern.candle_buffer_len.max(1),
            buffers: HashMap::new(),
            detector: PatternDetector::new(config.pattern.clone()),
            composer,
            engine: PositionEngine::new(config.position.clone()),
            trend,
            last_reference_close_ms: None,
            pending: HashMap::new(),
            trend_level_expiry_candles: config.pattern.trend_level_expiry_candles,
            stats_interval_ms: config.position.stats_interval_ms,
            last_stats_ms: None,
        }
    }

    pub fn trend(&self) -> &SharedTrend {
        &self.trend
    }

    pub fn engine(&self) -> &PositionEngine {
        &self.engine
    }

    pub fn detector(&self) -> &PatternDetector {
        &self.detector
    }

    pub fn router(&self) -> &SymbolRouter {
        &self.router
    }

    pub fn has_pending_trend(&self, symbol: &str) -> bool {
        self.pending.contains_key(symbol)
    }

    /// Seeds candle buffers and the reference trend from history without
    /// detecting or trading. Returns how many candles were accepted.
    pub fn warm_up(&mut self, candles: impl IntoIterator<Item = Candle>) -> usize {
        let mut accepted = 0;
        for mut candle in candles {
            let Some((symbol, role)) = self.router.route(&candle.symbol) else {
                continue;
            };
            if !is_valid(&candle) {
                continue;
            }
            candle.symbol = symbol.clone();
            let mut took = false;
            if role.is_reference() {
                took |= self.update_reference(&candle).is_some();
            }
            if role.is_traded() {
                let buffer = self.buffers.entry(symbol).or_default();
                if !buffer
                    .back()
                    .is_some_and(|last| last.close_time >= candle.close_time)
                {
                    buffer.push_back(candle);
                    while buffer.len() > self.buffer_len {
                        buffer.pop_front();
                    }
                    took = true;
                }
            }
            if took {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn on_closed_candle(&mut self, mut candle: Candle) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        let Some((symbol, role)) = self.router.route(&candle.symbol) else {
            tracing::debug!(symbol = %candle.symbol, "Candle for unsubscribed symbol ignored");
            return events;
        };
        if !is_valid(&candle) {
            tracing::warn!(symbol = %symbol, close = candle.close, "Malformed candle dropped");
            return events;
        }
        candle.symbol = symbol.clone();
        let now_ms = candle.close_time;

        if role.is_reference() {
            match self.update_reference(&candle) {
                Some(est) => tracing::debug!(
                    symbol = %symbol,
                    ready = est.ready,
                    direction = ?est.direction,
                    "Reference trend updated"
                ),
                None => tracing::debug!(
                    symbol = %symbol,
                    close_time = now_ms,
                    "Stale or duplicate reference candle ignored"
                ),
            }
        }

        if role.is_traded() {
            self.on_traded_candle(&symbol, candle, &mut events);
        }

        self.maybe_snapshot_stats(now_ms, &mut events);
        events
    }

    /// Feeds the reference close into the trend once per close time.
    fn update_reference(&mut self, candle: &Candle) -> Option<TrendEstimate> {
        if self
            .last_reference_close_ms
            .is_some_and(|last| candle.close_time <= last)
        {
            return None;
        }
        self.last_reference_close_ms = Some(candle.close_time);
        Some(self.trend.update(candle.close))
    }

    fn on_traded_candle(&mut self, symbol: &str, candle: Candle, events: &mut Vec<CoreEvent>) {
        let price = candle.close;
        let now_ms = candle.close_time;
        let buffer = self.buffers.entry(symbol.to_string()).or_default();
        if buffer.back().is_some_and(|last| last.close_time >= now_ms) {
            tracing::debug!(symbol, close_time = now_ms, "Stale or duplicate candle ignored");
            return;
        }
        buffer.push_back(candle);
        while buffer.len() > self.buffer_len {
            buffer.pop_front();
        }
        let window: &[Candle] = buffer.make_contiguous();

        for closed in self.engine.mark_and_maybe_close(symbol, price, now_ms) {
            events.push(CoreEvent::PositionClosed(closed));
        }

        if let Some(mut pending) = self.pending.remove(symbol) {
            pending.candles_waited += 1;
            match self.composer.direction_for(&pending.pattern, price) {
                Some(direction) => {
                    let composition =
                        self.composer
                            .compose(&pending.pattern, direction, window, price, now_ms);
                    act_on(&mut self.engine, composition, now_ms, events);
                }
                None if pending.candles_waited >= self.trend_level_expiry_candles => {
                    events.push(CoreEvent::SignalRejected(Rejection {
                        symbol: symbol.to_string(),
                        pattern_kind: pending.pattern.kind_label(),
                        direction: None,
                        reason: format!(
                            "next trend level not reached within {} candles",
                            self.trend_level_expiry_candles
                        ),
                        confirmation: None,
                        regime: None,
                    }));
                }
                None => {
                    self.pending.insert(symbol.to_string(), pending);
                }
            }
        }

        match self.detector.on_window(symbol, window) {
            Some(DetectorOutcome::Completed(pattern)) => {
                events.push(CoreEvent::PatternCompleted(pattern.clone()));
                match self.composer.direction_for(&pattern, price) {
                    Some(direction) => {
                        let composition =
                            self.composer.compose(&pattern, direction, window, price, now_ms);
                        act_on(&mut self.engine, composition, now_ms, events);
                    }
                    None => {
                        let replaced = self.pending.insert(
                            symbol.to_string(),
                            PendingTrend {
                                pattern,
                                candles_waited: 0,
                            },
                        );
                        if let Some(old) = replaced {
                            events.push(CoreEvent::SignalRejected(Rejection {
                                symbol: symbol.to_string(),
                                pattern_kind: old.pattern.kind_label(),
                                direction: None,
                                reason: "superseded by a newer trend pattern".to_string(),
                                confirmation: None,
                                regime: None,
                            }));
                        }
                    }
                }
            }
            Some(DetectorOutcome::Abandoned { reason }) => {
                events.push(CoreEvent::PatternAbandoned {
                    symbol: symbol.to_string(),
                    reason,
                });
            }
            None => {}
        }
    }

    fn maybe_snapshot_stats(&mut self, now_ms: u64, events: &mut Vec<CoreEvent>) {
        let Some(last) = self.last_stats_ms else {
            self.last_stats_ms = Some(now_ms);
            return;
        };
        if now_ms.saturating_sub(last) >= self.stats_interval_ms {
            self.last_stats_ms = Some(now_ms);
            events.push(CoreEvent::StatsSnapshot {
                at_ms: now_ms,
                stats: *self.engine.stats(),
                open_positions: self.engine.open_count(),
            });
        }
    }
}

/// Reverses opposing positions when configured, then opens the signal.
fn act_on(
    engine: &mut PositionEngine,
    composition: Composition,
    now_ms: u64,
    events: &mut Vec<CoreEvent>,
) {
    let signal = match composition {
        Composition::Accepted { signal, regime } => {
            if let Some(regime) = regime {
                tracing::debug!(
                    symbol = %signal.symbol,
                    regime = ?regime.direction,
                    strength = regime.strength,
                    filters = %regime.summary(),
                    "Regime breakdown"
                );
            }
            signal
        }
        Composition::Rejected(rejection) => {
            events.push(CoreEvent::SignalRejected(rejection));
            return;
        }
    };
    events.push(CoreEvent::SignalAccepted(signal.clone()));

    if engine.config().single_direction_per_symbol {
        for id in engine.opposing_ids(&signal.symbol, signal.direction) {
            if let Some(closed) = engine.close_by_reversal(&id, signal.entry_price, now_ms) {
                events.push(CoreEvent::PositionClosed(closed));
            }
        }
    }
    match engine.open(&signal, now_ms) {
        Ok(position) => events.push(CoreEvent::PositionOpened(position)),
        Err(rejection) => events.push(CoreEvent::OpenRejected { signal, rejection }),
    }
}

fn is_valid(candle: &Candle) -> bool {
    [candle.open, candle.high, candle.low, candle.close]
        .iter()
        .all(|p| p.is_finite() && *p > 0.0)
        && candle.volume.is_finite()
        && candle.high >= candle.low
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::OrderFlowConfig;
use crate::error::AppError;
use crate::model::depth::{DepthBook, DepthLevel};
use crate::model::signal::Direction;

/// Order-book lookup supplied by the transport layer.
pub trait DepthSource: Send + Sync {
    fn depth(&self, symbol: &str, levels: usize) -> Result<DepthBook, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderFlowSnapshot {
    pub symbol: String,
    pub mid_price: f64,
    pub spread: f64,
    pub bid_notional: f64,
    pub ask_notional: f64,
    pub bid_ask_ratio: f64,
    pub bid_wall: Option<f64>,
    pub ask_wall: Option<f64>,
    pub support_notional: f64,
    pub resistance_notional: f64,
    pub bullish_signal: bool,
    pub bearish_signal: bool,
    pub strength: FlowStrength,
    pub available: bool,
}

impl OrderFlowSnapshot {
    pub fn neutral(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            mid_price: 0.0,
            spread: 0.0,
            bid_notional: 0.0,
            ask_notional: 0.0,
            bid_ask_ratio: 1.0,
            bid_wall: None,
            ask_wall: None,
            support_notional: 0.0,
            resistance_notional: 0.0,
            bullish_signal: false,
            bearish_signal: false,
            strength: FlowStrength::Weak,
            available: false,
        }
    }

    pub fn analyze(symbol: &str, book: &DepthBook, config: &OrderFlowConfig) -> Self {
        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            return Self::neutral(symbol);
        };
        if best_bid <= 0.0 || best_ask <= 0.0 {
            return Self::neutral(symbol);
        }
        let mid = (best_bid + best_ask) / 2.0;
        let within = |pct: f64| {
            let lo = mid * (1.0 - pct / 100.0);
            let hi = mid * (1.0 + pct / 100.0);
            move |l: &&DepthLevel| l.price >= lo && l.price <= hi
        };
        let notional = |levels: &[DepthLevel], pct: f64| -> f64 {
            levels.iter().filter(within(pct)).map(DepthLevel::notional).sum()
        };
        let wall = |levels: &[DepthLevel]| -> Option<f64> {
            levels
                .iter()
                .filter(within(config.wall_band_percent))
                .filter(|l| l.notional() >= config.min_wall_notional)
                .max_by(|a, b| a.notional().total_cmp(&b.notional()))
                .map(|l| l.price)
        };

        let bid_notional = notional(&book.bids, config.band_percent);
        let ask_notional = notional(&book.asks, config.band_percent);
        let bid_ask_ratio = if ask_notional > 0.0 {
            bid_notional / ask_notional
        } else if bid_notional > 0.0 {
            f64::INFINITY
        } else {
            1.0
        };
        let support_notional = notional(&book.bids, config.support_band_percent);
        let resistance_notional = notional(&book.asks, config.support_band_percent);

        let ratio = config.imbalance_ratio;
        let bullish_signal = bid_ask_ratio > ratio && support_notional >= config.min_support_notional;
        let bearish_signal =
            bid_ask_ratio < 1.0 / ratio && resistance_notional >= config.min_support_notional;
        let strength = if bid_ask_ratio >= 3.0 || bid_ask_ratio <= 1.0 / 3.0 {
            FlowStrength::Strong
        } else if bid_ask_ratio >= ratio || bid_ask_ratio <= 1.0 / ratio {
            FlowStrength::Moderate
        } else {
            FlowStrength::Weak
        };

        Self {
            symbol: symbol.to_string(),
            mid_price: mid,
            spread: best_ask - best_bid,
            bid_notional,
            ask_notional,
            bid_ask_ratio,
            bid_wall: wall(&book.bids),
            ask_wall: wall(&book.asks),
            support_notional,
            resistance_notional,
            bullish_signal,
            bearish_signal,
            strength,
            available: true,
        }
    }

    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.bullish_signal,
            Direction::Short => self.bearish_signal,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedFlow {
    fetched_at_ms: u64,
    snapshot: OrderFlowSnapshot,
}

/// TTL-cached order-book analysis keyed by symbol.
pub struct OrderFlowAnalyzer {
    source: Arc<dyn DepthSource>,
    config: OrderFlowConfig,
    cache: HashMap<String, CachedFlow>,
}

impl OrderFlowAnalyzer {
    pub fn new(source: Arc<dyn DepthSource>, config: OrderFlowConfig) -> Self {
        Self {
            source,
            config,
            cache: HashMap::new(),
        }
    }

    pub fn snapshot(&mut self, symbol: &str, now_ms: u64) -> OrderFlowSnapshot {
        if let Some(cached) = self.cache.get(symbol) {
            if now_ms.saturating_sub(cached.fetched_at_ms) < self.config.ttl_ms {
                return cached.snapshot.clone();
            }
        }
        match self.source.depth(symbol, self.config.depth_levels) {
            Ok(book) => {
                let snapshot = OrderFlowSnapshot::analyze(symbol, &book, &self.config);
                self.cache.insert(
                    symbol.to_string(),
                    CachedFlow {
                        fetched_at_ms: now_ms,
                        snapshot: snapshot.clone(),
                    },
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Depth fetch failed, using neutral order flow");
                self.cache.remove(symbol);
                OrderFlowSnapshot::neutral(symbol)
            }
        }
    }
}

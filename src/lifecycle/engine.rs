use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::config::PositionConfig;
use crate::lifecycle::stats::TradingStats;
use crate::model::position::{CloseReason, Position, PositionStatus};
use crate::model::signal::{Direction, TradingSignal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRejection {
    SymbolCap { symbol: String, cap: usize },
    TotalCap { cap: usize },
    OppositeDirectionOpen { symbol: String, existing: Direction },
}

impl fmt::Display for OpenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SymbolCap { symbol, cap } => {
                write!(f, "{symbol} already holds {cap} open position(s)")
            }
            Self::TotalCap { cap } => write!(f, "total open positions at cap {cap}"),
            Self::OppositeDirectionOpen { symbol, existing } => {
                write!(f, "{symbol} has an open {existing} position")
            }
        }
    }
}

/// Paper positions keyed by symbol, with bounded closed history and stats.
pub struct PositionEngine {
    config: PositionConfig,
    open: HashMap<String, Vec<Position>>,
    closed: VecDeque<Position>,
    stats: TradingStats,
}

impl PositionEngine {
    pub fn new(config: PositionConfig) -> Self {
        Self {
            config,
            open: HashMap::new(),
            closed: VecDeque::new(),
            stats: TradingStats::default(),
        }
    }

    pub fn open(&mut self, signal: &TradingSignal, now_ms: u64) -> Result<Position, OpenRejection> {
        let on_symbol = self.open_positions(&signal.symbol);
        if self.config.single_direction_per_symbol {
            if let Some(existing) = on_symbol.iter().find(|p| p.direction != signal.direction) {
                return Err(OpenRejection::OppositeDirectionOpen {
                    symbol: signal.symbol.clone(),
                    existing: existing.direction,
                });
            }
        }
        if on_symbol.len() >= self.config.max_positions_per_symbol {
            return Err(OpenRejection::SymbolCap {
                symbol: signal.symbol.clone(),
                cap: self.config.max_positions_per_symbol,
            });
        }
        if self.open_count() >= self.config.max_total_positions {
            return Err(OpenRejection::TotalCap {
                cap: self.config.max_total_positions,
            });
        }

        let mut position = Position {
            id: format!("pos-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: signal.entry_price,
            entry_time_ms: now_ms,
            current_price: signal.entry_price,
            take_profit: signal.take_profit,
            stop_loss: signal.stop_loss,
            status: PositionStatus::Open,
            notional_usdt: self.config.order_amount_usdt,
            entry_fee_rate: self.config.taker_fee_rate,
            unrealized_pnl_percent: 0.0,
            realized_pnl_percent: None,
            confirmation: signal.confirmation.clone(),
            open_reason: signal.reason.clone(),
            close_reason: None,
            closed_at_ms: None,
        };
        position.mark(signal.entry_price, self.config.taker_fee_rate);
        self.stats.record_open();
        self.open
            .entry(signal.symbol.clone())
            .or_default()
            .push(position.clone());
        Ok(position)
    }

    /// Re-marks every open position on `symbol` and closes those whose target
    /// or stop is reached. Take-profit wins when both are.
    pub fn mark_and_maybe_close(&mut self, symbol: &str, price: f64, now_ms: u64) -> Vec<Position> {
        let Some(positions) = self.open.get_mut(symbol) else {
            return Vec::new();
        };
        let (maker, taker) = (self.config.maker_fee_rate, self.config.taker_fee_rate);
        let mut closed = Vec::new();
        let mut still_open = Vec::with_capacity(positions.len());
        for mut pos in positions.drain(..) {
            if pos.take_profit_hit(price) {
                pos.close(CloseReason::TakeProfit, price, maker, now_ms);
                closed.push(pos);
            } else if pos.stop_loss_hit(price) {
                pos.close(CloseReason::StopLoss, price, taker, now_ms);
                closed.push(pos);
            } else {
                pos.mark(price, taker);
                still_open.push(pos);
            }
        }
        if still_open.is_empty() {
            self.open.remove(symbol);
        } else {
            *positions = still_open;
        }
        for pos in &closed {
            self.archive(pos.clone());
        }
        closed
    }

    pub fn close_by_reversal(&mut self, id: &str, price: f64, now_ms: u64) -> Option<Position> {
        let (symbol, idx) = self.open.iter().find_map(|(symbol, positions)| {
            positions
                .iter()
                .position(|p| p.id == id)
                .map(|idx| (symbol.clone(), idx))
        })?;
        let positions = self.open.get_mut(&symbol)?;
        let mut pos = positions.remove(idx);
        if positions.is_empty() {
            self.open.remove(&symbol);
        }
        pos.close(CloseReason::Reversal, price, self.config.taker_fee_rate, now_ms);
        self.archive(pos.clone());
        Some(pos)
    }

    /// Ids of open positions on `symbol` that point against `direction`.
    pub fn opposing_ids(&self, symbol: &str, direction: Direction) -> Vec<String> {
        self.open_positions(symbol)
            .iter()
            .filter(|p| p.direction == direction.opposite())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn open_positions(&self, symbol: &str) -> &[Position] {
        self.open.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn open_count(&self) -> usize {
        self.open.values().map(Vec::len).sum()
    }

    pub fn closed_history(&self) -> impl Iterator<Item = &Position> {
        self.closed.iter()
    }

    pub fn stats(&self) -> &TradingStats {
        &self.stats
    }

    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    fn archive(&mut self, position: Position) {
        self.stats.record_close(&position);
        self.closed.push_back(position);
        while self.closed.len() > self.config.closed_history_limit {
            self.closed.pop_front();
        }
    }
}

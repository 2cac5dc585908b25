use crate::model::position::{CloseReason, Position};

/// Running performance counters over every position the engine has closed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradingStats {
    pub total_trades: u32,
    pub open_trades: u32,
    pub closed_trades: u32,
    pub win_trades: u32,
    pub loss_trades: u32,
    pub take_profit_closes: u32,
    pub stop_loss_closes: u32,
    pub reversal_closes: u32,
    pub total_pnl_percent: f64,
    pub average_pnl_percent: f64,
    pub max_win_percent: f64,
    pub max_loss_percent: f64,
    pub total_pnl_usdt: f64,
    pub win_rate_percent: f64,
}

impl TradingStats {
    pub fn record_open(&mut self) {
        self.total_trades = self.total_trades.saturating_add(1);
        self.open_trades = self.open_trades.saturating_add(1);
    }

    pub fn record_close(&mut self, position: &Position) {
        let Some(pnl) = position.realized_pnl_percent else {
            return;
        };
        self.open_trades = self.open_trades.saturating_sub(1);
        self.closed_trades = self.closed_trades.saturating_add(1);
        if pnl > 0.0 {
            self.win_trades += 1;
            self.max_win_percent = self.max_win_percent.max(pnl);
        } else {
            self.loss_trades += 1;
            self.max_loss_percent = self.max_loss_percent.min(pnl);
        }
        match position.close_reason {
            Some(CloseReason::TakeProfit) => self.take_profit_closes += 1,
            Some(CloseReason::StopLoss) => self.stop_loss_closes += 1,
            Some(CloseReason::Reversal) => self.reversal_closes += 1,
            None => {}
        }
        self.total_pnl_percent += pnl;
        self.total_pnl_usdt += position.realized_pnl_usdt().unwrap_or(0.0);
        self.average_pnl_percent = self.total_pnl_percent / self.closed_trades as f64;
        self.win_rate_percent = (self.win_trades as f64 / self.closed_trades as f64) * 100.0;
    }
}

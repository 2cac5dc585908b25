use super::signal::{ConfirmationRecord, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    ClosedTakeProfit,
    ClosedStopLoss,
    ClosedReversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Reversal,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
            Self::Reversal => "reversal",
        }
    }

    pub fn terminal_status(self) -> PositionStatus {
        match self {
            Self::TakeProfit => PositionStatus::ClosedTakeProfit,
            Self::StopLoss => PositionStatus::ClosedStopLoss,
            Self::Reversal => PositionStatus::ClosedReversal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time_ms: u64,
    pub current_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub status: PositionStatus,
    /// Quote-currency notional the PnL percentages are applied to.
    pub notional_usdt: f64,
    pub entry_fee_rate: f64,
    /// Net of the entry fee and the fee an exit at the current price would pay.
    pub unrealized_pnl_percent: f64,
    pub realized_pnl_percent: Option<f64>,
    pub confirmation: ConfirmationRecord,
    pub open_reason: String,
    pub close_reason: Option<CloseReason>,
    pub closed_at_ms: Option<u64>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Price move in the position's favour, in percent of entry, before fees.
    pub fn gross_pnl_percent(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price * 100.0 * self.direction.sign()
    }

    pub fn take_profit_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price >= self.take_profit,
            Direction::Short => price <= self.take_profit,
        }
    }

    pub fn stop_loss_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    pub fn mark(&mut self, price: f64, exit_fee_rate: f64) {
        assert!(
            price.is_finite() && price > 0.0,
            "mark price must be positive and finite"
        );
        self.current_price = price;
        let fee_percent = (self.entry_fee_rate + exit_fee_rate) * 100.0;
        self.unrealized_pnl_percent = self.gross_pnl_percent(price) - fee_percent;
    }

    /// Final mark at `price`, then freeze the snapshot as realized PnL.
    pub fn close(&mut self, reason: CloseReason, price: f64, exit_fee_rate: f64, now_ms: u64) {
        debug_assert!(self.is_open(), "position {} already closed", self.id);
        self.mark(price, exit_fee_rate);
        self.realized_pnl_percent = Some(self.unrealized_pnl_percent);
        self.status = reason.terminal_status();
        self.close_reason = Some(reason);
        self.closed_at_ms = Some(now_ms);
    }

    pub fn realized_pnl_usdt(&self) -> Option<f64> {
        self.realized_pnl_percent
            .map(|pct| self.notional_usdt * pct / 100.0)
    }
}

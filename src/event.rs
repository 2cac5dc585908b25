use crate::composer::Rejection;
use crate::lifecycle::{OpenRejection, TradingStats};
use crate::model::pattern::CompletedPattern;
use crate::model::position::Position;
use crate::model::signal::TradingSignal;

#[derive(Debug, Clone)]
pub enum WsConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay_ms: u64 },
}

/// Everything the core reports back to the binary for a processed candle.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    PatternCompleted(CompletedPattern),
    PatternAbandoned {
        symbol: String,
        reason: String,
    },
    SignalAccepted(TradingSignal),
    SignalRejected(Rejection),
    PositionOpened(Position),
    /// Accepted signal the position engine refused to open.
    OpenRejected {
        signal: TradingSignal,
        rejection: OpenRejection,
    },
    PositionClosed(Position),
    StatsSnapshot {
        at_ms: u64,
        stats: TradingStats,
        open_positions: usize,
    },
}

impl CoreEvent {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::PatternCompleted(p) => Some(p.symbol()),
            Self::PatternAbandoned { symbol, .. } => Some(symbol),
            Self::SignalAccepted(s) | Self::OpenRejected { signal: s, .. } => Some(&s.symbol),
            Self::SignalRejected(r) => Some(&r.symbol),
            Self::PositionOpened(p) | Self::PositionClosed(p) => Some(&p.symbol),
            Self::StatsSnapshot { .. } => None,
        }
    }
}

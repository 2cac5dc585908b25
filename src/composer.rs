use crate::analysis::{
    MarketRegimeFilter, OrderFlowAnalyzer, RegimeBreakdown, SharedTrend, VolumeProfileAnalyzer,
    VolumeVerdict,
};
use crate::config::{ConfirmationConfig, SizingConfig};
use crate::model::candle::Candle;
use crate::model::pattern::{CompletedPattern, SidewaysPath, TrendPattern};
use crate::model::signal::{
    CheckOutcome, ConfirmationRecord, ConfirmationSource, Direction, SourceCheck, SourceRole,
    TradingSignal,
};
use crate::sizing;

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub symbol: String,
    pub pattern_kind: &'static str,
    pub direction: Option<Direction>,
    pub reason: String,
    pub confirmation: Option<ConfirmationRecord>,
    pub regime: Option<RegimeBreakdown>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Accepted {
        signal: TradingSignal,
        regime: Option<RegimeBreakdown>,
    },
    Rejected(Rejection),
}

/// Turns completed patterns into sized, confirmed trading signals.
pub struct SignalComposer {
    confirmation: ConfirmationConfig,
    sizing: SizingConfig,
    level_tolerance_percent: f64,
    trend: SharedTrend,
    volume: VolumeProfileAnalyzer,
    order_flow: OrderFlowAnalyzer,
    regime: MarketRegimeFilter,
}

impl SignalComposer {
    pub fn new(
        confirmation: ConfirmationConfig,
        sizing: SizingConfig,
        level_tolerance_percent: f64,
        trend: SharedTrend,
        volume: VolumeProfileAnalyzer,
        order_flow: OrderFlowAnalyzer,
        regime: MarketRegimeFilter,
    ) -> Self {
        Self {
            confirmation,
            sizing,
            level_tolerance_percent,
            trend,
            volume,
            order_flow,
            regime,
        }
    }

    /// Trade direction for the pattern at `price`, or `None` while a trend
    /// pattern's entry levels have not been reached.
    pub fn direction_for(&self, pattern: &CompletedPattern, price: f64) -> Option<Direction> {
        match pattern {
            CompletedPattern::Sideways(p) => Some(match p.path {
                SidewaysPath::LowHighLow => Direction::Long,
                SidewaysPath::HighLowHigh => Direction::Short,
            }),
            CompletedPattern::Trend(p) => self.trend_entry(p, price),
        }
    }

    fn trend_entry(&self, pattern: &TrendPattern, price: f64) -> Option<Direction> {
        let near = |level: f64| {
            let distance = (price - level).abs() / level * 100.0;
            (distance <= self.level_tolerance_percent).then_some(distance)
        };
        match (near(pattern.next_levels.long), near(pattern.next_levels.short)) {
            (Some(l), Some(s)) => Some(if l <= s {
                Direction::Long
            } else {
                Direction::Short
            }),
            (Some(_), None) => Some(Direction::Long),
            (None, Some(_)) => Some(Direction::Short),
            (None, None) => None,
        }
    }

    pub fn compose(
        &mut self,
        pattern: &CompletedPattern,
        direction: Direction,
        window: &[Candle],
        price: f64,
        now_ms: u64,
    ) -> Composition {
        let symbol = pattern.symbol().to_string();
        let (confirmation, regime) = self.confirm(&symbol, direction, window, price, now_ms);

        if let Some(blocking) = confirmation.blocking_check() {
            return Composition::Rejected(Rejection {
                symbol,
                pattern_kind: pattern.kind_label(),
                direction: Some(direction),
                reason: format!(
                    "{} {}: {}",
                    blocking.source.as_str(),
                    blocking.outcome.as_str(),
                    blocking.detail
                ),
                confirmation: Some(confirmation),
                regime,
            });
        }

        let width_percent = pattern.width_percent();
        let levels = sizing::size(&self.sizing, direction, price, width_percent);
        let reason = format!(
            "{} -> {} @ {:.6}; {}; confirm [{}]{}",
            describe_pattern(pattern),
            direction,
            price,
            levels.breakdown.describe(),
            confirmation.summary(),
            if confirmation.overall_confirmed {
                ""
            } else {
                " (partial)"
            }
        );
        Composition::Accepted {
            signal: TradingSignal {
                symbol,
                direction,
                entry_price: price,
                take_profit: levels.take_profit,
                stop_loss: levels.stop_loss,
                sizing: levels.breakdown,
                reason,
                confirmation,
                created_at_ms: now_ms,
            },
            regime,
        }
    }

    fn confirm(
        &mut self,
        symbol: &str,
        direction: Direction,
        window: &[Candle],
        price: f64,
        now_ms: u64,
    ) -> (ConfirmationRecord, Option<RegimeBreakdown>) {
        let mut checks = Vec::new();
        let mut regime_breakdown = None;

        for source in ConfirmationSource::ALL {
            let role = self.confirmation.role(source);
            if role == SourceRole::Disabled {
                continue;
            }
            let (outcome, detail) = match source {
                ConfirmationSource::Trend => {
                    let est = self.trend.estimate();
                    let detail = format!(
                        "reference {:?} fast {:?} slow {:?} samples {}",
                        est.direction, est.ema_fast, est.ema_slow, est.samples
                    );
                    let outcome = if !est.ready {
                        CheckOutcome::NotReady
                    } else if est.allows(direction) {
                        CheckOutcome::Passed
                    } else {
                        CheckOutcome::Failed
                    };
                    (outcome, detail)
                }
                ConfirmationSource::VolumeProfile => {
                    let proximity = self.volume.config().proximity_percent;
                    match self
                        .volume
                        .profile(symbol, now_ms)
                        .supports(direction, price, proximity)
                    {
                        VolumeVerdict::Confirmed(d) => (CheckOutcome::Passed, d),
                        VolumeVerdict::Rejected(d) => (CheckOutcome::Failed, d),
                        VolumeVerdict::Unavailable(d) => (CheckOutcome::Unavailable, d),
                    }
                }
                ConfirmationSource::OrderFlow => {
                    let snap = self.order_flow.snapshot(symbol, now_ms);
                    let detail = format!(
                        "bid/ask {:.2} support {:.0} resistance {:.0} {:?}",
                        snap.bid_ask_ratio,
                        snap.support_notional,
                        snap.resistance_notional,
                        snap.strength
                    );
                    let outcome = if !snap.available {
                        CheckOutcome::Unavailable
                    } else if snap.supports(direction) {
                        CheckOutcome::Passed
                    } else {
                        CheckOutcome::Failed
                    };
                    (outcome, detail)
                }
                ConfirmationSource::Regime => {
                    let decision = self.regime.evaluate(window);
                    let outcome = if !decision.ready {
                        CheckOutcome::NotReady
                    } else if decision.allows(direction) {
                        CheckOutcome::Passed
                    } else {
                        CheckOutcome::Failed
                    };
                    let detail = match &decision.breakdown {
                        Some(b) if decision.reason.is_empty() => b.summary(),
                        _ => decision.reason.clone(),
                    };
                    regime_breakdown = decision.breakdown;
                    (outcome, detail)
                }
            };

            let effective_pass = match outcome {
                CheckOutcome::Passed => true,
                CheckOutcome::Failed => false,
                CheckOutcome::NotReady | CheckOutcome::Unavailable => {
                    !self.confirmation.fails_closed(source)
                }
            };
            if effective_pass && outcome != CheckOutcome::Passed {
                tracing::debug!(
                    symbol,
                    source = source.as_str(),
                    outcome = outcome.as_str(),
                    "Confirmation source failed open"
                );
            }
            checks.push(SourceCheck {
                source,
                role,
                outcome,
                effective_pass,
                detail,
            });
        }

        let critical_passed = checks
            .iter()
            .filter(|c| c.role == SourceRole::Critical)
            .all(|c| c.effective_pass);
        let overall_confirmed =
            critical_passed && checks.iter().all(|c| c.outcome == CheckOutcome::Passed);
        (
            ConfirmationRecord {
                checks,
                critical_passed,
                overall_confirmed,
            },
            regime_breakdown,
        )
    }
}

fn describe_pattern(pattern: &CompletedPattern) -> String {
    match pattern {
        CompletedPattern::Sideways(p) => format!(
            "sideways {} {:.6}/{:.6} width {:.2}%",
            p.path.as_str(),
            p.first.price,
            p.second.price,
            p.width_percent
        ),
        CompletedPattern::Trend(p) => format!(
            "trend {} {:.6}/{:.6}/{:.6} step {:.2}%",
            p.direction.as_str(),
            p.points[0].price,
            p.points[1].price,
            p.points[2].price,
            p.step_percent
        ),
    }
}

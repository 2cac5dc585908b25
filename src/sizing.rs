use crate::config::{SizingConfig, SizingMode};
use crate::model::signal::Direction;

/// How the take-profit and stop-loss distances were derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingBreakdown {
    Fixed {
        tp_percent: f64,
        sl_percent: f64,
    },
    Adaptive {
        width_percent: f64,
        raw_sl_percent: f64,
        raw_tp_percent: f64,
        sl_percent: f64,
        tp_percent: f64,
        /// TP (or SL) was moved to honour the minimum risk/reward.
        rr_adjusted: bool,
    },
}

impl SizingBreakdown {
    pub fn tp_percent(&self) -> f64 {
        match self {
            Self::Fixed { tp_percent, .. } | Self::Adaptive { tp_percent, .. } => *tp_percent,
        }
    }

    pub fn sl_percent(&self) -> f64 {
        match self {
            Self::Fixed { sl_percent, .. } | Self::Adaptive { sl_percent, .. } => *sl_percent,
        }
    }

    pub fn risk_reward(&self) -> f64 {
        self.tp_percent() / self.sl_percent()
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Fixed {
                tp_percent,
                sl_percent,
            } => format!("fixed TP {tp_percent:.2}% / SL {sl_percent:.2}%"),
            Self::Adaptive {
                width_percent,
                raw_sl_percent,
                raw_tp_percent,
                sl_percent,
                tp_percent,
                rr_adjusted,
            } => format!(
                "adaptive width {width_percent:.2}%: raw TP {raw_tp_percent:.2}% / SL {raw_sl_percent:.2}% -> TP {tp_percent:.2}% / SL {sl_percent:.2}% (R:R {:.2}{})",
                tp_percent / sl_percent,
                if *rr_adjusted { ", adjusted" } else { "" }
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub breakdown: SizingBreakdown,
}

/// Channel-width-proportional distances, clamped, then stretched to the minimum R:R.
pub fn adaptive_percentages(config: &SizingConfig, width_percent: f64) -> SizingBreakdown {
    let raw_sl_percent = width_percent * config.sl_fraction;
    let raw_tp_percent = width_percent * config.tp_fraction;
    let mut sl_percent = raw_sl_percent.clamp(config.sl_min_percent, config.sl_max_percent);
    let mut tp_percent = raw_tp_percent.clamp(config.tp_min_percent, config.tp_max_percent);

    let mut rr_adjusted = false;
    if tp_percent / sl_percent < config.min_risk_reward {
        tp_percent = (sl_percent * config.min_risk_reward).min(config.tp_max_percent);
        rr_adjusted = true;
        if tp_percent / sl_percent < config.min_risk_reward {
            sl_percent = (tp_percent / config.min_risk_reward).max(config.sl_min_percent);
        }
    }

    SizingBreakdown::Adaptive {
        width_percent,
        raw_sl_percent,
        raw_tp_percent,
        sl_percent,
        tp_percent,
        rr_adjusted,
    }
}

pub fn size(
    config: &SizingConfig,
    direction: Direction,
    entry: f64,
    width_percent: f64,
) -> SizedLevels {
    let breakdown = match config.mode {
        SizingMode::Fixed => SizingBreakdown::Fixed {
            tp_percent: config.take_profit_percent,
            sl_percent: config.stop_loss_percent,
        },
        SizingMode::Adaptive => adaptive_percentages(config, width_percent),
    };
    let sign = direction.sign();
    SizedLevels {
        take_profit: entry * (1.0 + sign * breakdown.tp_percent() / 100.0),
        stop_loss: entry * (1.0 - sign * breakdown.sl_percent() / 100.0),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive() -> SizingConfig {
        SizingConfig {
            mode: SizingMode::Adaptive,
            ..SizingConfig::default()
        }
    }

    #[test]
    fn six_percent_channel_needs_no_adjustment() {
        let b = adaptive_percentages(&adaptive(), 6.0);
        let SizingBreakdown::Adaptive {
            raw_sl_percent,
            raw_tp_percent,
            rr_adjusted,
            ..
        } = b
        else {
            panic!("expected adaptive breakdown");
        };
        assert!((raw_sl_percent - 1.8).abs() < 1e-9);
        assert!((raw_tp_percent - 4.8).abs() < 1e-9);
        assert!(!rr_adjusted);
        assert!((b.sl_percent() - 1.8).abs() < 1e-9);
        assert!((b.tp_percent() - 4.8).abs() < 1e-9);
        assert!(b.risk_reward() >= 1.5);
    }

    #[test]
    fn low_ratio_stretches_take_profit() {
        let config = SizingConfig {
            tp_fraction: 0.35,
            ..adaptive()
        };
        // SL 3.0%, raw TP 3.5% -> ratio 1.17 < 1.5 -> TP 4.5%.
        let b = adaptive_percentages(&config, 10.0);
        assert!((b.sl_percent() - 3.0).abs() < 1e-9);
        assert!((b.tp_percent() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn all_widths_respect_bounds_and_ratio() {
        let config = adaptive();
        for i in 1..=400 {
            let width = i as f64 * 0.25;
            let b = adaptive_percentages(&config, width);
            assert!(b.sl_percent() >= config.sl_min_percent - 1e-12);
            assert!(b.sl_percent() <= config.sl_max_percent + 1e-12);
            assert!(b.tp_percent() >= config.tp_min_percent - 1e-12);
            assert!(b.tp_percent() <= config.tp_max_percent + 1e-12);
            assert!(
                b.risk_reward() >= config.min_risk_reward - 1e-9,
                "width {width}: {}",
                b.describe()
            );
        }
    }

    #[test]
    fn fixed_levels_mirror_for_short() {
        let config = SizingConfig::default();
        let long = size(&config, Direction::Long, 100.0, 0.0);
        assert!((long.take_profit - 102.0).abs() < 1e-9);
        assert!((long.stop_loss - 99.0).abs() < 1e-9);
        let short = size(&config, Direction::Short, 100.0, 0.0);
        assert!((short.take_profit - 98.0).abs() < 1e-9);
        assert!((short.stop_loss - 101.0).abs() < 1e-9);
    }
}

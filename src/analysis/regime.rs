use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::config::RegimeConfig;
use crate::indicator::atr::wilder_atr;
use crate::indicator::ema::Ema;
use crate::indicator::sma::Sma;
use crate::model::candle::Candle;
use crate::model::signal::Direction;

const EMA_FAST: usize = 20;
const EMA_MID: usize = 50;
const EMA_SLOW: usize = 200;
const ATR_PERIOD: usize = 14;
const VOLUME_PERIOD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeDirection {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCheck {
    pub name: &'static str,
    pub enabled: bool,
    pub passed: bool,
    pub blocks_long: bool,
    pub blocks_short: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeBreakdown {
    pub direction: RegimeDirection,
    pub strength: f64,
    pub price: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub atr: f64,
    pub atr_percent: f64,
    pub current_volume: f64,
    pub average_volume: f64,
    pub hour_utc: u32,
    pub weekend: bool,
    pub checks: Vec<FilterCheck>,
}

impl RegimeBreakdown {
    pub fn summary(&self) -> String {
        self.checks
            .iter()
            .filter(|c| c.enabled)
            .map(|c| format!("{}={}", c.name, if c.passed { "pass" } else { "fail" }))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeDecision {
    pub ready: bool,
    pub allow_long: bool,
    pub allow_short: bool,
    pub breakdown: Option<RegimeBreakdown>,
    pub reason: String,
}

impl RegimeDecision {
    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.allow_long,
            Direction::Short => self.allow_short,
        }
    }
}

/// Trend-strength, session, volume and volatility gates over a candle window.
#[derive(Debug, Clone)]
pub struct MarketRegimeFilter {
    config: RegimeConfig,
}

impl MarketRegimeFilter {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, window: &[Candle]) -> RegimeDecision {
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
        let indicators = (
            Ema::last_of(&closes, EMA_FAST),
            Ema::last_of(&closes, EMA_MID),
            Ema::last_of(&closes, EMA_SLOW),
            wilder_atr(window, ATR_PERIOD),
            Sma::last_of(&volumes, VOLUME_PERIOD),
            window.last(),
        );
        let (Some(ema20), Some(ema50), Some(ema200), Some(atr), Some(average_volume), Some(last)) =
            indicators
        else {
            return RegimeDecision {
                ready: false,
                allow_long: true,
                allow_short: true,
                breakdown: None,
                reason: format!(
                    "regime needs {} candles, have {}",
                    EMA_SLOW,
                    window.len()
                ),
            };
        };

        let price = last.close;
        let direction = if price > ema20 && ema20 > ema50 && ema50 > ema200 {
            RegimeDirection::Bullish
        } else if price < ema20 && ema20 < ema50 && ema50 < ema200 {
            RegimeDirection::Bearish
        } else {
            RegimeDirection::Sideways
        };
        let spread = |a: f64, b: f64| ((a - b) / b).abs() * 100.0;
        let mean_distance =
            (spread(price, ema20) + spread(ema20, ema50) + spread(ema50, ema200)) / 3.0;
        let strength = (mean_distance * self.config.strength_scale).clamp(0.0, 100.0);
        let atr_percent = atr / price * 100.0;

        let when = DateTime::<Utc>::from_timestamp_millis(last.close_time as i64)
            .unwrap_or_default();
        let hour_utc = when.hour();
        let weekend = matches!(when.weekday(), Weekday::Sat | Weekday::Sun);

        let cfg = &self.config;
        let mut checks = Vec::with_capacity(4);

        let strong = strength > cfg.min_trend_strength;
        let (trend_blocks_long, trend_blocks_short) = match direction {
            RegimeDirection::Bullish if strong => (false, true),
            RegimeDirection::Bearish if strong => (true, false),
            _ => (false, false),
        };
        checks.push(gate(
            "trend_strength",
            cfg.trend_filter_enabled,
            trend_blocks_long,
            trend_blocks_short,
            format!("{direction:?} strength {strength:.1} vs {:.1}", cfg.min_trend_strength),
        ));

        let in_session = cfg.allowed_utc_hours.contains(&hour_utc) && !(cfg.exclude_weekends && weekend);
        checks.push(gate(
            "session",
            cfg.session_filter_enabled,
            !in_session,
            !in_session,
            format!("hour {hour_utc} UTC, weekend {weekend}"),
        ));

        let volume_floor = average_volume * cfg.volume_multiplier;
        let thin = last.volume < volume_floor;
        checks.push(gate(
            "volume",
            cfg.volume_filter_enabled,
            thin,
            thin,
            format!("volume {:.2} vs floor {:.2}", last.volume, volume_floor),
        ));

        let out_of_band = atr_percent < cfg.min_atr_percent || atr_percent > cfg.max_atr_percent;
        checks.push(gate(
            "volatility",
            cfg.volatility_filter_enabled,
            out_of_band,
            out_of_band,
            format!(
                "ATR {:.3}% vs [{:.3}%, {:.3}%]",
                atr_percent, cfg.min_atr_percent, cfg.max_atr_percent
            ),
        ));

        let enforced = checks.iter().filter(|c| c.enabled);
        let allow_long = enforced.clone().all(|c| !c.blocks_long);
        let allow_short = enforced.clone().all(|c| !c.blocks_short);
        let reason = enforced
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect::<Vec<_>>()
            .join("; ");

        RegimeDecision {
            ready: true,
            allow_long,
            allow_short,
            breakdown: Some(RegimeBreakdown {
                direction,
                strength,
                price,
                ema20,
                ema50,
                ema200,
                atr,
                atr_percent,
                current_volume: last.volume,
                average_volume,
                hour_utc,
                weekend,
                checks,
            }),
            reason,
        }
    }
}

/// Inputs and verdict are recorded even for disabled filters.
fn gate(
    name: &'static str,
    enabled: bool,
    blocks_long: bool,
    blocks_short: bool,
    detail: String,
) -> FilterCheck {
    FilterCheck {
        name,
        enabled,
        passed: !blocks_long && !blocks_short,
        blocks_long,
        blocks_short,
        detail,
    }
}

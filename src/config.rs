use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::signal::{ConfirmationSource, SourceRole};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub binance: BinanceConfig,
    pub pattern: PatternConfig,
    pub trend: TrendConfig,
    pub volume_profile: VolumeProfileConfig,
    pub order_flow: OrderFlowConfig,
    pub regime: RegimeConfig,
    pub confirmation: ConfirmationConfig,
    pub sizing: SizingConfig,
    pub position: PositionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub rest_base_url: String,
    pub ws_base_url: String,
    pub symbols: Vec<String>,
    /// Market-leading pair whose trend gates every other symbol.
    pub reference_symbol: String,
    pub kline_interval: String,
    pub request_timeout_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://fapi.binance.com".to_string(),
            ws_base_url: "wss://fstream.binance.com".to_string(),
            symbols: vec!["ETHUSDT".to_string(), "SOLUSDT".to_string()],
            reference_symbol: "BTCUSDT".to_string(),
            kline_interval: "5m".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    Sideways,
    Trend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub mode: PatternMode,
    /// Candles on each side a local extremum must dominate.
    pub lookback: usize,
    pub min_channel_width_percent: f64,
    pub return_tolerance_percent: f64,
    /// Candles a two-point channel may wait for the return before it is dropped; 0 disables.
    pub return_expiry_candles: usize,
    pub min_trend_step_percent: f64,
    pub max_trend_step_percent: f64,
    /// Distance to a trend next-level that counts as "reached".
    pub level_tolerance_percent: f64,
    pub trend_level_expiry_candles: usize,
    pub candle_buffer_len: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            mode: PatternMode::Sideways,
            lookback: 3,
            min_channel_width_percent: 2.0,
            return_tolerance_percent: 0.1,
            return_expiry_candles: 288,
            min_trend_step_percent: 0.5,
            max_trend_step_percent: 5.0,
            level_tolerance_percent: 0.1,
            trend_level_expiry_candles: 20,
            candle_buffer_len: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub min_samples: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
            min_samples: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeProfileConfig {
    pub ttl_ms: u64,
    pub lookback_ms: u64,
    pub interval: String,
    pub high_volume_multiplier: f64,
    pub low_volume_multiplier: f64,
    pub proximity_percent: f64,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30 * 60_000,
            lookback_ms: 6 * 3_600_000,
            interval: "1m".to_string(),
            high_volume_multiplier: 1.5,
            low_volume_multiplier: 0.5,
            proximity_percent: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderFlowConfig {
    pub ttl_ms: u64,
    pub depth_levels: usize,
    pub band_percent: f64,
    pub wall_band_percent: f64,
    pub support_band_percent: f64,
    pub min_wall_notional: f64,
    pub min_support_notional: f64,
    pub imbalance_ratio: f64,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            depth_levels: 100,
            band_percent: 1.0,
            wall_band_percent: 2.0,
            support_band_percent: 0.5,
            min_wall_notional: 100_000.0,
            min_support_notional: 50_000.0,
            imbalance_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub trend_filter_enabled: bool,
    pub min_trend_strength: f64,
    pub strength_scale: f64,
    pub session_filter_enabled: bool,
    pub allowed_utc_hours: Vec<u32>,
    pub exclude_weekends: bool,
    pub volume_filter_enabled: bool,
    pub volume_multiplier: f64,
    pub volatility_filter_enabled: bool,
    pub min_atr_percent: f64,
    pub max_atr_percent: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            trend_filter_enabled: true,
            min_trend_strength: 60.0,
            strength_scale: 20.0,
            session_filter_enabled: false,
            allowed_utc_hours: (0..24).collect(),
            exclude_weekends: false,
            volume_filter_enabled: true,
            volume_multiplier: 0.5,
            volatility_filter_enabled: true,
            min_atr_percent: 0.1,
            max_atr_percent: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub trend: SourceRole,
    pub volume_profile: SourceRole,
    pub order_flow: SourceRole,
    pub regime: SourceRole,
    /// Sources that reject when unavailable or not ready instead of failing open.
    pub fail_closed_sources: Vec<ConfirmationSource>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            trend: SourceRole::Critical,
            volume_profile: SourceRole::Critical,
            order_flow: SourceRole::Advisory,
            regime: SourceRole::Critical,
            fail_closed_sources: Vec::new(),
        }
    }
}

impl ConfirmationConfig {
    pub fn role(&self, source: ConfirmationSource) -> SourceRole {
        match source {
            ConfirmationSource::Trend => self.trend,
            ConfirmationSource::VolumeProfile => self.volume_profile,
            ConfirmationSource::OrderFlow => self.order_flow,
            ConfirmationSource::Regime => self.regime,
        }
    }

    pub fn fails_closed(&self, source: ConfirmationSource) -> bool {
        self.fail_closed_sources.contains(&source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    Fixed,
    Adaptive,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub mode: SizingMode,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
    pub sl_fraction: f64,
    pub tp_fraction: f64,
    pub sl_min_percent: f64,
    pub sl_max_percent: f64,
    pub tp_min_percent: f64,
    pub tp_max_percent: f64,
    pub min_risk_reward: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            mode: SizingMode::Fixed,
            take_profit_percent: 2.0,
            stop_loss_percent: 1.0,
            sl_fraction: 0.3,
            tp_fraction: 0.8,
            sl_min_percent: 0.5,
            sl_max_percent: 5.0,
            tp_min_percent: 1.0,
            tp_max_percent: 15.0,
            min_risk_reward: 1.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub max_positions_per_symbol: usize,
    pub max_total_positions: usize,
    /// Opposite-direction signal closes the open position by reversal.
    pub single_direction_per_symbol: bool,
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
    pub order_amount_usdt: f64,
    pub closed_history_limit: usize,
    pub stats_interval_ms: u64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            max_positions_per_symbol: 1,
            max_total_positions: 10,
            single_direction_per_symbol: true,
            maker_fee_rate: 0.0002,
            taker_fee_rate: 0.0005,
            order_amount_usdt: 100.0,
            closed_history_limit: 1_000,
            stats_interval_ms: 15 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "swing-quant.log".to_string(),
        }
    }
}

/// Parse a Binance kline interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl BinanceConfig {
    pub fn kline_interval_ms(&self) -> Result<u64> {
        parse_interval_ms(&self.kline_interval)
    }

    /// Reference symbol first, then configured symbols, uppercased and deduplicated.
    pub fn subscribed_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        let reference = self.reference_symbol.trim().to_ascii_uppercase();
        if !reference.is_empty() {
            out.push(reference);
        }
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("SWING_QUANT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.binance
            .kline_interval_ms()
            .context("binance.kline_interval is invalid")?;
        parse_interval_ms(&self.volume_profile.interval)
            .context("volume_profile.interval is invalid")?;

        let p = &self.pattern;
        if p.lookback == 0 {
            bail!("pattern.lookback must be > 0");
        }
        if p.candle_buffer_len < 2 * p.lookback + 1 {
            bail!(
                "pattern.candle_buffer_len ({}) must hold at least 2 * lookback + 1 candles",
                p.candle_buffer_len
            );
        }
        if p.min_trend_step_percent > p.max_trend_step_percent {
            bail!("pattern.min_trend_step_percent must be <= max_trend_step_percent");
        }

        let t = &self.trend;
        if t.fast_period == 0 || t.fast_period >= t.slow_period {
            bail!("trend.fast_period must be > 0 and < slow_period");
        }

        let s = &self.sizing;
        if s.sl_min_percent <= 0.0 || s.sl_min_percent > s.sl_max_percent {
            bail!("sizing.sl_min_percent must be > 0 and <= sl_max_percent");
        }
        if s.tp_min_percent <= 0.0 || s.tp_min_percent > s.tp_max_percent {
            bail!("sizing.tp_min_percent must be > 0 and <= tp_max_percent");
        }
        if s.min_risk_reward <= 0.0 {
            bail!("sizing.min_risk_reward must be > 0");
        }
        if s.tp_max_percent < s.sl_min_percent * s.min_risk_reward {
            bail!(
                "sizing.tp_max_percent ({}) cannot satisfy min_risk_reward {} at sl_min_percent {}",
                s.tp_max_percent,
                s.min_risk_reward,
                s.sl_min_percent
            );
        }
        if s.take_profit_percent <= 0.0 || s.stop_loss_percent <= 0.0 {
            bail!("sizing fixed percentages must be > 0");
        }

        let r = &self.regime;
        if r.min_atr_percent > r.max_atr_percent {
            bail!("regime.min_atr_percent must be <= max_atr_percent");
        }
        if r.allowed_utc_hours.iter().any(|h| *h > 23) {
            bail!("regime.allowed_utc_hours must be within 0..=23");
        }

        let pos = &self.position;
        if pos.max_positions_per_symbol == 0 || pos.max_total_positions == 0 {
            bail!("position caps must be > 0");
        }
        Ok(())
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::VolumeProfileConfig;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::signal::Direction;

/// Historical candle lookup supplied by the transport layer.
pub trait CandleHistory: Send + Sync {
    fn recent_candles(
        &self,
        symbol: &str,
        lookback_ms: u64,
        interval: &str,
    ) -> Result<Vec<Candle>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    pub symbol: String,
    pub point_of_control: Option<f64>,
    pub high_volume_nodes: Vec<f64>,
    pub low_volume_ranges: Vec<PriceRange>,
    /// Mean volume of the populated bins.
    pub average_volume: f64,
    pub bin_size: f64,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VolumeVerdict {
    Confirmed(String),
    Rejected(String),
    Unavailable(String),
}

/// Bin width giving four significant digits at `price`.
pub fn price_bin_size(price: f64) -> f64 {
    if price <= 0.0 || !price.is_finite() {
        return 1.0;
    }
    10f64.powi(price.log10().floor() as i32 - 3)
}

impl VolumeProfile {
    pub fn neutral(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            point_of_control: None,
            high_volume_nodes: Vec::new(),
            low_volume_ranges: Vec::new(),
            average_volume: 0.0,
            bin_size: 0.0,
            available: false,
        }
    }

    pub fn build(symbol: &str, candles: &[Candle], config: &VolumeProfileConfig) -> Self {
        let Some(last) = candles.last() else {
            return Self::neutral(symbol);
        };
        let bin_size = price_bin_size(last.close);
        let mut bins: BTreeMap<i64, f64> = BTreeMap::new();
        for c in candles {
            let key = (c.mid_price() / bin_size).round() as i64;
            *bins.entry(key).or_default() += c.volume;
        }
        let total: f64 = bins.values().sum();
        if bins.is_empty() || total <= 0.0 {
            return Self::neutral(symbol);
        }
        let average_volume = total / bins.len() as f64;

        let point_of_control = bins
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| *k as f64 * bin_size);

        let hvn_floor = average_volume * config.high_volume_multiplier;
        let high_volume_nodes = bins
            .iter()
            .filter(|(_, v)| **v > hvn_floor)
            .map(|(k, _)| *k as f64 * bin_size)
            .collect();

        // Missing keys between the extremes are empty bins and count as thin.
        let lvn_ceiling = average_volume * config.low_volume_multiplier;
        let mut low_volume_ranges = Vec::new();
        let mut run_start: Option<i64> = None;
        let (first_key, last_key) = match (bins.keys().next(), bins.keys().next_back()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Self::neutral(symbol),
        };
        for key in first_key..=last_key {
            let thin = bins.get(&key).copied().unwrap_or(0.0) < lvn_ceiling;
            match (thin, run_start) {
                (true, None) => run_start = Some(key),
                (false, Some(start)) => {
                    low_volume_ranges.push(PriceRange {
                        low: start as f64 * bin_size,
                        high: (key - 1) as f64 * bin_size,
                    });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            low_volume_ranges.push(PriceRange {
                low: start as f64 * bin_size,
                high: last_key as f64 * bin_size,
            });
        }

        Self {
            symbol: symbol.to_string(),
            point_of_control,
            high_volume_nodes,
            low_volume_ranges,
            average_volume,
            bin_size,
            available: true,
        }
    }

    pub fn in_low_volume_zone(&self, price: f64) -> bool {
        self.low_volume_ranges.iter().any(|r| r.contains(price))
    }

    /// A long wants heavy volume just below price, a short just above.
    pub fn supports(&self, direction: Direction, price: f64, proximity_percent: f64) -> VolumeVerdict {
        if !self.available {
            return VolumeVerdict::Unavailable("volume profile unavailable".to_string());
        }
        if self.in_low_volume_zone(price) {
            return VolumeVerdict::Rejected(format!("price {price} sits in a low-volume zone"));
        }
        let band = price * proximity_percent / 100.0;
        let levels = self
            .point_of_control
            .iter()
            .chain(self.high_volume_nodes.iter());
        let nearby = levels
            .filter(|lvl| match direction {
                Direction::Long => **lvl <= price + self.bin_size && price - **lvl <= band,
                Direction::Short => **lvl >= price - self.bin_size && **lvl - price <= band,
            })
            .copied()
            .reduce(|a, b| if (a - price).abs() <= (b - price).abs() { a } else { b });
        match nearby {
            Some(level) => VolumeVerdict::Confirmed(format!(
                "volume node {level} within {proximity_percent}% of {price}"
            )),
            None => VolumeVerdict::Rejected(format!(
                "no volume node within {proximity_percent}% {} {price}",
                match direction {
                    Direction::Long => "below",
                    Direction::Short => "above",
                }
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedProfile {
    built_at_ms: u64,
    profile: VolumeProfile,
}

/// TTL-cached volume-by-price profiles keyed by symbol.
pub struct VolumeProfileAnalyzer {
    history: Arc<dyn CandleHistory>,
    config: VolumeProfileConfig,
    cache: HashMap<String, CachedProfile>,
}

impl VolumeProfileAnalyzer {
    pub fn new(history: Arc<dyn CandleHistory>, config: VolumeProfileConfig) -> Self {
        Self {
            history,
            config,
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &VolumeProfileConfig {
        &self.config
    }

    /// Cached profile if younger than the TTL, otherwise rebuilt from history.
    /// Failures yield a neutral profile and are not cached.
    pub fn profile(&mut self, symbol: &str, now_ms: u64) -> VolumeProfile {
        if let Some(cached) = self.cache.get(symbol) {
            if now_ms.saturating_sub(cached.built_at_ms) < self.config.ttl_ms {
                return cached.profile.clone();
            }
        }

        match self
            .history
            .recent_candles(symbol, self.config.lookback_ms, &self.config.interval)
        {
            Ok(candles) => {
                let profile = VolumeProfile::build(symbol, &candles, &self.config);
                tracing::debug!(
                    symbol,
                    candles = candles.len(),
                    poc = ?profile.point_of_control,
                    "Volume profile rebuilt"
                );
                self.cache.insert(
                    symbol.to_string(),
                    CachedProfile {
                        built_at_ms: now_ms,
                        profile: profile.clone(),
                    },
                );
                profile
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Volume profile fetch failed, using neutral profile");
                self.cache.remove(symbol);
                VolumeProfile::neutral(symbol)
            }
        }
    }
}

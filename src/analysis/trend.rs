use std::sync::{Arc, RwLock};

use crate::config::TrendConfig;
use crate::indicator::ema::Ema;
use crate::model::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendBias {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendEstimate {
    pub direction: TrendBias,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub ready: bool,
    /// Slow value is a simple average because the slow EMA is still seeding.
    pub warming: bool,
    pub allow_long: bool,
    pub allow_short: bool,
    pub samples: usize,
}

impl TrendEstimate {
    fn not_ready(samples: usize) -> Self {
        Self {
            direction: TrendBias::Bullish,
            ema_fast: None,
            ema_slow: None,
            ready: false,
            warming: true,
            allow_long: true,
            allow_short: true,
            samples,
        }
    }

    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.allow_long,
            Direction::Short => self.allow_short,
        }
    }
}

/// Fast/slow EMA trend state for the reference asset.
#[derive(Debug, Clone)]
pub struct TrendEstimator {
    fast: Ema,
    slow: Ema,
    min_samples: usize,
}

impl TrendEstimator {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            fast: Ema::new(config.fast_period),
            slow: Ema::new(config.slow_period),
            min_samples: config.min_samples.max(1),
        }
    }

    pub fn push(&mut self, close: f64) -> TrendEstimate {
        self.fast.push(close);
        self.slow.push(close);
        self.estimate()
    }

    pub fn estimate(&self) -> TrendEstimate {
        let samples = self.slow.samples();
        if samples < self.min_samples {
            return TrendEstimate::not_ready(samples);
        }
        let fast = self.fast.value().or_else(|| self.fast.warmup_mean());
        let slow = self.slow.value().or_else(|| self.slow.warmup_mean());
        let (Some(f), Some(s)) = (fast, slow) else {
            return TrendEstimate::not_ready(samples);
        };
        let direction = if f > s {
            TrendBias::Bullish
        } else {
            TrendBias::Bearish
        };
        TrendEstimate {
            direction,
            ema_fast: Some(f),
            ema_slow: Some(s),
            ready: true,
            warming: !self.slow.is_ready(),
            allow_long: direction == TrendBias::Bullish,
            allow_short: direction == TrendBias::Bearish,
            samples,
        }
    }
}

/// Shared handle: written from the reference symbol's candles, read by every composer.
#[derive(Debug, Clone)]
pub struct SharedTrend {
    inner: Arc<RwLock<TrendEstimator>>,
}

impl SharedTrend {
    pub fn new(estimator: TrendEstimator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(estimator)),
        }
    }

    pub fn update(&self, close: f64) -> TrendEstimate {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        guard.push(close)
    }

    pub fn estimate(&self) -> TrendEstimate {
        match self.inner.read() {
            Ok(guard) => guard.estimate(),
            Err(poisoned) => poisoned.into_inner().estimate(),
        }
    }
}

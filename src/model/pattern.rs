use super::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceExtremum {
    pub price: f64,
    pub timestamp_ms: u64,
    pub kind: ExtremumKind,
    /// Index of the source candle within the window it was found in.
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternStatus {
    SeekingOpposite,
    /// Sideways: two points recorded, waiting for price to come back to the first.
    AwaitingReturn,
    /// Trend: two points recorded, waiting for the third extremum.
    AwaitingThird,
}

/// Live per-symbol pattern under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternState {
    pub points: Vec<PriceExtremum>,
    pub status: PatternStatus,
    pub started_at_ms: u64,
    /// Trade direction implied by the seed: a HIGH seed looks for a return to the top.
    pub implied_direction: Direction,
}

impl PatternState {
    pub fn seed(point: PriceExtremum) -> Self {
        let implied_direction = match point.kind {
            ExtremumKind::High => Direction::Short,
            ExtremumKind::Low => Direction::Long,
        };
        Self {
            points: vec![point],
            status: PatternStatus::SeekingOpposite,
            started_at_ms: point.timestamp_ms,
            implied_direction,
        }
    }

    pub fn last_point(&self) -> Option<&PriceExtremum> {
        self.points.last()
    }
}

/// Path order of the two channel anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidewaysPath {
    HighLowHigh,
    LowHighLow,
}

impl SidewaysPath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighLowHigh => "high_to_low_to_high",
            Self::LowHighLow => "low_to_high_to_low",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidewaysPattern {
    pub symbol: String,
    pub first: PriceExtremum,
    pub second: PriceExtremum,
    pub current_price: f64,
    pub channel_high: f64,
    pub channel_low: f64,
    pub width_percent: f64,
    pub path: SidewaysPath,
    pub completed_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uptrend => "uptrend",
            Self::Downtrend => "downtrend",
        }
    }
}

/// Prices at which the next trend step would be entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextLevels {
    pub long: f64,
    pub short: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendPattern {
    pub symbol: String,
    pub points: [PriceExtremum; 3],
    pub current_price: f64,
    pub direction: TrendDirection,
    pub step_size: f64,
    pub step_percent: f64,
    pub next_levels: NextLevels,
    pub completed_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletedPattern {
    Sideways(SidewaysPattern),
    Trend(TrendPattern),
}

impl CompletedPattern {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Sideways(p) => &p.symbol,
            Self::Trend(p) => &p.symbol,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Sideways(_) => "sideways",
            Self::Trend(_) => "trend",
        }
    }

    pub fn shape_label(&self) -> &'static str {
        match self {
            Self::Sideways(p) => p.path.as_str(),
            Self::Trend(p) => p.direction.as_str(),
        }
    }

    /// Lowest and highest of the prices that define the pattern.
    pub fn defining_range(&self) -> (f64, f64) {
        match self {
            Self::Sideways(p) => (p.channel_low, p.channel_high),
            Self::Trend(p) => p
                .points
                .iter()
                .fold((f64::MAX, f64::MIN), |(lo, hi), pt| {
                    (lo.min(pt.price), hi.max(pt.price))
                }),
        }
    }

    /// (max - min) of the defining prices as a percentage of the first point.
    pub fn width_percent(&self) -> f64 {
        match self {
            Self::Sideways(p) => p.width_percent,
            Self::Trend(p) => {
                let (lo, hi) = self.defining_range();
                let origin = p.points[0].price;
                if origin <= 0.0 {
                    return 0.0;
                }
                (hi - lo) / origin * 100.0
            }
        }
    }
}

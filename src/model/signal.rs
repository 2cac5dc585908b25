use std::fmt;

use serde::Deserialize;

use crate::sizing::SizingBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// +1 for long, -1 for short. Multiplies a raw price move into PnL sign.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confirmation sources consulted before a pattern becomes a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationSource {
    Trend,
    VolumeProfile,
    OrderFlow,
    Regime,
}

impl ConfirmationSource {
    pub const ALL: [ConfirmationSource; 4] = [
        ConfirmationSource::Trend,
        ConfirmationSource::VolumeProfile,
        ConfirmationSource::OrderFlow,
        ConfirmationSource::Regime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::VolumeProfile => "volume_profile",
            Self::OrderFlow => "order_flow",
            Self::Regime => "regime",
        }
    }
}

/// How a source participates in the accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// A failure rejects the signal.
    Critical,
    /// Only feeds the `overall_confirmed` label.
    Advisory,
    /// Not consulted.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// Source is still warming up.
    NotReady,
    /// Source errored and returned a neutral value.
    Unavailable,
}

impl CheckOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::NotReady => "not_ready",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCheck {
    pub source: ConfirmationSource,
    pub role: SourceRole,
    pub outcome: CheckOutcome,
    /// Whether this check counts as passing after fail-open rules are applied.
    pub effective_pass: bool,
    pub detail: String,
}

/// Which sources were consulted and how each one voted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfirmationRecord {
    pub checks: Vec<SourceCheck>,
    /// Every critical source passed (or failed open).
    pub critical_passed: bool,
    /// Every consulted source, critical and advisory, passed outright.
    pub overall_confirmed: bool,
}

impl ConfirmationRecord {
    pub fn check(&self, source: ConfirmationSource) -> Option<&SourceCheck> {
        self.checks.iter().find(|c| c.source == source)
    }

    pub fn passed_sources(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Passed)
            .map(|c| c.source.as_str())
            .collect()
    }

    /// First critical check that rejected the signal, if any.
    pub fn blocking_check(&self) -> Option<&SourceCheck> {
        self.checks
            .iter()
            .find(|c| c.role == SourceRole::Critical && !c.effective_pass)
    }

    pub fn summary(&self) -> String {
        self.checks
            .iter()
            .map(|c| format!("{}={}", c.source.as_str(), c.outcome.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// An accepted, sized trade proposal. Consumed once by the position engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub sizing: SizingBreakdown,
    pub reason: String,
    pub confirmation: ConfirmationRecord,
    pub created_at_ms: u64,
}

pub mod order_flow;
pub mod regime;
pub mod trend;
pub mod volume_profile;

pub use order_flow::{DepthSource, FlowStrength, OrderFlowAnalyzer, OrderFlowSnapshot};
pub use regime::{MarketRegimeFilter, RegimeBreakdown, RegimeDecision, RegimeDirection};
pub use trend::{SharedTrend, TrendBias, TrendEstimate, TrendEstimator};
pub use volume_profile::{CandleHistory, VolumeProfile, VolumeProfileAnalyzer, VolumeVerdict};

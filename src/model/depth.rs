#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLevel {
    pub price: f64,
    pub qty: f64,
}

impl DepthLevel {
    pub fn notional(&self) -> f64 {
        self.price * self.qty
    }
}

/// Order-book snapshot: bids best-first (descending), asks best-first (ascending).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthBook {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl DepthBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.iter().map(|l| l.price).reduce(f64::max)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.iter().map(|l| l.price).reduce(f64::min)
    }
}

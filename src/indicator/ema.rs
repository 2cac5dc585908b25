use super::sma::Sma;

/// Exponential Moving Average, seeded with the SMA of its first `period` samples.
#[derive(Debug, Clone)]
pub struct Ema {
    multiplier: f64,
    ema: Option<f64>,
    seed: Sma,
    samples: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be > 0");
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            ema: None,
            seed: Sma::new(period),
            samples: 0,
        }
    }

    /// Push a new value, return the current EMA if enough data.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.samples += 1;
        self.ema = match self.ema {
            Some(prev) => Some((value - prev) * self.multiplier + prev),
            None => self.seed.push(value),
        };
        self.ema
    }

    pub fn value(&self) -> Option<f64> {
        self.ema
    }

    /// Simple mean of the samples seen so far while the EMA is still seeding.
    pub fn warmup_mean(&self) -> Option<f64> {
        if self.is_ready() {
            None
        } else {
            self.seed.partial_mean()
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn is_ready(&self) -> bool {
        self.ema.is_some()
    }

    /// EMA value after feeding an entire series.
    pub fn last_of(values: &[f64], period: usize) -> Option<f64> {
        let mut ema = Ema::new(period);
        values.iter().fold(None, |_, v| ema.push(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_with_sma_then_smooths() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.push(2.0), None);
        assert_eq!(ema.push(5.0), None);
        assert!(!ema.is_ready());
        assert!((ema.warmup_mean().unwrap() - 3.5).abs() < f64::EPSILON);

        let v = ema.push(8.0).unwrap();
        assert!((v - 5.0).abs() < f64::EPSILON);
        assert_eq!(ema.warmup_mean(), None);

        let v = ema.push(11.0).unwrap();
        assert!((v - 8.0).abs() < f64::EPSILON);
        assert_eq!(ema.samples(), 4);
    }

    #[test]
    fn last_of_matches_incremental() {
        let values = [2.0, 5.0, 8.0, 11.0, 14.0];
        assert!((Ema::last_of(&values, 3).unwrap() - 11.0).abs() < f64::EPSILON);
        assert_eq!(Ema::last_of(&values[..2], 3), None);
    }
}

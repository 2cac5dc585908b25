/// Simple Moving Average over a fixed ring buffer.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    buffer: Vec<f64>,
    head: usize,
    count: usize,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            buffer: vec![0.0; period],
            head: 0,
            count: 0,
            sum: 0.0,
        }
    }

    /// Push a new value, return the current SMA once `period` samples exist.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.count >= self.period {
            self.sum -= self.buffer[self.head];
        }
        self.buffer[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.period;
        if self.count < self.period {
            self.count += 1;
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    /// Mean of whatever samples are buffered, even before the window is full.
    pub fn partial_mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    /// Mean of the last `period` values of a slice, if it is long enough.
    pub fn last_of(values: &[f64], period: usize) -> Option<f64> {
        if period == 0 || values.len() < period {
            return None;
        }
        let mut sma = Sma::new(period);
        values[values.len() - period..]
            .iter()
            .fold(None, |_, v| sma.push(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_sma() {
        let mut sma = Sma::new(3);
        assert_eq!(sma.push(1.0), None);
        assert_eq!(sma.push(2.0), None);
        assert!(!sma.is_ready());

        let v = sma.push(3.0).unwrap();
        assert!((v - 2.0).abs() < f64::EPSILON);

        let v = sma.push(4.0).unwrap();
        assert!((v - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_mean_before_window_fills() {
        let mut sma = Sma::new(50);
        assert_eq!(sma.partial_mean(), None);
        sma.push(10.0);
        sma.push(20.0);
        assert!((sma.partial_mean().unwrap() - 15.0).abs() < f64::EPSILON);
        assert_eq!(sma.value(), None);
    }

    #[test]
    fn last_of_uses_tail_of_slice() {
        let values = [1.0, 2.0, 3.0, 10.0, 20.0];
        assert!((Sma::last_of(&values, 2).unwrap() - 15.0).abs() < f64::EPSILON);
        assert_eq!(Sma::last_of(&values, 6), None);
    }

    #[test]
    fn no_drift_after_many_pushes() {
        let mut sma = Sma::new(10);
        let mut naive_buf: Vec<f64> = Vec::new();

        for i in 0..10_000u64 {
            let val = (i as f64) * 0.1 + 0.01;
            sma.push(val);
            naive_buf.push(val);
            if naive_buf.len() > 10 {
                naive_buf.remove(0);
            }

            if let Some(ring_avg) = sma.value() {
                let naive_avg: f64 = naive_buf.iter().sum::<f64>() / naive_buf.len() as f64;
                assert!(
                    (ring_avg - naive_avg).abs() < 1e-8,
                    "Drift at i={}: ring={} naive={}",
                    i,
                    ring_avg,
                    naive_avg
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "SMA period must be > 0")]
    fn zero_period_panics() {
        Sma::new(0);
    }
}

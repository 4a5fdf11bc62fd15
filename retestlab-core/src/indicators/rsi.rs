//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period (first value once `period` close-to-close changes exist).
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    seed_gain: f64,
    seed_loss: f64,
    seed_count: usize,
    avg_gain: f64,
    avg_loss: f64,
    current: Option<f64>,
    previous: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
            prev_close: None,
            seed_gain: 0.0,
            seed_loss: 0.0,
            seed_count: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            current: None,
            previous: None,
        }
    }

    /// Change between the previous and the latest value.
    pub fn delta(&self) -> Option<f64> {
        Some(self.current? - self.previous?)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        let close = bar.close;
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };
        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        self.previous = self.current;

        if self.seed_count < self.period {
            self.seed_gain += gain;
            self.seed_loss += loss;
            self.seed_count += 1;
            if self.seed_count == self.period {
                self.avg_gain = self.seed_gain / self.period as f64;
                self.avg_loss = self.seed_loss / self.period as f64;
                self.current = Some(compute_rsi(self.avg_gain, self.avg_loss));
            }
            return self.current;
        }

        let alpha = 1.0 / self.period as f64;
        self.avg_gain = alpha * gain + (1.0 - alpha) * self.avg_gain;
        self.avg_loss = alpha * loss + (1.0 - alpha) * self.avg_loss;
        self.current = Some(compute_rsi(self.avg_gain, self.avg_loss));
        self.current
    }

    fn value(&self) -> Option<f64> {
        self.current
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, compute_series, make_bars};

    #[test]
    fn rsi_all_gains() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let result = compute_series(&mut Rsi::new(3), &bars);
        assert_approx(result[3], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let result = compute_series(&mut Rsi::new(3), &bars);
        assert_approx(result[3], 0.0, 1e-6);
    }

    #[test]
    fn rsi_mixed_seed() {
        // Changes: +0.34, -0.25, -0.48 → RSI[3] = 100 - 100/(1 + 0.34/0.73)
        let bars = make_bars(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        let result = compute_series(&mut Rsi::new(3), &bars);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);
        assert!(result[4] > result[3]);
    }

    #[test]
    fn rsi_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let result = compute_series(&mut Rsi::new(3), &bars);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!(
                    (0.0..=100.0).contains(&v),
                    "RSI out of bounds at bar {i}: {v}"
                );
            }
        }
    }

    #[test]
    fn rsi_delta_tracks_previous_value() {
        let bars = make_bars(&[100.0, 99.0, 100.0, 98.0, 101.0]);
        let mut rsi = Rsi::new(2);
        for bar in &bars[..3] {
            rsi.update(bar);
        }
        assert!(rsi.delta().is_none(), "only one value so far");
        let before = rsi.value().unwrap();
        rsi.update(&bars[3]);
        let after = rsi.value().unwrap();
        assert_approx(rsi.delta().unwrap(), after - before, 1e-12);
        assert!(rsi.delta().unwrap() < 0.0);
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}

//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period), seeded with the mean of the
//! first `period` true ranges. The first bar has no previous close and
//! contributes no true range, so the first value appears at index `period`.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    current: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            current: None,
        }
    }
}

/// True range of `bar` given the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        let Some(prev_close) = self.prev_close.replace(bar.close) else {
            return None;
        };
        let tr = true_range(bar, prev_close);

        match self.current {
            None => {
                self.seed_sum += tr;
                self.seed_count += 1;
                if self.seed_count == self.period {
                    self.current = Some(self.seed_sum / self.period as f64);
                }
            }
            Some(prev) => {
                let alpha = 1.0 / self.period as f64;
                self.current = Some(alpha * tr + (1.0 - alpha) * prev);
            }
        }
        self.current
    }

    fn value(&self) -> Option<f64> {
        self.current
    }
}

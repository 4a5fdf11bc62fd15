//! Simple Moving Average (SMA) over a chosen bar field.
//!
//! Rolling mean over a fixed window, maintained with a running sum.
//! Lookback: period - 1 (first valid value once `period` bars are in).

use std::collections::VecDeque;

use super::Indicator;
use crate::domain::Bar;

/// Bar field an [`Sma`] averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Close,
    Volume,
}

impl PriceField {
    fn extract(self, bar: &Bar) -> f64 {
        match self {
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }

    fn label(self) -> &'static str {
        match self {
            PriceField::Close => "sma",
            PriceField::Volume => "volume_sma",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    field: PriceField,
    name: String,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self::of(PriceField::Close, period)
    }

    pub fn of(field: PriceField, period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            field,
            name: format!("{}_{period}", field.label()),
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        let v = self.field.extract(bar);
        self.window.push_back(v);
        self.sum += v;
        if self.window.len() > self.period {
            if let Some(leaving) = self.window.pop_front() {
                self.sum -= leaving;
            }
        }
        self.value()
    }

    fn value(&self) -> Option<f64> {
        (self.window.len() == self.period).then(|| self.sum / self.period as f64)
    }
}

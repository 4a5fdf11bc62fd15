//! Streaming indicators.
//!
//! The engine sees one bar at a time and keeps only a bounded window, so every
//! indicator here is incremental: `update` folds in the next bar in O(1) and
//! `value` reads the latest output without mutating anything. No indicator
//! value at bar t depends on bar t+1 or later by construction.

pub mod atr;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use rsi::Rsi;
pub use sma::{PriceField, Sma};

use crate::domain::Bar;

/// Trait for streaming indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_7", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars consumed before the first valid value.
    fn lookback(&self) -> usize;

    /// Fold in the next bar and return the updated value, if warmed up.
    fn update(&mut self, bar: &Bar) -> Option<f64>;

    /// Latest value, `None` during warmup.
    fn value(&self) -> Option<f64>;
}

/// Run an indicator over a whole series, producing one entry per bar.
///
/// Warmup entries are `f64::NAN`.
pub fn compute_series(indicator: &mut dyn Indicator, bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .map(|bar| indicator.update(bar).unwrap_or(f64::NAN))
        .collect()
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

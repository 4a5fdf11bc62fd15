//! Seeded synthetic bars for development and demos.
//!
//! The series is a bounded random walk around an anchor price plus a slow
//! oscillation, so swing highs and lows repeat near the same prices and form
//! levels. Every so often the anchor jumps on heavy volume, which gives the
//! engine breakouts to find. Same seed, same bars.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use retestlab_core::domain::Bar;

/// Generate `n` daily bars starting at `start`.
pub fn synthetic_bars(seed: u64, n: usize, start: DateTime<Utc>) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut anchor = 100.0_f64;
    let period = rng.gen_range(10.0..24.0_f64);
    let amplitude = rng.gen_range(0.02..0.04_f64);
    let mut prev_close = anchor;
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let mut volume = 1_000_000.0 * rng.gen_range(0.7..1.3_f64);

        // regime shift roughly every 40 bars
        if i > 0 && rng.gen_bool(1.0 / 40.0) {
            let jump = rng.gen_range(0.03..0.06_f64);
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            anchor *= 1.0 + sign * jump;
            volume *= 1.8;
        }
        anchor = (anchor * (1.0 + rng.gen_range(-0.002..0.002_f64))).max(5.0);

        let phase = std::f64::consts::TAU * i as f64 / period;
        let target = anchor * (1.0 + amplitude * phase.sin());
        let noise = rng.gen_range(-0.006..0.006_f64) * target;
        // pull toward the target rather than snapping to it
        let close = (prev_close + (target - prev_close) * 0.6 + noise).max(1.0);
        let open = prev_close;
        let wick = close * 0.004;
        let high = open.max(close) + wick * rng.gen_range(0.1..1.0_f64);
        let low = (open.min(close) - wick * rng.gen_range(0.1..1.0_f64)).max(0.5);

        bars.push(Bar {
            timestamp: start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume: volume.round(),
        });
        prev_close = close;
    }

    bars
}

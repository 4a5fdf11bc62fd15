//! Breakout Detector: close-based, volume-confirmed breaks of a level.
//!
//! Only closes are compared against levels. A candidate needs the close to
//! cross `level * (1 ± min_breakout_strength)` on this bar and volume at or
//! above `breakout_volume_factor` times the baseline. Intrabar highs and lows
//! are never consulted.

use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Bar, BreakoutCandidate, Direction, IdGen, Level, LevelKind};

/// Per-bar inputs the detector needs besides the levels.
#[derive(Debug, Clone, Copy)]
pub struct BreakoutInput<'a> {
    pub bar_index: usize,
    pub bar: &'a Bar,
    pub prev_close: f64,
    /// Mean volume of the preceding bars, excluding this one.
    pub volume_baseline: Option<f64>,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BreakoutDetector {
    min_strength: f64,
    volume_factor: f64,
    dedup_tolerance: f64,
}

impl BreakoutDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_strength: config.min_breakout_strength,
            volume_factor: config.breakout_volume_factor,
            dedup_tolerance: config.level_tolerance,
        }
    }

    /// Breakout threshold for a level in the given direction.
    pub fn threshold(&self, level_price: f64, direction: Direction) -> f64 {
        level_price * (1.0 + direction.sign() * self.min_strength)
    }

    /// Whether the close crossed the level's threshold on this bar.
    pub fn crossed(&self, level_price: f64, direction: Direction, prev_close: f64, close: f64) -> bool {
        let threshold = self.threshold(level_price, direction);
        match direction {
            Direction::Bullish => prev_close <= threshold && close > threshold,
            Direction::Bearish => prev_close >= threshold && close < threshold,
        }
    }

    /// Look for a new candidate on this bar.
    ///
    /// At most one candidate per bar: a close can only move one way relative to
    /// the previous close, and the nearest crossed level wins. Breaks of a level
    /// already pending in the same direction are dropped.
    pub fn detect<'a>(
        &self,
        input: BreakoutInput<'_>,
        levels: &[Level],
        pending: impl IntoIterator<Item = &'a BreakoutCandidate>,
        ids: &mut IdGen,
    ) -> Option<BreakoutCandidate> {
        let bar = input.bar;
        let direction = if bar.close > input.prev_close {
            Direction::Bullish
        } else if bar.close < input.prev_close {
            Direction::Bearish
        } else {
            return None;
        };
        let wanted = match direction {
            Direction::Bullish => LevelKind::Resistance,
            Direction::Bearish => LevelKind::Support,
        };

        let level = levels
            .iter()
            .filter(|l| l.kind == wanted)
            .filter(|l| self.crossed(l.price, direction, input.prev_close, bar.close))
            .min_by(|a, b| {
                (bar.close - a.price)
                    .abs()
                    .total_cmp(&(bar.close - b.price).abs())
            })?;

        let baseline = match input.volume_baseline {
            Some(b) if b > 0.0 => b,
            _ => return None,
        };
        let volume_ratio = bar.volume / baseline;
        if volume_ratio < self.volume_factor {
            debug!(
                index = input.bar_index,
                level = level.price,
                volume_ratio,
                "breakout rejected on volume"
            );
            return None;
        }

        let duplicate = pending.into_iter().any(|c| {
            c.direction == direction
                && ((c.level_price - level.price) / level.price).abs() <= self.dedup_tolerance
        });
        if duplicate {
            return None;
        }

        let candidate = BreakoutCandidate {
            id: ids.next_candidate_id(),
            level_price: level.price,
            level_strength: level.strength,
            direction,
            break_index: input.bar_index,
            break_close: bar.close,
            break_strength: break_strength(level, bar.close, volume_ratio, input.atr),
        };
        debug!(
            id = %candidate.id,
            index = input.bar_index,
            level = level.price,
            direction = ?direction,
            strength = candidate.break_strength,
            "breakout registered"
        );
        Some(candidate)
    }
}

/// Diagnostic conviction score: level strength plus volume and distance bonuses.
fn break_strength(level: &Level, close: f64, volume_ratio: f64, atr: Option<f64>) -> f64 {
    let mut strength = level.strength as f64;
    if volume_ratio > 2.0 {
        strength += 1.0;
    } else if volume_ratio > 1.5 {
        strength += 0.5;
    }
    if let Some(atr) = atr {
        if (close - level.price).abs() > 2.0 * atr {
            strength += 0.5;
        }
    }
    strength
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateId;
    use chrono::TimeZone;

    fn bar(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn resistance(price: f64) -> Level {
        Level {
            price,
            kind: LevelKind::Resistance,
            strength: 2,
            last_touch_index: 5,
        }
    }

    fn support(price: f64) -> Level {
        Level {
            kind: LevelKind::Support,
            ..resistance(price)
        }
    }

    fn input(bar: &Bar, prev_close: f64) -> BreakoutInput<'_> {
        BreakoutInput {
            bar_index: 20,
            bar,
            prev_close,
            volume_baseline: Some(1000.0),
            atr: Some(1.0),
        }
    }

    fn detector() -> BreakoutDetector {
        BreakoutDetector::new(&EngineConfig::default())
    }

    #[test]
    fn close_above_threshold_on_volume_breaks_out() {
        let b = bar(99.5, 101.5, 99.4, 101.2, 1300.0);
        let mut ids = IdGen::default();
        let c = detector()
            .detect(input(&b, 99.6), &[resistance(100.0)], [], &mut ids)
            .unwrap();
        assert_eq!(c.direction, Direction::Bullish);
        assert_eq!(c.level_price, 100.0);
        assert_eq!(c.break_index, 20);
        assert_eq!(c.break_strength, 2.0);
    }

    #[test]
    fn intrabar_high_without_close_is_ignored() {
        let b = bar(99.5, 103.0, 99.4, 100.5, 3000.0);
        let mut ids = IdGen::default();
        assert!(detector()
            .detect(input(&b, 99.6), &[resistance(100.0)], [], &mut ids)
            .is_none());
    }

    #[test]
    fn weak_close_below_min_strength_is_ignored() {
        // threshold is 100.8
        let b = bar(99.5, 101.0, 99.4, 100.7, 3000.0);
        let mut ids = IdGen::default();
        assert!(detector()
            .detect(input(&b, 99.6), &[resistance(100.0)], [], &mut ids)
            .is_none());
    }

    #[test]
    fn below_average_volume_is_rejected() {
        let b = bar(99.5, 101.5, 99.4, 101.2, 900.0);
        let mut ids = IdGen::default();
        assert!(detector()
            .detect(input(&b, 99.6), &[resistance(100.0)], [], &mut ids)
            .is_none());
    }

    #[test]
    fn no_baseline_means_no_breakout() {
        let b = bar(99.5, 101.5, 99.4, 101.2, 1300.0);
        let mut ids = IdGen::default();
        let inp = BreakoutInput {
            volume_baseline: None,
            ..input(&b, 99.6)
        };
        assert!(detector()
            .detect(inp, &[resistance(100.0)], [], &mut ids)
            .is_none());
    }

    #[test]
    fn staying_above_the_level_is_not_a_new_break() {
        let b = bar(101.2, 102.0, 101.0, 101.8, 1300.0);
        let mut ids = IdGen::default();
        assert!(detector()
            .detect(input(&b, 101.2), &[resistance(100.0)], [], &mut ids)
            .is_none());
    }

    #[test]
    fn bearish_break_of_support() {
        let b = bar(100.5, 100.6, 98.5, 98.8, 1500.0);
        let mut ids = IdGen::default();
        let c = detector()
            .detect(input(&b, 100.4), &[support(100.0), resistance(105.0)], [], &mut ids)
            .unwrap();
        assert_eq!(c.direction, Direction::Bearish);
        assert_eq!(c.level_price, 100.0);
    }

    #[test]
    fn nearest_crossed_level_wins() {
        let b = bar(99.0, 104.5, 98.9, 104.0, 1300.0);
        let mut ids = IdGen::default();
        let c = detector()
            .detect(
                input(&b, 98.0),
                &[resistance(99.0), resistance(102.0)],
                [],
                &mut ids,
            )
            .unwrap();
        assert_eq!(c.level_price, 102.0);
    }

    #[test]
    fn duplicate_pending_break_is_dropped() {
        let b = bar(99.5, 101.5, 99.4, 101.2, 1300.0);
        let pending = BreakoutCandidate {
            id: CandidateId(7),
            level_price: 100.2,
            level_strength: 2,
            direction: Direction::Bullish,
            break_index: 12,
            break_close: 101.3,
            break_strength: 2.0,
        };
        let mut ids = IdGen::default();
        assert!(detector()
            .detect(input(&b, 99.6), &[resistance(100.0)], [&pending], &mut ids)
            .is_none());
        // ids are only consumed by registered candidates
        assert_eq!(ids.next_candidate_id(), CandidateId(1));
    }

    #[test]
    fn strength_rewards_heavy_volume_and_distance() {
        let level = resistance(100.0);
        assert_eq!(break_strength(&level, 101.0, 1.2, Some(1.0)), 2.0);
        assert_eq!(break_strength(&level, 101.0, 1.6, Some(1.0)), 2.5);
        assert_eq!(break_strength(&level, 103.0, 2.5, Some(1.0)), 3.5);
        assert_eq!(break_strength(&level, 103.0, 2.5, None), 3.0);
    }
}

//! Reversal candlestick patterns used by retest confirmation.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Direction};

/// Body/range below this is a small-body (hammer-family) candle.
const SMALL_BODY: f64 = 0.3;
/// Directional shadow/range above this completes a hammer or shooting star.
const LONG_SHADOW: f64 = 0.6;
/// Body/range below this is a doji.
const DOJI_BODY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandlePattern {
    Engulfing,
    /// Hammer for longs, shooting star for shorts.
    Hammer,
    Doji,
    ColourReversal,
}

/// Reversal pattern in `direction` on `current`, checked against `prior`.
pub fn reversal_on(direction: Direction, current: &Bar, prior: Option<&Bar>) -> Option<CandlePattern> {
    if let Some(prior) = prior {
        if is_engulfing(direction, current, prior) {
            return Some(CandlePattern::Engulfing);
        }
    }
    if is_hammer(direction, current) {
        return Some(CandlePattern::Hammer);
    }
    if is_doji(current) {
        return Some(CandlePattern::Doji);
    }
    if let Some(prior) = prior {
        if is_colour_reversal(direction, current, prior) {
            return Some(CandlePattern::ColourReversal);
        }
    }
    None
}

/// Reversal pattern on the current bar or, failing that, on the prior bar.
pub fn reversal_pattern(
    direction: Direction,
    current: &Bar,
    prior: Option<&Bar>,
    before_prior: Option<&Bar>,
) -> Option<CandlePattern> {
    reversal_on(direction, current, prior)
        .or_else(|| prior.and_then(|p| reversal_on(direction, p, before_prior)))
}

pub fn is_engulfing(direction: Direction, current: &Bar, prior: &Bar) -> bool {
    match direction {
        Direction::Bullish => {
            prior.is_bearish()
                && current.is_bullish()
                && current.open <= prior.close
                && current.close >= prior.open
        }
        Direction::Bearish => {
            prior.is_bullish()
                && current.is_bearish()
                && current.open >= prior.close
                && current.close <= prior.open
        }
    }
}

pub fn is_hammer(direction: Direction, bar: &Bar) -> bool {
    let range = bar.range();
    if range <= 0.0 || bar.body() / range >= SMALL_BODY {
        return false;
    }
    let shadow = match direction {
        Direction::Bullish => bar.lower_shadow(),
        Direction::Bearish => bar.upper_shadow(),
    };
    shadow / range > LONG_SHADOW
}

pub fn is_doji(bar: &Bar) -> bool {
    let range = bar.range();
    range > 0.0 && bar.body() / range < DOJI_BODY
}

/// Green after red for longs, red after green for shorts.
pub fn is_colour_reversal(direction: Direction, current: &Bar, prior: &Bar) -> bool {
    match direction {
        Direction::Bullish => prior.is_bearish() && current.is_bullish(),
        Direction::Bearish => prior.is_bullish() && current.is_bearish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn bullish_engulfing() {
        let prior = bar(100.8, 100.9, 100.2, 100.3);
        let current = bar(100.2, 101.0, 100.1, 100.9);
        assert!(is_engulfing(Direction::Bullish, &current, &prior));
        assert!(!is_engulfing(Direction::Bearish, &current, &prior));
        assert_eq!(
            reversal_on(Direction::Bullish, &current, Some(&prior)),
            Some(CandlePattern::Engulfing)
        );
    }

    #[test]
    fn hammer_and_shooting_star() {
        let hammer = bar(100.6, 100.8, 99.0, 100.7);
        assert!(is_hammer(Direction::Bullish, &hammer));
        assert!(!is_hammer(Direction::Bearish, &hammer));

        let star = bar(99.4, 101.0, 99.2, 99.3);
        assert!(is_hammer(Direction::Bearish, &star));
    }

    #[test]
    fn doji_is_direction_neutral() {
        let doji = bar(100.0, 101.0, 99.0, 100.05);
        assert!(is_doji(&doji));
        assert_eq!(reversal_on(Direction::Bearish, &doji, None), Some(CandlePattern::Doji));
    }

    #[test]
    fn flat_bar_is_not_a_pattern() {
        let flat = bar(100.0, 100.0, 100.0, 100.0);
        assert!(!is_doji(&flat));
        assert!(!is_hammer(Direction::Bullish, &flat));
    }

    #[test]
    fn pattern_on_prior_bar_counts() {
        let before = bar(101.0, 101.1, 100.0, 100.2);
        let prior = bar(100.1, 101.4, 100.0, 101.3);
        // strong bullish bar, no pattern by itself
        let current = bar(101.3, 102.4, 101.2, 102.3);
        assert_eq!(reversal_on(Direction::Bullish, &current, Some(&prior)), None);
        assert_eq!(
            reversal_pattern(Direction::Bullish, &current, Some(&prior), Some(&before)),
            Some(CandlePattern::Engulfing)
        );
    }

    #[test]
    fn trend_continuation_bars_are_rejected() {
        let prior = bar(100.0, 101.1, 99.9, 101.0);
        let current = bar(101.0, 102.1, 100.9, 102.0);
        assert_eq!(
            reversal_pattern(Direction::Bullish, &current, Some(&prior), None),
            None
        );
    }
}

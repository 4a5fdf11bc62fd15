//! Retest confirmations as small pure predicates, combined by a [`ConfirmationRule`].

use serde::{Deserialize, Serialize};

use crate::config::ConfirmationRule;
use crate::domain::Direction;

use super::patterns::CandlePattern;

/// Per-bar tally for one pending candidate. Never persisted past resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationScore {
    pub pattern: Option<CandlePattern>,
    pub momentum_match: bool,
    pub volume_match: bool,
}

impl ConfirmationScore {
    pub fn pattern_match(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn passed(&self) -> u8 {
        [self.pattern_match(), self.momentum_match, self.volume_match]
            .iter()
            .filter(|&&b| b)
            .count() as u8
    }
}

/// Verdict of a rule over a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleVerdict {
    pub confirmed: bool,
    /// Fraction of confirmations passed, weighted when the rule is.
    pub confidence: f64,
}

impl ConfirmationRule {
    pub fn apply(&self, score: &ConfirmationScore) -> RuleVerdict {
        match *self {
            ConfirmationRule::Count { min } => {
                let passed = score.passed();
                RuleVerdict {
                    confirmed: passed >= min,
                    confidence: f64::from(passed) / 3.0,
                }
            }
            ConfirmationRule::Weighted {
                pattern,
                momentum,
                volume,
                threshold,
            } => {
                let total = pattern + momentum + volume;
                let mut earned = 0.0;
                if score.pattern_match() {
                    earned += pattern;
                }
                if score.momentum_match {
                    earned += momentum;
                }
                if score.volume_match {
                    earned += volume;
                }
                let confidence = if total > 0.0 { earned / total } else { 0.0 };
                RuleVerdict {
                    confirmed: confidence >= threshold,
                    confidence,
                }
            }
        }
    }
}

/// RSI turned in the breakout's favour by at least `threshold` and sits strictly
/// inside the non-extreme band.
pub fn momentum_confirms(
    direction: Direction,
    rsi: Option<f64>,
    rsi_delta: Option<f64>,
    threshold: f64,
    band: (f64, f64),
) -> bool {
    match (rsi, rsi_delta) {
        (Some(rsi), Some(delta)) => {
            rsi > band.0 && rsi < band.1 && delta * direction.sign() >= threshold
        }
        _ => false,
    }
}

/// Volume at or above `ratio` times the baseline. No baseline, no confirmation.
pub fn volume_confirms(volume: f64, baseline: Option<f64>, ratio: f64) -> bool {
    matches!(baseline, Some(b) if b > 0.0 && volume >= ratio * b)
}

/// Abnormally thin retest volume vetoes confirmation regardless of the rule.
pub fn is_thin_volume(volume: f64, baseline: Option<f64>, thin_ratio: f64) -> bool {
    matches!(baseline, Some(b) if b > 0.0 && volume < thin_ratio * b)
}

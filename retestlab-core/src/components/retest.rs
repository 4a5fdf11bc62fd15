//! Retest Confirmation Engine: the `PENDING_RETEST -> CONFIRMED | INVALIDATED`
//! state machine for breakout candidates.
//!
//! The tracker owns every pending candidate. Evaluating a bar is read-only and
//! yields a [`RetestState`] per candidate; the caller then calls
//! [`RetestTracker::resolve`], which removes the candidate. A removed candidate
//! cannot be resolved a second time.

use serde::{Deserialize, Serialize};

use crate::config::{ConfirmationRule, EngineConfig};
use crate::domain::{Bar, BreakoutCandidate, CandidateId, Direction};

use super::confirm::{self, ConfirmationScore};
use super::patterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Unconfirmed past `max_retest_age` bars.
    Expired,
    /// Closed back through the level against the breakout.
    FailedRetest,
}

/// What one bar did to one pending candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum RetestState {
    Pending,
    Confirmed {
        score: ConfirmationScore,
        confidence: f64,
    },
    Invalidated(InvalidationReason),
}

/// Market state the confirmations read on the current bar.
#[derive(Debug, Clone, Copy)]
pub struct RetestContext<'a> {
    pub bar_index: usize,
    pub bar: &'a Bar,
    pub prior: Option<&'a Bar>,
    pub before_prior: Option<&'a Bar>,
    pub rsi: Option<f64>,
    pub rsi_delta: Option<f64>,
    pub volume_baseline: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RetestTracker {
    tolerance: f64,
    min_bounce: f64,
    max_age: usize,
    rsi_threshold: f64,
    rsi_band: (f64, f64),
    volume_ratio: f64,
    thin_volume_ratio: f64,
    rule: ConfirmationRule,
    pending: Vec<BreakoutCandidate>,
}

impl RetestTracker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tolerance: config.retest_tolerance,
            min_bounce: config.min_retest_bounce,
            max_age: config.max_retest_age,
            rsi_threshold: config.rsi_momentum_threshold,
            rsi_band: config.rsi_band,
            volume_ratio: config.retest_volume_ratio,
            thin_volume_ratio: config.thin_volume_ratio,
            rule: config.confirmation_rule,
            pending: Vec::new(),
        }
    }

    /// Candidates in `PENDING_RETEST`, in creation order.
    pub fn pending(&self) -> &[BreakoutCandidate] {
        &self.pending
    }

    pub fn track(&mut self, candidate: BreakoutCandidate) {
        self.pending.push(candidate);
    }

    /// Evaluate every pending candidate against the current bar.
    pub fn evaluate(&self, ctx: &RetestContext<'_>) -> Vec<(CandidateId, RetestState)> {
        self.pending
            .iter()
            .map(|c| (c.id, self.evaluate_one(c, ctx)))
            .collect()
    }

    /// Remove a candidate on resolution. `None` if it is not pending.
    pub fn resolve(&mut self, id: CandidateId) -> Option<BreakoutCandidate> {
        let pos = self.pending.iter().position(|c| c.id == id)?;
        Some(self.pending.remove(pos))
    }

    pub fn evaluate_one(&self, candidate: &BreakoutCandidate, ctx: &RetestContext<'_>) -> RetestState {
        if ctx.bar_index <= candidate.break_index {
            return RetestState::Pending;
        }
        if candidate.age(ctx.bar_index) > self.max_age {
            return RetestState::Invalidated(InvalidationReason::Expired);
        }

        let level = candidate.level_price;
        let bar = ctx.bar;
        let (failed, touched, bounced) = match candidate.direction {
            Direction::Bullish => (
                bar.close < level * (1.0 - self.tolerance),
                bar.low <= level * (1.0 + self.tolerance),
                bar.close >= level * (1.0 + self.min_bounce),
            ),
            Direction::Bearish => (
                bar.close > level * (1.0 + self.tolerance),
                bar.high >= level * (1.0 - self.tolerance),
                bar.close <= level * (1.0 - self.min_bounce),
            ),
        };
        if failed {
            return RetestState::Invalidated(InvalidationReason::FailedRetest);
        }
        if !touched || !bounced {
            return RetestState::Pending;
        }
        if confirm::is_thin_volume(bar.volume, ctx.volume_baseline, self.thin_volume_ratio) {
            return RetestState::Pending;
        }

        let score = ConfirmationScore {
            pattern: patterns::reversal_pattern(
                candidate.direction,
                bar,
                ctx.prior,
                ctx.before_prior,
            ),
            momentum_match: confirm::momentum_confirms(
                candidate.direction,
                ctx.rsi,
                ctx.rsi_delta,
                self.rsi_threshold,
                self.rsi_band,
            ),
            volume_match: confirm::volume_confirms(bar.volume, ctx.volume_baseline, self.volume_ratio),
        };
        let verdict = self.rule.apply(&score);
        if verdict.confirmed {
            RetestState::Confirmed {
                score,
                confidence: verdict.confidence,
            }
        } else {
            RetestState::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn candidate(direction: Direction) -> BreakoutCandidate {
        BreakoutCandidate {
            id: CandidateId(1),
            level_price: 100.0,
            level_strength: 2,
            direction,
            break_index: 10,
            break_close: 101.2,
            break_strength: 2.0,
        }
    }

    fn ctx<'a>(index: usize, bar: &'a Bar, prior: &'a Bar) -> RetestContext<'a> {
        RetestContext {
            bar_index: index,
            bar,
            prior: Some(prior),
            before_prior: None,
            rsi: Some(53.0),
            rsi_delta: Some(5.0),
            volume_baseline: Some(1000.0),
        }
    }

    fn tracker() -> RetestTracker {
        RetestTracker::new(&EngineConfig::default())
    }

    #[test]
    fn engulfing_pullback_on_average_volume_confirms() {
        let prior = bar(100.9, 101.0, 100.3, 100.4, 900.0);
        let current = bar(100.2, 101.0, 100.1, 100.95, 1000.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(13, &current, &prior));
        match state {
            RetestState::Confirmed { score, confidence } => {
                assert_eq!(score.passed(), 3);
                assert_eq!(confidence, 1.0);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    #[test]
    fn thin_volume_keeps_candidate_pending() {
        let prior = bar(100.9, 101.0, 100.3, 100.4, 900.0);
        let current = bar(100.2, 101.0, 100.1, 100.95, 400.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(13, &current, &prior));
        assert_eq!(state, RetestState::Pending);
    }

    #[test]
    fn no_touch_no_evaluation() {
        let prior = bar(101.5, 101.8, 101.2, 101.3, 900.0);
        let current = bar(101.2, 102.0, 100.9, 101.9, 1500.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(13, &current, &prior));
        assert_eq!(state, RetestState::Pending);
    }

    #[test]
    fn close_back_through_level_invalidates() {
        let prior = bar(100.9, 101.0, 100.3, 100.4, 900.0);
        let current = bar(100.4, 100.5, 98.9, 99.2, 1500.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(13, &current, &prior));
        assert_eq!(state, RetestState::Invalidated(InvalidationReason::FailedRetest));
    }

    #[test]
    fn stale_candidate_expires() {
        let prior = bar(101.5, 101.8, 101.2, 101.3, 900.0);
        let current = bar(101.2, 102.0, 101.0, 101.9, 1500.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(23, &current, &prior));
        assert_eq!(state, RetestState::Invalidated(InvalidationReason::Expired));
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(22, &current, &prior));
        assert_eq!(state, RetestState::Pending);
    }

    #[test]
    fn breakout_bar_itself_is_not_a_retest() {
        let prior = bar(100.9, 101.0, 100.3, 100.4, 900.0);
        let current = bar(100.2, 101.0, 100.1, 100.95, 1000.0);
        let state = tracker().evaluate_one(&candidate(Direction::Bullish), &ctx(10, &current, &prior));
        assert_eq!(state, RetestState::Pending);
    }

    #[test]
    fn bearish_retest_mirrors() {
        let prior = bar(99.2, 99.7, 99.1, 99.6, 900.0);
        let current = bar(99.8, 99.9, 99.0, 99.05, 1000.0);
        let context = RetestContext {
            rsi: Some(45.0),
            rsi_delta: Some(-4.0),
            ..ctx(12, &current, &prior)
        };
        let state = tracker().evaluate_one(&candidate(Direction::Bearish), &context);
        assert!(matches!(state, RetestState::Confirmed { .. }));
    }

    #[test]
    fn resolve_removes_exactly_once() {
        let mut t = tracker();
        t.track(candidate(Direction::Bullish));
        assert_eq!(t.pending().len(), 1);
        assert!(t.resolve(CandidateId(1)).is_some());
        assert!(t.resolve(CandidateId(1)).is_none());
        assert!(t.pending().is_empty());
    }
}

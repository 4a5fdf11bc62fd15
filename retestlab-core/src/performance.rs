//! Performance tracking: cumulative retest and trade statistics.

use serde::{Deserialize, Serialize};

use crate::domain::SignalId;

/// Realized result of a trade, reported back by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub signal_id: SignalId,
    pub exit_price: f64,
    pub exit_index: usize,
    pub pnl: f64,
}

impl TradeOutcome {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Monotonic counters for one engine instance. Never reset during a run.
///
/// `retest_attempts == successful_retests + invalidated_retests` holds after
/// every bar. `trades` counts accepted entries; `wins + losses` counts the
/// ones whose outcome has been reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub retest_attempts: u64,
    pub successful_retests: u64,
    pub invalidated_retests: u64,
    pub signals_generated: u64,
    pub signals_muted: u64,
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub cumulative_pnl: f64,
}

impl PerformanceCounters {
    pub fn record_confirmation(&mut self) {
        self.retest_attempts += 1;
        self.successful_retests += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.retest_attempts += 1;
        self.invalidated_retests += 1;
    }

    pub fn record_signal(&mut self, actionable: bool) {
        self.signals_generated += 1;
        if actionable {
            self.trades += 1;
        } else {
            self.signals_muted += 1;
        }
    }

    pub fn record_outcome(&mut self, outcome: &TradeOutcome) {
        if outcome.is_win() {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.cumulative_pnl += outcome.pnl;
    }

    pub fn closed_trades(&self) -> u64 {
        self.wins + self.losses
    }

    /// Fraction of resolved retests that confirmed. `None` before any resolution.
    pub fn retest_success_rate(&self) -> Option<f64> {
        ratio(self.successful_retests, self.retest_attempts)
    }

    pub fn win_rate(&self) -> Option<f64> {
        ratio(self.wins, self.closed_trades())
    }

    pub fn average_pnl(&self) -> Option<f64> {
        let closed = self.closed_trades();
        (closed > 0).then(|| self.cumulative_pnl / closed as f64)
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

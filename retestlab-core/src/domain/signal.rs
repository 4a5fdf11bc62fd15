//! Breakout candidates, signals and their dispositions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CandidateId, SignalId};

/// Direction of a breakout and of the trade it leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Close broke above resistance; the trade is long.
    Bullish,
    /// Close broke below support; the trade is short.
    Bearish,
}

impl Direction {
    /// +1.0 for bullish, -1.0 for bearish.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
        }
    }
}

/// A close-confirmed, volume-backed break of a level awaiting its retest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutCandidate {
    pub id: CandidateId,
    pub level_price: f64,
    pub level_strength: usize,
    pub direction: Direction,
    pub break_index: usize,
    pub break_close: f64,
    /// Diagnostic conviction score (level strength plus volume/ATR bonuses).
    pub break_strength: f64,
}

impl BreakoutCandidate {
    pub fn age(&self, current_index: usize) -> usize {
        current_index.saturating_sub(self.break_index)
    }
}

/// Where the stop price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopSource {
    /// Just beyond a qualifying swing point.
    Structure,
    /// No swing qualified; ATR multiple from entry.
    AtrFallback,
}

/// Where the target price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSource {
    /// Nearest unbroken level in the trade's favour.
    Level,
    /// No level qualified; fixed multiple of risk.
    RiskMultiple,
    /// Pushed out to satisfy the minimum risk-reward ratio.
    MinRiskReward,
}

/// Terminal artifact of the pipeline: an entry with risk levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub candidate_id: CandidateId,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    /// Fraction of confirmations passed, reduced when the stop is an ATR fallback.
    pub confidence: f64,
    pub level_price: f64,
    pub stop_source: StopSource,
    pub target_source: TargetSource,
}

impl Signal {
    /// Distance from entry to stop, positive for a well-formed signal.
    pub fn risk(&self) -> f64 {
        (self.entry_price - self.stop_price) * self.direction.sign()
    }

    /// Distance from entry to target, positive for a well-formed signal.
    pub fn reward(&self) -> f64 {
        (self.target_price - self.entry_price) * self.direction.sign()
    }

    pub fn risk_reward(&self) -> f64 {
        let risk = self.risk();
        if risk > 0.0 {
            self.reward() / risk
        } else {
            0.0
        }
    }
}

/// Why a generated signal was not made actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuteReason {
    Cooldown,
    Spacing,
    TrendFilter,
    Volatility,
}

impl std::fmt::Display for MuteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuteReason::Cooldown => write!(f, "cooldown"),
            MuteReason::Spacing => write!(f, "spacing"),
            MuteReason::TrendFilter => write!(f, "trend_filter"),
            MuteReason::Volatility => write!(f, "volatility"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Actionable,
    Muted(MuteReason),
}

/// A signal as emitted by one `process` call, tagged with its pacing verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub disposition: Disposition,
}

impl SignalEvent {
    pub fn is_actionable(&self) -> bool {
        matches!(self.disposition, Disposition::Actionable)
    }
}

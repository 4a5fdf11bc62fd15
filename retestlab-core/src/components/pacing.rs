//! Trade Pacing Controller: cooldown and price-spacing rules, plus the optional
//! trend and volatility filters, deciding whether a signal becomes a trade.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, TrendFilter};
use crate::domain::{Direction, Disposition, MuteReason, Signal};

/// One accepted entry, kept only for pacing checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLedgerEntry {
    pub entry_price: f64,
    pub entry_index: usize,
}

/// Append-only ledger pruned by age and capacity.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    entries: VecDeque<TradeLedgerEntry>,
    capacity: usize,
    horizon: usize,
}

impl TradeLedger {
    pub fn new(capacity: usize, horizon: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            horizon,
        }
    }

    pub fn record(&mut self, entry: TradeLedgerEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn prune(&mut self, current_index: usize) {
        while let Some(front) = self.entries.front() {
            if current_index.saturating_sub(front.entry_index) > self.horizon {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TradeLedgerEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Market readings the optional filters need on the signal bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterInputs {
    pub close: f64,
    pub trend_sma: Option<f64>,
    pub atr: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PacingController {
    cooldown_bars: usize,
    min_spacing: f64,
    trend_filter: Option<TrendFilter>,
    min_atr_pct: f64,
    ledger: TradeLedger,
    last_entry_index: Option<usize>,
}

impl PacingController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cooldown_bars: config.trade_cooldown_days,
            min_spacing: config.min_trade_spacing,
            trend_filter: config.trend_filter,
            min_atr_pct: config.min_atr_pct,
            ledger: TradeLedger::new(config.ledger_capacity, config.ledger_horizon),
            last_entry_index: None,
        }
    }

    /// Decide whether `signal`, generated on `bar_index`, may be traded.
    ///
    /// Checks run in order: cooldown, spacing, trend filter, volatility filter.
    pub fn check(&self, signal: &Signal, bar_index: usize, inputs: FilterInputs) -> Disposition {
        if let Some(last) = self.last_entry_index {
            if bar_index.saturating_sub(last) < self.cooldown_bars {
                return Disposition::Muted(MuteReason::Cooldown);
            }
        }

        let entry = signal.entry_price;
        let crowded = self
            .ledger
            .entries()
            .any(|e| ((entry - e.entry_price) / e.entry_price).abs() < self.min_spacing);
        if crowded {
            return Disposition::Muted(MuteReason::Spacing);
        }

        if let Some(filter) = &self.trend_filter {
            let with_trend = match inputs.trend_sma {
                Some(sma) => match signal.direction {
                    Direction::Bullish => inputs.close >= sma * (1.0 + filter.band),
                    Direction::Bearish => inputs.close <= sma * (1.0 - filter.band),
                },
                None => false,
            };
            if !with_trend {
                return Disposition::Muted(MuteReason::TrendFilter);
            }
        }

        if self.min_atr_pct > 0.0 {
            let volatile_enough = matches!(
                inputs.atr,
                Some(atr) if inputs.close > 0.0 && atr / inputs.close >= self.min_atr_pct
            );
            if !volatile_enough {
                return Disposition::Muted(MuteReason::Volatility);
            }
        }

        Disposition::Actionable
    }

    /// Record an accepted entry.
    pub fn accept(&mut self, entry_price: f64, bar_index: usize) {
        self.ledger.record(TradeLedgerEntry {
            entry_price,
            entry_index: bar_index,
        });
        self.last_entry_index = Some(bar_index);
    }

    /// Age out ledger entries. Called once per bar.
    pub fn on_bar(&mut self, bar_index: usize) {
        self.ledger.prune(bar_index);
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn last_entry_index(&self) -> Option<usize> {
        self.last_entry_index
    }
}

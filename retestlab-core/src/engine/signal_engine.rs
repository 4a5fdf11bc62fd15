use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::components::{
    BreakoutDetector, BreakoutInput, FilterInputs, LevelDetector, PacingController, RetestContext,
    RetestState, RetestTracker, RiskCalculator, TradeLedger,
};
use crate::config::EngineConfig;
use crate::domain::{
    Bar, BreakoutCandidate, CandidateId, Direction, Disposition, IdGen, Level, Signal, SignalEvent,
    SignalId, SwingPoint,
};
use crate::error::EngineError;
use crate::indicators::{Atr, Indicator, PriceField, Rsi, Sma};
use crate::performance::{PerformanceCounters, TradeOutcome};

/// Readings taken once per bar and shared by the resolve and detect phases.
#[derive(Debug, Clone, Copy)]
struct BarReadings {
    index: usize,
    bar: Bar,
    prior: Option<Bar>,
    before_prior: Option<Bar>,
    prev_close: Option<f64>,
    volume_baseline: Option<f64>,
    atr: Option<f64>,
    rsi: Option<f64>,
    rsi_delta: Option<f64>,
    trend_sma: Option<f64>,
}

/// Breakout/retest signal engine for a single asset.
///
/// Deterministic: the same configuration and bar sequence always produce the
/// same events. Not shared across assets; run one instance per asset.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    window: VecDeque<Bar>,
    capacity: usize,
    bars_seen: usize,
    last_timestamp: Option<DateTime<Utc>>,

    levels: LevelDetector,
    breakouts: BreakoutDetector,
    retests: RetestTracker,
    risk: RiskCalculator,
    pacing: PacingController,

    atr: Atr,
    rsi: Rsi,
    volume_avg: Sma,
    trend_sma: Option<Sma>,

    ids: IdGen,
    counters: PerformanceCounters,
    open_trades: BTreeMap<SignalId, Signal>,
}

impl SignalEngine {
    /// Build an engine. Invalid configuration is rejected here, never clamped.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let capacity = config.window_capacity();
        Ok(Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
            bars_seen: 0,
            last_timestamp: None,
            levels: LevelDetector::new(&config),
            breakouts: BreakoutDetector::new(&config),
            retests: RetestTracker::new(&config),
            risk: RiskCalculator::new(&config),
            pacing: PacingController::new(&config),
            atr: Atr::new(config.atr_period),
            rsi: Rsi::new(config.rsi_period),
            volume_avg: Sma::of(PriceField::Volume, config.volume_period),
            trend_sma: config.trend_filter.map(|f| Sma::new(f.period)),
            ids: IdGen::default(),
            counters: PerformanceCounters::default(),
            open_trades: BTreeMap::new(),
            config,
        })
    }

    /// Ingest one bar and return the signals it produced (possibly none).
    ///
    /// Malformed and out-of-order bars are rejected before any state changes,
    /// so the engine can keep consuming the stream after an error.
    pub fn process(&mut self, bar: Bar) -> Result<Vec<SignalEvent>, EngineError> {
        let index = self.bars_seen;
        if !bar.is_sane() {
            warn!(index, timestamp = %bar.timestamp, "rejected malformed bar");
            return Err(EngineError::MalformedBar {
                index,
                timestamp: bar.timestamp,
            });
        }
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                warn!(index, timestamp = %bar.timestamp, %previous, "rejected out-of-order bar");
                return Err(EngineError::OutOfOrderBar {
                    index,
                    timestamp: bar.timestamp,
                    previous,
                });
            }
        }

        let readings = self.ingest(index, bar);

        let mut events = Vec::new();
        self.resolve_retests(&readings, &mut events);
        self.detect_breakout(&readings);
        Ok(events)
    }

    /// Process a whole series, stopping at the first rejected bar.
    pub fn process_all(
        &mut self,
        bars: impl IntoIterator<Item = Bar>,
    ) -> Result<Vec<SignalEvent>, EngineError> {
        let mut events = Vec::new();
        for bar in bars {
            events.extend(self.process(bar)?);
        }
        Ok(events)
    }

    /// Notification hook for the executor: a trade opened from `outcome.signal_id` closed.
    pub fn record_trade_outcome(&mut self, outcome: TradeOutcome) -> Result<(), EngineError> {
        let id = outcome.signal_id;
        if self.open_trades.remove(&id).is_none() {
            // ids are sequential, so an issued id that is not open was closed or muted
            return Err(if self.ids.was_issued(id) {
                EngineError::DuplicateOutcome(id)
            } else {
                EngineError::UnknownTrade(id)
            });
        }
        self.counters.record_outcome(&outcome);
        info!(
            signal = %id,
            exit_price = outcome.exit_price,
            pnl = outcome.pnl,
            win = outcome.is_win(),
            "trade outcome recorded"
        );
        Ok(())
    }

    pub fn counters(&self) -> &PerformanceCounters {
        &self.counters
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_seen
    }

    /// False while fewer than `lookback_period` bars have been seen.
    pub fn is_warmed_up(&self) -> bool {
        self.bars_seen >= self.config.lookback_period
    }

    /// Every retained swing, expired ones included.
    pub fn swing_history(&self) -> impl Iterator<Item = &SwingPoint> {
        self.levels.arena().iter()
    }

    pub fn levels(&self) -> &[Level] {
        self.levels.levels()
    }

    /// Candidates still awaiting a retest.
    pub fn pending(&self) -> &[BreakoutCandidate] {
        self.retests.pending()
    }

    /// Accepted signals whose outcome has not been reported yet.
    pub fn open_trades(&self) -> impl Iterator<Item = &Signal> {
        self.open_trades.values()
    }

    pub fn ledger(&self) -> &TradeLedger {
        self.pacing.ledger()
    }

    /// ATR as of the last processed bar.
    pub fn atr(&self) -> Option<f64> {
        self.atr.value()
    }

    /// Structure stop for a position in `direction` priced at `reference`,
    /// from the swings still active at the last processed bar.
    pub fn structure_stop(&self, direction: Direction, reference: f64) -> Option<f64> {
        let index = self.bars_seen.checked_sub(1)?;
        self.risk
            .structure_stop(direction, reference, self.levels.active_swings(index))
    }

    fn ingest(&mut self, index: usize, bar: Bar) -> BarReadings {
        let volume_baseline = self.volume_avg.value();
        let prior = self.window.back().copied();
        let before_prior = self.window.iter().rev().nth(1).copied();

        self.volume_avg.update(&bar);
        let atr = self.atr.update(&bar);
        let rsi = self.rsi.update(&bar);
        let rsi_delta = self.rsi.delta();
        let trend_sma = self.trend_sma.as_mut().and_then(|sma| sma.update(&bar));

        self.window.push_back(bar);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.bars_seen += 1;
        self.last_timestamp = Some(bar.timestamp);

        if index == 0 {
            debug!(
                lookback = self.config.lookback_period,
                "insufficient history, swing detection withheld until lookback fills"
            );
        }
        self.levels.on_bar(&self.window, index);
        self.pacing.on_bar(index);

        BarReadings {
            index,
            bar,
            prior,
            before_prior,
            prev_close: prior.map(|b| b.close),
            volume_baseline,
            atr,
            rsi,
            rsi_delta,
            trend_sma,
        }
    }

    fn resolve_retests(&mut self, r: &BarReadings, events: &mut Vec<SignalEvent>) {
        let ctx = RetestContext {
            bar_index: r.index,
            bar: &r.bar,
            prior: r.prior.as_ref(),
            before_prior: r.before_prior.as_ref(),
            rsi: r.rsi,
            rsi_delta: r.rsi_delta,
            volume_baseline: r.volume_baseline,
        };

        for (id, state) in self.retests.evaluate(&ctx) {
            match state {
                RetestState::Pending => {}
                RetestState::Invalidated(reason) => {
                    if self.retests.resolve(id).is_some() {
                        self.counters.record_invalidation();
                        debug!(candidate = %id, index = r.index, reason = ?reason, "retest invalidated");
                    }
                }
                RetestState::Confirmed { confidence, .. } => {
                    if let Some(event) = self.confirm(id, confidence, r) {
                        events.push(event);
                    }
                }
            }
        }
    }

    /// Turn a confirmed retest into a signal event. A candidate whose risk
    /// levels cannot be derived yet stays pending.
    fn confirm(&mut self, id: CandidateId, confidence: f64, r: &BarReadings) -> Option<SignalEvent> {
        let candidate = self.retests.pending().iter().find(|c| c.id == id)?.clone();
        let entry = r.bar.close;
        let Some(levels) = self.risk.compute(
            candidate.direction,
            entry,
            self.levels.active_swings(r.index),
            self.levels.levels(),
            r.atr,
        ) else {
            debug!(candidate = %id, index = r.index, "retest confirmed but no usable stop, still pending");
            return None;
        };

        self.retests.resolve(id)?;
        self.counters.record_confirmation();

        let signal = Signal {
            id: self.ids.next_signal_id(),
            candidate_id: candidate.id,
            direction: candidate.direction,
            entry_price: entry,
            stop_price: levels.stop,
            target_price: levels.target,
            confidence: confidence * levels.confidence_factor,
            level_price: candidate.level_price,
            stop_source: levels.stop_source,
            target_source: levels.target_source,
        };

        let disposition = self.pacing.check(
            &signal,
            r.index,
            FilterInputs {
                close: r.bar.close,
                trend_sma: r.trend_sma,
                atr: r.atr,
            },
        );
        let actionable = disposition == Disposition::Actionable;
        self.counters.record_signal(actionable);
        if actionable {
            self.pacing.accept(entry, r.index);
            self.open_trades.insert(signal.id, signal.clone());
            info!(
                signal = %signal.id,
                index = r.index,
                direction = ?signal.direction,
                entry = signal.entry_price,
                stop = signal.stop_price,
                target = signal.target_price,
                confidence = signal.confidence,
                "signal emitted"
            );
        } else {
            debug!(signal = %signal.id, index = r.index, disposition = ?disposition, "signal muted");
        }

        Some(SignalEvent {
            bar_index: r.index,
            timestamp: r.bar.timestamp,
            signal,
            disposition,
        })
    }

    fn detect_breakout(&mut self, r: &BarReadings) {
        let Some(prev_close) = r.prev_close else {
            return;
        };
        let input = BreakoutInput {
            bar_index: r.index,
            bar: &r.bar,
            prev_close,
            volume_baseline: r.volume_baseline,
            atr: r.atr,
        };
        if let Some(candidate) = self.breakouts.detect(
            input,
            self.levels.levels(),
            self.retests.pending(),
            &mut self.ids,
        ) {
            self.retests.track(candidate);
        }
    }
}

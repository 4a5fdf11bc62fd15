//! Simulated execution of actionable signals.
//!
//! One position at a time. A position fills at the signal's entry price on
//! the signal bar and is checked from the next bar on, in this order:
//!
//! 1. stop (the initial stop, or wherever trailing has moved it)
//! 2. target
//! 3. the holding limit, exiting at that bar's close
//! 4. the partial exit, once price covers its share of the way to target
//! 5. trailing: the stop ratchets from this bar's close, effective next bar
//!
//! Every exit is reported back to the engine through `record_trade_outcome`,
//! which is how win/loss counters get filled in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use retestlab_core::domain::{Bar, Direction, SignalEvent, SignalId};
use retestlab_core::{EngineError, SignalEngine, TradeOutcome};

use crate::config::ExecutionConfig;

/// Why a simulated position closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Stop,
    /// Stopped out after trailing moved the stop.
    TrailingStop,
    Target,
    MaxHolding,
}

/// The part of a position closed early at the partial-profit level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialFill {
    pub index: usize,
    pub price: f64,
    pub units: f64,
    pub pnl: f64,
}

/// A position currently held by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub signal_id: SignalId,
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub units: f64,
    /// Units still held after any partial exit.
    pub remaining: f64,
    pub partial: Option<PartialFill>,
}

impl OpenPosition {
    fn trailed(&self) -> bool {
        self.stop_price != self.initial_stop
    }

    /// Pnl of closing the remaining units at `exit_price`, plus any partial exit.
    pub fn realized_pnl(&self, exit_price: f64) -> f64 {
        let partial = self.partial.map_or(0.0, |p| p.pnl);
        partial + self.direction.sign() * (exit_price - self.entry_price) * self.remaining
    }

    /// Whether `candidate` is a tighter stop that still sits on the loss side of `close`.
    fn tightens(&self, candidate: f64, close: f64) -> bool {
        match self.direction {
            Direction::Bullish => candidate > self.stop_price && candidate < close,
            Direction::Bearish => candidate < self.stop_price && candidate > close,
        }
    }
}

/// A completed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub signal_id: SignalId,
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_price: f64,
    pub exit_index: usize,
    /// Price the remaining units closed at.
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub units: f64,
    pub partial: Option<PartialFill>,
    /// Realized over the whole position, partial exit included.
    pub pnl: f64,
}

impl TradeRecord {
    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }

    /// Signed return of the final exit relative to entry.
    pub fn return_pct(&self) -> f64 {
        self.direction.sign() * (self.exit_price - self.entry_price) / self.entry_price
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    config: ExecutionConfig,
    equity: f64,
    open: Option<OpenPosition>,
    trades: Vec<TradeRecord>,
    skipped: usize,
}

impl SimulatedExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            equity: config.initial_equity,
            config,
            open: None,
            trades: Vec::new(),
            skipped: 0,
        }
    }

    /// Manage the open position on `bar`: close it and notify the engine when
    /// an exit triggers, otherwise take the partial exit and trail the stop.
    /// Call after the engine has processed `bar` and before `on_events`.
    pub fn on_bar(
        &mut self,
        engine: &mut SignalEngine,
        bar_index: usize,
        bar: &Bar,
    ) -> Result<Option<TradeRecord>, EngineError> {
        let Some(mut position) = self.open else {
            return Ok(None);
        };
        if bar_index <= position.entry_index {
            return Ok(None);
        }
        let Some((exit_price, exit_reason)) = self.exit_for(&position, bar_index, bar) else {
            self.take_partial(&mut position, bar_index, bar);
            self.trail(&mut position, engine, bar);
            self.open = Some(position);
            return Ok(None);
        };

        let pnl = position.realized_pnl(exit_price);
        let record = TradeRecord {
            signal_id: position.signal_id,
            direction: position.direction,
            entry_index: position.entry_index,
            entry_price: position.entry_price,
            exit_index: bar_index,
            exit_price,
            exit_reason,
            units: position.units,
            partial: position.partial,
            pnl,
        };
        engine.record_trade_outcome(TradeOutcome {
            signal_id: record.signal_id,
            exit_price,
            exit_index: bar_index,
            pnl,
        })?;
        debug!(
            signal = %record.signal_id,
            reason = ?exit_reason,
            exit_price,
            pnl,
            "position closed"
        );
        self.equity += pnl;
        self.open = None;
        self.trades.push(record);
        Ok(Some(record))
    }

    /// Open a position from the first actionable event when flat.
    ///
    /// Actionable signals arriving while a position is open are skipped;
    /// the engine has already recorded them.
    pub fn on_events(&mut self, events: &[SignalEvent]) {
        for event in events.iter().filter(|e| e.is_actionable()) {
            if self.open.is_some() {
                self.skipped += 1;
                debug!(signal = %event.signal.id, "position open, signal skipped");
                continue;
            }
            let s = &event.signal;
            let units = self.config.sizing.units(self.equity, s.risk());
            if !(units > 0.0 && units.is_finite()) {
                self.skipped += 1;
                debug!(signal = %s.id, equity = self.equity, "no size for signal, skipped");
                continue;
            }
            self.open = Some(OpenPosition {
                signal_id: s.id,
                direction: s.direction,
                entry_index: event.bar_index,
                entry_price: s.entry_price,
                initial_stop: s.stop_price,
                stop_price: s.stop_price,
                target_price: s.target_price,
                units,
                remaining: units,
                partial: None,
            });
        }
    }

    fn exit_for(
        &self,
        position: &OpenPosition,
        bar_index: usize,
        bar: &Bar,
    ) -> Option<(f64, ExitReason)> {
        let (stop_hit, target_hit) = match position.direction {
            Direction::Bullish => (
                bar.low <= position.stop_price,
                bar.high >= position.target_price,
            ),
            Direction::Bearish => (
                bar.high >= position.stop_price,
                bar.low <= position.target_price,
            ),
        };
        if stop_hit {
            let reason = if position.trailed() {
                ExitReason::TrailingStop
            } else {
                ExitReason::Stop
            };
            Some((position.stop_price, reason))
        } else if target_hit {
            Some((position.target_price, ExitReason::Target))
        } else if bar_index - position.entry_index >= self.config.max_holding_bars {
            Some((bar.close, ExitReason::MaxHolding))
        } else {
            None
        }
    }

    /// Close part of the position once, at the partial-profit price.
    fn take_partial(&self, position: &mut OpenPosition, bar_index: usize, bar: &Bar) {
        let Some(partial) = self.config.partial_profit else {
            return;
        };
        if position.partial.is_some() {
            return;
        }
        let sign = position.direction.sign();
        let price = position.entry_price
            + (position.target_price - position.entry_price) * partial.level;
        let reached = match position.direction {
            Direction::Bullish => bar.high >= price,
            Direction::Bearish => bar.low <= price,
        };
        if !reached {
            return;
        }
        let units = position.remaining * partial.fraction;
        let pnl = sign * (price - position.entry_price) * units;
        position.remaining -= units;
        position.partial = Some(PartialFill {
            index: bar_index,
            price,
            units,
            pnl,
        });
        debug!(signal = %position.signal_id, price, units, pnl, "partial profit taken");
    }

    /// Ratchet the stop toward price; it never loosens.
    fn trail(&self, position: &mut OpenPosition, engine: &SignalEngine, bar: &Bar) {
        let sign = position.direction.sign();
        let atr_stop = self
            .config
            .trailing_atr_multiple
            .zip(engine.atr())
            .map(|(multiple, atr)| bar.close - sign * multiple * atr);
        let structure_stop = if self.config.structure_trailing {
            engine.structure_stop(position.direction, bar.close)
        } else {
            None
        };
        for candidate in [atr_stop, structure_stop].into_iter().flatten() {
            if position.tightens(candidate, bar.close) {
                debug!(
                    signal = %position.signal_id,
                    from = position.stop_price,
                    to = candidate,
                    "stop trailed"
                );
                position.stop_price = candidate;
            }
        }
    }

    pub fn open_position(&self) -> Option<&OpenPosition> {
        self.open.as_ref()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Initial equity plus realized pnl.
    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Actionable signals not taken, because a position was already open or
    /// sizing gave no units.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_trades(self) -> Vec<TradeRecord> {
        self.trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use retestlab_core::domain::{CandidateId, Disposition, Signal, StopSource, TargetSource};
    use retestlab_core::EngineConfig;

    use crate::config::{PartialProfit, PositionSizing};

    fn bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn long_event(id: u64, bar_index: usize) -> SignalEvent {
        SignalEvent {
            bar_index,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            signal: Signal {
                id: SignalId(id),
                candidate_id: CandidateId(id),
                direction: Direction::Bullish,
                entry_price: 100.0,
                stop_price: 97.0,
                target_price: 106.0,
                confidence: 1.0,
                level_price: 99.5,
                stop_source: StopSource::Structure,
                target_source: TargetSource::RiskMultiple,
            },
            disposition: Disposition::Actionable,
        }
    }

    fn executor(max_holding_bars: usize) -> SimulatedExecutor {
        SimulatedExecutor::new(ExecutionConfig {
            max_holding_bars,
            ..ExecutionConfig::default()
        })
    }

    /// An engine that has seen `n` flat bars with a constant 2.0 range. At `n = 15`
    /// the 14-bar ATR has just seeded at exactly 2.0.
    fn engine_with_atr(n: usize) -> SignalEngine {
        let mut engine = SignalEngine::new(EngineConfig::default()).unwrap();
        for i in 0..n {
            engine.process(bar(i, 101.0, 99.0, 100.0)).unwrap();
        }
        engine
    }

    /// Six-bar cycles with swing lows at 97.0 and swing highs at 100.0.
    fn engine_with_swings() -> SignalEngine {
        let cycle = [
            (98.6, 97.8, 98.4),
            (99.2, 98.2, 99.0),
            (100.0, 98.8, 99.5),
            (99.6, 98.7, 98.9),
            (99.0, 97.9, 98.1),
            (98.2, 97.0, 97.6),
        ];
        let mut engine = SignalEngine::new(EngineConfig::default()).unwrap();
        for i in 0..24 {
            let (h, l, c) = cycle[i % 6];
            engine.process(bar(i, h, l, c)).unwrap();
        }
        engine
    }

    #[test]
    fn flat_executor_ignores_bars() {
        let mut engine = SignalEngine::new(EngineConfig::default()).unwrap();
        let mut exec = executor(30);
        assert_eq!(exec.on_bar(&mut engine, 5, &bar(5, 200.0, 1.0, 100.0)).unwrap(), None);
    }

    #[test]
    fn stop_is_checked_before_target() {
        let mut exec = executor(30);
        exec.on_events(&[long_event(0, 10)]);
        let position = *exec.open_position().unwrap();
        // one bar spanning both stop and target
        let exit = exec.exit_for(&position, 11, &bar(11, 107.0, 96.0, 100.0));
        assert_eq!(exit, Some((97.0, ExitReason::Stop)));
    }

    #[test]
    fn target_then_holding_limit() {
        let mut exec = executor(3);
        exec.on_events(&[long_event(0, 10)]);
        let position = *exec.open_position().unwrap();
        assert_eq!(
            exec.exit_for(&position, 11, &bar(11, 106.5, 99.0, 105.0)),
            Some((106.0, ExitReason::Target))
        );
        assert_eq!(exec.exit_for(&position, 12, &bar(12, 101.0, 99.0, 100.5)), None);
        assert_eq!(
            exec.exit_for(&position, 13, &bar(13, 101.0, 99.0, 100.5)),
            Some((100.5, ExitReason::MaxHolding))
        );
    }

    #[test]
    fn signals_while_open_are_skipped() {
        let mut exec = executor(30);
        exec.on_events(&[long_event(0, 10), long_event(1, 10)]);
        exec.on_events(&[long_event(2, 12)]);
        assert_eq!(exec.open_position().unwrap().signal_id, SignalId(0));
        assert_eq!(exec.skipped(), 2);
    }

    #[test]
    fn muted_events_never_open_positions() {
        let mut exec = executor(30);
        let mut muted = long_event(0, 10);
        muted.disposition = Disposition::Muted(retestlab_core::domain::MuteReason::Cooldown);
        exec.on_events(&[muted]);
        assert!(exec.open_position().is_none());
        assert_eq!(exec.skipped(), 0);
    }

    #[test]
    fn short_exits_mirror_longs() {
        let mut exec = executor(30);
        let mut short = long_event(0, 10);
        short.signal.direction = Direction::Bearish;
        short.signal.stop_price = 103.0;
        short.signal.target_price = 94.0;
        exec.on_events(&[short]);
        let position = *exec.open_position().unwrap();
        assert_eq!(
            exec.exit_for(&position, 11, &bar(11, 101.0, 93.5, 95.0)),
            Some((94.0, ExitReason::Target))
        );
        assert_eq!(
            exec.exit_for(&position, 11, &bar(11, 103.5, 93.5, 95.0)),
            Some((103.0, ExitReason::Stop))
        );
    }

    #[test]
    fn short_record_reports_signed_return() {
        let record = TradeRecord {
            signal_id: SignalId(0),
            direction: Direction::Bearish,
            entry_index: 3,
            entry_price: 100.0,
            exit_index: 8,
            exit_price: 95.0,
            exit_reason: ExitReason::Target,
            units: 2.0,
            partial: None,
            pnl: 10.0,
        };
        assert_eq!(record.bars_held(), 5);
        assert!((record.return_pct() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn atr_trailing_ratchets_and_exits_as_trailing_stop() {
        let engine = engine_with_atr(15);
        assert_eq!(engine.atr(), Some(2.0));
        let mut exec = SimulatedExecutor::new(ExecutionConfig {
            trailing_atr_multiple: Some(1.0),
            ..ExecutionConfig::default()
        });
        exec.on_events(&[long_event(1, 10)]);
        let mut position = *exec.open_position().unwrap();

        let up = bar(11, 103.5, 100.5, 103.0);
        assert_eq!(exec.exit_for(&position, 11, &up), None);
        exec.trail(&mut position, &engine, &up);
        assert_eq!(position.stop_price, 101.0);
        assert_eq!(position.initial_stop, 97.0);

        // a lower close never loosens the stop
        exec.trail(&mut position, &engine, &bar(12, 102.0, 101.5, 101.8));
        assert_eq!(position.stop_price, 101.0);

        let down = bar(13, 102.0, 100.0, 100.5);
        assert_eq!(
            exec.exit_for(&position, 13, &down),
            Some((101.0, ExitReason::TrailingStop))
        );
        assert!((position.realized_pnl(101.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn short_atr_trailing_moves_the_stop_down() {
        let engine = engine_with_atr(15);
        let mut exec = SimulatedExecutor::new(ExecutionConfig {
            trailing_atr_multiple: Some(1.5),
            ..ExecutionConfig::default()
        });
        let mut short = long_event(1, 10);
        short.signal.direction = Direction::Bearish;
        short.signal.stop_price = 103.0;
        short.signal.target_price = 94.0;
        exec.on_events(&[short]);
        let mut position = *exec.open_position().unwrap();
        exec.trail(&mut position, &engine, &bar(11, 98.5, 96.5, 97.0));
        assert_eq!(position.stop_price, 100.0);
    }

    #[test]
    fn structure_trailing_follows_the_latest_swing() {
        let engine = engine_with_swings();
        let swing_stop = engine.structure_stop(Direction::Bullish, 100.3).unwrap();
        assert!((swing_stop - 97.0 * 0.995).abs() < 1e-9);
        let mut exec = SimulatedExecutor::new(ExecutionConfig {
            structure_trailing: true,
            ..ExecutionConfig::default()
        });
        let mut event = long_event(1, 10);
        event.signal.entry_price = 90.0;
        event.signal.stop_price = 85.0;
        event.signal.target_price = 110.0;
        exec.on_events(&[event]);
        let mut position = *exec.open_position().unwrap();
        exec.trail(&mut position, &engine, &bar(11, 100.5, 99.8, 100.3));
        assert_eq!(position.stop_price, swing_stop);
    }

    #[test]
    fn trailing_is_off_by_default() {
        let engine = engine_with_atr(15);
        let exec = executor(30);
        let mut position = OpenPosition {
            signal_id: SignalId(1),
            direction: Direction::Bullish,
            entry_index: 10,
            entry_price: 100.0,
            initial_stop: 97.0,
            stop_price: 97.0,
            target_price: 106.0,
            units: 1.0,
            remaining: 1.0,
            partial: None,
        };
        exec.trail(&mut position, &engine, &bar(11, 105.0, 103.0, 104.0));
        exec.take_partial(&mut position, 11, &bar(11, 105.0, 103.0, 104.0));
        assert_eq!(position.stop_price, 97.0);
        assert!(position.partial.is_none());
    }

    #[test]
    fn partial_exit_is_taken_once_and_counts_in_pnl() {
        let mut exec = SimulatedExecutor::new(ExecutionConfig {
            partial_profit: Some(PartialProfit::default()),
            sizing: PositionSizing::Fixed { units: 10.0 },
            ..ExecutionConfig::default()
        });
        exec.on_events(&[long_event(1, 10)]);
        let mut position = *exec.open_position().unwrap();

        // halfway to the 106 target is 103
        exec.take_partial(&mut position, 11, &bar(11, 102.9, 100.0, 102.0));
        assert!(position.partial.is_none());
        exec.take_partial(&mut position, 12, &bar(12, 103.5, 101.0, 103.2));
        let fill = position.partial.unwrap();
        assert_eq!(fill.index, 12);
        assert_eq!(fill.price, 103.0);
        assert_eq!(fill.units, 5.0);
        assert!((fill.pnl - 15.0).abs() < 1e-12);
        assert_eq!(position.remaining, 5.0);

        exec.take_partial(&mut position, 13, &bar(13, 104.0, 102.0, 103.8));
        assert_eq!(position.partial.unwrap().index, 12);

        // the other five units: breakeven overall at the stop, 45 at target
        assert!((position.realized_pnl(97.0) - (15.0 - 15.0)).abs() < 1e-12);
        assert!((position.realized_pnl(106.0) - (15.0 + 30.0)).abs() < 1e-12);
    }

    #[test]
    fn risk_percent_sizing_risks_a_share_of_equity() {
        let mut exec = SimulatedExecutor::new(ExecutionConfig {
            initial_equity: 60_000.0,
            sizing: PositionSizing::RiskPercent { risk_pct: 0.02 },
            ..ExecutionConfig::default()
        });
        assert_eq!(exec.equity(), 60_000.0);
        exec.on_events(&[long_event(1, 10)]);
        let position = exec.open_position().unwrap();
        // 2% of 60k over a 3.0 stop distance
        assert!((position.units - 400.0).abs() < 1e-9);
        assert!((position.realized_pnl(97.0) + 1200.0).abs() < 1e-9);
    }
}

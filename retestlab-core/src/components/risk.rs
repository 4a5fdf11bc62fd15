//! Risk/Target Calculator: structure-based stops with an ATR fallback, and
//! level-based targets pushed out to the minimum risk-reward.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::{Direction, Level, StopSource, SwingKind, SwingPoint, TargetSource};

/// Stop and target for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop: f64,
    pub target: f64,
    pub stop_source: StopSource,
    pub target_source: TargetSource,
    /// Multiplier applied to signal confidence (< 1.0 on ATR fallback).
    pub confidence_factor: f64,
}

#[derive(Debug, Clone)]
pub struct RiskCalculator {
    stop_buffer: f64,
    min_stop_distance: f64,
    swing_candidates: usize,
    atr_multiple: f64,
    fallback_confidence: f64,
    min_target_distance: f64,
    take_profit_ratio: f64,
    min_risk_reward: f64,
}

impl RiskCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            stop_buffer: config.stop_buffer,
            min_stop_distance: config.min_stop_distance,
            swing_candidates: config.stop_swing_candidates,
            atr_multiple: config.atr_stop_multiple,
            fallback_confidence: config.atr_fallback_confidence,
            min_target_distance: config.min_target_distance,
            take_profit_ratio: config.take_profit_ratio,
            min_risk_reward: config.min_risk_reward,
        }
    }

    /// Derive stop and target, or `None` when no usable stop exists.
    ///
    /// `swings` must be the non-expired history, oldest first.
    pub fn compute<'a>(
        &self,
        direction: Direction,
        entry: f64,
        swings: impl DoubleEndedIterator<Item = &'a SwingPoint>,
        levels: &[Level],
        atr: Option<f64>,
    ) -> Option<RiskLevels> {
        let sign = direction.sign();
        let (stop, stop_source, confidence_factor) = match self.structure_stop(direction, entry, swings) {
            Some(stop) => (stop, StopSource::Structure, 1.0),
            None => {
                let atr = atr.filter(|a| *a > 0.0)?;
                (
                    entry - sign * self.atr_multiple * atr,
                    StopSource::AtrFallback,
                    self.fallback_confidence,
                )
            }
        };
        let risk = (entry - stop) * sign;
        if !(risk > 0.0 && stop > 0.0) {
            return None;
        }

        let (mut target, mut target_source) = match self.level_target(direction, entry, levels) {
            Some(price) => (price, TargetSource::Level),
            None => (entry + sign * self.take_profit_ratio * risk, TargetSource::RiskMultiple),
        };
        let required = self.min_risk_reward * risk;
        if (target - entry) * sign < required {
            target = entry + sign * required;
            target_source = TargetSource::MinRiskReward;
        }
        // the rounded floor can land a few ulps short of the required reward
        while target > 0.0 && target.is_finite() && (target - entry) * sign < required {
            target = step_outward(target, sign);
        }
        if !(target > 0.0 && target.is_finite()) {
            return None;
        }

        Some(RiskLevels {
            stop,
            target,
            stop_source,
            target_source,
            confidence_factor,
        })
    }

    /// Highest qualifying recent swing low for longs, lowest swing high for shorts,
    /// buffered away from `entry`.
    pub fn structure_stop<'a>(
        &self,
        direction: Direction,
        entry: f64,
        swings: impl DoubleEndedIterator<Item = &'a SwingPoint>,
    ) -> Option<f64> {
        let kind = match direction {
            Direction::Bullish => SwingKind::Low,
            Direction::Bearish => SwingKind::High,
        };
        let recent = swings
            .rev()
            .filter(|s| s.kind == kind)
            .take(self.swing_candidates)
            .map(|s| s.price);
        match direction {
            Direction::Bullish => {
                let ceiling = entry * (1.0 - self.min_stop_distance);
                recent
                    .filter(|p| *p < ceiling)
                    .max_by(f64::total_cmp)
                    .map(|p| p * (1.0 - self.stop_buffer))
            }
            Direction::Bearish => {
                let floor = entry * (1.0 + self.min_stop_distance);
                recent
                    .filter(|p| *p > floor)
                    .min_by(f64::total_cmp)
                    .map(|p| p * (1.0 + self.stop_buffer))
            }
        }
    }

    /// Nearest level in the trade's favour beyond the minimum target distance.
    fn level_target(&self, direction: Direction, entry: f64, levels: &[Level]) -> Option<f64> {
        let prices = levels.iter().map(|l| l.price);
        match direction {
            Direction::Bullish => {
                let beyond = entry * (1.0 + self.min_target_distance);
                prices.filter(|p| *p > beyond).min_by(f64::total_cmp)
            }
            Direction::Bearish => {
                let beyond = entry * (1.0 - self.min_target_distance);
                prices.filter(|p| *p < beyond).max_by(f64::total_cmp)
            }
        }
    }
}

/// Next representable price away from entry. `price` must be positive.
fn step_outward(price: f64, sign: f64) -> f64 {
    let bits = price.to_bits();
    if sign > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

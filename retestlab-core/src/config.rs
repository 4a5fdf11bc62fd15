//! Engine configuration and its construction-time validation.
//!
//! Every threshold the five components use lives here. Values are checked once
//! by [`EngineConfig::validate`]; out-of-range values are rejected, never clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ConfigHash;

/// Invalid threshold values found at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },
    #[error("{field} must lie in {range}, got {value}")]
    OutOfRange {
        field: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("swing window {swing_window} needs 2k+1 <= lookback_period ({lookback_period})")]
    SwingWindowTooWide {
        swing_window: usize,
        lookback_period: usize,
    },
    #[error("swing_horizon ({horizon}) must be >= lookback_period ({lookback_period})")]
    HorizonShorterThanLookback {
        horizon: usize,
        lookback_period: usize,
    },
    #[error("rsi band must satisfy 0 <= low < high <= 100, got [{low}, {high}]")]
    InvalidRsiBand { low: f64, high: f64 },
    #[error("min_confirmations must be in 1..=3, got {0}")]
    InvalidConfirmationCount(u8),
    #[error("confirmation weights must be non-negative with a positive sum")]
    InvalidConfirmationWeights,
    #[error("failed to parse engine config: {0}")]
    Parse(String),
}

/// How the three retest confirmations combine into a verdict.
///
/// The default two-of-three rule leaves the candlestick pattern effectively
/// optional whenever momentum and volume both pass. That is a policy choice,
/// so stricter or weighted variants are selectable here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfirmationRule {
    /// At least `min` of the three booleans must hold.
    Count { min: u8 },
    /// Weighted sum of passed confirmations over total weight must reach `threshold`.
    Weighted {
        pattern: f64,
        momentum: f64,
        volume: f64,
        threshold: f64,
    },
}

impl Default for ConfirmationRule {
    fn default() -> Self {
        ConfirmationRule::Count { min: 2 }
    }
}

/// Trend filter from the source strategy: only trade with the moving average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFilter {
    pub period: usize,
    /// Longs need close >= SMA * (1 + band); shorts close <= SMA * (1 - band).
    pub band: f64,
}

impl Default for TrendFilter {
    fn default() -> Self {
        Self {
            period: 50,
            band: 0.02,
        }
    }
}

/// Static configuration of one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // ── Level detection ──
    pub lookback_period: usize,
    /// Bars required on each side of a swing point (k).
    pub swing_window: usize,
    /// Swings older than this many bars no longer feed levels or stops.
    pub swing_horizon: usize,
    /// Ring-arena capacity for swing history (diagnostics included).
    pub swing_history_capacity: usize,
    pub level_tolerance: f64,
    pub min_level_strength: usize,
    pub max_levels: usize,

    // ── Breakouts ──
    pub volume_period: usize,
    pub min_breakout_strength: f64,
    pub breakout_volume_factor: f64,

    // ── Retests ──
    pub retest_tolerance: f64,
    pub min_retest_bounce: f64,
    pub max_retest_age: usize,
    pub rsi_period: usize,
    pub rsi_momentum_threshold: f64,
    pub rsi_band: (f64, f64),
    pub retest_volume_ratio: f64,
    /// Retest bars below this fraction of average volume are vetoed outright.
    pub thin_volume_ratio: f64,
    pub confirmation_rule: ConfirmationRule,

    // ── Risk / target ──
    pub atr_period: usize,
    pub stop_buffer: f64,
    pub min_stop_distance: f64,
    pub stop_swing_candidates: usize,
    pub atr_stop_multiple: f64,
    pub atr_fallback_confidence: f64,
    pub min_target_distance: f64,
    pub take_profit_ratio: f64,
    pub min_risk_reward: f64,

    // ── Pacing ──
    /// Cooldown between entries, counted in bars.
    pub trade_cooldown_days: usize,
    pub min_trade_spacing: f64,
    pub ledger_horizon: usize,
    pub ledger_capacity: usize,
    pub trend_filter: Option<TrendFilter>,
    /// Minimum ATR / close; 0.0 disables the volatility filter.
    pub min_atr_pct: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_period: 20,
            swing_window: 2,
            swing_horizon: 60,
            swing_history_capacity: 256,
            level_tolerance: 0.005,
            min_level_strength: 2,
            max_levels: 10,

            volume_period: 20,
            min_breakout_strength: 0.008,
            breakout_volume_factor: 1.0,

            retest_tolerance: 0.005,
            min_retest_bounce: 0.002,
            max_retest_age: 12,
            rsi_period: 7,
            rsi_momentum_threshold: 2.0,
            rsi_band: (30.0, 70.0),
            retest_volume_ratio: 0.8,
            thin_volume_ratio: 0.5,
            confirmation_rule: ConfirmationRule::default(),

            atr_period: 14,
            stop_buffer: 0.005,
            min_stop_distance: 0.02,
            stop_swing_candidates: 5,
            atr_stop_multiple: 2.0,
            atr_fallback_confidence: 0.75,
            min_target_distance: 0.01,
            take_profit_ratio: 3.0,
            min_risk_reward: 1.5,

            trade_cooldown_days: 3,
            min_trade_spacing: 0.02,
            ledger_horizon: 60,
            ledger_capacity: 10,
            trend_filter: None,
            min_atr_pct: 0.0,
        }
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, min, value });
    }
    Ok(())
}

/// `low < value < high` (open interval) unless the bound flags say inclusive.
fn within(
    field: &'static str,
    range: &'static str,
    value: f64,
    low: f64,
    high: f64,
    low_inclusive: bool,
    high_inclusive: bool,
) -> Result<(), ConfigError> {
    let above = if low_inclusive { value >= low } else { value > low };
    let below = if high_inclusive { value <= high } else { value < high };
    if value.is_finite() && above && below {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            range,
            value,
        })
    }
}

impl EngineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("lookback_period", self.lookback_period, 3)?;
        at_least("swing_window", self.swing_window, 1)?;
        if 2 * self.swing_window + 1 > self.lookback_period {
            return Err(ConfigError::SwingWindowTooWide {
                swing_window: self.swing_window,
                lookback_period: self.lookback_period,
            });
        }
        if self.swing_horizon < self.lookback_period {
            return Err(ConfigError::HorizonShorterThanLookback {
                horizon: self.swing_horizon,
                lookback_period: self.lookback_period,
            });
        }
        at_least("swing_history_capacity", self.swing_history_capacity, 8)?;
        within("level_tolerance", "(0, 0.1)", self.level_tolerance, 0.0, 0.1, false, false)?;
        at_least("min_level_strength", self.min_level_strength, 1)?;
        at_least("max_levels", self.max_levels, 1)?;

        at_least("volume_period", self.volume_period, 1)?;
        within(
            "min_breakout_strength",
            "(0, 0.5)",
            self.min_breakout_strength,
            0.0,
            0.5,
            false,
            false,
        )?;
        within(
            "breakout_volume_factor",
            "(0, inf)",
            self.breakout_volume_factor,
            0.0,
            f64::INFINITY,
            false,
            false,
        )?;

        within("retest_tolerance", "(0, 0.1)", self.retest_tolerance, 0.0, 0.1, false, false)?;
        within(
            "min_retest_bounce",
            "[0, retest_tolerance]",
            self.min_retest_bounce,
            0.0,
            self.retest_tolerance,
            true,
            true,
        )?;
        at_least("max_retest_age", self.max_retest_age, 1)?;
        at_least("rsi_period", self.rsi_period, 2)?;
        within(
            "rsi_momentum_threshold",
            "(0, 100)",
            self.rsi_momentum_threshold,
            0.0,
            100.0,
            false,
            false,
        )?;
        let (lo, hi) = self.rsi_band;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo < hi && hi <= 100.0) {
            return Err(ConfigError::InvalidRsiBand { low: lo, high: hi });
        }
        within(
            "retest_volume_ratio",
            "(0, inf)",
            self.retest_volume_ratio,
            0.0,
            f64::INFINITY,
            false,
            false,
        )?;
        within(
            "thin_volume_ratio",
            "[0, retest_volume_ratio]",
            self.thin_volume_ratio,
            0.0,
            self.retest_volume_ratio,
            true,
            true,
        )?;
        match self.confirmation_rule {
            ConfirmationRule::Count { min } => {
                if !(1..=3).contains(&min) {
                    return Err(ConfigError::InvalidConfirmationCount(min));
                }
            }
            ConfirmationRule::Weighted {
                pattern,
                momentum,
                volume,
                threshold,
            } => {
                let weights = [pattern, momentum, volume];
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
                    || weights.iter().sum::<f64>() <= 0.0
                {
                    return Err(ConfigError::InvalidConfirmationWeights);
                }
                within("confirmation threshold", "(0, 1]", threshold, 0.0, 1.0, false, true)?;
            }
        }

        at_least("atr_period", self.atr_period, 1)?;
        within("stop_buffer", "[0, 0.1)", self.stop_buffer, 0.0, 0.1, true, false)?;
        within("min_stop_distance", "[0, 0.5)", self.min_stop_distance, 0.0, 0.5, true, false)?;
        at_least("stop_swing_candidates", self.stop_swing_candidates, 1)?;
        within(
            "atr_stop_multiple",
            "(0, inf)",
            self.atr_stop_multiple,
            0.0,
            f64::INFINITY,
            false,
            false,
        )?;
        within(
            "atr_fallback_confidence",
            "(0, 1]",
            self.atr_fallback_confidence,
            0.0,
            1.0,
            false,
            true,
        )?;
        within(
            "min_target_distance",
            "[0, 0.5)",
            self.min_target_distance,
            0.0,
            0.5,
            true,
            false,
        )?;
        within(
            "min_risk_reward",
            "[1.5, inf)",
            self.min_risk_reward,
            1.5,
            f64::INFINITY,
            true,
            false,
        )?;
        within(
            "take_profit_ratio",
            "[min_risk_reward, inf)",
            self.take_profit_ratio,
            self.min_risk_reward,
            f64::INFINITY,
            true,
            false,
        )?;

        within("min_trade_spacing", "[0, 1)", self.min_trade_spacing, 0.0, 1.0, true, false)?;
        at_least("ledger_horizon", self.ledger_horizon, 1)?;
        at_least("ledger_capacity", self.ledger_capacity, 1)?;
        if let Some(filter) = &self.trend_filter {
            at_least("trend_filter.period", filter.period, 2)?;
            within("trend_filter.band", "[0, 0.5)", filter.band, 0.0, 0.5, true, false)?;
        }
        within("min_atr_pct", "[0, 1)", self.min_atr_pct, 0.0, 1.0, true, false)?;
        Ok(())
    }

    /// Number of bars the engine keeps in its rolling window.
    pub fn window_capacity(&self) -> usize {
        self.lookback_period
            .max(self.volume_period + 1)
            .max(self.swing_window * 2 + 3)
    }

    /// Deterministic fingerprint of every parameter value.
    pub fn config_hash(&self) -> ConfigHash {
        // Struct fields serialize in declaration order, so the JSON is canonical.
        let json = serde_json::to_string(self).unwrap_or_default();
        ConfigHash::from_bytes(json.as_bytes())
    }
}

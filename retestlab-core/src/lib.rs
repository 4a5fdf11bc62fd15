//! RetestLab Core: the breakout/retest signal engine.
//!
//! This crate contains the whole per-asset pipeline and nothing that does I/O:
//! - Domain types (bars, swings, levels, candidates, signals)
//! - Streaming indicators (ATR, RSI, SMA)
//! - The five components: levels, breakouts, retest confirmation, risk/targets, pacing
//! - `SignalEngine`, the single `process(bar)` entry point tying them together
//! - Configuration with construction-time validation, errors, fingerprints

pub mod components;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod performance;

pub use config::{ConfigError, ConfirmationRule, EngineConfig, TrendFilter};
pub use engine::SignalEngine;
pub use error::EngineError;
pub use fingerprint::{SignalDigest, SignalDigester};
pub use performance::{PerformanceCounters, TradeOutcome};

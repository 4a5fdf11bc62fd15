//! The five engine components, leaves first.
//!
//! - [`levels`]: swing points and support/resistance levels
//! - [`breakout`]: close-based, volume-confirmed breakouts
//! - [`retest`]: the pending-retest state machine, scored by [`confirm`] and [`patterns`]
//! - [`risk`]: structure stops and risk-reward targets
//! - [`pacing`]: cooldown, spacing and optional trend/volatility filters
//!
//! Each component owns its own state and is driven by [`crate::engine::SignalEngine`].
//! None of them does I/O or reads the clock.

pub mod breakout;
pub mod confirm;
pub mod levels;
pub mod pacing;
pub mod patterns;
pub mod retest;
pub mod risk;

pub use breakout::{BreakoutDetector, BreakoutInput};
pub use confirm::{ConfirmationScore, RuleVerdict};
pub use levels::{LevelDetector, SwingArena};
pub use pacing::{FilterInputs, PacingController, TradeLedger, TradeLedgerEntry};
pub use patterns::CandlePattern;
pub use retest::{InvalidationReason, RetestContext, RetestState, RetestTracker};
pub use risk::{RiskCalculator, RiskLevels};

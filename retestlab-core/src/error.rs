//! Engine error taxonomy.
//!
//! Configuration and ordering problems are fatal and propagate immediately.
//! Everything recoverable inside a bar degrades to "no signal this bar" and
//! never surfaces here.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::SignalId;

pub use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bar {index} at {timestamp} is not after the previous bar at {previous}")]
    OutOfOrderBar {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp} is malformed (non-finite or inconsistent OHLCV)")]
    MalformedBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("signal {0} was never issued")]
    UnknownTrade(SignalId),

    /// The signal was issued but has no open trade: its outcome was already
    /// recorded, or it was muted and never opened one.
    #[error("signal {0} has no open trade (already closed or muted)")]
    DuplicateOutcome(SignalId),
}

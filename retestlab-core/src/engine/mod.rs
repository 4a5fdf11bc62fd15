//! Signal engine: one explicit state machine per asset.
//!
//! The engine owns all five components and a bounded bar window, and exposes a
//! single entry point, [`SignalEngine::process`]. Each bar runs these phases:
//!
//! 1. Validate: reject malformed or out-of-order bars before touching state
//! 2. Update: streaming indicators, rolling window, swing/level detection
//! 3. Resolve: evaluate pending retests; confirmations become signals
//! 4. Pace: mute or accept each signal, update the ledger and counters
//! 5. Detect: register a new breakout candidate, evaluated from the next bar

pub mod signal_engine;

pub use signal_engine::SignalEngine;

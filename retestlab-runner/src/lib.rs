//! RetestLab Runner: the harness around `retestlab-core`.
//!
//! This crate builds on the engine to provide:
//! - CSV bar loading and seeded synthetic bars
//! - A simulated executor that reports trade outcomes back to the engine
//! - Single-asset and parallel multi-asset runs, one engine per asset
//! - TOML run configuration with a deterministic run id
//! - JSON and markdown reports

pub mod config;
pub mod data_loader;
pub mod report;
pub mod runner;
pub mod simulator;
pub mod synthetic;

pub use config::{
    AssetSpec, ExecutionConfig, PartialProfit, PositionSizing, RunConfig, RunConfigError, RunId,
};
pub use data_loader::{dataset_hash, load_bars_csv, read_bars, write_bars_csv, LoadError};
pub use report::{render_markdown, AssetReport, RunReport};
pub use runner::{run_asset, run_from_config, run_universe, AssetBars, RunError};
pub use simulator::{ExitReason, OpenPosition, PartialFill, SimulatedExecutor, TradeRecord};
pub use synthetic::synthetic_bars;

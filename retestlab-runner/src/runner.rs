//! Run orchestration: one engine per asset, assets in parallel.
//!
//! Three entry points:
//! - `run_asset()`: drives one engine and one executor over a bar series.
//! - `run_universe()`: fans pre-loaded assets out over the rayon pool.
//! - `run_from_config()`: loads every `[[assets]]` CSV, then runs the universe.
//!
//! Engines never share state; the only aggregation is sorting the finished
//! reports by symbol, so results do not depend on thread scheduling.

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use retestlab_core::domain::Bar;
use retestlab_core::fingerprint::SignalDigester;
use retestlab_core::{EngineConfig, EngineError, SignalEngine};

use crate::config::{ExecutionConfig, RunConfig, RunConfigError};
use crate::data_loader::{dataset_hash, load_bars_csv, LoadError};
use crate::report::{AssetReport, RunReport};
use crate::simulator::SimulatedExecutor;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] RunConfigError),

    #[error("engine config error: {0}")]
    EngineConfig(#[from] retestlab_core::ConfigError),

    #[error("data error for '{symbol}': {source}")]
    Load {
        symbol: String,
        #[source]
        source: LoadError,
    },

    #[error("engine error for '{symbol}': {source}")]
    Engine {
        symbol: String,
        #[source]
        source: EngineError,
    },
}

/// One asset's bars, already loaded.
#[derive(Debug, Clone)]
pub struct AssetBars {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

/// Drive a fresh engine and executor over `bars`.
///
/// Per bar: the engine processes it, the executor checks its open position
/// against it (reporting any exit back to the engine), then takes the first
/// actionable signal if flat.
pub fn run_asset(
    symbol: &str,
    bars: &[Bar],
    engine_config: &EngineConfig,
    execution: &ExecutionConfig,
) -> Result<AssetReport, RunError> {
    let engine_err = |source: EngineError| RunError::Engine {
        symbol: symbol.to_string(),
        source,
    };

    let mut engine = SignalEngine::new(engine_config.clone()).map_err(engine_err)?;
    let mut executor = SimulatedExecutor::new(*execution);
    let mut digester = SignalDigester::default();
    let mut signals = Vec::new();

    for (index, bar) in bars.iter().enumerate() {
        let events = engine.process(*bar).map_err(engine_err)?;
        executor
            .on_bar(&mut engine, index, bar)
            .map_err(engine_err)?;
        executor.on_events(&events);
        for event in &events {
            digester.push(event);
        }
        signals.extend(events);
    }

    let counters = engine.counters().clone();
    info!(
        symbol,
        bars = bars.len(),
        signals = counters.signals_generated,
        muted = counters.signals_muted,
        closed = counters.closed_trades(),
        pnl = counters.cumulative_pnl,
        "asset run complete"
    );

    Ok(AssetReport {
        symbol: symbol.to_string(),
        bars: bars.len(),
        dataset_hash: dataset_hash(bars),
        signals,
        open_position: executor.open_position().copied(),
        skipped_signals: executor.skipped(),
        trades: executor.into_trades(),
        counters,
        digest: digester.finish(),
    })
}

/// Run many assets in parallel, one independent engine each.
///
/// Fails with the first error in symbol order; reports come back sorted by symbol.
pub fn run_universe(
    assets: &[AssetBars],
    engine_config: &EngineConfig,
    execution: &ExecutionConfig,
) -> Result<Vec<AssetReport>, RunError> {
    engine_config.validate()?;
    let mut ordered: Vec<&AssetBars> = assets.iter().collect();
    ordered.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    ordered
        .par_iter()
        .map(|asset| run_asset(&asset.symbol, &asset.bars, engine_config, execution))
        .collect()
}

/// Load every asset named in `config` and run them.
pub fn run_from_config(config: &RunConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    let assets = config
        .assets
        .par_iter()
        .map(|spec| {
            load_bars_csv(&spec.path)
                .map(|bars| AssetBars {
                    symbol: spec.symbol.clone(),
                    bars,
                })
                .map_err(|source| RunError::Load {
                    symbol: spec.symbol.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let reports = run_universe(&assets, &config.engine, &config.execution)?;
    let report = RunReport::new(config.run_id(), config.engine.config_hash(), reports);
    info!(
        run_id = %report.run_id,
        assets = report.assets.len(),
        signals = report.total_signals(),
        "run complete"
    );
    Ok(report)
}

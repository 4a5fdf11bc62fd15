//! RetestLab CLI: run, check-config and synth commands.
//!
//! Commands:
//! - `run`: drive the engine over a run file, a single CSV, or synthetic bars
//! - `check-config`: parse and validate an engine or run config, print its hash
//! - `synth`: write seeded synthetic bars to CSV

mod logging;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use retestlab_core::EngineConfig;
use retestlab_runner::{
    render_markdown, run_from_config, run_universe, synthetic_bars, write_bars_csv, AssetBars,
    AssetSpec, ExecutionConfig, RunConfig, RunReport,
};

use crate::logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(
    name = "retestlab",
    about = "RetestLab CLI: breakout/retest signal engine"
)]
struct Cli {
    /// Log filter, e.g. `debug` or `retestlab_core=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine and print a markdown summary.
    Run {
        /// Run file with [engine], [execution] and [[assets]].
        #[arg(long)]
        config: Option<PathBuf>,

        /// A single bar CSV (timestamp,open,high,low,close,volume).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Symbol for --data. Defaults to the file stem.
        #[arg(long)]
        symbol: Option<String>,

        /// Engine config TOML for --data or --synthetic. Defaults apply otherwise.
        #[arg(long)]
        engine_config: Option<PathBuf>,

        /// Run on seeded synthetic bars.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Bar count for --synthetic.
        #[arg(long, default_value_t = 500)]
        bars: usize,

        /// Write the full JSON report here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse and validate a config file, then print its hash.
    CheckConfig {
        /// Engine config or run file (TOML).
        path: PathBuf,
    },
    /// Write seeded synthetic bars to CSV.
    Synth {
        #[arg(long, default_value_t = 7)]
        seed: u64,

        #[arg(long, default_value_t = 500)]
        bars: usize,

        /// First bar date (YYYY-MM-DD).
        #[arg(long, default_value = "2020-01-02")]
        start: String,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            data,
            symbol,
            engine_config,
            synthetic,
            seed,
            bars,
            output,
        } => {
            let report = match (config, data, synthetic) {
                (Some(path), None, false) => run_file(&path)?,
                (None, Some(path), false) => {
                    run_csv(&path, symbol, engine_config.as_deref())?
                }
                (None, None, true) => run_synthetic(seed, bars, engine_config.as_deref())?,
                (None, None, false) => bail!("one of --config, --data or --synthetic is required"),
                _ => bail!("--config, --data and --synthetic are mutually exclusive"),
            };
            print!("{}", render_markdown(&report));
            if let Some(out) = output {
                report
                    .write_json(&out)
                    .with_context(|| format!("writing report to {}", out.display()))?;
                println!("\nReport saved to: {}", out.display());
            }
            Ok(())
        }
        Commands::CheckConfig { path } => check_config(&path),
        Commands::Synth {
            seed,
            bars,
            start,
            out,
        } => run_synth(seed, bars, &start, &out),
    }
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("reading engine config {}", path.display()))?;
    EngineConfig::from_toml_str(&src).with_context(|| format!("in {}", path.display()))
}

fn run_file(path: &Path) -> Result<RunReport> {
    let config = RunConfig::load(path)?;
    info!(run_id = %config.run_id(), assets = config.assets.len(), "starting run");
    Ok(run_from_config(&config)?)
}

fn run_csv(path: &Path, symbol: Option<String>, engine_config: Option<&Path>) -> Result<RunReport> {
    let symbol = match symbol {
        Some(s) => s,
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_uppercase())
            .context("cannot derive a symbol from --data; pass --symbol")?,
    };
    let config = RunConfig {
        engine: load_engine_config(engine_config)?,
        execution: ExecutionConfig::default(),
        assets: vec![AssetSpec {
            symbol,
            path: path.to_path_buf(),
        }],
    };
    Ok(run_from_config(&config)?)
}

fn run_synthetic(seed: u64, bars: usize, engine_config: Option<&Path>) -> Result<RunReport> {
    let engine = load_engine_config(engine_config)?;
    let execution = ExecutionConfig::default();
    let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).single().context("start date")?;
    let symbol = "SYNTH".to_string();

    // identity for the report: the config plus where the bars came from
    let identity = RunConfig {
        engine: engine.clone(),
        execution,
        assets: vec![AssetSpec {
            symbol: symbol.clone(),
            path: PathBuf::from(format!("synthetic/seed-{seed}-bars-{bars}")),
        }],
    };

    let assets = vec![AssetBars {
        symbol,
        bars: synthetic_bars(seed, bars, start),
    }];
    let reports = run_universe(&assets, &engine, &execution)?;
    Ok(RunReport::new(
        identity.run_id(),
        engine.config_hash(),
        reports,
    ))
}

fn check_config(path: &Path) -> Result<()> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let table: toml::Table = src
        .parse()
        .with_context(|| format!("parsing {}", path.display()))?;

    if table.contains_key("assets") || table.contains_key("engine") {
        let config = RunConfig::from_toml_str(&src)?;
        println!("Run config OK: {}", path.display());
        println!("Assets:      {}", config.assets.len());
        println!("Run ID:      {}", config.run_id());
        println!("Config hash: {}", config.engine.config_hash());
    } else {
        let config = EngineConfig::from_toml_str(&src)?;
        println!("Engine config OK: {}", path.display());
        println!("Config hash: {}", config.config_hash());
    }
    Ok(())
}

fn run_synth(seed: u64, bars: usize, start: &str, out: &Path) -> Result<()> {
    let date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid --start '{start}', expected YYYY-MM-DD"))?;
    let start = date
        .and_hms_opt(0, 0, 0)
        .context("invalid start time")?
        .and_utc();

    let series = synthetic_bars(seed, bars, start);
    write_bars_csv(out, &series)?;
    println!("Wrote {} bars (seed {seed}) to {}", series.len(), out.display());
    Ok(())
}

//! Integration tests for the runner: CSV files on disk through to reports.
//!
//! The RETEST asset is a hand-built series with a resistance at 100, a
//! breakout on bar 25, an engulfing retest on bar 28 and a wide bar 29 that
//! runs through the target. The SYNTH asset is seeded synthetic data.

use chrono::{Duration, TimeZone, Utc};
use std::path::Path;

use retestlab_core::domain::Bar;
use retestlab_runner::{
    render_markdown, run_from_config, synthetic_bars, write_bars_csv, ExitReason, PositionSizing,
    RunConfig, RunError,
};

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(i as i64),
        open,
        high,
        low,
        close,
        volume,
    }
}

fn retest_bars() -> Vec<Bar> {
    let cycle = [
        (98.0, 98.6, 97.8, 98.4),
        (98.4, 99.2, 98.2, 99.0),
        (99.0, 100.0, 98.8, 99.5),
        (99.5, 99.6, 98.7, 98.9),
        (98.9, 99.0, 97.9, 98.1),
        (98.1, 98.2, 97.0, 97.6),
    ];
    let mut bars: Vec<Bar> = (0..24)
        .map(|i| {
            let (o, h, l, c) = cycle[i % 6];
            bar(i, o, h, l, c, 1000.0)
        })
        .collect();
    bars.push(bar(24, 97.6, 99.0, 97.5, 98.8, 1000.0));
    bars.push(bar(25, 98.8, 101.5, 98.7, 101.2, 1300.0));
    bars.push(bar(26, 101.2, 101.4, 100.6, 100.7, 1000.0));
    bars.push(bar(27, 100.25, 100.6, 99.7, 99.9, 1000.0));
    bars.push(bar(28, 99.8, 100.5, 99.7, 100.3, 1000.0));
    // runs far through the risk-multiple target without touching the stop
    bars.push(bar(29, 100.3, 120.0, 100.2, 115.0, 1000.0));
    bars
}

fn write_run(dir: &Path) -> std::path::PathBuf {
    write_bars_csv(&dir.join("retest.csv"), &retest_bars()).unwrap();
    let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    write_bars_csv(&dir.join("synth.csv"), &synthetic_bars(7, 400, start)).unwrap();

    let run = dir.join("run.toml");
    std::fs::write(
        &run,
        r#"
[engine]
lookback_period = 20

[execution]
max_holding_bars = 30

[[assets]]
symbol = "SYNTH"
path = "synth.csv"

[[assets]]
symbol = "RETEST"
path = "retest.csv"
"#,
    )
    .unwrap();
    run
}

#[test]
fn run_file_produces_sorted_asset_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_run(dir.path())).unwrap();
    let report = run_from_config(&config).unwrap();

    let symbols: Vec<_> = report.assets.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["RETEST", "SYNTH"]);
    assert_eq!(report.run_id, config.run_id());
    assert_eq!(report.config_hash, config.engine.config_hash());
    assert_eq!(report.assets[0].bars, 30);
    assert_eq!(report.assets[1].bars, 400);
}

#[test]
fn executor_closes_the_retest_trade_at_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_run(dir.path())).unwrap();
    let report = run_from_config(&config).unwrap();
    let asset = &report.assets[0];

    assert_eq!(asset.signals.len(), 1);
    let signal = &asset.signals[0].signal;
    assert_eq!(asset.signals[0].bar_index, 28);

    assert_eq!(asset.trades.len(), 1);
    let trade = &asset.trades[0];
    assert_eq!(trade.signal_id, signal.id);
    assert_eq!(trade.exit_reason, ExitReason::Target);
    assert_eq!(trade.exit_index, 29);
    assert_eq!(trade.exit_price, signal.target_price);
    assert!((trade.pnl - signal.reward()).abs() < 1e-9);
    assert!(asset.open_position.is_none());

    // the outcome reached the engine's counters
    let c = &asset.counters;
    assert_eq!(c.trades, 1);
    assert_eq!(c.wins, 1);
    assert_eq!(c.losses, 0);
    assert!((c.cumulative_pnl - trade.pnl).abs() < 1e-12);
}

#[test]
fn risk_percent_sizing_scales_the_trade_pnl() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::load(&write_run(dir.path())).unwrap();
    config.execution.sizing = PositionSizing::RiskPercent { risk_pct: 0.02 };
    let report = run_from_config(&config).unwrap();
    let asset = &report.assets[0];
    let signal = &asset.signals[0].signal;
    let trade = &asset.trades[0];

    let units = config.execution.initial_equity * 0.02 / signal.risk();
    assert!((trade.units - units).abs() < 1e-9);
    assert_eq!(trade.exit_reason, ExitReason::Target);
    assert!((trade.pnl - units * signal.reward()).abs() < 1e-6);
    assert!((asset.counters.cumulative_pnl - trade.pnl).abs() < 1e-12);
}

#[test]
fn reruns_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_run(dir.path())).unwrap();
    let a = run_from_config(&config).unwrap();
    let b = run_from_config(&config).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

#[test]
fn reports_render_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_run(dir.path())).unwrap();
    let report = run_from_config(&config).unwrap();

    let md = render_markdown(&report);
    assert!(md.contains("## RETEST"));
    assert!(md.contains("| RETEST | 30 | 1 | 0 | 1 | 100.0% | 100.0% |"));

    let out = dir.path().join("report.json");
    report.write_json(&out).unwrap();
    let back: retestlab_runner::RunReport =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(back, report);
}

#[test]
fn missing_data_file_names_the_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_run(dir.path())).unwrap();
    std::fs::remove_file(dir.path().join("synth.csv")).unwrap();

    let err = run_from_config(&config).unwrap_err();
    assert!(matches!(&err, RunError::Load { symbol, .. } if symbol == "SYNTH"));
}

//! Run reports: JSON artifacts and a markdown summary.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use retestlab_core::domain::{ConfigHash, SignalEvent};
use retestlab_core::{PerformanceCounters, SignalDigest};

use crate::config::RunId;
use crate::simulator::{OpenPosition, TradeRecord};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Result of driving one engine over one asset's bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReport {
    pub symbol: String,
    /// Number of bars processed.
    pub bars: usize,
    pub dataset_hash: String,
    pub signals: Vec<SignalEvent>,
    pub trades: Vec<TradeRecord>,
    /// Position still held when the data ran out.
    pub open_position: Option<OpenPosition>,
    /// Actionable signals the executor passed on while already in a position.
    pub skipped_signals: usize,
    pub counters: PerformanceCounters,
    pub digest: SignalDigest,
}

impl AssetReport {
    pub fn actionable_signals(&self) -> usize {
        self.signals.iter().filter(|e| e.is_actionable()).count()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Report for a whole multi-asset run, assets sorted by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config_hash: ConfigHash,
    pub assets: Vec<AssetReport>,
}

impl RunReport {
    pub fn new(run_id: RunId, config_hash: ConfigHash, assets: Vec<AssetReport>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            config_hash,
            assets,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
    }

    pub fn total_signals(&self) -> usize {
        self.assets.iter().map(|a| a.signals.len()).sum()
    }
}

fn pct(rate: Option<f64>) -> String {
    rate.map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r * 100.0))
}

/// Human-readable summary of a run.
pub fn render_markdown(report: &RunReport) -> String {
    let mut out = format!(
        "# RetestLab Run Report\n\n\
Run ID: `{}`\n\
Config: `{}`\n\n\
## Assets\n\n\
| Symbol | Bars | Signals | Muted | Trades | Win Rate | Retest Success | PnL |\n\
|--------|------|---------|-------|--------|----------|----------------|-----|\n",
        report.run_id, report.config_hash
    );

    for asset in &report.assets {
        let c = &asset.counters;
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} | {:+.2} |",
            asset.symbol,
            asset.bars,
            c.signals_generated,
            c.signals_muted,
            asset.trades.len(),
            pct(c.win_rate()),
            pct(c.retest_success_rate()),
            asset.total_pnl(),
        );
    }

    for asset in report.assets.iter().filter(|a| !a.signals.is_empty()) {
        let _ = write!(
            out,
            "\n## {}\n\nDigest: `{}`\n\n\
| Bar | Direction | Entry | Stop | Target | R:R | Confidence | Disposition |\n\
|-----|-----------|-------|------|--------|-----|------------|-------------|\n",
            asset.symbol, asset.digest
        );
        for event in &asset.signals {
            let s = &event.signal;
            let disposition = match event.disposition {
                retestlab_core::domain::Disposition::Actionable => "actionable".to_string(),
                retestlab_core::domain::Disposition::Muted(reason) => format!("muted ({reason})"),
            };
            let _ = writeln!(
                out,
                "| {} | {:?} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {} |",
                event.bar_index,
                s.direction,
                s.entry_price,
                s.stop_price,
                s.target_price,
                s.risk_reward(),
                s.confidence,
                disposition,
            );
        }
        if asset.skipped_signals > 0 {
            let _ = writeln!(
                out,
                "\n{} actionable signal(s) skipped while a position was open.",
                asset.skipped_signals
            );
        }
    }

    out
}

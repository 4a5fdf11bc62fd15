//! Serializable run configuration.
//!
//! A run file is TOML with three parts:
//!
//! ```toml
//! [engine]            # an EngineConfig; omitted keys take their defaults
//! lookback_period = 20
//!
//! [execution]         # the simulated executor
//! max_holding_bars = 30
//! trailing_atr_multiple = 1.5
//!
//! [execution.sizing]
//! mode = "risk_percent"
//! risk_pct = 0.02
//!
//! [[assets]]
//! symbol = "SPY"
//! path = "data/spy.csv"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use retestlab_core::EngineConfig;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Errors from reading or validating a run file.
#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("cannot read run config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("engine config: {0}")]
    Engine(#[from] retestlab_core::ConfigError),

    #[error("run config lists no assets")]
    NoAssets,

    #[error("asset '{0}' is listed more than once")]
    DuplicateSymbol(String),

    #[error("execution.{field} must be {expected}, got {value}")]
    Execution {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
}

/// Configuration for one multi-asset run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Engine parameters shared by every asset.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Simulated executor settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Bar series to run, one engine each.
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
}

/// One asset: a symbol and the CSV file holding its bars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetSpec {
    pub symbol: String,
    pub path: PathBuf,
}

/// Simulated executor settings.
///
/// Trailing stops and partial exits are off unless configured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Positions still open after this many bars exit at the close.
    pub max_holding_bars: usize,

    /// Starting equity; realized pnl accumulates onto it.
    pub initial_equity: f64,

    pub sizing: PositionSizing,

    /// Ratchet the stop to `close -/+ multiple * ATR` after each bar.
    pub trailing_atr_multiple: Option<f64>,

    /// Ratchet the stop to the nearest qualifying swing after each bar.
    pub structure_trailing: bool,

    pub partial_profit: Option<PartialProfit>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_holding_bars: 30,
            initial_equity: 100_000.0,
            sizing: PositionSizing::default(),
            trailing_atr_multiple: None,
            structure_trailing: false,
            partial_profit: None,
        }
    }
}

/// How many units a new position takes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PositionSizing {
    /// A constant number of units per trade.
    Fixed { units: f64 },
    /// Size so that a stop-out loses `risk_pct` of current equity.
    RiskPercent { risk_pct: f64 },
}

impl Default for PositionSizing {
    fn default() -> Self {
        PositionSizing::Fixed { units: 1.0 }
    }
}

impl PositionSizing {
    /// Units for an entry whose stop is `risk_per_unit` away.
    pub fn units(&self, equity: f64, risk_per_unit: f64) -> f64 {
        match *self {
            PositionSizing::Fixed { units } => units,
            PositionSizing::RiskPercent { risk_pct } => {
                if risk_per_unit > 0.0 && equity > 0.0 {
                    equity * risk_pct / risk_per_unit
                } else {
                    0.0
                }
            }
        }
    }
}

/// Close `fraction` of the position once price covers `level` of the way to target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PartialProfit {
    pub level: f64,
    pub fraction: f64,
}

impl Default for PartialProfit {
    fn default() -> Self {
        Self {
            level: 0.5,
            fraction: 0.5,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), RunConfigError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(RunConfigError::Execution {
        field,
        expected: "> 0",
        value,
    })
}

fn unit_open(field: &'static str, value: f64) -> Result<(), RunConfigError> {
    if value > 0.0 && value < 1.0 {
        return Ok(());
    }
    Err(RunConfigError::Execution {
        field,
        expected: "(0, 1)",
        value,
    })
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), RunConfigError> {
        if self.max_holding_bars < 1 {
            return Err(RunConfigError::Execution {
                field: "max_holding_bars",
                expected: ">= 1",
                value: self.max_holding_bars as f64,
            });
        }
        positive("initial_equity", self.initial_equity)?;
        match self.sizing {
            PositionSizing::Fixed { units } => positive("sizing.units", units)?,
            PositionSizing::RiskPercent { risk_pct } => unit_open("sizing.risk_pct", risk_pct)?,
        }
        if let Some(multiple) = self.trailing_atr_multiple {
            positive("trailing_atr_multiple", multiple)?;
        }
        if let Some(partial) = self.partial_profit {
            unit_open("partial_profit.level", partial.level)?;
            unit_open("partial_profit.fraction", partial.fraction)?;
        }
        Ok(())
    }
}

impl RunConfig {
    /// Parse and validate a run file held in memory.
    pub fn from_toml_str(src: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a run file; relative asset paths resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&src)?;
        if let Some(base) = path.parent() {
            for asset in &mut config.assets {
                if asset.path.is_relative() {
                    asset.path = base.join(&asset.path);
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.engine.validate()?;
        self.execution.validate()?;
        if self.assets.is_empty() {
            return Err(RunConfigError::NoAssets);
        }
        let mut seen = std::collections::BTreeSet::new();
        for asset in &self.assets {
            if !seen.insert(asset.symbol.as_str()) {
                return Err(RunConfigError::DuplicateSymbol(asset.symbol.clone()));
            }
        }
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

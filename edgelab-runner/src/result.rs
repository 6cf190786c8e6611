//! Backtest result and the printed summary record.

use serde::{Deserialize, Serialize};

use edgelab_core::domain::{Signal, Trade};
use edgelab_core::engine::EquityPoint;
use edgelab_core::evaluate::BacktestMetrics;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub instrument: String,
    pub bar: String,
    pub horizon_minutes: u32,
    pub horizon_steps: usize,
    pub metrics: BacktestMetrics,
    pub equity: Vec<EquityPoint>,
    pub positions: Vec<Signal>,
    pub signals: Vec<Signal>,
    pub trades: Vec<Trade>,
    pub config_fingerprint: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            &self.instrument,
            &self.bar,
            self.horizon_minutes,
            &self.metrics,
        )
    }
}

/// The one-line report printed after a backtest.
///
/// Sharpe is rounded to 4 decimals, win rate and final equity to 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub instrument: String,
    pub bar: String,
    pub horizon_m: u32,
    pub samples: usize,
    pub trades: usize,
    pub sharpe: f64,
    pub win_rate_pct: f64,
    pub final_equity: f64,
}

impl RunSummary {
    pub fn new(instrument: &str, bar: &str, horizon_m: u32, metrics: &BacktestMetrics) -> Self {
        Self {
            instrument: instrument.to_string(),
            bar: bar.to_string(),
            horizon_m,
            samples: metrics.sample_count,
            trades: metrics.trade_count,
            sharpe: round_to(metrics.sharpe, 4),
            win_rate_pct: round_to(metrics.win_rate_pct, 2),
            final_equity: round_to(metrics.final_equity, 2),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> BacktestMetrics {
        BacktestMetrics {
            sample_count: 120,
            trade_count: 7,
            sharpe: 1.234_567_8,
            win_rate_pct: 42.857_142,
            final_equity: 10_123.456_7,
            total_return: 0.012_345,
            max_drawdown: -0.004,
            exposure: 0.6,
        }
    }

    #[test]
    fn summary_rounds_reported_values() {
        let s = RunSummary::new("BTC-USDT", "1m", 5, &metrics());
        assert_eq!(s.samples, 120);
        assert_eq!(s.trades, 7);
        assert_eq!(s.sharpe, 1.2346);
        assert_eq!(s.win_rate_pct, 42.86);
        assert_eq!(s.final_equity, 10_123.46);
    }

    #[test]
    fn summary_json_field_names() {
        let s = RunSummary::new("BTC-USDT", "1m", 5, &metrics());
        let v = serde_json::to_value(&s).unwrap();
        for key in [
            "instrument",
            "bar",
            "horizon_m",
            "samples",
            "trades",
            "sharpe",
            "win_rate_pct",
            "final_equity",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn missing_schema_version_defaults() {
        let result = BacktestResult {
            schema_version: SCHEMA_VERSION,
            instrument: "BTC-USDT".into(),
            bar: "1m".into(),
            horizon_minutes: 5,
            horizon_steps: 5,
            metrics: BacktestMetrics::empty(10_000.0),
            equity: vec![],
            positions: vec![],
            signals: vec![],
            trades: vec![],
            config_fingerprint: "abc".into(),
            dataset_hash: "def".into(),
            has_synthetic: false,
        };
        let mut v = serde_json::to_value(&result).unwrap();
        v.as_object_mut().unwrap().remove("schema_version");
        let back: BacktestResult = serde_json::from_value(v).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }
}

//! Reporting and export: JSON, CSV and Parquet artifacts.
//!
//! - **JSON**: the full `BacktestResult` with schema versioning, plus the
//!   short summary record
//! - **CSV**: equity curve and trade list
//! - **Parquet**: equity curve, for dataframe tools
//!
//! Persisted results carry a `schema_version`; newer versions are rejected
//! on load.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use polars::prelude::{Column, DataFrame, NamedFrom, ParquetWriter, Series};
use tracing::info;

use edgelab_core::domain::Trade;
use edgelab_core::engine::EquityPoint;

use crate::result::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// The printed summary record as pretty JSON.
pub fn export_summary_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&result.summary()).context("failed to serialize run summary")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Equity curve as CSV: `timestamp,equity` (RFC 3339 timestamps).
pub fn export_equity_csv(equity: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for point in equity {
        wtr.write_record([point.timestamp.to_rfc3339(), format!("{:.6}", point.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade list as CSV.
///
/// Columns: start, end, side, bars_held, entry_equity, exit_equity,
/// return_pct, winner
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "start",
        "end",
        "side",
        "bars_held",
        "entry_equity",
        "exit_equity",
        "return_pct",
        "winner",
    ])?;
    for t in trades {
        wtr.write_record([
            t.start.to_string(),
            t.end.to_string(),
            t.side.to_string(),
            t.bars_held().to_string(),
            format!("{:.6}", t.entry_equity),
            format!("{:.6}", t.exit_equity),
            format!("{:.6}", t.return_pct()),
            t.is_winner().to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet export ─────────────────────────────────────────────────

pub fn write_equity_parquet(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let timestamps: Vec<String> = equity.iter().map(|p| p.timestamp.to_rfc3339()).collect();
    let values: Vec<f64> = equity.iter().map(|p| p.equity).collect();

    let mut df = DataFrame::new(vec![
        Column::Series(Series::new("timestamp".into(), timestamps).into()),
        Column::Series(Series::new("equity".into(), values).into()),
    ])
    .context("failed to build equity dataframe")?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create equity parquet {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .context("failed to write equity parquet")?;
    Ok(())
}

/// Write the equity curve to `path`; `.parquet` selects Parquet, anything
/// else CSV.
pub fn write_equity(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        write_equity_parquet(path, equity)
    } else {
        let csv = export_equity_csv(equity)?;
        std::fs::write(path, csv)
            .with_context(|| format!("failed to write equity CSV {}", path.display()))
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{instrument}_{fingerprint prefix}/` under `output_dir`
/// containing:
/// - `result.json`: the full `BacktestResult`
/// - `summary.json`: the summary record
/// - `trades.csv`
/// - `equity.csv` and `equity.parquet`
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.config_fingerprint.chars().take(12).collect();
    let dirname = format!("{}_{}", result.instrument.replace('/', "-"), prefix);
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("summary.json"), export_summary_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity)?)?;
    write_equity_parquet(&run_dir.join("equity.parquet"), &result.equity)?;

    info!(dir = %run_dir.display(), "saved artifacts");
    Ok(run_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use edgelab_core::domain::Signal;
    use edgelab_core::evaluate::BacktestMetrics;

    fn sample_result() -> BacktestResult {
        let equity = (0..4)
            .map(|i| EquityPoint {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap(),
                equity: 10_000.0 + i as f64 * 10.0,
            })
            .collect();
        BacktestResult {
            schema_version: SCHEMA_VERSION,
            instrument: "BTC-USDT".into(),
            bar: "1m".into(),
            horizon_minutes: 1,
            horizon_steps: 1,
            metrics: BacktestMetrics::empty(10_000.0),
            equity,
            positions: vec![Signal::Flat, Signal::Long, Signal::Long, Signal::Flat],
            signals: vec![Signal::Long, Signal::Long, Signal::Flat, Signal::Flat],
            trades: vec![Trade {
                start: 1,
                end: 2,
                side: Signal::Long,
                entry_equity: 10_010.0,
                exit_equity: 10_020.0,
            }],
            config_fingerprint: "0123456789abcdef0123".into(),
            dataset_hash: "hash".into(),
            has_synthetic: true,
        }
    }

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn newer_schema_rejected() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn equity_csv_layout() {
        let csv = export_equity_csv(&sample_result().equity).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,equity");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].ends_with(",10000.000000"));
    }

    #[test]
    fn trades_csv_layout() {
        let csv = export_trades_csv(&sample_result().trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("start,end,side,bars_held"));
        assert!(lines[1].starts_with("1,2,"));
        assert!(lines[1].ends_with(",true"));
    }

    #[test]
    fn write_equity_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let equity = sample_result().equity;

        let csv_path = dir.path().join("out/equity.csv");
        write_equity(&csv_path, &equity).unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with("timestamp,equity"));

        let pq_path = dir.path().join("equity.parquet");
        write_equity(&pq_path, &equity).unwrap();
        let bytes = std::fs::read(&pq_path).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");
    }

    #[test]
    fn save_artifacts_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&sample_result(), dir.path()).unwrap();
        assert!(run_dir.ends_with("BTC-USDT_0123456789ab"));
        for name in [
            "result.json",
            "summary.json",
            "trades.csv",
            "equity.csv",
            "equity.parquet",
        ] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["instrument"], "BTC-USDT");
    }
}

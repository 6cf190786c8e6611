//! Feature and label construction.
//!
//! Turns an ascending candle series into a fixed-width feature matrix and a
//! binary "did the close go up over the next `h` bars" label.
//!
//! # Alignment
//! Every per-row series in a `FeatureSet` (rows, labels, timestamps, forward
//! returns, close returns, source indices) shares one index. Rows whose
//! forward close is not observable are dropped from all of them at once.
//!
//! # Fill policy
//! Return columns zero-fill their warmup rows. Moving-average columns
//! back-fill their warmup rows from the first defined value. The two policies
//! differ on purpose and are kept as they are.

pub mod rolling;

use crate::domain::{validate_ascending, Candle, CandleError};
use chrono::{DateTime, Utc};
use rolling::{backfill_leading, finite_or_zero, pct_change, rolling_mean, EPSILON};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of feature columns.
pub const FEATURE_COUNT: usize = 10;

/// Column names, in `FeatureRow::to_array()` order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "ret_1",
    "ret_3",
    "ret_5",
    "ma_5",
    "ma_10",
    "ma_ratio",
    "vol",
    "vol_ma_10",
    "vol_ratio",
    "hl_range",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("horizon must be at least 1 step, got {0}")]
    InvalidHorizon(usize),

    #[error("candles are not strictly ascending: {0}")]
    Unordered(#[from] CandleError),
}

/// One row of features for a single candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub ret_1: f64,
    pub ret_3: f64,
    pub ret_5: f64,
    pub ma_5: f64,
    pub ma_10: f64,
    pub ma_ratio: f64,
    pub vol: f64,
    pub vol_ma_10: f64,
    pub vol_ratio: f64,
    pub hl_range: f64,
}

impl FeatureRow {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.ret_1,
            self.ret_3,
            self.ret_5,
            self.ma_5,
            self.ma_10,
            self.ma_ratio,
            self.vol,
            self.vol_ma_10,
            self.vol_ratio,
            self.hl_range,
        ]
    }
}

/// Features and labels over the rows with an observable forward close.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    horizon_steps: usize,
    rows: Vec<FeatureRow>,
    labels: Vec<u8>,
    indices: Vec<usize>,
    timestamps: Vec<DateTime<Utc>>,
    forward_returns: Vec<f64>,
    close_returns: Vec<f64>,
}

impl FeatureSet {
    /// Build features and labels with a forward horizon of `horizon_steps` rows.
    ///
    /// Label is 1 when `close[t + h] / close[t] - 1 >= 0`. A forward return of
    /// NaN (0/0) counts as 0, i.e. an up move.
    pub fn build(candles: &[Candle], horizon_steps: usize) -> Result<Self, FeatureError> {
        if horizon_steps == 0 {
            return Err(FeatureError::InvalidHorizon(horizon_steps));
        }
        let all_rows = build_unlabeled(candles)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let one_step = pct_change(&closes, 1);

        let mut set = FeatureSet {
            horizon_steps,
            ..Default::default()
        };

        for (t, row) in all_rows.into_iter().enumerate() {
            let Some(&future) = closes.get(t + horizon_steps) else {
                break;
            };
            if future.is_nan() {
                continue;
            }
            let y = future / closes[t] - 1.0;
            let y = if y.is_nan() { 0.0 } else { y };

            set.rows.push(row);
            set.labels.push(u8::from(y >= 0.0));
            set.indices.push(t);
            set.timestamps.push(candles[t].timestamp);
            set.forward_returns.push(y);
            set.close_returns.push(one_step[t]);
        }

        Ok(set)
    }

    pub fn horizon_steps(&self) -> usize {
        self.horizon_steps
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Source candle index for each row.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// `close[t + h] / close[t] - 1` per row.
    pub fn forward_returns(&self) -> &[f64] {
        &self.forward_returns
    }

    /// `close[t] / close[t - 1] - 1` per row, 0 for the first candle of the series.
    pub fn close_returns(&self) -> &[f64] {
        &self.close_returns
    }

    /// Row-major feature matrix.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.to_array().to_vec()).collect()
    }

    /// Fraction of rows labelled 1. Zero for an empty set.
    pub fn label_balance(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().map(|&l| f64::from(l)).sum::<f64>() / self.labels.len() as f64
    }
}

/// Compute a feature row for every candle, with no label truncation.
///
/// Used to score the most recent candle, whose label is not yet observable.
pub fn build_unlabeled(candles: &[Candle]) -> Result<Vec<FeatureRow>, FeatureError> {
    validate_ascending(candles)?;

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles
        .iter()
        .map(|c| if c.volume.is_nan() { 0.0 } else { c.volume })
        .collect();

    let ret_1 = pct_change(&closes, 1);
    let ret_3 = pct_change(&closes, 3);
    let ret_5 = pct_change(&closes, 5);

    let mut ma_5 = rolling_mean(&closes, 5);
    let mut ma_10 = rolling_mean(&closes, 10);
    let mut vol_ma_10 = rolling_mean(&volumes, 10);
    backfill_leading(&mut ma_5);
    backfill_leading(&mut ma_10);
    backfill_leading(&mut vol_ma_10);

    let rows = candles
        .iter()
        .enumerate()
        .map(|(t, c)| FeatureRow {
            ret_1: ret_1[t],
            ret_3: ret_3[t],
            ret_5: ret_5[t],
            ma_5: ma_5[t],
            ma_10: ma_10[t],
            ma_ratio: finite_or_zero(ma_5[t] / (ma_10[t] + EPSILON) - 1.0),
            vol: volumes[t],
            vol_ma_10: vol_ma_10[t],
            vol_ratio: finite_or_zero(volumes[t] / (vol_ma_10[t] + EPSILON)),
            hl_range: (c.high - c.low) / (c.close + EPSILON),
        })
        .collect();

    Ok(rows)
}

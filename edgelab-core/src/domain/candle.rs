//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for a single instrument and bar size.
///
/// A candle series is strictly ascending by `timestamp` with unique
/// timestamps. Gaps between bars are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

/// Ordering violations in a candle series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("candle {index} has a duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("candle {index} at {timestamp} is earlier than its predecessor")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Check that a series is strictly ascending with unique timestamps.
pub fn validate_ascending(candles: &[Candle]) -> Result<(), CandleError> {
    for (i, pair) in candles.windows(2).enumerate() {
        let index = i + 1;
        let timestamp = pair[1].timestamp;
        if pair[1].timestamp == pair[0].timestamp {
            return Err(CandleError::DuplicateTimestamp { index, timestamp });
        }
        if pair[1].timestamp < pair[0].timestamp {
            return Err(CandleError::OutOfOrder { index, timestamp });
        }
    }
    Ok(())
}

/// Sort ascending and drop duplicate timestamps. The last occurrence of a
/// timestamp in the input wins.
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    // Stable sort keeps input order among equal timestamps.
    candles.sort_by_key(|c| c.timestamp);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => out.push(candle),
        }
    }
    out
}

//! Probability-to-signal mapping and execution lag.
//!
//! A signal decided at row `t` is held as a position during row `t + 1`.
//! Nothing here reads past the current row.

use crate::domain::Signal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("invalid cost model: {0}")]
    InvalidCost(String),

    #[error("length mismatch: {left} {left_name} vs {right} {right_name}")]
    LengthMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },
}

impl SignalError {
    pub(crate) fn check_lengths(
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    ) -> Result<(), Self> {
        if left == right {
            Ok(())
        } else {
            Err(SignalError::LengthMismatch {
                left_name,
                left,
                right_name,
                right,
            })
        }
    }
}

/// Long/short cut-offs on the up-move probability.
///
/// Guaranteed `0 <= short < long <= 1`. Construct with `Thresholds::new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct Thresholds {
    short: f64,
    long: f64,
}

#[derive(Deserialize)]
struct RawThresholds {
    short: f64,
    long: f64,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = SignalError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Thresholds::new(raw.short, raw.long)
    }
}

impl Thresholds {
    pub fn new(short: f64, long: f64) -> Result<Self, SignalError> {
        if !short.is_finite() || !long.is_finite() {
            return Err(SignalError::InvalidThresholds(format!(
                "thresholds must be finite (short={short}, long={long})"
            )));
        }
        if !(0.0..=1.0).contains(&short) || !(0.0..=1.0).contains(&long) {
            return Err(SignalError::InvalidThresholds(format!(
                "thresholds must lie in [0, 1] (short={short}, long={long})"
            )));
        }
        if short >= long {
            return Err(SignalError::InvalidThresholds(format!(
                "short threshold {short} must be below long threshold {long}"
            )));
        }
        Ok(Self { short, long })
    }

    pub fn short(&self) -> f64 {
        self.short
    }

    pub fn long(&self) -> f64 {
        self.long
    }

    /// `Long` above the long cut-off, `Short` below the short one, else `Flat`.
    ///
    /// NaN compares false against both and maps to `Flat`.
    pub fn classify(&self, p: f64) -> Signal {
        if p > self.long {
            Signal::Long
        } else if p < self.short {
            Signal::Short
        } else {
            Signal::Flat
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            short: 0.45,
            long: 0.55,
        }
    }
}

pub fn signals_from_probabilities(probabilities: &[f64], thresholds: &Thresholds) -> Vec<Signal> {
    probabilities.iter().map(|&p| thresholds.classify(p)).collect()
}

/// Shift signals forward one row. Row 0 is always flat.
pub fn lagged_positions(signals: &[Signal]) -> Vec<Signal> {
    let mut positions = Vec::with_capacity(signals.len());
    if signals.is_empty() {
        return positions;
    }
    positions.push(Signal::Flat);
    positions.extend_from_slice(&signals[..signals.len() - 1]);
    positions
}

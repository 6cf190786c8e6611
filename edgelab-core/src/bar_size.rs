//! Bar sizes and horizon conversion.
//!
//! Bar strings follow the exchange convention `<count><unit>`: `1m`, `15m`,
//! `1H`, `4h`, `1D`. Units are case-insensitive.
//!
//! Two policies live here:
//! - `horizon_steps()` is permissive: an unparseable bar string yields 1 step.
//! - `bar_minutes()` is permissive: a bad count reads as 1, an unknown unit
//!   reads as 1 minute.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Minutes in a 365-day year.
pub const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarSizeError {
    #[error("empty bar string")]
    Empty,

    #[error("unknown bar unit in '{0}' (expected m, h or d)")]
    UnknownUnit(String),

    #[error("invalid bar count in '{0}'")]
    InvalidCount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarUnit {
    Minute,
    Hour,
    Day,
}

impl BarUnit {
    pub fn minutes(self) -> u32 {
        match self {
            BarUnit::Minute => 1,
            BarUnit::Hour => 60,
            BarUnit::Day => 60 * 24,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'm' => Some(BarUnit::Minute),
            'h' => Some(BarUnit::Hour),
            'd' => Some(BarUnit::Day),
            _ => None,
        }
    }
}

/// A parsed bar duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSize {
    pub count: u32,
    pub unit: BarUnit,
}

impl BarSize {
    pub fn parse(bar: &str) -> Result<Self, BarSizeError> {
        let bar = bar.trim();
        let unit_char = bar.chars().last().ok_or(BarSizeError::Empty)?;
        let unit = BarUnit::from_char(unit_char)
            .ok_or_else(|| BarSizeError::UnknownUnit(bar.to_string()))?;
        let count: u32 = bar[..bar.len() - unit_char.len_utf8()]
            .parse()
            .map_err(|_| BarSizeError::InvalidCount(bar.to_string()))?;
        if count == 0 {
            return Err(BarSizeError::InvalidCount(bar.to_string()));
        }
        Ok(Self { count, unit })
    }

    /// Bar duration in minutes (always >= 1).
    pub fn minutes(&self) -> u32 {
        self.count.saturating_mul(self.unit.minutes()).max(1)
    }

    /// Number of bars in a 365-day year.
    pub fn periods_per_year(&self) -> f64 {
        MINUTES_PER_YEAR / f64::from(self.minutes())
    }

    /// Number of whole bars covered by `horizon_minutes`, at least 1.
    pub fn steps_for(&self, horizon_minutes: u32) -> usize {
        ((horizon_minutes / self.minutes()) as usize).max(1)
    }
}

impl FromStr for BarSize {
    type Err = BarSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BarSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            BarUnit::Minute => "m",
            BarUnit::Hour => "H",
            BarUnit::Day => "D",
        };
        write!(f, "{}{unit}", self.count)
    }
}

/// Permissive bar duration in minutes.
///
/// A count that fails to parse reads as 1; an unknown unit makes the whole
/// bar read as 1 minute. The result is always at least 1.
pub fn bar_minutes(bar: &str) -> u32 {
    let bar = bar.trim();
    let Some(unit_char) = bar.chars().last() else {
        return 1;
    };
    let Some(unit) = BarUnit::from_char(unit_char) else {
        return 1;
    };
    let count: u32 = bar[..bar.len() - unit_char.len_utf8()].parse().unwrap_or(1);
    count.saturating_mul(unit.minutes()).max(1)
}

/// Bars per 365-day year for a bar string, using `bar_minutes()`.
pub fn periods_per_year(bar: &str) -> f64 {
    MINUTES_PER_YEAR / f64::from(bar_minutes(bar))
}

/// Convert a horizon in minutes to a whole number of bars, rounding down.
///
/// Never returns less than 1. An unparseable bar string falls back to a single
/// step instead of failing.
pub fn horizon_steps(bar: &str, horizon_minutes: u32) -> usize {
    match BarSize::parse(bar) {
        Ok(size) => size.steps_for(horizon_minutes),
        Err(e) => {
            warn!(bar, error = %e, "unparseable bar size, using a 1-step horizon");
            1
        }
    }
}

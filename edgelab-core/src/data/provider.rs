//! Candle provider trait and structured error types.
//!
//! The CandleProvider trait abstracts over candle sources (the OKX REST API,
//! test fixtures) so pipelines can swap implementations and mock for tests.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for candle data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("exchange API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("no candles returned for {inst} ({bar})")]
    NoCandles { inst: String, bar: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl DataError {
    /// Errors worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Network(_))
    }
}

/// Where a candle series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Okx,
    Synthetic,
}

/// Trait for candle providers.
///
/// Implementations return candles sorted ascending with unique timestamps.
pub trait CandleProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch up to `limit` of the most recent candles of size `bar`.
    fn fetch_candles(&self, inst: &str, bar: &str, limit: usize) -> Result<Vec<Candle>, DataError>;
}

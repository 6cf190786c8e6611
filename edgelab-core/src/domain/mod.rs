//! Domain types for EdgeLab

pub mod candle;
pub mod signal;
pub mod trade;

pub use candle::{normalize, validate_ascending, Candle, CandleError};
pub use signal::Signal;
pub use trade::Trade;

/// Instrument identifier type alias (e.g. "BTC-USDT").
pub type InstId = String;

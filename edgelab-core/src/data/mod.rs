//! Candle data: provider trait, OKX client and response cache.

pub mod cache;
pub mod okx;
pub mod provider;

pub use cache::{CacheStatus, ResponseCache};
pub use okx::{OkxClient, OkxSettings};
pub use provider::{CandleProvider, DataError, DataSource};

//! EdgeLab Core: candles, features and labels, signals, costs, evaluation.
//!
//! This crate contains the heart of the directional-prediction backtest:
//! - Domain types (candles, signals, trades)
//! - Bar-size parsing and horizon conversion
//! - Feature/label construction with strict look-ahead avoidance
//! - Probability-to-signal mapping, execution lag and transaction costs
//! - Performance evaluation (equity, Sharpe, trade segmentation, win rate)
//! - The classifier capability trait
//! - Candle data layer (provider trait, OKX client, response cache)

pub mod bar_size;
pub mod cost;
pub mod data;
pub mod domain;
pub mod engine;
pub mod evaluate;
pub mod features;
pub mod model;
pub mod signal;

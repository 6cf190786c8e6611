//! EdgeLab Runner: configuration, classifier, pipelines, sweeps, export.
//!
//! This crate builds on `edgelab-core` to provide:
//! - TOML configuration with validation and fingerprinting
//! - Data loading with provider/synthetic fallback
//! - A scaled logistic-regression direction classifier with JSON persistence
//! - Train, predict and backtest pipelines
//! - Threshold/cost sweeps evaluated in parallel
//! - JSON, CSV and Parquet artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod result;
pub mod sweep;

pub use config::{AppConfig, ConfigError};
pub use data_loader::{load_candles, LoadError, LoadRequest, LoadedCandles};
pub use export::{save_artifacts, write_equity};
pub use model::{model_path, LogisticModel, TrainReport, TrainSettings};
pub use pipeline::{
    predict_pipeline, prepare_backtest_inputs, run_backtest, run_backtest_with_probabilities,
    train_pipeline, BacktestInputs, DataSourceOptions, Prediction, RunError, TrainOutcome,
};
pub use result::{BacktestResult, RunSummary, SCHEMA_VERSION};
pub use sweep::{run_sweep, SweepGrid, SweepPoint, SweepResults};

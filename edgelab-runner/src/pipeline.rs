//! Pipelines: train, predict and backtest.
//!
//! Entry points:
//! - `train_pipeline()`: candles → features/labels → fitted model on disk.
//! - `predict_pipeline()`: probability of an up move for the latest candle.
//! - `run_backtest()`: candles + saved model + config → `BacktestResult`.
//! - `run_backtest_with_probabilities()`: pre-built features and
//!   probabilities, no I/O. Used by `run_backtest` and by tests.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use edgelab_core::data::CandleProvider;
use edgelab_core::engine::{simulate, EngineError};
use edgelab_core::features::{build_unlabeled, FeatureError, FeatureSet};
use edgelab_core::model::{predict_probabilities, DirectionModel, ModelError};

use crate::config::{AppConfig, ConfigError};
use crate::data_loader::{load_candles, LoadError, LoadRequest, LoadedCandles};
use crate::model::{model_path, LogisticModel, ModelMeta, TrainReport, TrainSettings};
use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Errors from the pipelines.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("model not found at {}; train it first with `edgelab train`", .path.display())]
    ModelNotFound { path: PathBuf },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("model error: {0}")]
    Model(ModelError),
    #[error("no feature rows could be built for '{inst}'")]
    NoFeatureRows { inst: String },
}

impl From<ModelError> for RunError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NotFound { path } => RunError::ModelNotFound { path },
            other => RunError::Model(other),
        }
    }
}

impl RunError {
    /// Missing model or missing candles: nothing to retry.
    pub fn is_not_found(&self) -> bool {
        match self {
            RunError::ModelNotFound { .. } => true,
            RunError::Data(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Where candles come from for one pipeline run.
#[derive(Clone, Copy)]
pub struct DataSourceOptions<'a> {
    pub provider: Option<&'a dyn CandleProvider>,
    /// Fall back to synthetic candles when the provider fails or is absent.
    pub synthetic: bool,
}

impl<'a> DataSourceOptions<'a> {
    pub fn provider(provider: &'a dyn CandleProvider) -> Self {
        Self {
            provider: Some(provider),
            synthetic: false,
        }
    }

    pub fn synthetic_only() -> Self {
        Self {
            provider: None,
            synthetic: true,
        }
    }

    fn load(&self, config: &AppConfig) -> Result<LoadedCandles, RunError> {
        let request = LoadRequest {
            inst: config.market.inst.clone(),
            bar: config.market.bar.clone(),
            limit: config.market.limit,
            synthetic: self.synthetic,
        };
        Ok(load_candles(&request, self.provider)?)
    }
}

/// Path of the model file for the configured market and horizon.
pub fn configured_model_path(config: &AppConfig) -> PathBuf {
    model_path(
        &config.model.model_dir,
        &config.market.inst,
        &config.market.bar,
        config.model.horizon_minutes,
    )
}

// ── Train ────────────────────────────────────────────────────────────

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub report: TrainReport,
    pub model_path: PathBuf,
    pub samples: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

pub fn train_pipeline(
    config: &AppConfig,
    source: DataSourceOptions<'_>,
) -> Result<TrainOutcome, RunError> {
    config.validate()?;
    let loaded = source.load(config)?;
    let horizon_steps = config.horizon_steps();
    let features = FeatureSet::build(&loaded.candles, horizon_steps)?;
    if features.is_empty() {
        return Err(RunError::NoFeatureRows {
            inst: config.market.inst.clone(),
        });
    }

    let settings = TrainSettings::from(&config.model);
    let meta = ModelMeta {
        inst: config.market.inst.clone(),
        bar: config.market.bar.clone(),
        horizon_minutes: config.model.horizon_minutes,
        horizon_steps,
        trained_at: Utc::now(),
        settings: settings.clone(),
    };
    let (model, report) = LogisticModel::train(&features, &settings, meta)?;

    let path = configured_model_path(config);
    model.save(&path)?;
    info!(
        inst = %config.market.inst,
        samples = features.len(),
        accuracy = report.accuracy,
        path = %path.display(),
        "training complete"
    );

    Ok(TrainOutcome {
        report,
        model_path: path,
        samples: features.len(),
        dataset_hash: loaded.dataset_hash,
        has_synthetic: loaded.has_synthetic,
    })
}

// ── Predict ──────────────────────────────────────────────────────────

/// Probability of an up move over the horizon, for the latest candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub inst: String,
    pub prob_up: f64,
    pub bar: String,
    pub horizon_m: u32,
    pub as_of: DateTime<Utc>,
}

pub fn predict_pipeline(
    config: &AppConfig,
    source: DataSourceOptions<'_>,
) -> Result<Prediction, RunError> {
    config.validate()?;
    // Model first: a missing model must fail before any network call.
    let model = LogisticModel::load(&configured_model_path(config))?;
    warn_on_meta_mismatch(&model, config);

    let loaded = source.load(config)?;
    let rows = build_unlabeled(&loaded.candles)?;
    let (row, candle) = match (rows.last(), loaded.candles.last()) {
        (Some(row), Some(candle)) => (row, candle),
        _ => {
            return Err(RunError::NoFeatureRows {
                inst: config.market.inst.clone(),
            })
        }
    };

    let prob_up = model.estimate(row).into_probability();
    info!(inst = %config.market.inst, prob_up, "prediction");
    Ok(Prediction {
        inst: config.market.inst.clone(),
        prob_up,
        bar: config.market.bar.clone(),
        horizon_m: config.model.horizon_minutes,
        as_of: candle.timestamp,
    })
}

// ── Backtest ─────────────────────────────────────────────────────────

/// Features and model probabilities for one candle series.
///
/// Built once and then evaluated under as many strategy parameter sets as
/// needed (single backtest or sweep).
#[derive(Debug, Clone)]
pub struct BacktestInputs {
    pub features: FeatureSet,
    pub probabilities: Vec<f64>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

pub fn prepare_backtest_inputs(
    config: &AppConfig,
    source: DataSourceOptions<'_>,
) -> Result<BacktestInputs, RunError> {
    config.validate()?;
    let model = LogisticModel::load(&configured_model_path(config))?;
    warn_on_meta_mismatch(&model, config);

    let loaded = source.load(config)?;
    let features = FeatureSet::build(&loaded.candles, config.horizon_steps())?;
    let probabilities = predict_probabilities(&model, features.rows());
    Ok(BacktestInputs {
        features,
        probabilities,
        dataset_hash: loaded.dataset_hash,
        has_synthetic: loaded.has_synthetic,
    })
}

/// Load candles and the saved model, then backtest under `config`.
pub fn run_backtest(
    config: &AppConfig,
    source: DataSourceOptions<'_>,
) -> Result<BacktestResult, RunError> {
    let inputs = prepare_backtest_inputs(config, source)?;
    run_backtest_with_probabilities(
        &inputs.features,
        &inputs.probabilities,
        config,
        &inputs.dataset_hash,
        inputs.has_synthetic,
    )
}

/// Backtest pre-built features against given probabilities. No I/O.
pub fn run_backtest_with_probabilities(
    features: &FeatureSet,
    probabilities: &[f64],
    config: &AppConfig,
    dataset_hash: &str,
    has_synthetic: bool,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let params = config.strategy_params()?;
    let sim = simulate(features, probabilities, &params)?;

    info!(
        inst = %config.market.inst,
        samples = sim.metrics.sample_count,
        trades = sim.metrics.trade_count,
        sharpe = sim.metrics.sharpe,
        final_equity = sim.metrics.final_equity,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        instrument: config.market.inst.clone(),
        bar: config.market.bar.clone(),
        horizon_minutes: config.model.horizon_minutes,
        horizon_steps: features.horizon_steps(),
        positions: sim.returns.positions,
        signals: sim.signals,
        equity: sim.equity,
        trades: sim.trades,
        metrics: sim.metrics,
        config_fingerprint: config.fingerprint(),
        dataset_hash: dataset_hash.to_string(),
        has_synthetic,
    })
}

fn warn_on_meta_mismatch(model: &LogisticModel, config: &AppConfig) {
    let meta = &model.meta;
    if meta.bar != config.market.bar || meta.horizon_minutes != config.model.horizon_minutes {
        warn!(
            model_bar = %meta.bar,
            model_horizon = meta.horizon_minutes,
            bar = %config.market.bar,
            horizon = config.model.horizon_minutes,
            "model was trained for a different bar or horizon"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.market.limit = 400;
        config.model.model_dir = dir.join("models");
        config.model.max_iter = 200;
        config
    }

    #[test]
    fn model_error_not_found_maps_to_model_not_found() {
        let err: RunError = ModelError::NotFound {
            path: PathBuf::from("m.json"),
        }
        .into();
        assert!(matches!(err, RunError::ModelNotFound { .. }));
        assert!(err.is_not_found());

        let err: RunError = ModelError::NotFitted.into();
        assert!(matches!(err, RunError::Model(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn predict_without_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = predict_pipeline(&config, DataSourceOptions::synthetic_only()).unwrap_err();
        assert!(matches!(err, RunError::ModelNotFound { .. }));
    }

    #[test]
    fn backtest_without_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run_backtest(&config, DataSourceOptions::synthetic_only()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn no_source_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let source = DataSourceOptions {
            provider: None,
            synthetic: false,
        };
        let err = train_pipeline(&config, source).unwrap_err();
        assert!(matches!(err, RunError::Data(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn probability_count_mismatch_is_engine_error() {
        let candles = crate::data_loader::generate_synthetic_candles("X", "1m", 50);
        let features = FeatureSet::build(&candles, 5).unwrap();
        let config = AppConfig::default();
        let err =
            run_backtest_with_probabilities(&features, &[0.5; 3], &config, "h", true).unwrap_err();
        assert!(matches!(err, RunError::Engine(_)));
    }
}

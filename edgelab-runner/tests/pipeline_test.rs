//! End-to-end pipeline tests on synthetic candles.
//!
//! Each test gets its own temp directory for models, caches and artifacts.

use std::path::Path;
use std::time::Duration;

use edgelab_core::data::{OkxClient, OkxSettings, ResponseCache};
use edgelab_core::domain::Signal;
use edgelab_runner::data_loader::generate_synthetic_candles;
use edgelab_runner::{
    predict_pipeline, prepare_backtest_inputs, run_backtest, run_backtest_with_probabilities,
    run_sweep, save_artifacts, train_pipeline, AppConfig, DataSourceOptions, LogisticModel,
    RunError, SweepGrid,
};

fn config_in(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.market.inst = "BTC-USDT".to_string();
    config.market.limit = 400;
    config.model.model_dir = dir.join("models");
    config.model.max_iter = 200;
    config.backtest.output_dir = dir.join("runs");
    config.cache.dir = dir.join("cache");
    config
}

#[test]
fn train_then_predict_then_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let source = DataSourceOptions::synthetic_only();

    let outcome = train_pipeline(&config, source).unwrap();
    assert!(outcome.model_path.exists());
    assert!(outcome.has_synthetic);
    assert_eq!(outcome.samples, 400 - config.horizon_steps());
    assert_eq!(
        outcome.report.train_size + outcome.report.test_size,
        outcome.samples
    );
    assert!((0.0..=1.0).contains(&outcome.report.accuracy));

    let model = LogisticModel::load(&outcome.model_path).unwrap();
    assert_eq!(model.meta.inst, "BTC-USDT");
    assert_eq!(model.meta.horizon_minutes, config.model.horizon_minutes);

    let prediction = predict_pipeline(&config, source).unwrap();
    assert!((0.0..=1.0).contains(&prediction.prob_up));
    assert_eq!(prediction.inst, "BTC-USDT");
    assert_eq!(prediction.horizon_m, config.model.horizon_minutes);
    let candles = generate_synthetic_candles("BTC-USDT", "1m", 400);
    assert_eq!(prediction.as_of, candles[399].timestamp);

    let result = run_backtest(&config, source).unwrap();
    assert!(result.has_synthetic);
    assert_eq!(result.metrics.sample_count, outcome.samples);
    assert_eq!(result.equity.len(), result.metrics.sample_count);
    assert_eq!(result.positions.len(), result.signals.len());
    assert_eq!(result.positions[0], Signal::Flat);
    assert_eq!(result.config_fingerprint, config.fingerprint());
    assert!(result.equity.iter().all(|p| p.equity > 0.0));
}

#[test]
fn backtest_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let source = DataSourceOptions::synthetic_only();
    train_pipeline(&config, source).unwrap();

    let a = run_backtest(&config, source).unwrap();
    let b = run_backtest(&config, source).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_model_is_reported_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let err = run_backtest(&config, DataSourceOptions::synthetic_only()).unwrap_err();
    assert!(matches!(err, RunError::ModelNotFound { .. }));
    assert!(err.is_not_found());
}

#[test]
fn offline_cache_miss_fails_without_synthetic() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let cache = ResponseCache::new(&config.cache.dir, Duration::from_secs(120));
    let client = OkxClient::new(OkxSettings::default(), cache)
        .unwrap()
        .cache_only(true);

    let err = train_pipeline(&config, DataSourceOptions::provider(&client)).unwrap_err();
    assert!(matches!(err, RunError::Data(_)));
    assert!(!err.is_not_found());

    let source = DataSourceOptions {
        provider: Some(&client),
        synthetic: true,
    };
    let outcome = train_pipeline(&config, source).unwrap();
    assert!(outcome.has_synthetic);
}

#[test]
fn artifacts_and_sweep_from_shared_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let source = DataSourceOptions::synthetic_only();
    train_pipeline(&config, source).unwrap();

    let inputs = prepare_backtest_inputs(&config, source).unwrap();
    let result = run_backtest_with_probabilities(
        &inputs.features,
        &inputs.probabilities,
        &config,
        &inputs.dataset_hash,
        inputs.has_synthetic,
    )
    .unwrap();

    let run_dir = save_artifacts(&result, &config.backtest.output_dir).unwrap();
    assert!(run_dir.join("equity.parquet").exists());
    assert!(run_dir.join("trades.csv").exists());

    let params = config.strategy_params().unwrap();
    let grid = SweepGrid::around(&params.costs);
    let sweep = run_sweep(&inputs.features, &inputs.probabilities, &params, &grid).unwrap();
    assert!(!sweep.is_empty());

    // The configured point is in the grid and must reproduce the backtest.
    let point = sweep
        .all()
        .iter()
        .find(|p| p.thr_short == 0.45 && p.thr_long == 0.55)
        .unwrap();
    assert_eq!(point.metrics, result.metrics);
}

#[test]
fn overridden_thresholds_change_the_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let mut other = config.clone();
    other.strategy.thr_long = 0.6;
    assert_ne!(config.fingerprint(), other.fingerprint());
}

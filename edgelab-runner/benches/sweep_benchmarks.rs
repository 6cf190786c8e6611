//! Criterion benchmarks for the runner's sweep and training paths.
//!
//! Run with: `cargo bench -p edgelab-runner`
//!
//! - Threshold/cost sweep over one prediction vector (rayon)
//! - Logistic model training on a synthetic series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edgelab_core::engine::StrategyParams;
use edgelab_core::features::FeatureSet;
use edgelab_runner::data_loader::generate_synthetic_candles;
use edgelab_runner::model::{LogisticModel, ModelMeta, TrainSettings};
use edgelab_runner::{run_sweep, SweepGrid};

fn features(n: usize) -> FeatureSet {
    let candles = generate_synthetic_candles("BENCH", "1m", n);
    match FeatureSet::build(&candles, 5) {
        Ok(f) => f,
        Err(e) => panic!("feature build failed: {e}"),
    }
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    let base = StrategyParams::default();
    let grid = SweepGrid {
        thr_short: vec![0.30, 0.35, 0.40, 0.45, 0.50],
        thr_long: vec![0.50, 0.55, 0.60, 0.65, 0.70],
        fee_bps: vec![0.0, 5.0, 10.0],
        slippage_bps: vec![2.0],
    };

    for n in [2_000usize, 20_000] {
        let features = features(n);
        let probs: Vec<f64> = (0..features.len())
            .map(|i| 0.5 + 0.15 * (i as f64 * 0.37).sin())
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| run_sweep(black_box(&features), black_box(&probs), &base, &grid))
        });
    }
    group.finish();
}

fn bench_train(c: &mut Criterion) {
    let features = features(2_000);
    let settings = TrainSettings {
        max_iter: 200,
        ..TrainSettings::default()
    };
    let meta = ModelMeta {
        inst: "BENCH".into(),
        bar: "1m".into(),
        horizon_minutes: 5,
        horizon_steps: 5,
        trained_at: chrono::Utc::now(),
        settings: settings.clone(),
    };
    c.bench_function("train_logistic_2k", |b| {
        b.iter(|| LogisticModel::train(black_box(&features), &settings, meta.clone()))
    });
}

criterion_group!(benches, bench_sweep, bench_train);
criterion_main!(benches);

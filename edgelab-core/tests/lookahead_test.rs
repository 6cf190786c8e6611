//! Look-ahead contamination tests for features, labels and positions.
//!
//! Invariants:
//! - A feature row at t never depends on candles after t (once the longest
//!   moving-average window has filled).
//! - A label at t never depends on candles after t + h.
//! - A position at t never depends on probabilities at or after t.
//!
//! Method: compute on a truncated or perturbed series and on the full series,
//! and assert the overlapping prefix is identical.

use chrono::{TimeZone, Utc};
use edgelab_core::domain::{Candle, Signal};
use edgelab_core::engine::{simulate, StrategyParams};
use edgelab_core::features::{build_unlabeled, FeatureRow, FeatureSet};

/// Longest rolling window used by the feature builder.
const WARMUP: usize = 10;

/// Generate N minute candles with realistic variation.
fn make_test_candles(n: usize) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.01;
        price = (price + change).max(10.0);

        let open = price - 0.05;
        let close = price + 0.03;
        candles.push(Candle {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
            open,
            high: open.max(close) + 0.2,
            low: open.min(close) - 0.2,
            close,
            volume: 50.0 + (seed % 97) as f64,
        });
    }

    candles
}

/// Multiply every price and volume after `from` by a factor.
fn perturb_after(candles: &[Candle], from: usize, factor: f64) -> Vec<Candle> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i <= from {
                c.clone()
            } else {
                Candle {
                    open: c.open * factor,
                    high: c.high * factor,
                    low: c.low * factor,
                    close: c.close * factor,
                    volume: c.volume * factor,
                    ..c.clone()
                }
            }
        })
        .collect()
}

fn assert_rows_equal(label: &str, a: &[FeatureRow], b: &[FeatureRow]) {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        for (col, (u, v)) in x.to_array().iter().zip(y.to_array()).enumerate() {
            if u.is_nan() && v.is_nan() {
                continue;
            }
            assert!(
                (u - v).abs() < 1e-12,
                "{label}: look-ahead contamination at row {i}, column {col}: {u} vs {v}"
            );
        }
    }
}

#[test]
fn features_truncated_vs_full() {
    let candles = make_test_candles(200);
    let full = build_unlabeled(&candles).unwrap();
    for cut in [WARMUP, 37, 100, 199] {
        let truncated = build_unlabeled(&candles[..cut]).unwrap();
        assert_eq!(truncated.len(), cut);
        assert_rows_equal(&format!("cut={cut}"), &truncated, &full[..cut]);
    }
}

#[test]
fn features_ignore_perturbed_future() {
    let candles = make_test_candles(150);
    let base = build_unlabeled(&candles).unwrap();
    for from in [WARMUP - 1, 40, 120] {
        let perturbed = build_unlabeled(&perturb_after(&candles, from, 3.0)).unwrap();
        assert_rows_equal(&format!("from={from}"), &perturbed[..=from], &base[..=from]);
    }
}

#[test]
fn labels_depend_only_on_horizon_window() {
    let candles = make_test_candles(150);
    for h in [1, 5, 12] {
        let base = FeatureSet::build(&candles, h).unwrap();
        let from = 60;
        let perturbed = FeatureSet::build(&perturb_after(&candles, from + h, 0.5), h).unwrap();
        assert_eq!(
            &base.labels()[..=from],
            &perturbed.labels()[..=from],
            "labels changed for h={h}"
        );
        assert_eq!(
            &base.forward_returns()[..=from],
            &perturbed.forward_returns()[..=from]
        );
    }
}

#[test]
fn labelled_rows_match_unlabelled_prefix() {
    let candles = make_test_candles(120);
    let all = build_unlabeled(&candles).unwrap();
    let set = FeatureSet::build(&candles, 7).unwrap();
    assert_eq!(set.len(), 113);
    assert_rows_equal("labelled", set.rows(), &all[..113]);
}

#[test]
fn positions_ignore_current_and_future_probabilities() {
    let candles = make_test_candles(100);
    let set = FeatureSet::build(&candles, 5).unwrap();
    let params = StrategyParams::default();

    let probs: Vec<f64> = (0..set.len()).map(|i| if i % 4 < 2 { 0.8 } else { 0.2 }).collect();
    let base = simulate(&set, &probs, &params).unwrap();

    let k = 40;
    let mut changed = probs.clone();
    for p in &mut changed[k..] {
        *p = 0.5;
    }
    let other = simulate(&set, &changed, &params).unwrap();

    assert_eq!(&base.positions()[..=k], &other.positions()[..=k]);
    assert_eq!(&base.returns.net[..k], &other.returns.net[..k]);
    assert_eq!(base.positions()[0], Signal::Flat);
}

//! Logistic-regression direction classifier.
//!
//! A standard scaler followed by an L2-regularised logistic regression,
//! fitted by batch gradient descent on a stratified, seeded train split.
//! Persisted as pretty JSON so a saved model can be inspected and diffed.

use chrono::{DateTime, Utc};
use edgelab_core::features::{FeatureRow, FeatureSet, FEATURE_COUNT, FEATURE_NAMES};
use edgelab_core::model::{DirectionModel, ModelError, UpEstimate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ModelConfig;

/// Gradient magnitude below which fitting stops early.
const GRADIENT_TOLERANCE: f64 = 1e-7;

/// Hyper-parameters for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSettings {
    pub test_size: f64,
    pub random_state: u64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2: f64,
}

impl From<&ModelConfig> for TrainSettings {
    fn from(cfg: &ModelConfig) -> Self {
        Self {
            test_size: cfg.test_size,
            random_state: cfg.random_state,
            learning_rate: cfg.learning_rate,
            max_iter: cfg.max_iter,
            l2: cfg.l2,
        }
    }
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

// ── Scaler ──────────────────────────────────────────────────────────

/// Per-column standardisation with population statistics.
///
/// Zero-variance columns get a unit scale, so they standardise to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut var = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m).powi(2) / n;
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let s = v.sqrt();
                if s.is_finite() && s > 0.0 {
                    s
                } else {
                    1.0
                }
            })
            .collect();
        Self { mean, scale }
    }

    /// Standardise one row. Non-finite results become 0.
    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (j, o) in out.iter_mut().enumerate() {
            let z = (row[j] - self.mean[j]) / self.scale[j];
            *o = if z.is_finite() { z } else { 0.0 };
        }
        out
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Hold-out evaluation of a freshly trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub accuracy: f64,
    /// Class 0 (down) then class 1 (up).
    pub classes: [ClassReport; 2],
    pub train_size: usize,
    pub test_size: usize,
    pub iterations: usize,
    pub label_balance: f64,
}

impl TrainReport {
    fn evaluate(actual: &[u8], predicted: &[u8]) -> ([ClassReport; 2], f64) {
        let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
        let accuracy = correct as f64 / actual.len().max(1) as f64;

        let classes = [0u8, 1u8].map(|class| {
            let tp = actual
                .iter()
                .zip(predicted)
                .filter(|&(&a, &p)| a == class && p == class)
                .count() as f64;
            let predicted_pos = predicted.iter().filter(|&&p| p == class).count() as f64;
            let support = actual.iter().filter(|&&a| a == class).count();
            let precision = if predicted_pos > 0.0 { tp / predicted_pos } else { 0.0 };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassReport {
                precision,
                recall,
                f1,
                support,
            }
        });
        (classes, accuracy)
    }
}

// ── Model ───────────────────────────────────────────────────────────

/// Provenance stored next to the fitted weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub inst: String,
    pub bar: String,
    pub horizon_minutes: u32,
    pub horizon_steps: usize,
    pub trained_at: DateTime<Utc>,
    pub settings: TrainSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub meta: ModelMeta,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    /// Split, fit on the train part and report on the held-out part.
    pub fn train(
        features: &FeatureSet,
        settings: &TrainSettings,
        meta: ModelMeta,
    ) -> Result<(Self, TrainReport), ModelError> {
        let rows: Vec<[f64; FEATURE_COUNT]> = features.rows().iter().map(|r| r.to_array()).collect();
        let labels = features.labels();

        if let Some(i) = rows.iter().position(|r| r.iter().any(|x| !x.is_finite())) {
            return Err(ModelError::InvalidData(format!(
                "feature row {i} contains a non-finite value; more candles are needed"
            )));
        }

        let (train_idx, test_idx) =
            stratified_split(labels, settings.test_size, settings.random_state)?;

        let train_rows: Vec<[f64; FEATURE_COUNT]> = train_idx.iter().map(|&i| rows[i]).collect();
        let train_labels: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();

        let scaler = StandardScaler::fit(&train_rows);
        let scaled: Vec<[f64; FEATURE_COUNT]> =
            train_rows.iter().map(|r| scaler.transform(r)).collect();
        let (weights, bias, iterations) = fit_logistic(&scaled, &train_labels, settings);

        let model = Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            weights,
            bias,
            meta,
        };

        let test_labels: Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();
        let predicted: Vec<u8> = test_idx
            .iter()
            .map(|&i| u8::from(model.probability(&rows[i]) >= 0.5))
            .collect();
        let (classes, accuracy) = TrainReport::evaluate(&test_labels, &predicted);

        let report = TrainReport {
            accuracy,
            classes,
            train_size: train_idx.len(),
            test_size: test_idx.len(),
            iterations,
            label_balance: features.label_balance(),
        };
        info!(
            train = report.train_size,
            test = report.test_size,
            accuracy = report.accuracy,
            iterations,
            "trained logistic model"
        );
        Ok((model, report))
    }

    /// Probability of an up move for one raw feature row.
    pub fn probability(&self, row: &[f64; FEATURE_COUNT]) -> f64 {
        let x = self.scaler.transform(row);
        let z: f64 = self.weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + self.bias;
        sigmoid(z)
    }

    /// Write as pretty JSON (atomic: .tmp then rename).
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        debug!(path = %path.display(), "saved model");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        if model.weights.len() != FEATURE_COUNT
            || model.scaler.mean.len() != FEATURE_COUNT
            || model.scaler.scale.len() != FEATURE_COUNT
        {
            return Err(ModelError::InvalidData(format!(
                "model at {} has the wrong number of features",
                path.display()
            )));
        }
        Ok(model)
    }
}

impl DirectionModel for LogisticModel {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn estimate(&self, row: &FeatureRow) -> UpEstimate {
        UpEstimate::Probability(self.probability(&row.to_array()))
    }
}

/// Where the model for an instrument, bar and horizon lives.
pub fn model_path(dir: &Path, inst: &str, bar: &str, horizon_minutes: u32) -> PathBuf {
    let safe = inst.replace('/', "-");
    dir.join(format!("logreg_price_move_{safe}_{bar}_{horizon_minutes}m.json"))
}

/// Shuffle each class separately and hold out `test_size` of each.
///
/// Every class must have at least two rows so both sides of the split see it.
pub fn stratified_split(
    labels: &[u8],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), ModelError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ModelError::InvalidData(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        if idx.len() < 2 {
            return Err(ModelError::InvalidData(format!(
                "class {class} has {} rows; at least 2 of each class are needed",
                idx.len()
            )));
        }
        idx.shuffle(&mut rng);
        let n_test = ((idx.len() as f64 * test_size).round() as usize).clamp(1, idx.len() - 1);
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

fn fit_logistic(
    rows: &[[f64; FEATURE_COUNT]],
    labels: &[u8],
    settings: &TrainSettings,
) -> (Vec<f64>, f64, usize) {
    let n = rows.len().max(1) as f64;
    let mut w = vec![0.0; FEATURE_COUNT];
    let mut b = 0.0;
    let mut iterations = 0;

    for _ in 0..settings.max_iter {
        iterations += 1;
        let mut grad_w = vec![0.0; FEATURE_COUNT];
        let mut grad_b = 0.0;
        for (x, &y) in rows.iter().zip(labels) {
            let z: f64 = w.iter().zip(x).map(|(wi, xi)| wi * xi).sum::<f64>() + b;
            let err = sigmoid(z) - f64::from(y);
            for (g, xi) in grad_w.iter_mut().zip(x) {
                *g += err * xi / n;
            }
            grad_b += err / n;
        }
        for (g, wi) in grad_w.iter_mut().zip(&w) {
            *g += settings.l2 * wi;
        }

        let max_grad = grad_w.iter().fold(grad_b.abs(), |m, g| m.max(g.abs()));
        for (wi, g) in w.iter_mut().zip(&grad_w) {
            *wi -= settings.learning_rate * g;
        }
        b -= settings.learning_rate * grad_b;

        if max_grad < GRADIENT_TOLERANCE {
            break;
        }
    }
    (w, b, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use edgelab_core::domain::Candle;

    fn meta() -> ModelMeta {
        ModelMeta {
            inst: "TEST".into(),
            bar: "1m".into(),
            horizon_minutes: 1,
            horizon_steps: 1,
            trained_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            settings: TrainSettings::default(),
        }
    }

    /// Alternating up/down closes: an up move always follows a down move.
    fn zigzag_features(n: usize) -> FeatureSet {
        let candles: Vec<Candle> = (0..n)
            .map(|i| {
                let close = if i % 2 == 0 { 100.0 } else { 101.0 };
                Candle {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 10.0,
                }
            })
            .collect();
        FeatureSet::build(&candles, 1).unwrap()
    }

    #[test]
    fn scaler_standardises_columns() {
        let mut a = [0.0; FEATURE_COUNT];
        let mut b = [0.0; FEATURE_COUNT];
        a[0] = 1.0;
        b[0] = 3.0;
        a[1] = 5.0;
        b[1] = 5.0;
        let scaler = StandardScaler::fit(&[a, b]);
        assert_eq!(scaler.mean[0], 2.0);
        assert_eq!(scaler.scale[0], 1.0);
        assert_eq!(scaler.scale[1], 1.0);
        let t = scaler.transform(&a);
        assert_eq!(t[0], -1.0);
        assert_eq!(t[1], 0.0);
    }

    #[test]
    fn split_is_stratified_and_seeded() {
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i % 5 == 0)).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(train.len() + test.len(), 50);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 2);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 0).count(), 8);
        assert_eq!(stratified_split(&labels, 0.2, 42).unwrap(), (train, test));
    }

    #[test]
    fn split_rejects_single_class() {
        assert!(matches!(
            stratified_split(&[1, 1, 1, 0], 0.25, 1),
            Err(ModelError::InvalidData(_))
        ));
    }

    #[test]
    fn learns_zigzag_pattern() {
        let features = zigzag_features(80);
        let (model, report) =
            LogisticModel::train(&features, &TrainSettings::default(), meta()).unwrap();
        assert!(report.accuracy > 0.9, "accuracy {}", report.accuracy);
        assert_eq!(report.train_size + report.test_size, features.len());
        assert_eq!(report.classes[0].support + report.classes[1].support, report.test_size);

        // After a down move (ret_1 < 0) the next move is up.
        let down_row = features
            .rows()
            .iter()
            .find(|r| r.ret_1 < 0.0)
            .unwrap();
        assert!(model.probability(&down_row.to_array()) > 0.5);
    }

    #[test]
    fn non_finite_features_rejected() {
        // Fewer candles than the 10-bar window leaves moving averages undefined.
        let features = zigzag_features(8);
        let err = LogisticModel::train(&features, &TrainSettings::default(), meta()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidData(_)));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = model_path(dir.path(), "BTC/USDT", "1m", 5);
        assert!(path.to_string_lossy().contains("BTC-USDT_1m_5m"));

        let (model, _) =
            LogisticModel::train(&zigzag_features(60), &TrainSettings::default(), meta()).unwrap();
        model.save(&path).unwrap();
        let loaded = LogisticModel::load(&path).unwrap();
        assert_eq!(loaded.meta, model.meta);
        assert_eq!(loaded.feature_names, model.feature_names);
        for (a, b) in loaded.weights.iter().zip(&model.weights) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((loaded.bias - model.bias).abs() < 1e-12);
        assert_eq!(loaded.name(), "logistic_regression");
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogisticModel::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn report_metrics() {
        let (classes, acc) = TrainReport::evaluate(&[1, 1, 0, 0], &[1, 0, 0, 0]);
        assert_eq!(acc, 0.75);
        assert_eq!(classes[1].precision, 1.0);
        assert_eq!(classes[1].recall, 0.5);
        assert!((classes[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(classes[0].support, 2);
    }
}
